//! Status codes reported by the native window, the presentation sink and the
//! composition backend

use thiserror::Error;

/// Failure status returned by a collaborator call
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusError {
    #[error("out of memory")]
    NoMemory,
    #[error("bad value")]
    BadValue,
    #[error("not initialized")]
    NoInit,
    #[error("operation would block")]
    WouldBlock,
    #[error("timed out")]
    TimedOut,
    #[error("dead object")]
    DeadObject,
    #[error("invalid operation")]
    InvalidOperation,
    /// A code with no variant of its own. Build it through
    /// [`StatusError::from_code`], which never wraps a known code or `0`.
    #[error("unknown error {0}")]
    Unknown(i32),
}

/// Code reported for an `Unknown` that was built around `0`
pub const UNKNOWN_ERROR: i32 = i32::MIN;

impl StatusError {
    /// Native (negative errno style) status code. Never `0`.
    pub fn code(&self) -> i32 {
        match self {
            StatusError::NoMemory => -12,
            StatusError::BadValue => -22,
            StatusError::NoInit => -19,
            StatusError::WouldBlock => -11,
            StatusError::TimedOut => -110,
            StatusError::DeadObject => -32,
            StatusError::InvalidOperation => -38,
            StatusError::Unknown(0) => UNKNOWN_ERROR,
            StatusError::Unknown(code) => *code,
        }
    }

    /// Replaces an `Unknown` that wraps a known code with the matching variant
    pub fn normalized(self) -> Self {
        match self {
            StatusError::Unknown(code) => Self::from_code(code).unwrap_or(self),
            other => other,
        }
    }

    /// Maps a native status code; `0` means success and yields `None`
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => None,
            -12 => Some(StatusError::NoMemory),
            -22 => Some(StatusError::BadValue),
            -19 => Some(StatusError::NoInit),
            -11 => Some(StatusError::WouldBlock),
            -110 => Some(StatusError::TimedOut),
            -32 => Some(StatusError::DeadObject),
            -38 => Some(StatusError::InvalidOperation),
            other => Some(StatusError::Unknown(other)),
        }
    }
}

/// Result of a collaborator call that produces no value
pub type Status = Result<(), StatusError>;

/// Converts a status into its native code, `0` for success
pub fn status_code(status: &Status) -> i32 {
    match status {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}
