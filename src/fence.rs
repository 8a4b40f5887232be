//! Sync fences handed between the renderer, the buffer queue and the display
//!
//! A [`Fence`] is a single-consumer handle onto a shared signal. It is not
//! `Clone`: giving the same signal to a second consumer requires [`Fence::dup`],
//! which mints a new handle. Dropping a handle never signals or cancels the
//! underlying fence.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::status::StatusError;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static NEXT_SIGNAL: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct FenceSignal {
    id: u64,
    signaled: Mutex<bool>,
    cond: Condvar,
}

/// Owned handle to a sync fence
#[derive(Debug)]
pub struct Fence {
    signal: Option<Arc<FenceSignal>>,
    handle: u64,
}

impl Fence {
    /// The empty fence: always considered signaled
    pub fn no_fence() -> Self {
        Self {
            signal: None,
            handle: 0,
        }
    }

    /// Creates a pending fence that some producer will signal later.
    ///
    /// Unlike [`Fence::default`], which is the empty fence, this one blocks
    /// waiters until [`Fence::signal`] is called.
    pub fn pending() -> Self {
        let signal = FenceSignal {
            id: NEXT_SIGNAL.fetch_add(1, Ordering::Relaxed),
            signaled: Mutex::new(false),
            cond: Condvar::new(),
        };
        Self {
            signal: Some(Arc::new(signal)),
            handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Creates a fence that has already fired
    pub fn signaled() -> Self {
        let fence = Self::pending();
        fence.signal();
        fence
    }

    /// Whether this handle refers to a real fence
    pub fn is_valid(&self) -> bool {
        self.signal.is_some()
    }

    /// Handle number of this particular copy, `None` for [`Fence::no_fence`]
    pub fn handle(&self) -> Option<u64> {
        self.signal.as_ref().map(|_| self.handle)
    }

    /// Identity of the underlying signal, shared by all duplicates
    pub fn signal_id(&self) -> Option<u64> {
        self.signal.as_ref().map(|s| s.id)
    }

    /// Mints an independent handle observing the same signal
    pub fn dup(&self) -> Fence {
        match &self.signal {
            Some(signal) => Fence {
                signal: Some(Arc::clone(signal)),
                handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
            },
            None => Fence::no_fence(),
        }
    }

    /// True when both handles observe the same signal
    pub fn shares_signal_with(&self, other: &Fence) -> bool {
        match (&self.signal, &other.signal) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Fires the fence, waking every waiter on any duplicate
    pub fn signal(&self) {
        if let Some(signal) = &self.signal {
            let mut fired = signal.signaled.lock();
            *fired = true;
            signal.cond.notify_all();
        }
    }

    pub fn is_signaled(&self) -> bool {
        match &self.signal {
            Some(signal) => *signal.signaled.lock(),
            None => true,
        }
    }

    /// Blocks until the fence fires or `timeout` elapses
    pub fn wait(&self, timeout: Duration) -> Result<(), StatusError> {
        let Some(signal) = &self.signal else {
            return Ok(());
        };

        let deadline = Instant::now() + timeout;
        let mut fired = signal.signaled.lock();
        while !*fired {
            if signal.cond.wait_until(&mut fired, deadline).timed_out() {
                return if *fired { Ok(()) } else { Err(StatusError::TimedOut) };
            }
        }
        Ok(())
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::no_fence()
    }
}
