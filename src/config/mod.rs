//! Configuration for the display simulator
//!
//! This module handles loading, parsing, and validating the TOML file that
//! describes which displays `surface-sim` drives, how many frames it runs,
//! and which faults it injects into each display's collaborators.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::buffer::Dataspace;
use crate::sim::{CompositionPattern, FaultPlan};
use crate::surface::DisplayKind;

/// Main configuration struct for a simulation run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    /// Run-wide settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Displays to drive, each on its own producer
    #[serde(default = "SimConfig::default_displays")]
    pub displays: Vec<DisplayConfig>,
}

/// Run-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Frames to produce per display
    pub frames: u64,

    /// Enable debug logging
    pub debug: bool,

    /// How long the simulated GPU waits on a dequeue fence (milliseconds)
    pub acquire_timeout_ms: u64,
}

/// One simulated display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    /// Name used in logs and dumps
    pub name: String,

    /// `physical` or `virtual`
    pub kind: DisplayKind,

    /// Width in pixels
    pub width: i32,

    /// Height in pixels
    pub height: i32,

    /// Request protected-content buffers after initialization
    #[serde(default)]
    pub protected: bool,

    /// Color space tag for queued buffers
    #[serde(default)]
    pub dataspace: Dataspace,

    /// Hardware composer id; leave unset for a GPU-only display
    #[serde(default)]
    pub hwc_id: Option<u64>,

    /// Buffers in the display's queue (2 or 3)
    #[serde(default = "DisplayConfig::default_buffer_count")]
    pub buffer_count: usize,

    /// Which composition path the backend reports each frame
    #[serde(default)]
    pub composition: CompositionPattern,

    /// Failure schedule for this display
    #[serde(default)]
    pub faults: FaultPlan,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            frames: 120,
            debug: false,
            acquire_timeout_ms: 100,
        }
    }
}

impl DisplayConfig {
    fn default_buffer_count() -> usize {
        3
    }

    /// Built-in panel backed by the hardware composer
    pub fn physical(name: &str, hwc_id: u64, width: i32, height: i32) -> Self {
        Self {
            name: name.to_string(),
            kind: DisplayKind::Physical,
            width,
            height,
            protected: false,
            dataspace: Dataspace::Srgb,
            hwc_id: Some(hwc_id),
            buffer_count: Self::default_buffer_count(),
            composition: CompositionPattern::Alternate,
            faults: FaultPlan::default(),
        }
    }

    /// GPU-composited virtual display without a hardware composer id
    pub fn virtual_display(name: &str, width: i32, height: i32) -> Self {
        Self {
            name: name.to_string(),
            kind: DisplayKind::Virtual,
            width,
            height,
            protected: false,
            dataspace: Dataspace::Srgb,
            hwc_id: None,
            buffer_count: 2,
            composition: CompositionPattern::Gpu,
            faults: FaultPlan::default(),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            displays: Self::default_displays(),
        }
    }
}

impl SimConfig {
    fn default_displays() -> Vec<DisplayConfig> {
        vec![
            DisplayConfig::physical("internal", 0, 1920, 1080),
            DisplayConfig::virtual_display("recording", 1280, 720),
        ]
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            let rest = path.strip_prefix("~").unwrap_or(path);
            Path::new(&home).join(rest)
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.general.frames == 0 {
            anyhow::bail!("Invalid frames: must be greater than 0");
        }

        if self.displays.is_empty() {
            anyhow::bail!("At least one display must be configured");
        }

        let mut names = HashSet::new();
        let mut hwc_ids = HashSet::new();
        for display in &self.displays {
            if !names.insert(display.name.as_str()) {
                anyhow::bail!("Duplicate display name: {}", display.name);
            }
            if let Some(id) = display.hwc_id {
                if !hwc_ids.insert(id) {
                    anyhow::bail!("Duplicate hwc_id {} on display {}", id, display.name);
                }
            }
            if display.width <= 0 || display.height <= 0 {
                anyhow::bail!(
                    "Invalid size {}x{} for display {}: must be positive",
                    display.width,
                    display.height,
                    display.name
                );
            }
            if !(2..=3).contains(&display.buffer_count) {
                anyhow::bail!(
                    "Invalid buffer_count {} for display {}: must be 2 or 3",
                    display.buffer_count,
                    display.name
                );
            }
        }

        Ok(())
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = self.to_toml_string()?;
        fs::write(path, contents).context("Failed to write configuration file")?;
        Ok(())
    }
}


#[cfg(test)]
mod property_tests;
