use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Default announcement voice (the Jamie premium voice).
pub const DEFAULT_VOICE: &str = "Jamie";
/// Default speech rate in words per minute.
pub const DEFAULT_RATE_WPM: u32 = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Voice output settings, persisted as owner-only TOML.
pub struct SpeakerConfig {
    pub enabled: bool,
    pub voice: String,
    pub rate_wpm: u32,
    pub volume: f64,
    /// Quiet interval `[quiet_start, quiet_end)` in hours of day (0-23).
    /// `quiet_start > quiet_end` wraps past midnight; equal values mean an
    /// empty, never-quiet window.
    pub quiet_start: u32,
    pub quiet_end: u32,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            voice: DEFAULT_VOICE.to_string(),
            rate_wpm: DEFAULT_RATE_WPM,
            volume: 0.7,
            quiet_start: 0,
            quiet_end: 0,
        }
    }
}

impl SpeakerConfig {
    pub fn is_quiet_at(&self, hour: u32) -> bool {
        is_quiet(self.quiet_start, self.quiet_end, hour)
    }

    pub fn load(path: &Path) -> Result<Self> {
        hearth_core::load_settings(path)
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        hearth_core::store_settings_private(path, self)
    }
}

/// Quiet-window membership for `hour`, with `start > end` denoting a window
/// that wraps past midnight and `start == end` an empty window.
pub fn is_quiet(start: u32, end: u32, hour: u32) -> bool {
    if start == end {
        return false;
    }
    if start > end {
        hour >= start || hour < end
    } else {
        hour >= start && hour < end
    }
}

/// Current local hour of day (0-23).
pub fn local_hour() -> u32 {
    use chrono::Timelike;

    chrono::Local::now().hour()
}
