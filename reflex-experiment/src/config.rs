use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trigger delay is drawn uniformly from this inclusive range.
pub const DELAY_RANGE_MS: (u64, u64) = (1000, 4000);
/// Subtracted from every raw reaction time to cancel systematic input lag.
pub const CALIBRATION_OFFSET_MS: u32 = 60;
/// Faster adjusted times are treated as a held or coincident press.
pub const MIN_PLAUSIBLE_MS: u32 = 80;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("delay range {0}..={1} ms is empty")]
    EmptyDelayRange(u64, u64),

    #[error("minimum trigger delay must be positive")]
    ZeroDelay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub delay_range_ms: (u64, u64),
    pub calibration_offset_ms: u32,
    pub min_plausible_ms: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            delay_range_ms: DELAY_RANGE_MS,
            calibration_offset_ms: CALIBRATION_OFFSET_MS,
            min_plausible_ms: MIN_PLAUSIBLE_MS,
        }
    }
}

impl TimerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (lo, hi) = self.delay_range_ms;
        if lo > hi {
            return Err(ConfigError::EmptyDelayRange(lo, hi));
        }
        if lo == 0 {
            return Err(ConfigError::ZeroDelay);
        }
        Ok(())
    }
}
