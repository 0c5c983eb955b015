use crate::config::TimerConfig;

/// One pass through the reaction timer, from `start()` to a terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    pub id: u64,
    pub delay_ms: u64,
    /// Baseline in clock nanoseconds, captured once the trigger has fired
    pub started_at: Option<u64>,
    pub reaction_time_ms: Option<u32>,
    pub interacted_while_waiting: bool,
    pub submitted: bool,
    pub submission_in_flight: bool,
}

impl Trial {
    pub fn new(id: u64, delay_ms: u64) -> Self {
        Self {
            id,
            delay_ms,
            started_at: None,
            reaction_time_ms: None,
            interacted_while_waiting: false,
            submitted: false,
            submission_in_flight: false,
        }
    }
}

/// Converts the elapsed time between baseline and reaction into a
/// calibrated reaction time, or `None` when the result is implausible.
///
/// `raw = round(elapsed)` in whole milliseconds; the calibrated value is
/// `raw - calibration_offset_ms` and must be positive and at least
/// `min_plausible_ms`.
pub fn calibrated_reaction_ms(elapsed_ns: u64, config: &TimerConfig) -> Option<u32> {
    let raw_ms = (elapsed_ns + 500_000) / 1_000_000;
    let adjusted = raw_ms as i64 - i64::from(config.calibration_offset_ms);
    if adjusted <= 0 || adjusted < i64::from(config.min_plausible_ms) {
        return None;
    }
    u32::try_from(adjusted).ok()
}
