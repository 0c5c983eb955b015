use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trial state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrialState {
    /// Awaiting a user-initiated start
    #[default]
    Ready,
    /// Trigger pending; any press now is a fault
    Waiting,
    /// Trigger fired; awaiting the reaction
    Armed,
    /// A valid reaction time was captured
    Measured,
    /// Pressed while waiting
    TooEarly,
    /// Held through the trigger, or implausibly fast
    Failed,
}

impl TrialState {
    /// States a trial can end in. `start()` from one of these resets first.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Measured | Self::TooEarly | Self::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Waiting => "waiting",
            Self::Armed => "armed",
            Self::Measured => "measured",
            Self::TooEarly => "too early",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TrialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Persisted record of one measured trial
///
/// Serialized as `{"time": 190, "date": "2024-05-01T12:00:00Z"}` so that
/// histories written by earlier releases keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResult {
    #[serde(rename = "time")]
    pub reaction_time_ms: u32,
    #[serde(rename = "date")]
    pub recorded_at: DateTime<Utc>,
}

impl StoredResult {
    pub fn new(reaction_time_ms: u32, recorded_at: DateTime<Utc>) -> Self {
        Self {
            reaction_time_ms,
            recorded_at,
        }
    }

    /// Stamps the record with the current wall-clock time.
    pub fn now(reaction_time_ms: u32) -> Self {
        Self::new(reaction_time_ms, Utc::now())
    }
}
