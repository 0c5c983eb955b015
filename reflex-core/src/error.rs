//! Error types shared by the reflex crates

use thiserror::Error;

/// Local persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored value under {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Remote leaderboard errors
#[derive(Error, Debug)]
pub enum LeaderboardError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Leaderboard returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed leaderboard response: {0}")]
    Decode(String),
}

/// Display name rejected before any network call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Display name is empty")]
    Empty,

    #[error("Display name contains a disallowed word")]
    Disallowed,
}

/// Reasons a leaderboard submission did not go through
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("No measured reaction time to submit")]
    NotMeasured,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("This trial was already submitted")]
    Duplicate,

    #[error("Submission failed: {0}")]
    Failed(#[from] LeaderboardError),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type LeaderboardResult<T> = Result<T, LeaderboardError>;
