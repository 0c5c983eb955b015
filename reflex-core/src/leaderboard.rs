use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LeaderboardResult;

/// Entry as sent to the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    #[serde(rename = "username")]
    pub display_name: String,
    #[serde(rename = "reactionMs")]
    pub reaction_time_ms: u32,
}

/// Entry as stored by the leaderboard; `created_at` is assigned server-side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    #[serde(rename = "username")]
    pub display_name: String,
    #[serde(rename = "reactionMs")]
    pub reaction_time_ms: u32,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}

/// Remote ranking service
pub trait LeaderboardClient: Send + Sync {
    fn create(
        &self,
        entry: NewEntry,
    ) -> impl Future<Output = LeaderboardResult<LeaderboardEntry>> + Send;

    /// Entries sorted ascending by reaction time (lower is better).
    fn list_ranked(&self) -> impl Future<Output = LeaderboardResult<Vec<LeaderboardEntry>>> + Send;
}

impl<L: LeaderboardClient> LeaderboardClient for Arc<L> {
    fn create(
        &self,
        entry: NewEntry,
    ) -> impl Future<Output = LeaderboardResult<LeaderboardEntry>> + Send {
        (**self).create(entry)
    }

    fn list_ranked(&self) -> impl Future<Output = LeaderboardResult<Vec<LeaderboardEntry>>> + Send {
        (**self).list_ranked()
    }
}

/// Decides whether a display name may appear on the leaderboard
pub trait UsernameValidator {
    fn is_allowed(&self, name: &str) -> bool;
}

impl<F: Fn(&str) -> bool> UsernameValidator for F {
    fn is_allowed(&self, name: &str) -> bool {
        self(name)
    }
}
