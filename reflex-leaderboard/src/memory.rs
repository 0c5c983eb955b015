use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use reflex_core::{
    LeaderboardClient, LeaderboardEntry, LeaderboardError, LeaderboardResult, NewEntry,
};

/// In-process leaderboard for offline play and tests
#[derive(Debug, Default)]
pub struct MemoryLeaderboard {
    entries: Mutex<Vec<LeaderboardEntry>>,
    offline: AtomicBool,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn entries(&self) -> LeaderboardResult<std::sync::MutexGuard<'_, Vec<LeaderboardEntry>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LeaderboardError::Network("leaderboard offline".into()));
        }
        self.entries
            .lock()
            .map_err(|_| LeaderboardError::Network("leaderboard poisoned".into()))
    }
}

impl LeaderboardClient for MemoryLeaderboard {
    async fn create(&self, entry: NewEntry) -> LeaderboardResult<LeaderboardEntry> {
        let created = LeaderboardEntry {
            display_name: entry.display_name,
            reaction_time_ms: entry.reaction_time_ms,
            created_at: Utc::now(),
        };
        let mut entries = self.entries()?;
        // Ties keep arrival order
        let at = entries.partition_point(|e| e.reaction_time_ms <= created.reaction_time_ms);
        entries.insert(at, created.clone());
        Ok(created)
    }

    async fn list_ranked(&self) -> LeaderboardResult<Vec<LeaderboardEntry>> {
        Ok(self.entries()?.clone())
    }
}
