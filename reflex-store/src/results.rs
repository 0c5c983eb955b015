use reflex_core::{ResultStore, StoreError, StoreResult, StoredResult};
use tokio::sync::Mutex;
use tracing::debug;

use crate::kv::KvStore;

pub const RESULTS_KEY: &str = "@reaction_results";

/// Measurement history kept as one JSON array under [`RESULTS_KEY`]
pub struct LocalResults<K> {
    kv: K,
    // Serializes read-modify-write appends
    write_lock: Mutex<()>,
}

impl<K: KvStore> LocalResults<K> {
    pub fn new(kv: K) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> StoreResult<Vec<StoredResult>> {
        match self.kv.get(RESULTS_KEY).await? {
            None => Ok(Vec::new()),
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                key: RESULTS_KEY.to_string(),
                source,
            }),
        }
    }
}

impl<K: KvStore> ResultStore for LocalResults<K> {
    async fn append(&self, record: StoredResult) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        records.push(record);
        let raw = serde_json::to_string(&records).map_err(|source| StoreError::Corrupt {
            key: RESULTS_KEY.to_string(),
            source,
        })?;
        self.kv.set(RESULTS_KEY, raw).await?;
        debug!(count = records.len(), "results appended");
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<StoredResult>> {
        self.load().await
    }
}
