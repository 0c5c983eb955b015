use std::future::Future;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::trial::StoredResult;

/// Append-only local history of measured trials
pub trait ResultStore: Send + Sync {
    fn append(&self, record: StoredResult) -> impl Future<Output = StoreResult<()>> + Send;

    /// All records in insertion order.
    fn list_all(&self) -> impl Future<Output = StoreResult<Vec<StoredResult>>> + Send;
}

impl<S: ResultStore> ResultStore for Arc<S> {
    fn append(&self, record: StoredResult) -> impl Future<Output = StoreResult<()>> + Send {
        (**self).append(record)
    }

    fn list_all(&self) -> impl Future<Output = StoreResult<Vec<StoredResult>>> + Send {
        (**self).list_all()
    }
}
