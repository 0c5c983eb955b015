use reflex_core::{StoreError, StoreResult, UsernameValidator, ValidationError};
use thiserror::Error;
use tracing::info;

use crate::kv::KvStore;

pub const USERNAME_KEY: &str = "@userName";

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to save display name: {0}")]
    Store(#[from] StoreError),
}

/// The locally remembered display name
///
/// Read on demand by the front-end and handed to submissions explicitly.
pub struct ProfileStore<K> {
    kv: K,
}

impl<K: KvStore> ProfileStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub async fn display_name(&self) -> StoreResult<Option<String>> {
        Ok(self
            .kv
            .get(USERNAME_KEY)
            .await?
            .filter(|name| !name.trim().is_empty()))
    }

    /// Validates and stores `name`, returning the stored (trimmed) value.
    pub async fn set_display_name<V>(&self, name: &str, validator: &V) -> Result<String, ProfileError>
    where
        V: UsernameValidator + ?Sized,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty.into());
        }
        if !validator.is_allowed(name) {
            return Err(ValidationError::Disallowed.into());
        }
        self.kv.set(USERNAME_KEY, name.to_string()).await?;
        info!(display_name = name, "display name saved");
        Ok(name.to_string())
    }
}
