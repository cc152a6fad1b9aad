//! Persistence boundary.
//!
//! Two tiers, split by protection strength rather than data type:
//! - [`SecretStore`] holds the unlock code and device identity. The
//!   production backend is the OS keyring.
//! - [`BulkStore`] holds JSON records: setup flag, pairing state, messages.
//!
//! Neither tier applies policy. Failures propagate to the caller.

mod file;
mod keyring_store;
mod memory;

pub use file::JsonFileStore;
pub use keyring_store::KeyringSecretStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CloakError, Result};

/// Record names shared by both tiers.
pub mod keys {
    pub const UNLOCK_CODE: &str = "unlock_code";
    pub const DEVICE_ID: &str = "device_id";

    pub const SETUP_COMPLETE: &str = "setup_complete";
    pub const PAIRED_WITH: &str = "paired_with";
    pub const PAIRING_CODE: &str = "pairing_code";
    pub const MESSAGES: &str = "messages";
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret_get(&self, key: &str) -> Result<Option<String>>;
    async fn secret_set(&self, key: &str, value: &str) -> Result<()>;
    /// Deleting an absent key is not an error.
    async fn secret_delete(&self, key: &str) -> Result<()>;
}

#[async_trait]
pub trait BulkStore: Send + Sync {
    async fn bulk_get(&self, key: &str) -> Result<Option<Value>>;
    async fn bulk_set(&self, key: &str, value: Value) -> Result<()>;
    /// Deleting an absent key is not an error.
    async fn bulk_delete(&self, key: &str) -> Result<()>;
}

/// Reads a typed record, mapping shape mismatches to [`CloakError::Malformed`].
pub async fn get_json<T: DeserializeOwned>(store: &dyn BulkStore, key: &str) -> Result<Option<T>> {
    match store.bulk_get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| CloakError::malformed(key, e)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn BulkStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let value = serde_json::to_value(value).map_err(|e| CloakError::write(key, e))?;
    store.bulk_set(key, value).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn typed_helpers_roundtrip() {
        let store = MemoryStore::new();
        set_json(&store, keys::SETUP_COMPLETE, &true).await.unwrap();
        let flag: Option<bool> = get_json(&store, keys::SETUP_COMPLETE).await.unwrap();
        assert_eq!(flag, Some(true));
        let missing: Option<String> = get_json(&store, keys::PAIRED_WITH).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn wrong_shape_is_malformed() {
        let store = MemoryStore::new();
        store
            .bulk_set(keys::MESSAGES, json!({"not": "a list"}))
            .await
            .unwrap();
        let err = get_json::<Vec<String>>(&store, keys::MESSAGES)
            .await
            .unwrap_err();
        assert!(matches!(err, CloakError::Malformed { .. }));
    }
}
