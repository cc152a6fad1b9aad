use async_trait::async_trait;
use keyring::Entry;

use super::SecretStore;
use crate::error::{CloakError, Result};

const ENTRY_PREFIX: &str = "cloak";

/// Secret tier backed by the platform credential store.
///
/// Each record is a separate keyring entry named `cloak:<key>` under the
/// configured service. Keyring calls block, so they run on the blocking pool.
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(service: &str, key: &str) -> keyring::Result<Entry> {
        Entry::new(service, &format!("{}:{}", ENTRY_PREFIX, key))
    }

    async fn blocking<T, F>(key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(op)
            .await
            .map_err(|e| CloakError::read(key, format!("keyring task: {e}")))?
    }
}

#[async_trait]
impl SecretStore for KeyringSecretStore {
    async fn secret_get(&self, key: &str) -> Result<Option<String>> {
        let service = self.service.clone();
        let name = key.to_string();
        Self::blocking(key, move || {
            let entry = Self::entry(&service, &name)
                .map_err(|e| CloakError::read(&name, format!("keyring init: {e}")))?;
            match entry.get_password() {
                Ok(value) => Ok(Some(value)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(CloakError::read(&name, format!("load: {e}"))),
            }
        })
        .await
    }

    async fn secret_set(&self, key: &str, value: &str) -> Result<()> {
        let service = self.service.clone();
        let name = key.to_string();
        let value = zeroize::Zeroizing::new(value.to_string());
        Self::blocking(key, move || {
            let entry = Self::entry(&service, &name)
                .map_err(|e| CloakError::write(&name, format!("keyring init: {e}")))?;
            entry
                .set_password(&value)
                .map_err(|e| CloakError::write(&name, format!("store: {e}")))
        })
        .await
    }

    async fn secret_delete(&self, key: &str) -> Result<()> {
        let service = self.service.clone();
        let name = key.to_string();
        Self::blocking(key, move || {
            let entry = Self::entry(&service, &name)
                .map_err(|e| CloakError::write(&name, format!("keyring init: {e}")))?;
            match entry.delete_password() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(CloakError::write(&name, format!("delete: {e}"))),
            }
        })
        .await
    }
}
