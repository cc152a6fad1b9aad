use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use super::{BulkStore, SecretStore};
use crate::error::{CloakError, Result};

/// In-process store implementing both tiers.
///
/// Used by `--ephemeral` runs and by tests. Reads and writes can be made to
/// fail on demand, and secret reads can be held at a gate to simulate a slow
/// keyring: a held read has already taken its value and only delivers it
/// once the gate opens.
#[derive(Debug, Default)]
pub struct MemoryStore {
    secrets: RwLock<HashMap<String, String>>,
    bulk: RwLock<HashMap<String, Value>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    secret_read_gate: Mutex<Option<Arc<Notify>>>,
    parked_reads: Notify,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every subsequent `secret_get` waits for one `notify_one` on `gate`.
    pub fn hold_secret_reads(&self, gate: Arc<Notify>) {
        *self.secret_read_gate.lock() = Some(gate);
    }

    pub fn release_secret_reads(&self) {
        *self.secret_read_gate.lock() = None;
    }

    /// Resolves once a `secret_get` is waiting at the gate.
    pub async fn secret_read_parked(&self) {
        self.parked_reads.notified().await;
    }

    fn check_read(&self, key: &str) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CloakError::read(key, "injected read failure"));
        }
        Ok(())
    }

    fn check_write(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CloakError::write(key, "injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn secret_get(&self, key: &str) -> Result<Option<String>> {
        self.check_read(key)?;
        let value = self.secrets.read().get(key).cloned();
        let gate = self.secret_read_gate.lock().clone();
        if let Some(gate) = gate {
            self.parked_reads.notify_one();
            gate.notified().await;
        }
        Ok(value)
    }

    async fn secret_set(&self, key: &str, value: &str) -> Result<()> {
        self.check_write(key)?;
        self.secrets.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn secret_delete(&self, key: &str) -> Result<()> {
        self.check_write(key)?;
        self.secrets.write().remove(key);
        Ok(())
    }
}

#[async_trait]
impl BulkStore for MemoryStore {
    async fn bulk_get(&self, key: &str) -> Result<Option<Value>> {
        self.check_read(key)?;
        Ok(self.bulk.read().get(key).cloned())
    }

    async fn bulk_set(&self, key: &str, value: Value) -> Result<()> {
        self.check_write(key)?;
        self.bulk.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn bulk_delete(&self, key: &str) -> Result<()> {
        self.check_write(key)?;
        self.bulk.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn tiers_are_separate() {
        let store = MemoryStore::new();
        store.secret_set("k", "secret").await.unwrap();
        assert!(store.bulk_get("k").await.unwrap().is_none());
        store.bulk_set("k", json!(1)).await.unwrap();
        assert_eq!(store.secret_get("k").await.unwrap().as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn injected_failures_propagate() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        assert!(matches!(
            store.secret_set("k", "v").await,
            Err(CloakError::StorageWrite { .. })
        ));
        store.fail_writes(false);
        store.fail_reads(true);
        assert!(matches!(
            store.bulk_get("k").await,
            Err(CloakError::StorageRead { .. })
        ));
    }

    #[tokio::test]
    async fn delete_missing_is_ok() {
        let store = MemoryStore::new();
        store.secret_delete("absent").await.unwrap();
        store.bulk_delete("absent").await.unwrap();
    }

    #[tokio::test]
    async fn held_read_delivers_value_taken_before_gate() {
        let store = Arc::new(MemoryStore::new());
        store.secret_set("k", "old").await.unwrap();
        let gate = Arc::new(Notify::new());
        store.hold_secret_reads(gate.clone());
        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.secret_get("k").await }
        });
        store.secret_read_parked().await;
        store.secret_set("k", "new").await.unwrap();
        gate.notify_one();
        assert_eq!(pending.await.unwrap().unwrap().as_deref(), Some("old"));
        store.release_secret_reads();
    }
}
