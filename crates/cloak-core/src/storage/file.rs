use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::warn;

use super::BulkStore;
use crate::error::{CloakError, Result};

const FILE_KEY: &str = "<bulk file>";

/// Bulk tier kept as a single JSON object on disk.
///
/// Writes go to a temp file in the same directory and are renamed over the
/// existing file, so a crash mid-write leaves the previous version intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl JsonFileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CloakError::write(FILE_KEY, e))?;
        }
        Ok(Self {
            path,
            io: Mutex::new(()),
        })
    }

    fn load(path: &Path) -> Result<Map<String, Value>> {
        if !path.exists() {
            return Ok(Map::new());
        }
        let data = fs::read(path).map_err(|e| CloakError::read(FILE_KEY, e))?;
        if data.is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_slice::<Value>(&data) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CloakError::malformed(FILE_KEY, "top level is not an object")),
            Err(e) => Err(CloakError::malformed(FILE_KEY, e)),
        }
    }

    /// Loads for a read-modify-write cycle. A corrupt file is moved aside so
    /// the store keeps accepting writes.
    fn load_for_update(path: &Path) -> Result<Map<String, Value>> {
        match Self::load(path) {
            Err(CloakError::Malformed { reason, .. }) => {
                let aside = path.with_extension("corrupt");
                warn!(path = %path.display(), %reason, "bulk store corrupt; moving aside");
                fs::rename(path, &aside).map_err(|e| CloakError::write(FILE_KEY, e))?;
                Ok(Map::new())
            }
            other => other,
        }
    }

    fn persist(path: &Path, map: &Map<String, Value>) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let data = serde_json::to_vec_pretty(map).map_err(|e| CloakError::write(FILE_KEY, e))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CloakError::write(FILE_KEY, e))?;
        tmp.write_all(&data)
            .and_then(|_| tmp.flush())
            .map_err(|e| CloakError::write(FILE_KEY, e))?;
        tmp.persist(path)
            .map_err(|e| CloakError::write(FILE_KEY, e.error))?;
        Ok(())
    }

    async fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>) + Send + 'static,
    {
        let _io = self.io.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut map = Self::load_for_update(&path)?;
            f(&mut map);
            Self::persist(&path, &map)
        })
        .await
        .map_err(|e| CloakError::write(key, e))?
    }
}

#[async_trait]
impl BulkStore for JsonFileStore {
    async fn bulk_get(&self, key: &str) -> Result<Option<Value>> {
        let _io = self.io.lock().await;
        let path = self.path.clone();
        let mut map = tokio::task::spawn_blocking(move || Self::load(&path))
            .await
            .map_err(|e| CloakError::read(key, e))??;
        Ok(map.remove(key))
    }

    async fn bulk_set(&self, key: &str, value: Value) -> Result<()> {
        let name = key.to_string();
        self.update(key, move |map| {
            map.insert(name, value);
        })
        .await
    }

    async fn bulk_delete(&self, key: &str) -> Result<()> {
        let name = key.to_string();
        self.update(key, move |map| {
            map.remove(&name);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bulk.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.bulk_set("setup_complete", json!(true)).await.unwrap();
            store.bulk_set("paired_with", json!("ABC123")).await.unwrap();
            store.bulk_delete("paired_with").await.unwrap();
        }
        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.bulk_get("setup_complete").await.unwrap(),
            Some(json!(true))
        );
        assert!(reopened.bulk_get("paired_with").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bulk.json");
        fs::write(&path, b"{ not json").unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        let err = store.bulk_get("messages").await.unwrap_err();
        assert!(matches!(err, CloakError::Malformed { .. }));
    }

    #[tokio::test]
    async fn write_after_corruption_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bulk.json");
        fs::write(&path, b"[1, 2").unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        store.bulk_set("setup_complete", json!(true)).await.unwrap();
        assert_eq!(
            store.bulk_get("setup_complete").await.unwrap(),
            Some(json!(true))
        );
        assert!(path.with_extension("corrupt").exists());
    }
}
