//! Filesystem-backed blob store for product documents.
//!
//! Layout: `{root}/{partition}/{key}.json`, one raw JSON document per file.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::{BlobStore, Partition, StorageError};
use crate::domain::product::ProductRecord;

const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// The root itself is created lazily by [`BlobStore::ensure_partitions`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn partition_dir(&self, partition: Partition) -> PathBuf {
        self.root.join(partition.as_str())
    }

    /// Absolute path of the file holding `key` in `partition`.
    pub fn record_path(&self, partition: Partition, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let mut components = relative.components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if key.is_empty() || !single_normal {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }

        Ok(self
            .partition_dir(partition)
            .join(format!("{key}.{RECORD_EXTENSION}")))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn ensure_partitions(&self) -> Result<(), StorageError> {
        for partition in Partition::ALL {
            let dir = self.partition_dir(partition);
            fs::create_dir_all(&dir)
                .await
                .map_err(|err| StorageError::io(dir.display(), err))?;
            tracing::debug!(partition = %partition, path = %dir.display(), "Partition ready");
        }
        Ok(())
    }

    async fn get(
        &self,
        partition: Partition,
        key: &str,
    ) -> Result<Option<ProductRecord>, StorageError> {
        let path = self.record_path(partition, key)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(path.display(), err)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| StorageError::Corrupt {
                partition,
                key: key.to_string(),
                reason: err.to_string(),
            })
    }

    async fn put(
        &self,
        partition: Partition,
        key: &str,
        record: &ProductRecord,
    ) -> Result<(), StorageError> {
        let path = self.record_path(partition, key)?;
        let encoded = serde_json::to_vec(record).map_err(|err| StorageError::Encode {
            key: key.to_string(),
            reason: err.to_string(),
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::io(parent.display(), err))?;
        }

        fs::write(&path, encoded)
            .await
            .map_err(|err| StorageError::io(path.display(), err))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn sample() -> ProductRecord {
        ProductRecord::new(json!({
            "code": "4029764001401",
            "status": 1,
            "product": {
                "product_name": "Club-Mate",
                "nutriments": { "energy_serving": "529", "energy_100g": 84.5 }
            }
        }))
    }

    #[tokio::test]
    async fn ensure_partitions_creates_missing_directories() {
        let tmp = TempDir::new().expect("temp dir");
        let store = FsBlobStore::new(tmp.path().join("nested/root"));

        store.ensure_partitions().await.expect("partitions");
        assert!(store.partition_dir(Partition::Cache).is_dir());
        assert!(store.partition_dir(Partition::Reject).is_dir());

        store
            .ensure_partitions()
            .await
            .expect("existing partitions are fine");
    }

    #[tokio::test]
    async fn ensure_partitions_fails_when_root_is_a_file() {
        let tmp = TempDir::new().expect("temp dir");
        let root = tmp.path().join("occupied");
        std::fs::write(&root, b"not a directory").expect("write file");

        let err = FsBlobStore::new(&root)
            .ensure_partitions()
            .await
            .expect_err("cannot create partitions under a file");
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[tokio::test]
    async fn round_trips_records_per_partition() {
        let tmp = TempDir::new().expect("temp dir");
        let store = FsBlobStore::new(tmp.path());
        store.ensure_partitions().await.expect("partitions");

        let record = sample();
        store
            .put(Partition::Cache, "4029764001401", &record)
            .await
            .expect("put");

        let loaded = store
            .get(Partition::Cache, "4029764001401")
            .await
            .expect("get");
        assert_eq!(loaded, Some(record));
        assert_eq!(
            store
                .get(Partition::Reject, "4029764001401")
                .await
                .expect("get"),
            None
        );
        assert!(tmp.path().join("cache/4029764001401.json").is_file());
    }

    #[tokio::test]
    async fn put_overwrites_existing_value() {
        let tmp = TempDir::new().expect("temp dir");
        let store = FsBlobStore::new(tmp.path());

        let first = ProductRecord::new(json!({ "status": 0 }));
        store
            .put(Partition::Reject, "12345678", &first)
            .await
            .expect("first put creates directories");
        store
            .put(Partition::Reject, "12345678", &sample())
            .await
            .expect("second put");

        let loaded = store.get(Partition::Reject, "12345678").await.expect("get");
        assert_eq!(loaded, Some(sample()));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let tmp = TempDir::new().expect("temp dir");
        let store = FsBlobStore::new(tmp.path());
        assert_eq!(
            store.get(Partition::Cache, "12345678").await.expect("get"),
            None
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let tmp = TempDir::new().expect("temp dir");
        let store = FsBlobStore::new(tmp.path());
        store.ensure_partitions().await.expect("partitions");
        std::fs::write(tmp.path().join("cache/12345678.json"), b"{ truncated")
            .expect("write corrupt file");

        let err = store
            .get(Partition::Cache, "12345678")
            .await
            .expect_err("corrupt");
        assert!(matches!(err, StorageError::Corrupt { partition: Partition::Cache, .. }));
    }

    #[test]
    fn rejects_keys_escaping_the_partition() {
        let store = FsBlobStore::new("/srv/caloriecounter");
        for key in ["", "..", "../cache/x", "a/b", "/etc/passwd", "."] {
            assert!(
                matches!(
                    store.record_path(Partition::Cache, key),
                    Err(StorageError::InvalidKey { .. })
                ),
                "{key:?} should be rejected"
            );
        }
        assert_eq!(
            store
                .record_path(Partition::Reject, "12345678")
                .expect("valid key"),
            PathBuf::from("/srv/caloriecounter/reject/12345678.json")
        );
    }
}
