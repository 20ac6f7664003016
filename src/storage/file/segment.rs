//! File-backed segment counters.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::{SegmentRange, SegmentState};
use crate::error::{StorageError, StorageResult};

/// One JSON file per scope, updated under an exclusive OS file lock.
pub struct FileSegmentStore {
    /// Directory for segment files.
    segments_dir: PathBuf,
    /// Serializes file operations within this process.
    lock: Mutex<()>,
}

impl FileSegmentStore {
    /// Create a store rooted at `segments_dir`.
    pub fn new(segments_dir: PathBuf) -> Self {
        Self {
            segments_dir,
            lock: Mutex::new(()),
        }
    }

    fn segment_path(&self, scope: &str) -> PathBuf {
        self.segments_dir
            .join(format!("{}.json", sanitize_name(scope)))
    }

    fn temp_path(&self, scope: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        self.segments_dir.join(format!(
            "{}.json.{}-{n}.tmp",
            sanitize_name(scope),
            std::process::id()
        ))
    }

    /// Advance the counter for `scope` by `step`.
    pub async fn advance(&self, scope: &str, step: u32) -> StorageResult<SegmentRange> {
        let _guard = self.lock.lock().await;

        let path = self.segment_path(scope);
        if !path.exists() {
            return Err(StorageError::NotFound(scope.to_string()));
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        file.lock_exclusive()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        let result = (|| -> StorageResult<SegmentRange> {
            // An empty file was never seeded.
            if file.metadata()?.len() == 0 {
                return Err(StorageError::NotFound(scope.to_string()));
            }
            let mut state: SegmentState = serde_json::from_reader(&file)?;
            let range = state
                .advance(step)
                .ok_or_else(|| StorageError::Exhausted(scope.to_string()))?;

            file.seek(SeekFrom::Start(0))?;
            file.set_len(0)?;
            let json = serde_json::to_string_pretty(&state)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            Ok(range)
        })();

        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;
        result
    }

    /// Create the file for `scope` unless it exists.
    ///
    /// The state is written to a temporary file and hard-linked into place, so
    /// the counter file never appears without content. A pre-existing empty
    /// file is seeded under the exclusive lock.
    pub async fn init_if_absent(
        &self,
        scope: &str,
        initial_max_id: i64,
        step: u32,
    ) -> StorageResult<bool> {
        let _guard = self.lock.lock().await;

        let path = self.segment_path(scope);
        let state = SegmentState::new(scope.to_string(), initial_max_id, step);

        let temp_path = self.temp_path(scope);
        let linked = link_new(&temp_path, &path, &state);
        std::fs::remove_file(&temp_path).ok();
        if linked? {
            return Ok(true);
        }

        seed_if_empty(&path, &state)
    }

    /// Read the persisted state for `scope`.
    pub async fn state(&self, scope: &str) -> StorageResult<Option<SegmentState>> {
        let _guard = self.lock.lock().await;

        let path = self.segment_path(scope);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        file.lock_shared()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;
        let state = (|| -> StorageResult<Option<SegmentState>> {
            if file.metadata()?.len() == 0 {
                return Ok(None);
            }
            Ok(Some(serde_json::from_reader(&file)?))
        })();
        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        state
    }
}

/// Write `state` to `temp_path` and link it to `path`. `false` if `path`
/// already exists.
fn link_new(temp_path: &Path, path: &Path, state: &SegmentState) -> StorageResult<bool> {
    let temp = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)?;
    serde_json::to_writer_pretty(&temp, state)?;
    temp.sync_all()?;

    match std::fs::hard_link(temp_path, path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Seed an existing counter file only if it is empty.
fn seed_if_empty(path: &Path, state: &SegmentState) -> StorageResult<bool> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    file.lock_exclusive()
        .map_err(|e| StorageError::LockFailed(e.to_string()))?;

    let result = (|| -> StorageResult<bool> {
        if file.metadata()?.len() > 0 {
            return Ok(false);
        }
        warn!(scope = %state.scope, path = %path.display(), "Seeding empty segment file");
        file.write_all(serde_json::to_string_pretty(state)?.as_bytes())?;
        file.sync_all()?;
        Ok(true)
    })();

    file.unlock()
        .map_err(|e| StorageError::LockFailed(e.to_string()))?;
    result
}

/// Sanitize a name for use as a filename.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FileSegmentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSegmentStore::new(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_advance_requires_init() {
        let (store, _temp) = create_test_store();
        let err = store.advance("order", 10).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_advance() {
        let (store, _temp) = create_test_store();
        assert!(store.init_if_absent("order", 0, 10).await.unwrap());

        assert_eq!(
            store.advance("order", 10).await.unwrap(),
            SegmentRange::new(1, 10)
        );
        assert_eq!(
            store.advance("order", 5).await.unwrap(),
            SegmentRange::new(11, 15)
        );

        let state = store.state("order").await.unwrap().unwrap();
        assert_eq!(state.max_id, 15);
        assert_eq!(state.version, 2);
    }

    #[tokio::test]
    async fn test_init_does_not_overwrite() {
        let (store, _temp) = create_test_store();
        assert!(store.init_if_absent("sku", 100, 10).await.unwrap());
        store.advance("sku", 10).await.unwrap();
        assert!(!store.init_if_absent("sku", 0, 10).await.unwrap());
        assert_eq!(store.state("sku").await.unwrap().unwrap().max_id, 110);
    }

    #[tokio::test]
    async fn test_empty_file_is_seeded() {
        let (store, temp) = create_test_store();
        std::fs::write(temp.path().join("order.json"), b"").unwrap();

        let err = store.advance("order", 10).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(store.state("order").await.unwrap().is_none());

        assert!(store.init_if_absent("order", 0, 10).await.unwrap());
        assert_eq!(
            store.advance("order", 10).await.unwrap(),
            SegmentRange::new(1, 10)
        );
        assert!(!store.init_if_absent("order", 0, 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_init_leaves_no_temp_files() {
        let (store, temp) = create_test_store();
        assert!(store.init_if_absent("order", 0, 10).await.unwrap());
        assert!(!store.init_if_absent("order", 0, 10).await.unwrap());

        let names: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["order.json".to_string()]);
    }

    #[tokio::test]
    async fn test_advance_overflow_keeps_counter() {
        let (store, _temp) = create_test_store();
        store.init_if_absent("order", i64::MAX - 5, 10).await.unwrap();

        let err = store.advance("order", 10).await.unwrap_err();
        assert!(matches!(err, StorageError::Exhausted(_)));
        let state = store.state("order").await.unwrap().unwrap();
        assert_eq!(state.max_id, i64::MAX - 5);
        assert_eq!(state.version, 0);
    }

    #[tokio::test]
    async fn test_sanitize_name() {
        assert_eq!(sanitize_name("order_item"), "order_item");
        assert_eq!(sanitize_name("with/slash"), "with_slash");
        assert_eq!(sanitize_name("with space"), "with_space");
    }
}
