//! # Local Download Cache
//!
//! Remote scans are copied to
//! `<cache_root>/<product>/<year>/<DDD>/<basename>` and reused on later runs.
//! Downloads land in a temporary file next to the target and are renamed
//! into place only once complete, so an interrupted download never looks
//! cached.

use crate::input::{CacheConfig, CacheValidation};
use crate::storage::{ObjectEntry, StorageBackend, StorageError, StorageResult};
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Deterministic cache location of a remote key
pub fn cache_path(cache_root: &Path, product: &str, year: i32, jday: u32, key: &str) -> PathBuf {
    let basename = key.rsplit('/').next().unwrap_or(key);
    cache_root
        .join(product)
        .join(year.to_string())
        .join(format!("{:03}", jday))
        .join(basename)
}

/// Outcome of [`fetch_cached`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Cached,
    Downloaded,
}

/// Whether `path` holds a usable copy of `entry` under `validation`.
pub async fn is_cache_valid(
    path: &Path,
    entry: &ObjectEntry,
    validation: CacheValidation,
) -> StorageResult<bool> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(StorageError::Io(e)),
    };
    if !metadata.is_file() {
        return Ok(false);
    }
    Ok(match (validation, entry.size) {
        (CacheValidation::Exists, _) => true,
        (CacheValidation::Size, Some(expected)) => metadata.len() == expected,
        (CacheValidation::Size, None) => true,
    })
}

/// Copies `entry` to `path` unless a valid copy is already there.
///
/// Transient failures are retried `options.max_retries` times with a
/// linearly growing delay. Missing objects fail immediately.
pub async fn fetch_cached<S: StorageBackend + ?Sized>(
    store: &S,
    entry: &ObjectEntry,
    path: &Path,
    options: &CacheConfig,
) -> StorageResult<FetchOutcome> {
    if is_cache_valid(path, entry, options.validation).await? {
        debug!("Using cached file: {}", path.display());
        return Ok(FetchOutcome::Cached);
    }

    info!("Downloading {} -> {}", entry.key, path.display());
    let mut attempt = 0;
    loop {
        match download(store, entry, path).await {
            Ok(()) => return Ok(FetchOutcome::Downloaded),
            Err(e) if e.is_transient() && attempt < options.max_retries => {
                attempt += 1;
                let delay = Duration::from_millis(options.retry_delay_ms * attempt as u64);
                warn!(
                    "Download of {} failed ({}), retry {}/{} in {:?}",
                    entry.key, e, attempt, options.max_retries, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn download<S: StorageBackend + ?Sized>(
    store: &S,
    entry: &ObjectEntry,
    path: &Path,
) -> StorageResult<()> {
    let data = store.read(&entry.key).await?;
    if let Some(expected) = entry.size
        && expected != data.len() as u64
    {
        return Err(StorageError::ByteStream(format!(
            "{}: received {} bytes, expected {}",
            entry.key,
            data.len(),
            expected
        )));
    }

    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(&parent).await?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
        temp.write_all(&data)?;
        temp.as_file().sync_all()?;
        temp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Store serving one object, failing the first `failures` reads.
    struct FlakyStore {
        data: Vec<u8>,
        failures: Mutex<usize>,
        reads: AtomicUsize,
    }

    impl FlakyStore {
        fn new(data: &[u8], failures: usize) -> Self {
            Self {
                data: data.to_vec(),
                failures: Mutex::new(failures),
                reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl StorageBackend for FlakyStore {
        async fn list(&self, _prefix: &str) -> StorageResult<Vec<ObjectEntry>> {
            Ok(Vec::new())
        }

        async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if key.ends_with("missing.nc") {
                return Err(StorageError::PathNotFound(key.to_string()));
            }
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(StorageError::ByteStream("connection reset".to_string()));
            }
            Ok(self.data.clone())
        }
    }

    fn entry(key: &str, size: Option<u64>) -> ObjectEntry {
        ObjectEntry {
            key: key.to_string(),
            size,
        }
    }

    fn fast_retries(max_retries: u32) -> CacheConfig {
        CacheConfig {
            max_retries,
            retry_delay_ms: 1,
            ..CacheConfig::default()
        }
    }

    #[test]
    fn test_cache_path_layout() {
        let path = cache_path(
            Path::new("/cache"),
            "ABI-L2-LSTF",
            2024,
            15,
            "ABI-L2-LSTF/2024/015/12/OR_x.nc",
        );
        assert_eq!(path, PathBuf::from("/cache/ABI-L2-LSTF/2024/015/OR_x.nc"));
    }

    #[tokio::test]
    async fn test_download_then_cache_hit() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("P/2024/015/OR_x.nc");
        let store = FlakyStore::new(b"payload", 0);
        let e = entry("P/2024/015/12/OR_x.nc", Some(7));

        let first = fetch_cached(&store, &e, &path, &fast_retries(0)).await?;
        assert_eq!(first, FetchOutcome::Downloaded);
        assert_eq!(std::fs::read(&path)?, b"payload");

        let second = fetch_cached(&store, &e, &path, &fast_retries(0)).await?;
        assert_eq!(second, FetchOutcome::Cached);
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);

        // No temporary files left behind
        let leftovers = std::fs::read_dir(path.parent().unwrap())?.count();
        assert_eq!(leftovers, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_existence_policy_trusts_truncated_file() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("OR_x.nc");
        std::fs::write(&path, b"pay")?;
        let e = entry("P/2024/015/12/OR_x.nc", Some(7));

        assert!(is_cache_valid(&path, &e, CacheValidation::Exists).await?);
        assert!(!is_cache_valid(&path, &e, CacheValidation::Size).await?);
        assert!(is_cache_valid(&path, &entry("k", None), CacheValidation::Size).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_size_policy_refetches_truncated_file() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("OR_x.nc");
        std::fs::write(&path, b"pay")?;
        let store = FlakyStore::new(b"payload", 0);
        let options = CacheConfig {
            validation: CacheValidation::Size,
            ..fast_retries(0)
        };

        let outcome = fetch_cached(&store, &entry("P/OR_x.nc", Some(7)), &path, &options).await?;
        assert_eq!(outcome, FetchOutcome::Downloaded);
        assert_eq!(std::fs::read(&path)?, b"payload");
        Ok(())
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("OR_x.nc");
        let store = FlakyStore::new(b"payload", 2);

        let outcome = fetch_cached(&store, &entry("P/OR_x.nc", None), &path, &fast_retries(2)).await?;
        assert_eq!(outcome, FetchOutcome::Downloaded);
        assert_eq!(store.reads.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_retries_exhausted_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("OR_x.nc");
        let store = FlakyStore::new(b"payload", 5);

        let result = fetch_cached(&store, &entry("P/OR_x.nc", None), &path, &fast_retries(1)).await;
        assert!(matches!(result, Err(StorageError::ByteStream(_))));
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_object_is_not_retried() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.nc");
        let store = FlakyStore::new(b"", 0);

        let result = fetch_cached(&store, &entry("P/missing.nc", None), &path, &fast_retries(3)).await;
        assert!(matches!(result, Err(StorageError::PathNotFound(_))));
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_size_mismatch_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("OR_x.nc");
        let store = FlakyStore::new(b"short", 0);

        let result = fetch_cached(&store, &entry("P/OR_x.nc", Some(100)), &path, &fast_retries(0)).await;
        assert!(matches!(result, Err(StorageError::ByteStream(_))));
        assert!(!path.exists());
    }
}
