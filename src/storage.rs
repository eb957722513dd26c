//! # Storage Abstraction Module
//!
//! A read-only view of an object store holding GOES products, with two
//! backends: the public S3 archive (accessed anonymously) and a local
//! directory laid out like the bucket. Keys are always `/`-separated paths
//! relative to the bucket or directory root, e.g.
//! `ABI-L2-LSTF/2024/015/12/OR_ABI-L2-LSTF-M6_G18_s20240151200210_e..._c....nc`.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use goes2json::storage::{StorageBackend, StorageFactory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = StorageFactory::from_uri("s3://noaa-goes18", "us-east-1").await?;
//!     for entry in storage.list("ABI-L2-LSTF/2024/015/").await? {
//!         println!("{} ({:?} bytes)", entry.key, entry.size);
//!     }
//!     Ok(())
//! }
//! ```

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Region;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("AWS S3 GetObject error: {0}")]
    S3GetObject(#[from] aws_sdk_s3::error::SdkError<aws_sdk_s3::operation::get_object::GetObjectError>),

    #[error("AWS S3 ListObjectsV2 error: {0}")]
    S3ListObjects(
        #[from] aws_sdk_s3::error::SdkError<aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error>,
    ),

    #[error("AWS ByteStream error: {0}")]
    ByteStream(String),

    #[error("Invalid S3 URI format: {0}")]
    InvalidS3Uri(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl StorageError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            StorageError::PathNotFound(_)
                | StorageError::PermissionDenied(_)
                | StorageError::InvalidS3Uri(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One object returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Key relative to the store root
    pub key: String,
    /// Size in bytes, when the backend reports it
    pub size: Option<u64>,
}

/// Read-only interface shared by the object store backends.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Lists every object whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectEntry>>;

    /// Reads the entire contents of an object.
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;
}

/// A directory mirroring the bucket layout.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        LocalStorage { root: root.into() }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn key_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(segments?.join("/"))
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectEntry>> {
        // Walk from the deepest directory named by the prefix
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = self.resolve(dir_part);

        let mut entries = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut read_dir = match fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };
            while let Some(entry) = read_dir.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file()
                    && let Some(key) = self.key_of(&path)
                    && key.starts_with(prefix)
                {
                    let size = entry.metadata().await?.len();
                    entries.push(ObjectEntry {
                        key,
                        size: Some(size),
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(key);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::PathNotFound(key.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(StorageError::PermissionDenied(key.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Amazon S3 storage backend bound to one bucket.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    /// Creates an unsigned client for a public bucket.
    pub async fn anonymous(bucket: &str, region: &str) -> StorageResult<Self> {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .no_credentials()
            .load()
            .await;
        Ok(Self::from_config(&config, bucket))
    }

    /// Creates a client from an explicit SDK configuration.
    ///
    /// Path-style addressing is used so S3-compatible endpoints work too.
    pub fn from_config(config: &aws_config::SdkConfig, bucket: &str) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(config)
            .force_path_style(true)
            .build();
        S3Storage {
            client: S3Client::from_conf(s3_config),
            bucket: bucket.to_string(),
        }
    }

    /// Extracts the bucket name from `s3://bucket[/]`.
    fn parse_s3_uri(uri: &str) -> StorageResult<String> {
        let rest = uri.strip_prefix("s3://").ok_or_else(|| {
            StorageError::InvalidS3Uri(format!("S3 URI must start with 's3://': {}", uri))
        })?;
        let bucket = rest.trim_end_matches('/');
        if bucket.is_empty() || bucket.contains('/') {
            return Err(StorageError::InvalidS3Uri(format!(
                "Expected 's3://bucket': {}",
                uri
            )));
        }
        Ok(bucket.to_string())
    }
}

#[async_trait::async_trait]
impl StorageBackend for S3Storage {
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectEntry>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut entries = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    entries.push(ObjectEntry {
                        key: key.to_string(),
                        size: object.size().and_then(|s| u64::try_from(s).ok()),
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                aws_sdk_s3::error::SdkError::ServiceError(service_err)
                    if service_err.err().is_no_such_key() =>
                {
                    StorageError::PathNotFound(key.to_string())
                }
                _ => StorageError::S3GetObject(e),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::ByteStream(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }
}

/// Storage backend enumeration
#[derive(Debug)]
pub enum Storage {
    Local(LocalStorage),
    S3(S3Storage),
}

#[async_trait::async_trait]
impl StorageBackend for Storage {
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectEntry>> {
        match self {
            Storage::Local(storage) => storage.list(prefix).await,
            Storage::S3(storage) => storage.list(prefix).await,
        }
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        match self {
            Storage::Local(storage) => storage.read(key).await,
            Storage::S3(storage) => storage.read(key).await,
        }
    }
}

/// Picks a backend from a source URI:
/// `s3://bucket` uses [`S3Storage`], anything else is a local directory.
pub struct StorageFactory;

impl StorageFactory {
    pub async fn from_uri(uri: &str, region: &str) -> StorageResult<Storage> {
        if Self::is_s3_uri(uri) {
            let bucket = S3Storage::parse_s3_uri(uri)?;
            Ok(Storage::S3(S3Storage::anonymous(&bucket, region).await?))
        } else {
            Ok(Storage::Local(LocalStorage::new(uri)))
        }
    }

    pub fn is_s3_uri(uri: &str) -> bool {
        uri.starts_with("s3://")
    }
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use aws_credential_types::Credentials;
    use testcontainers_modules::localstack::LocalStack;
    use testcontainers_modules::testcontainers::runners::AsyncRunner;

    #[tokio::test]
    #[ignore] // Requires a Docker daemon to run LocalStack
    async fn test_s3_list_and_read_localstack() -> Result<(), Box<dyn std::error::Error>> {
        let node = LocalStack::default().start().await?;
        let port = node.get_host_port_ipv4(4566).await?;
        let endpoint = format!("http://127.0.0.1:{}", port);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(&endpoint)
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .load()
            .await;

        let storage = S3Storage::from_config(&config, "goes-test");
        let admin = S3Client::from_conf(
            aws_sdk_s3::config::Builder::from(&config)
                .force_path_style(true)
                .build(),
        );
        admin.create_bucket().bucket("goes-test").send().await?;
        for (key, body) in [
            ("ABI-L2-LSTF/2024/015/12/a.nc", "first"),
            ("ABI-L2-LSTF/2024/015/13/b.nc", "second"),
            ("ABI-L2-LSTF/2024/016/00/c.nc", "other day"),
        ] {
            admin
                .put_object()
                .bucket("goes-test")
                .key(key)
                .body(aws_sdk_s3::primitives::ByteStream::from(body.as_bytes().to_vec()))
                .send()
                .await?;
        }

        let entries = storage.list("ABI-L2-LSTF/2024/015/").await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "ABI-L2-LSTF/2024/015/12/a.nc");
        assert_eq!(entries[0].size, Some(5));

        assert_eq!(storage.read(&entries[1].key).await?, b"second");
        assert!(matches!(
            storage.read("ABI-L2-LSTF/2024/015/12/missing.nc").await,
            Err(StorageError::PathNotFound(_))
        ));
        Ok(())
    }
}
