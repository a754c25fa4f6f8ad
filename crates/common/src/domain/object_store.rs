use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// An uploaded file on its way to the object store. Never persisted relationally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnboardingFile {
    pub bucket_name: String,
    pub file_path: String,
    pub file_name: String,
    pub content: Bytes,
}

/// Bucket and path every upload is stamped with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectStorageConfig {
    pub bucket_name: String,
    pub file_path: String,
}

/// Object store write capability
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, bucket: &str, path: &str, name: &str, content: Bytes)
        -> Result<()>;
}

/// Joins a path prefix and a file name into an object key, skipping empty segments
pub fn object_key(path: &str, name: &str) -> String {
    path.split('/')
        .chain(name.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
