use common::domain::{DomainError, DomainResult, ObjectStorageConfig, ObjectStore, OnboardingFile};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Domain service for storing onboarding uploads
pub struct FileService {
    object_store: Arc<dyn ObjectStore>,
    storage: ObjectStorageConfig,
}

impl FileService {
    pub fn new(object_store: Arc<dyn ObjectStore>, storage: ObjectStorageConfig) -> Self {
        Self {
            object_store,
            storage,
        }
    }

    /// Store one file under the configured bucket and path.
    ///
    /// Bucket and path supplied by the caller are replaced. There is no retry.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.content.len()))]
    pub async fn upload_file(&self, mut file: OnboardingFile) -> DomainResult<()> {
        if file.file_name.is_empty() {
            return Err(DomainError::InvalidData("file name is empty".to_string()));
        }

        file.bucket_name = self.storage.bucket_name.clone();
        file.file_path = self.storage.file_path.clone();

        self.object_store
            .put_object(
                &file.bucket_name,
                &file.file_path,
                &file.file_name,
                file.content,
            )
            .await
            .map_err(DomainError::ServerError)?;

        debug!(bucket = %file.bucket_name, path = %file.file_path, "file uploaded");
        Ok(())
    }
}
