use crate::domain::{object_key, ObjectStore};
use anyhow::{Context, Result};
use async_nats::jetstream;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, instrument};

/// Object store backed by NATS JetStream object store buckets
pub struct NatsObjectStoreClient {
    jetstream: jetstream::Context,
}

impl NatsObjectStoreClient {
    pub fn new(jetstream: jetstream::Context) -> Self {
        Self { jetstream }
    }

    async fn bucket(&self, bucket_name: &str) -> Result<jetstream::object_store::ObjectStore> {
        match self.jetstream.get_object_store(bucket_name).await {
            Ok(store) => Ok(store),
            Err(_) => {
                debug!(bucket = %bucket_name, "creating object store bucket");
                self.jetstream
                    .create_object_store(jetstream::object_store::Config {
                        bucket: bucket_name.to_string(),
                        ..Default::default()
                    })
                    .await
                    .context("failed to create object store bucket")
            }
        }
    }
}

#[async_trait]
impl ObjectStore for NatsObjectStoreClient {
    #[instrument(skip(self, content), fields(bucket = %bucket, size = content.len()))]
    async fn put_object(&self, bucket: &str, path: &str, name: &str, content: Bytes) -> Result<()> {
        let store = self.bucket(bucket).await?;
        let key = object_key(path, name);

        let mut reader = &content[..];
        store
            .put(key.as_str(), &mut reader)
            .await
            .context("failed to upload object")?;

        debug!(bucket = %bucket, key = %key, "object uploaded");
        Ok(())
    }
}
