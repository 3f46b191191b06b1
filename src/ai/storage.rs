//! Object storage for reference images.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{IdolError, Result};
use crate::idol::ImageLocation;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `body` at `location`, replacing any existing object.
    async fn put(
        &self,
        location: &ImageLocation,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()>;

    /// Removes the object at `location`. Removing a missing object succeeds.
    async fn delete(&self, location: &ImageLocation) -> Result<()>;
}

/// [`ObjectStore`] backed by Amazon S3.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        location: &ImageLocation,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .body(ByteStream::from(body))
            .set_content_type(content_type.map(String::from))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key = %location.key, error = %e, "S3 upload failed");
                IdolError::service("put_object", e)
            })?;

        tracing::debug!(%location, size, "image uploaded");
        Ok(())
    }

    async fn delete(&self, location: &ImageLocation) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| IdolError::service("delete_object", e))?;

        tracing::debug!(%location, "image deleted");
        Ok(())
    }
}
