//! Object Storage
//!
//! Uploads go to `/storage/v1/object/{bucket}/{path}`; public URLs are a pure
//! derivation from bucket and path.

use super::{BackendClient, BackendResult};
use async_trait::async_trait;

/// Blob storage seam
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` inside `bucket`; returns the stored path
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<String>;

    /// Publicly reachable URL for an object
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Percent-encode each segment of an object path, keeping the separators
fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl BlobStore for BackendClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<String> {
        let size = bytes.len();
        let url = self.endpoint(&format!(
            "storage/v1/object/{}/{}",
            urlencoding::encode(bucket),
            encode_path(path)
        ));
        let request = self
            .http
            .post(url)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes);
        let response = self.send(self.authorized(request).await).await?;
        Self::check(response).await?;

        tracing::debug!(bucket, path, size, "Uploaded object");
        Ok(path.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&format!(
            "storage/v1/object/public/{}/{}",
            urlencoding::encode(bucket),
            encode_path(path)
        ))
    }
}
