//! Attachment Store Access
//!
//! Message files live in the `attachments` bucket under
//! `files/{unix_ms}-{file_name}`, avatars in `avatars` under
//! `avatars/{address}-{unix_ms}`. The timestamp only reduces collisions.

use crate::address::WalletAddress;
use crate::backend::{BackendResult, BlobStore};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

pub const ATTACHMENTS_BUCKET: &str = "attachments";
pub const AVATARS_BUCKET: &str = "avatars";

/// A file selected for upload
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a local file, guessing its MIME type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let content_type = guess_mime(&name).to_string();
        Ok(Self {
            name,
            content_type,
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// MIME type for a file name, `application/octet-stream` when unknown
pub fn guess_mime(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        _ => "application/octet-stream",
    }
}

/// Object path of a message file
pub fn message_file_path(file_name: &str, unix_ms: i64) -> String {
    format!("files/{}-{}", unix_ms, file_name)
}

/// Object path of a profile avatar
pub fn avatar_path(address: &WalletAddress, unix_ms: i64) -> String {
    format!("avatars/{}-{}", address, unix_ms)
}

/// Uploads and URLs for message files and avatars
#[derive(Clone)]
pub struct AttachmentStore {
    blobs: Arc<dyn BlobStore>,
}

impl AttachmentStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Upload a message file; returns its object path
    pub async fn upload_message_file(&self, file: &FileUpload) -> BackendResult<String> {
        let path = message_file_path(&file.name, Utc::now().timestamp_millis());
        self.blobs
            .upload(ATTACHMENTS_BUCKET, &path, file.bytes.clone(), &file.content_type)
            .await
    }

    /// Upload an avatar; returns its public URL
    pub async fn upload_avatar(&self, address: &WalletAddress, file: &FileUpload) -> BackendResult<String> {
        let path = avatar_path(address, Utc::now().timestamp_millis());
        let stored = self
            .blobs
            .upload(AVATARS_BUCKET, &path, file.bytes.clone(), &file.content_type)
            .await?;
        Ok(self.blobs.public_url(AVATARS_BUCKET, &stored))
    }

    /// Public URL of a message file
    pub fn public_url(&self, file_path: &str) -> String {
        self.blobs.public_url(ATTACHMENTS_BUCKET, file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryBlobStore;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime("cat.PNG"), "image/png");
        assert_eq!(guess_mime("report.pdf"), "application/pdf");
        assert_eq!(guess_mime("archive.tar.gz"), "application/gzip");
        assert_eq!(guess_mime("Makefile"), "application/octet-stream");
    }

    #[test]
    fn test_paths() {
        let address = WalletAddress::parse("0xAB5801a7D398351b8bE11C439e05C5B3259aeC9B").unwrap();
        assert_eq!(message_file_path("cat.png", 1_700_000_000_000), "files/1700000000000-cat.png");
        assert_eq!(
            avatar_path(&address, 1_700_000_000_000),
            "avatars/0xab5801a7d398351b8be11c439e05c5b3259aec9b-1700000000000"
        );
    }

    #[tokio::test]
    async fn test_from_path_reads_and_guesses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let file = FileUpload::from_path(&path).await.unwrap();
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.content_type, "text/plain");
        assert_eq!(file.size(), 5);
        assert!(!file.is_image());
    }

    #[tokio::test]
    async fn test_upload_avatar_returns_public_url() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let store = AttachmentStore::new(blobs.clone());
        let address = WalletAddress::parse("0xAB5801a7D398351b8bE11C439e05C5B3259aeC9B").unwrap();

        let url = store
            .upload_avatar(&address, &FileUpload::new("me.png", "image/png", vec![1, 2]))
            .await
            .unwrap();
        assert!(url.starts_with("memory://avatars/avatars/0xab5801a7d398351b8be11c439e05c5b3259aec9b-"));
        assert_eq!(blobs.objects_in(AVATARS_BUCKET).len(), 1);
    }
}
