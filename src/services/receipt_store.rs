//! Local filesystem storage for receipt images.
//!
//! Images arrive base64-encoded (optionally as a `data:` URL) and are
//! written under `<root>/<tenant-slug>/receipts/<YYYY-MM>/<number>.<ext>`.
//! The relative path doubles as the stored file id.

use base64::Engine;
use chrono::NaiveDate;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::config::config;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("Invalid file id")]
    InvalidFileId,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Path relative to the storage root, e.g. `acme/receipts/2026-08/REC-20260830-001.jpg`.
    pub file_id: String,
    /// URL path the API serves the image from.
    pub url: String,
    /// Folder the image landed in, relative to the storage root.
    pub folder_path: String,
}

pub struct ReceiptStore {
    root: PathBuf,
}

impl ReceiptStore {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from(&config().storage.receipt_root),
        }
    }

    #[cfg(test)]
    fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Decode and persist a receipt image. `image_data` may carry a
    /// `data:image/...;base64,` prefix or be bare base64.
    pub async fn save(
        &self,
        tenant_slug: &str,
        receipt_number: &str,
        receipt_date: NaiveDate,
        image_data: &str,
    ) -> Result<StoredImage, StoreError> {
        let (ext, payload) = split_data_url(image_data);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| StoreError::InvalidImage(e.to_string()))?;
        if bytes.is_empty() {
            return Err(StoreError::InvalidImage("empty image payload".into()));
        }

        let folder_path = format!(
            "{}/receipts/{}",
            tenant_slug,
            receipt_date.format("%Y-%m")
        );
        let file_id = format!("{}/{}.{}", folder_path, receipt_number, ext);
        // receipt_number and slug are generated server-side, but never
        // trust a path that escapes the root.
        ensure_relative(&file_id)?;

        let dir = self.root.join(&folder_path);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(self.root.join(&file_id), &bytes).await?;

        Ok(StoredImage {
            url: format!("/files/{}", file_id),
            folder_path,
            file_id,
        })
    }

    /// Best-effort removal; a missing file is not an error.
    pub async fn delete(&self, file_id: &str) -> Result<(), StoreError> {
        ensure_relative(file_id)?;
        match tokio::fs::remove_file(self.root.join(file_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("Failed to delete receipt image {}: {}", file_id, e);
                Err(e.into())
            }
        }
    }
}

impl Default for ReceiptStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Split an optional `data:<mime>;base64,` prefix off, mapping the mime
/// type to a file extension. Bare base64 defaults to jpg.
fn split_data_url(image_data: &str) -> (&'static str, &str) {
    if let Some(rest) = image_data.strip_prefix("data:") {
        if let Some((mime, payload)) = rest.split_once(";base64,") {
            let ext = match mime {
                "image/png" => "png",
                "image/webp" => "webp",
                "image/gif" => "gif",
                "image/heic" => "heic",
                _ => "jpg",
            };
            return (ext, payload);
        }
    }
    ("jpg", image_data)
}

fn ensure_relative(file_id: &str) -> Result<(), StoreError> {
    let path = Path::new(file_id);
    let safe = !file_id.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(())
    } else {
        Err(StoreError::InvalidFileId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_data_url_prefixes() {
        assert_eq!(split_data_url("data:image/png;base64,AAAA"), ("png", "AAAA"));
        assert_eq!(split_data_url("data:image/jpeg;base64,BBBB"), ("jpg", "BBBB"));
        assert_eq!(split_data_url("data:image/webp;base64,CCCC"), ("webp", "CCCC"));
        assert_eq!(split_data_url("QUJD"), ("jpg", "QUJD"));
    }

    #[test]
    fn rejects_escaping_file_ids() {
        assert!(ensure_relative("acme/receipts/2026-08/REC-20260830-001.jpg").is_ok());
        assert!(ensure_relative("../etc/passwd").is_err());
        assert!(ensure_relative("/etc/passwd").is_err());
        assert!(ensure_relative("acme/../../etc/passwd").is_err());
        assert!(ensure_relative("").is_err());
    }

    #[tokio::test]
    async fn saves_and_deletes_an_image() {
        let dir = std::env::temp_dir().join(format!("graft-store-{}", std::process::id()));
        let store = ReceiptStore::with_root(dir.clone());
        let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();

        let stored = store
            .save("acme", "REC-20260830-001", date, "data:image/png;base64,aGVsbG8=")
            .await
            .unwrap();
        assert_eq!(
            stored.file_id,
            "acme/receipts/2026-08/REC-20260830-001.png"
        );
        assert_eq!(stored.url, "/files/acme/receipts/2026-08/REC-20260830-001.png");
        assert_eq!(stored.folder_path, "acme/receipts/2026-08");

        let on_disk = tokio::fs::read(dir.join(&stored.file_id)).await.unwrap();
        assert_eq!(on_disk, b"hello");

        store.delete(&stored.file_id).await.unwrap();
        // Deleting again is fine.
        store.delete(&stored.file_id).await.unwrap();

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn rejects_garbage_base64() {
        let store = ReceiptStore::with_root(std::env::temp_dir());
        let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let result = store.save("acme", "REC-20260830-002", date, "not base64!!").await;
        assert!(matches!(result, Err(StoreError::InvalidImage(_))));
    }
}
