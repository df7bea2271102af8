use std::path::PathBuf;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::AppError;

/// Persists uploaded photos and attachments, returning a reference to them.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn store(&self, user_id: u64, bytes: Vec<u8>, extension: &str)
    -> Result<String, AppError>;
}

/// Writes files under `<root>/<user_id>/<uuid>.<ext>`.
pub struct FsPhotoStore {
    root: PathBuf,
    url_prefix: String,
}

impl FsPhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            url_prefix: "/uploads".to_string(),
        }
    }
}

#[async_trait]
impl PhotoStore for FsPhotoStore {
    async fn store(
        &self,
        user_id: u64,
        bytes: Vec<u8>,
        extension: &str,
    ) -> Result<String, AppError> {
        let dir = self.root.join(user_id.to_string());
        let name = format!("{}.{}", Uuid::new_v4(), extension);

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            error!(error = %e, dir = %dir.display(), "Failed to create upload directory");
            AppError::Storage(e.to_string())
        })?;
        tokio::fs::write(dir.join(&name), &bytes).await.map_err(|e| {
            error!(error = %e, user_id, "Failed to write upload");
            AppError::Storage(e.to_string())
        })?;

        debug!(user_id, file = %name, size = bytes.len(), "Stored upload");
        Ok(format!("{}/{}/{}", self.url_prefix, user_id, name))
    }
}

/// A decoded upload from a JSON body.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub extension: String,
}

/// Decodes a base64 payload, optionally in `data:<mime>;base64,` form.
///
/// The extension comes from the data-URL mime type, falling back to `default_ext`.
pub fn decode_upload(raw: &str, default_ext: &str, max_bytes: usize) -> Result<Upload, AppError> {
    let (mime, data) = match raw.strip_prefix("data:").and_then(|r| r.split_once(',')) {
        Some((header, data)) => (header.strip_suffix(";base64"), data),
        None => (None, raw),
    };

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| AppError::BadRequest("Upload is not valid base64".to_string()))?;

    if bytes.is_empty() {
        return Err(AppError::BadRequest("Upload is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::BadRequest(format!(
            "Upload exceeds the {} byte limit",
            max_bytes
        )));
    }

    let extension = match mime {
        Some("image/jpeg") | Some("image/jpg") => "jpg",
        Some("image/png") => "png",
        Some("image/webp") => "webp",
        Some("application/pdf") => "pdf",
        _ => default_ext,
    };

    Ok(Upload {
        bytes,
        extension: extension.to_string(),
    })
}
