use anyhow::Result;
use shared::Attachment;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// MIME types accepted for message attachments
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "text/csv",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

#[derive(Debug, PartialEq, Eq)]
pub enum UploadRejection {
    Empty,
    TooLarge { size: u64, max: u64 },
    UnsupportedType(String),
}

impl std::fmt::Display for UploadRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadRejection::Empty => write!(f, "File is empty"),
            UploadRejection::TooLarge { max, .. } => {
                write!(f, "File exceeds the maximum size of {} MB", max / (1024 * 1024))
            }
            UploadRejection::UnsupportedType(ct) => write!(f, "File type not allowed: {}", ct),
        }
    }
}

pub fn validate_upload(content_type: &str, size: u64, max: u64) -> Result<(), UploadRejection> {
    if size == 0 {
        return Err(UploadRejection::Empty);
    }
    if size > max {
        return Err(UploadRejection::TooLarge { size, max });
    }
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&essence.as_str()) {
        return Err(UploadRejection::UnsupportedType(content_type.to_string()));
    }
    Ok(())
}

/// Keep a display name safe to use as a path component
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[derive(Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Get the directory path for an order's attachments
    fn order_dir(&self, order_id: &Uuid) -> PathBuf {
        self.base_path.join("attachments").join(order_id.to_string())
    }

    /// Store an uploaded file under the order and describe it
    pub async fn save_attachment(
        &self,
        order_id: &Uuid,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<Attachment> {
        let dir = self.order_dir(order_id);
        fs::create_dir_all(&dir).await.map_err(|e| {
            anyhow::anyhow!("Storage location unavailable ({}): {}", dir.display(), e)
        })?;

        let id = Uuid::new_v4();
        let safe_name = sanitize_file_name(file_name);
        let stored_name = format!("{}-{}", id, safe_name);

        let mut file = fs::File::create(dir.join(&stored_name)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        tracing::debug!("Stored attachment {} for order {}", stored_name, order_id);

        Ok(Attachment {
            id,
            file_name: safe_name,
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            path: format!("/api/attachments/{}/{}", order_id, stored_name),
        })
    }

    /// Read a stored attachment; `None` if it does not exist
    pub async fn read_attachment(&self, order_id: &Uuid, stored_name: &str) -> Result<Option<Vec<u8>>> {
        if stored_name != sanitize_file_name(stored_name) {
            return Ok(None);
        }

        let path = self.order_dir(order_id).join(stored_name);
        if !path.exists() {
            return Ok(None);
        }

        Ok(Some(fs::read(&path).await?))
    }
}
