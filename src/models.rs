use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::AppResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sticker {
    pub id: String,
    pub name: String,
    pub file_id: String,
    pub creator_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Sticker {
    pub fn is_created_by(&self, user_id: &str) -> bool {
        !user_id.is_empty() && self.creator_id == user_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StickerCollection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub stickers: Vec<Sticker>,
    #[serde(default)]
    pub total: usize,
}

impl StickerCollection {
    pub fn is_empty(&self) -> bool {
        self.stickers.is_empty()
    }
}

/// Per-file outcome of a batch upload. `success` holds the names the server
/// derived from filenames, `failed` is keyed by the original filename.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkUploadResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub success: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub failed: BTreeMap<String, String>,
}

impl BulkUploadResult {
    pub fn has_successes(&self) -> bool {
        !self.success.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// True when every file shows up exactly once, either as its derived name
    /// in `success` or under its filename in `failed`.
    pub fn accounts_for(&self, files: &[UploadFile]) -> bool {
        if self.success.len() + self.failed.len() != files.len() {
            return false;
        }

        let mut remaining = self.success.clone();
        files.iter().all(|file| {
            let failed = self.failed.contains_key(&file.filename);
            let position = remaining.iter().position(|name| name == file.derived_name());
            match (failed, position) {
                (true, None) => true,
                (false, Some(index)) => {
                    remaining.swap_remove(index);
                    true
                }
                _ => false,
            }
        })
    }

    /// Lines shown under the batch form after a submission.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.has_successes() {
            lines.push(format!("Added: {}", self.success.join(", ")));
        }
        if self.has_failures() {
            lines.push("Failed:".to_string());
            for (file, reason) in &self.failed {
                lines.push(format!("{}: {}", file, reason));
            }
        }
        lines
    }
}

/// An image picked by the user, held in memory until submission.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let mime_type = mime_type_for(&filename).to_string();
        Self {
            filename,
            bytes,
            mime_type,
        }
    }

    pub async fn from_path(file_path: &str) -> AppResult<Self> {
        let bytes = tokio::fs::read(file_path).await?;
        let filename = Path::new(file_path)
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Ok(Self::new(filename, bytes))
    }

    /// The name the batch endpoint assigns. The server lower-cases the
    /// extension before trimming it, so an upper-case extension is kept.
    pub fn derived_name(&self) -> &str {
        let Some(index) = self.filename.rfind('.') else {
            return &self.filename;
        };

        let extension = &self.filename[index..];
        if extension == extension.to_lowercase() {
            &self.filename[..index]
        } else {
            &self.filename
        }
    }
}

/// Detect MIME type based on file extension
pub fn mime_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png", // Default fallback
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

/// The part of a host post this crate reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub post_type: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub file_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub props: PostProps,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
