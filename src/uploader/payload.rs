use reqwest::multipart;

use crate::errors::AppResult;
use crate::models::UploadFile;

/// What a caller hands to the request builder.
#[derive(Debug, Clone)]
pub enum Payload {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// Encoded body of a built request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// Serialized JSON text, sent with an explicit JSON content type.
    Json(String),
    /// Passed through untouched so the transport can set the boundary.
    Multipart(MultipartForm),
}

/// Helper struct to hold multipart form data until it reaches the transport
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    text_fields: Vec<(String, String)>,
    files: Vec<(String, UploadFile)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text_field(&mut self, key: &str, value: &str) {
        self.text_fields.push((key.to_string(), value.to_string()));
    }

    /// Adds `channel_id` only when a non-empty channel was given.
    pub fn add_channel(&mut self, channel_id: Option<&str>) {
        if let Some(channel_id) = channel_id.filter(|c| !c.is_empty()) {
            self.add_text_field("channel_id", channel_id);
        }
    }

    pub fn add_file(&mut self, field_name: &str, file: UploadFile) {
        self.files.push((field_name.to_string(), file));
    }

    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.text_fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &UploadFile)> {
        self.files.iter().map(|(field, file)| (field.as_str(), file))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn build_form(&self) -> AppResult<multipart::Form> {
        let mut form = multipart::Form::new();

        for (key, value) in &self.text_fields {
            form = form.text(key.clone(), value.clone());
        }

        for (field_name, file) in &self.files {
            let part = multipart::Part::bytes(file.bytes.clone())
                .file_name(file.filename.clone())
                .mime_str(&file.mime_type)?;

            form = form.part(field_name.clone(), part);
        }

        Ok(form)
    }
}
