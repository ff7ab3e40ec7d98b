use crate::errors::{AppError, AppResult};
use crate::models::UploadFile;

pub const NAME_REQUIRED: &str = "Please provide a name";
pub const FILE_REQUIRED: &str = "Please select a file";
pub const URL_REQUIRED: &str = "Please provide an image URL";
pub const FILES_REQUIRED: &str = "Please select files";

/// Local checks run before any upload request is built.
pub struct InputValidator;

impl InputValidator {
    /// Returns the trimmed name.
    pub fn validate_sticker_name(name: &str) -> AppResult<String> {
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(AppError::validation("name", NAME_REQUIRED));
        }

        Ok(trimmed.to_string())
    }

    pub fn validate_selected_file(file: Option<&UploadFile>) -> AppResult<&UploadFile> {
        file.ok_or_else(|| AppError::validation("file", FILE_REQUIRED))
    }

    /// Returns the trimmed URL. Reachability and content type are checked by
    /// the server when it downloads the image.
    pub fn validate_source_url(url: &str) -> AppResult<String> {
        let trimmed = url.trim();

        if trimmed.is_empty() {
            return Err(AppError::validation("url", URL_REQUIRED));
        }

        Ok(trimmed.to_string())
    }

    pub fn validate_batch(files: &[UploadFile]) -> AppResult<()> {
        if files.is_empty() {
            return Err(AppError::validation("files", FILES_REQUIRED));
        }

        Ok(())
    }
}
