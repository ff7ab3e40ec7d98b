use crate::errors::AppResult;
use crate::models::{BulkUploadResult, Sticker, UploadFile};
use crate::security::InputValidator;

use super::sticker_client::StickerClient;

pub const SINGLE_UPLOAD_FAILED: &str = "Failed to upload sticker";
pub const BATCH_UPLOAD_FAILED: &str = "Failed to upload stickers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    #[default]
    File,
    Url,
    Bulk,
}

/// One submission. Exactly one variant is built per submit.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadRequest {
    SingleFile {
        name: String,
        file: UploadFile,
        channel_id: Option<String>,
    },
    FromUrl {
        name: String,
        source_url: String,
        channel_id: Option<String>,
    },
    Batch {
        files: Vec<UploadFile>,
        channel_id: Option<String>,
    },
}

impl UploadRequest {
    /// Message shown when the request fails without a server explanation.
    pub fn failure_fallback(&self) -> &'static str {
        match self {
            UploadRequest::Batch { .. } => BATCH_UPLOAD_FAILED,
            _ => SINGLE_UPLOAD_FAILED,
        }
    }
}

/// What the user has entered in the upload panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadForm {
    pub mode: UploadMode,
    pub name: String,
    pub file: Option<UploadFile>,
    pub url: String,
    pub batch: Vec<UploadFile>,
    /// Outcome of the last batch submission, kept for display.
    pub batch_result: Option<BulkUploadResult>,
}

impl UploadForm {
    pub fn new(mode: UploadMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Switches mode, dropping everything tied to the old mode. The name is
    /// shared by the file and URL modes and survives.
    pub fn switch_mode(self, mode: UploadMode) -> Self {
        Self {
            mode,
            name: self.name,
            ..Default::default()
        }
    }

    /// Validates the form and builds the request. Checks run in order and
    /// the first failure wins: name, then the mode's payload.
    pub fn prepare(&self, channel_id: Option<&str>) -> AppResult<UploadRequest> {
        let channel_id = channel_id.filter(|c| !c.is_empty()).map(str::to_string);

        match self.mode {
            UploadMode::File => {
                let name = InputValidator::validate_sticker_name(&self.name)?;
                let file = InputValidator::validate_selected_file(self.file.as_ref())?;
                Ok(UploadRequest::SingleFile {
                    name,
                    file: file.clone(),
                    channel_id,
                })
            }
            UploadMode::Url => {
                let name = InputValidator::validate_sticker_name(&self.name)?;
                let source_url = InputValidator::validate_source_url(&self.url)?;
                Ok(UploadRequest::FromUrl {
                    name,
                    source_url,
                    channel_id,
                })
            }
            UploadMode::Bulk => {
                InputValidator::validate_batch(&self.batch)?;
                Ok(UploadRequest::Batch {
                    files: self.batch.clone(),
                    channel_id,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadReceipt {
    Created(Sticker),
    Batch(BulkUploadResult),
}

/// How the picker should react to a completed submission.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    /// The catalog changed and must be refetched.
    pub catalog_dirty: bool,
    /// Clear the form and close the panel.
    pub completed: bool,
    pub batch_result: Option<BulkUploadResult>,
}

/// Performs the single REST call for a validated request.
pub async fn dispatch(client: &StickerClient, request: &UploadRequest) -> AppResult<UploadReceipt> {
    match request {
        UploadRequest::SingleFile {
            name,
            file,
            channel_id,
        } => {
            log::info!("Uploading sticker '{}' from {}", name, file.filename);
            let sticker = client
                .upload(name, file.clone(), channel_id.as_deref())
                .await?;
            Ok(UploadReceipt::Created(sticker))
        }
        UploadRequest::FromUrl {
            name,
            source_url,
            channel_id,
        } => {
            log::info!("Importing sticker '{}' from {}", name, source_url);
            let sticker = client
                .upload_from_url(name, source_url, channel_id.as_deref())
                .await?;
            Ok(UploadReceipt::Created(sticker))
        }
        UploadRequest::Batch { files, channel_id } => {
            log::info!("Uploading batch of {} file(s)", files.len());
            let result = client.bulk_upload(files, channel_id.as_deref()).await?;

            if !result.accounts_for(files) {
                log::warn!(
                    "Batch result does not match the {} submitted file(s): {} added, {} failed",
                    files.len(),
                    result.success.len(),
                    result.failed.len()
                );
            }

            Ok(UploadReceipt::Batch(result))
        }
    }
}

pub fn interpret(receipt: UploadReceipt) -> UploadOutcome {
    match receipt {
        UploadReceipt::Created(_) => UploadOutcome {
            catalog_dirty: true,
            completed: true,
            batch_result: None,
        },
        UploadReceipt::Batch(result) => {
            if result.has_failures() {
                log::warn!(
                    "{} file(s) failed in batch upload, keeping selection",
                    result.failed.len()
                );
            }

            UploadOutcome {
                catalog_dirty: result.has_successes(),
                completed: !result.has_failures(),
                batch_result: Some(result),
            }
        }
    }
}

/// Runs a validated request and reduces it to an outcome or a user-facing
/// error message.
pub async fn submit(client: &StickerClient, request: &UploadRequest) -> Result<UploadOutcome, String> {
    match dispatch(client, request).await {
        Ok(receipt) => Ok(interpret(receipt)),
        Err(e) => {
            log::error!("Upload failed: {}", e);
            Err(e.user_message(request.failure_fallback()))
        }
    }
}
