//! The sticker picker as an explicit state value.
//!
//! `PickerState::apply` consumes the state and an event and returns the next
//! state plus at most one `Effect`. Nothing in here performs I/O; the
//! `PickerController` at the bottom of the file runs effects against a
//! `StickerClient` and feeds their results back in as events.

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{Sticker, StickerCollection, UploadFile};
use crate::uploader::orchestrator::{self, UploadForm, UploadMode, UploadOutcome, UploadRequest};
use crate::uploader::StickerClient;

pub const LOAD_FAILED: &str = "Failed to load stickers";
pub const DELETE_FAILED: &str = "Failed to delete sticker";
pub const NO_MATCHES: &str = "No stickers found";
pub const EMPTY_CATALOG: &str = "No stickers yet. Add one!";
pub const BULK_HINT: &str =
    "Select multiple files. Sticker names will be set from filenames (without extension).";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CatalogPhase {
    #[default]
    Loading,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum UploadPanel {
    #[default]
    Closed,
    Open(UploadForm),
}

impl UploadPanel {
    pub fn form(&self) -> Option<&UploadForm> {
        match self {
            UploadPanel::Open(form) => Some(form),
            UploadPanel::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, UploadPanel::Open(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKey {
    Escape,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickerEvent {
    SearchChanged(String),
    /// Result of the catalog fetch issued as `generation`.
    CatalogLoaded {
        query: String,
        generation: u64,
        result: Result<StickerCollection, String>,
    },
    ToggleUploadPanel,
    SwitchMode(UploadMode),
    NameChanged(String),
    FileSelected(Option<UploadFile>),
    UrlChanged(String),
    BatchSelected(Vec<UploadFile>),
    Submit,
    UploadFinished(Result<UploadOutcome, String>),
    DeleteRequested(String),
    DeleteConfirmed { sticker: Sticker, confirmed: bool },
    DeleteFinished(Result<(), String>),
    Select(String),
    Close,
    KeyPressed(PickerKey),
}

/// Work the driver performs on behalf of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchCatalog { query: String, generation: u64 },
    Upload(UploadRequest),
    ConfirmDelete(Sticker),
    Delete { sticker_id: String },
    Select(Sticker),
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: PickerState,
    pub effect: Option<Effect>,
}

impl Step {
    fn idle(state: PickerState) -> Self {
        Self {
            state,
            effect: None,
        }
    }

    fn with(state: PickerState, effect: Effect) -> Self {
        Self {
            state,
            effect: Some(effect),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PickerState {
    pub phase: CatalogPhase,
    pub items: Vec<Sticker>,
    pub search_term: String,
    pub panel: UploadPanel,
    /// The one user-visible message, error or validation.
    pub message: Option<String>,
    pub uploading: bool,
    pub current_user_id: String,
    pub channel_id: Option<String>,
    /// False once the picker was closed or a sticker selected.
    pub active: bool,
    /// Bumped for every catalog fetch; only the latest one may land.
    pub generation: u64,
}

impl PickerState {
    /// Starts a session and requests the unfiltered catalog.
    pub fn open(current_user_id: &str, channel_id: Option<&str>) -> Step {
        let state = Self {
            current_user_id: current_user_id.to_string(),
            channel_id: channel_id.filter(|c| !c.is_empty()).map(str::to_string),
            active: true,
            generation: 1,
            ..Default::default()
        };

        Step::with(
            state,
            Effect::FetchCatalog {
                query: String::new(),
                generation: 1,
            },
        )
    }

    pub fn apply(mut self, event: PickerEvent) -> Step {
        if !self.active {
            log::debug!("Ignoring {:?} on a closed picker", event);
            return Step::idle(self);
        }

        match event {
            PickerEvent::SearchChanged(term) => {
                self.search_term = term;
                self.refetch()
            }
            PickerEvent::CatalogLoaded {
                query,
                generation,
                result,
            } => self.catalog_loaded(&query, generation, result),
            PickerEvent::ToggleUploadPanel => {
                self.panel = match self.panel {
                    UploadPanel::Closed => UploadPanel::Open(UploadForm::new(UploadMode::File)),
                    UploadPanel::Open(_) => UploadPanel::Closed,
                };
                Step::idle(self)
            }
            PickerEvent::SwitchMode(mode) => self.edit_form(|form| form.switch_mode(mode)),
            PickerEvent::NameChanged(name) => self.edit_form(|form| UploadForm { name, ..form }),
            PickerEvent::FileSelected(file) => self.edit_form(|form| UploadForm { file, ..form }),
            PickerEvent::UrlChanged(url) => self.edit_form(|form| UploadForm { url, ..form }),
            PickerEvent::BatchSelected(batch) => self.edit_form(|form| UploadForm {
                batch,
                batch_result: None,
                ..form
            }),
            PickerEvent::Submit => self.submit(),
            PickerEvent::UploadFinished(result) => self.upload_finished(result),
            PickerEvent::DeleteRequested(sticker_id) => self.delete_requested(&sticker_id),
            PickerEvent::DeleteConfirmed { sticker, confirmed } => {
                if !confirmed {
                    return Step::idle(self);
                }
                Step::with(
                    self,
                    Effect::Delete {
                        sticker_id: sticker.id,
                    },
                )
            }
            PickerEvent::DeleteFinished(Ok(())) => self.refetch(),
            PickerEvent::DeleteFinished(Err(message)) => {
                self.message = Some(message);
                Step::idle(self)
            }
            PickerEvent::Select(sticker_id) => {
                match self.items.iter().find(|s| s.id == sticker_id).cloned() {
                    Some(sticker) => {
                        self.end();
                        Step::with(self, Effect::Select(sticker))
                    }
                    None => {
                        log::warn!("Selected sticker {} is not in the catalog", sticker_id);
                        Step::idle(self)
                    }
                }
            }
            PickerEvent::Close | PickerEvent::KeyPressed(PickerKey::Escape) => {
                self.end();
                Step::with(self, Effect::Close)
            }
            PickerEvent::KeyPressed(PickerKey::Other) => Step::idle(self),
        }
    }

    fn refetch(mut self) -> Step {
        self.phase = CatalogPhase::Loading;
        self.message = None;
        self.generation += 1;
        let effect = Effect::FetchCatalog {
            query: self.search_term.clone(),
            generation: self.generation,
        };
        Step::with(self, effect)
    }

    fn catalog_loaded(
        mut self,
        query: &str,
        generation: u64,
        result: Result<StickerCollection, String>,
    ) -> Step {
        // Superseded fetches are dropped even when their term matches again
        if generation != self.generation {
            log::debug!(
                "Discarding stale catalog response for '{}' ({} < {})",
                query,
                generation,
                self.generation
            );
            return Step::idle(self);
        }

        match result {
            Ok(collection) => {
                self.items = collection.stickers;
                self.phase = CatalogPhase::Ready;
            }
            Err(message) => {
                self.phase = CatalogPhase::Error(message.clone());
                self.message = Some(message);
            }
        }
        Step::idle(self)
    }

    fn edit_form(mut self, edit: impl FnOnce(UploadForm) -> UploadForm) -> Step {
        self.panel = match self.panel {
            UploadPanel::Open(form) => UploadPanel::Open(edit(form)),
            UploadPanel::Closed => UploadPanel::Closed,
        };
        Step::idle(self)
    }

    fn submit(mut self) -> Step {
        if self.uploading {
            return Step::idle(self);
        }

        let prepared = self
            .panel
            .form()
            .map(|form| form.prepare(self.channel_id.as_deref()));
        let Some(prepared) = prepared else {
            return Step::idle(self);
        };

        match prepared {
            Ok(request) => {
                self.uploading = true;
                self.message = None;
                if let UploadPanel::Open(form) = &mut self.panel {
                    form.batch_result = None;
                }
                Step::with(self, Effect::Upload(request))
            }
            Err(e) => {
                self.message = Some(e.to_string());
                Step::idle(self)
            }
        }
    }

    fn upload_finished(mut self, result: Result<UploadOutcome, String>) -> Step {
        self.uploading = false;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(message) => {
                self.message = Some(message);
                return Step::idle(self);
            }
        };

        if outcome.completed {
            self.panel = UploadPanel::Closed;
        } else if let UploadPanel::Open(form) = &mut self.panel {
            form.batch_result = outcome.batch_result;
        }

        if outcome.catalog_dirty {
            self.refetch()
        } else {
            Step::idle(self)
        }
    }

    fn delete_requested(self, sticker_id: &str) -> Step {
        let sticker = self.items.iter().find(|s| s.id == sticker_id).cloned();

        match sticker {
            Some(sticker) if self.can_delete(&sticker) => {
                Step::with(self, Effect::ConfirmDelete(sticker))
            }
            Some(_) => {
                log::warn!("Delete of {} not offered to this user", sticker_id);
                Step::idle(self)
            }
            None => Step::idle(self),
        }
    }

    fn end(&mut self) {
        self.panel = UploadPanel::Closed;
        self.active = false;
    }

    /// Deletion is only offered to the creator. The server still decides.
    pub fn can_delete(&self, sticker: &Sticker) -> bool {
        sticker.is_created_by(&self.current_user_id)
    }

    /// Text for an empty grid, once a fetch has completed.
    pub fn empty_message(&self) -> Option<&'static str> {
        if self.phase == CatalogPhase::Loading || !self.items.is_empty() {
            return None;
        }

        if self.search_term.is_empty() {
            Some(EMPTY_CATALOG)
        } else {
            Some(NO_MATCHES)
        }
    }

    pub fn submit_label(&self) -> Option<String> {
        let form = self.panel.form()?;

        let label = if self.uploading {
            "Uploading...".to_string()
        } else {
            match form.mode {
                UploadMode::Bulk if form.batch.is_empty() => "Select files".to_string(),
                UploadMode::Bulk => format!("Upload {} file(s)", form.batch.len()),
                _ if form.name.trim().is_empty() => "Enter name".to_string(),
                UploadMode::File if form.file.is_none() => "Select file".to_string(),
                UploadMode::Url if form.url.trim().is_empty() => "Enter URL".to_string(),
                _ => "Upload".to_string(),
            }
        };

        Some(label)
    }

    pub fn can_submit(&self) -> bool {
        !self.uploading
            && self
                .panel
                .form()
                .is_some_and(|form| form.prepare(None).is_ok())
    }

    pub fn bulk_hint(&self) -> Option<&'static str> {
        self.panel
            .form()
            .filter(|f| f.mode == UploadMode::Bulk)
            .map(|_| BULK_HINT)
    }

    pub fn batch_selection_label(&self) -> Option<String> {
        let form = self.panel.form().filter(|f| f.mode == UploadMode::Bulk)?;

        if form.batch.is_empty() {
            Some("Choose files...".to_string())
        } else {
            Some(format!("{} file(s) selected", form.batch.len()))
        }
    }

    pub fn bulk_summary(&self) -> Vec<String> {
        self.panel
            .form()
            .and_then(|form| form.batch_result.as_ref())
            .map(|result| result.summary_lines())
            .unwrap_or_default()
    }
}

pub fn delete_prompt(sticker: &Sticker) -> String {
    format!("Delete sticker \"{}\"?", sticker.name)
}

/// Blocking yes/no question shown before a delete.
#[async_trait]
pub trait ConfirmDelete: Send + Sync {
    async fn confirm(&self, sticker: &Sticker) -> bool;
}

/// How a picker session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerExit {
    Selected(Sticker),
    Closed,
}

/// Runs a picker session, one effect at a time.
pub struct PickerController {
    client: StickerClient,
    confirm: Arc<dyn ConfirmDelete>,
    state: PickerState,
}

impl PickerController {
    pub fn new(client: StickerClient, confirm: Arc<dyn ConfirmDelete>) -> Self {
        Self {
            client,
            confirm,
            state: PickerState::default(),
        }
    }

    pub fn state(&self) -> &PickerState {
        &self.state
    }

    pub async fn open(&mut self, current_user_id: &str, channel_id: Option<&str>) -> Option<PickerExit> {
        log::info!("Opening sticker picker");
        self.run(PickerState::open(current_user_id, channel_id)).await
    }

    /// Applies a user event and performs whatever follows from it. Returns
    /// `Some` when the session ended.
    pub async fn handle(&mut self, event: PickerEvent) -> Option<PickerExit> {
        let step = std::mem::take(&mut self.state).apply(event);
        self.run(step).await
    }

    async fn run(&mut self, mut step: Step) -> Option<PickerExit> {
        loop {
            self.state = step.state;

            let event = match step.effect? {
                Effect::FetchCatalog { query, generation } => {
                    let result = self.fetch(&query).await;
                    PickerEvent::CatalogLoaded {
                        query,
                        generation,
                        result,
                    }
                }
                Effect::Upload(request) => {
                    PickerEvent::UploadFinished(orchestrator::submit(&self.client, &request).await)
                }
                Effect::ConfirmDelete(sticker) => {
                    let confirmed = self.confirm.confirm(&sticker).await;
                    PickerEvent::DeleteConfirmed { sticker, confirmed }
                }
                Effect::Delete { sticker_id } => {
                    let result = self.client.remove(&sticker_id).await.map_err(|e| {
                        log::error!("Failed to delete sticker {}: {}", sticker_id, e);
                        e.user_message(DELETE_FAILED)
                    });
                    PickerEvent::DeleteFinished(result)
                }
                Effect::Select(sticker) => {
                    log::info!("Selected sticker '{}'", sticker.name);
                    return Some(PickerExit::Selected(sticker));
                }
                Effect::Close => return Some(PickerExit::Closed),
            };

            step = std::mem::take(&mut self.state).apply(event);
        }
    }

    async fn fetch(&self, query: &str) -> Result<StickerCollection, String> {
        let result = if query.is_empty() {
            self.client.list().await
        } else {
            self.client.search(query).await
        };

        result.map_err(|e| {
            log::error!("Failed to load stickers: {}", e);
            LOAD_FAILED.to_string()
        })
    }
}
