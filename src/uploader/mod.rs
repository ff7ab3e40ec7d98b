// Uploader module - everything that talks to the sticker endpoints
//
// credentials builds authenticated requests, sticker_client performs them,
// orchestrator validates and dispatches the three upload modes

pub mod credentials;
pub mod orchestrator;
pub mod payload;
pub mod sticker_client;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{UploadForm, UploadMode, UploadOutcome, UploadRequest};
pub use sticker_client::{ReqwestTransport, StickerClient, Transport, TransportResponse};
