// Library exports so the CLI driver and integration tests share one crate

pub mod config;
pub mod errors;
pub mod host;
pub mod models;
pub mod picker;
pub mod post_reference;
pub mod routes;
pub mod security;
pub mod uploader;

pub use errors::{AppError, AppResult};
pub use models::{BulkUploadResult, Post, Sticker, StickerCollection, UploadFile};
pub use uploader::StickerClient;
