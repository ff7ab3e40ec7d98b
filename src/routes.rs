//! URL construction for the plugin-scoped sticker API and the host's generic
//! file and post endpoints. Nothing here performs I/O.

use url::Url;

use crate::errors::{AppError, AppResult};

/// Computes fetchable URLs for sticker images and host files.
pub trait Locators {
    fn image_locator(&self, sticker_id: &str) -> String;
    fn host_file_locator(&self, file_id: &str) -> String;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Routes {
    server_url: String,
    plugin_id: String,
}

impl Routes {
    pub fn new(server_url: &str, plugin_id: &str) -> AppResult<Self> {
        let parsed = Url::parse(server_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::validation(
                "server_url",
                "Server URL must use http or https",
            ));
        }

        if plugin_id.trim().is_empty() {
            return Err(AppError::validation("plugin_id", "Plugin id cannot be empty"));
        }

        Ok(Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            plugin_id: plugin_id.trim().to_string(),
        })
    }

    pub fn plugin_route(&self) -> String {
        format!("{}/plugins/{}", self.server_url, self.plugin_id)
    }

    pub fn stickers(&self) -> String {
        format!("{}/api/v1/stickers", self.plugin_route())
    }

    pub fn search(&self, query: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        format!("{}/search?q={}", self.stickers(), encoded)
    }

    pub fn bulk(&self) -> String {
        format!("{}/bulk", self.stickers())
    }

    pub fn from_url(&self) -> String {
        format!("{}/from-url", self.stickers())
    }

    pub fn send(&self) -> String {
        format!("{}/send", self.stickers())
    }

    pub fn sticker(&self, sticker_id: &str) -> String {
        format!("{}/{}", self.stickers(), path_segment(sticker_id))
    }

    pub fn host_posts(&self) -> String {
        format!("{}/api/v4/posts", self.server_url)
    }
}

impl Locators for Routes {
    fn image_locator(&self, sticker_id: &str) -> String {
        format!("{}/image", self.sticker(sticker_id))
    }

    fn host_file_locator(&self, file_id: &str) -> String {
        format!("{}/api/v4/files/{}", self.server_url, path_segment(file_id))
    }
}

// Ids are opaque; keep a stray '/' or '?' from escaping its segment.
fn path_segment(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
