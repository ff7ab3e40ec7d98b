use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Duration;

use crate::errors::{AppError, AppResult};
use crate::models::{BulkUploadResult, Post, Sticker, StickerCollection, UploadFile};
use crate::routes::{Locators, Routes};

use super::credentials::{CredentialsMode, RequestBuilder, RequestDescriptor};
use super::payload::{MultipartForm, Payload, RequestBody};

/// Status and body text of a completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: RequestDescriptor) -> AppResult<TransportResponse>;
}

/// reqwest-backed transport.
pub struct ReqwestTransport {
    client: Client,
    cookie_header: Option<String>,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, cookie_header: Option<String>) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            cookie_header,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: RequestDescriptor) -> AppResult<TransportResponse> {
        let RequestDescriptor {
            method,
            url,
            headers,
            credentials,
            body,
        } = request;

        let mut builder = self.client.request(method, url.as_str()).headers(headers);

        if credentials == CredentialsMode::Include {
            if let Some(cookie) = &self.cookie_header {
                builder = builder.header(COOKIE, cookie.as_str());
            }
        }

        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(text) => builder.body(text),
            // Setting multipart adds the content type with its boundary
            RequestBody::Multipart(form) => builder.multipart(form.build_form()?),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let body = if response.status().is_success() {
            response.text().await?
        } else {
            response.text().await.unwrap_or_default()
        };

        Ok(TransportResponse { status, body })
    }
}

#[derive(Serialize)]
struct FromUrlBody<'a> {
    name: &'a str,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_id: Option<&'a str>,
}

#[derive(Serialize)]
struct SendBody<'a> {
    sticker_id: &'a str,
    channel_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_id: Option<&'a str>,
}

/// Typed access to the sticker endpoints.
#[derive(Clone)]
pub struct StickerClient {
    transport: Arc<dyn Transport>,
    builder: RequestBuilder,
    routes: Routes,
}

impl StickerClient {
    pub fn new(transport: Arc<dyn Transport>, builder: RequestBuilder, routes: Routes) -> Self {
        Self {
            transport,
            builder,
            routes,
        }
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    pub async fn list(&self) -> AppResult<StickerCollection> {
        self.fire(Method::GET, &self.routes.stickers(), Payload::Empty)
            .await
    }

    /// Searches by name. An empty query is sent as-is.
    pub async fn search(&self, query: &str) -> AppResult<StickerCollection> {
        self.fire(Method::GET, &self.routes.search(query), Payload::Empty)
            .await
    }

    pub async fn upload(
        &self,
        name: &str,
        file: UploadFile,
        channel_id: Option<&str>,
    ) -> AppResult<Sticker> {
        let mut form = MultipartForm::new();
        form.add_text_field("name", name);
        form.add_file("image", file);
        form.add_channel(channel_id);

        let sticker: Sticker = self
            .fire(Method::POST, &self.routes.stickers(), Payload::Multipart(form))
            .await?;
        log::info!("Uploaded sticker '{}' ({})", sticker.name, sticker.id);
        Ok(sticker)
    }

    pub async fn upload_from_url(
        &self,
        name: &str,
        source_url: &str,
        channel_id: Option<&str>,
    ) -> AppResult<Sticker> {
        let body = FromUrlBody {
            name,
            url: source_url,
            channel_id: channel_id.filter(|c| !c.is_empty()),
        };

        let sticker: Sticker = self
            .fire(
                Method::POST,
                &self.routes.from_url(),
                Payload::Json(serde_json::to_value(&body)?),
            )
            .await?;
        log::info!("Imported sticker '{}' from {}", sticker.name, source_url);
        Ok(sticker)
    }

    pub async fn bulk_upload(
        &self,
        files: &[UploadFile],
        channel_id: Option<&str>,
    ) -> AppResult<BulkUploadResult> {
        let mut form = MultipartForm::new();
        for file in files {
            form.add_file("images", file.clone());
        }
        form.add_channel(channel_id);

        let result: BulkUploadResult = self
            .fire(Method::POST, &self.routes.bulk(), Payload::Multipart(form))
            .await?;
        log::info!(
            "Bulk upload finished: {} added, {} failed",
            result.success.len(),
            result.failed.len()
        );
        Ok(result)
    }

    pub async fn remove(&self, sticker_id: &str) -> AppResult<()> {
        self.wind(Method::DELETE, &self.routes.sticker(sticker_id), Payload::Empty)
            .await?;
        log::info!("Deleted sticker {}", sticker_id);
        Ok(())
    }

    /// Asks the plugin to post the sticker on the user's behalf.
    pub async fn send(
        &self,
        sticker_id: &str,
        channel_id: &str,
        root_id: Option<&str>,
    ) -> AppResult<Post> {
        let body = SendBody {
            sticker_id,
            channel_id,
            root_id: root_id.filter(|r| !r.is_empty()),
        };

        self.fire(
            Method::POST,
            &self.routes.send(),
            Payload::Json(serde_json::to_value(&body)?),
        )
        .await
    }

    /// Creates a post through the host's own post endpoint.
    pub async fn create_post(&self, post: &Post) -> AppResult<Post> {
        self.fire(
            Method::POST,
            &self.routes.host_posts(),
            Payload::Json(serde_json::to_value(post)?),
        )
        .await
    }

    async fn fire<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        payload: Payload,
    ) -> AppResult<T> {
        let response = self.wind(method, url, payload).await?;

        serde_json::from_str(&response.body).map_err(|e| {
            log::error!(
                "Undecodable {} response from {}: {}",
                response.status,
                url,
                e
            );
            AppError::Decode(e)
        })
    }

    async fn wind(&self, method: Method, url: &str, payload: Payload) -> AppResult<TransportResponse> {
        let request = self.builder.build(method, url, payload)?;
        log::debug!("{} {}", request.method, request.url);

        let response = self.transport.execute(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let error = AppError::transport(response.status, &response.body);
        log::warn!("Request to {} failed ({}): {}", url, response.status, error);
        Err(error)
    }
}

impl Locators for StickerClient {
    fn image_locator(&self, sticker_id: &str) -> String {
        self.routes.image_locator(sticker_id)
    }

    fn host_file_locator(&self, file_id: &str) -> String {
        self.routes.host_file_locator(file_id)
    }
}
