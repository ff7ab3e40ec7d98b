//! In-memory transport for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::errors::{AppError, AppResult};
use crate::routes::Routes;

use super::credentials::{
    discover_credentials, HostGlobals, RequestBuilder, RequestDescriptor, SessionCookies,
    DEFAULT_CSRF_COOKIE, DEFAULT_CSRF_HEADER,
};
use super::sticker_client::{StickerClient, Transport, TransportResponse};

#[derive(Default)]
struct Script {
    responses: VecDeque<AppResult<TransportResponse>>,
    requests: Vec<RequestDescriptor>,
}

/// Replays queued responses in order and records every request.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.push(Ok(TransportResponse::new(status, body)));
        self
    }

    /// Queues a failure that never produced a response.
    pub fn disconnect(self) -> Self {
        self.push(Err(connection_refused()));
        self
    }

    pub fn push(&self, response: AppResult<TransportResponse>) {
        self.script.lock().unwrap().responses.push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.script.lock().unwrap().requests.len()
    }

    pub fn last_request(&self) -> Option<RequestDescriptor> {
        self.script.lock().unwrap().requests.last().cloned()
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.script.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: RequestDescriptor) -> AppResult<TransportResponse> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request);
        script
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(connection_refused()))
    }
}

fn connection_refused() -> AppError {
    AppError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

pub fn test_client(transport: &ScriptedTransport) -> StickerClient {
    let provider = discover_credentials(
        &HostGlobals::default(),
        Arc::new(SessionCookies::new(Some("MMCSRF=test-token".to_string()))),
        DEFAULT_CSRF_COOKIE,
        DEFAULT_CSRF_HEADER,
    )
    .unwrap();

    StickerClient::new(
        Arc::new(transport.clone()),
        RequestBuilder::new(provider),
        Routes::new("https://chat.example.com", "com.example.sticker").unwrap(),
    )
}

pub fn sticker_json(id: &str, name: &str, creator_id: &str) -> String {
    serde_json::json!({
        "id": id,
        "name": name,
        "file_id": format!("file-{}", id),
        "creator_id": creator_id,
        "created_at": 1_700_000_000_000i64
    })
    .to_string()
}

pub fn collection_json(stickers: &[(&str, &str, &str)]) -> String {
    let items: Vec<String> = stickers
        .iter()
        .map(|(id, name, creator)| sticker_json(id, name, creator))
        .collect();
    format!(
        r#"{{"stickers": [{}], "total": {}}}"#,
        items.join(","),
        stickers.len()
    )
}
