//! Boundary with the host application: which user and channel a picker was
//! opened for, and how a selected sticker becomes a post.

use serde_json::Value;

use crate::errors::AppResult;
use crate::models::{Post, Sticker};
use crate::uploader::StickerClient;

/// What the host knows about the session when the picker is launched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSnapshot {
    pub current_user_id: String,
    pub current_channel_id: String,
    /// Post selected in the right-hand thread view, if one is open.
    pub selected_post_id: Option<String>,
}

pub trait HostState: Send + Sync {
    fn snapshot(&self) -> HostSnapshot;
}

/// A host that never changes, for drivers outside a running host.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    snapshot: HostSnapshot,
}

impl StaticHost {
    pub fn new(snapshot: HostSnapshot) -> Self {
        Self { snapshot }
    }
}

impl HostState for StaticHost {
    fn snapshot(&self) -> HostSnapshot {
        self.snapshot.clone()
    }
}

/// What the host passes to the picker's launch hook. Depending on where the
/// picker was opened from this is a channel id, a channel-like object, or
/// nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChannelArgument {
    #[default]
    Absent,
    Id(String),
    Object {
        id: Option<String>,
        channel_id: Option<String>,
    },
}

impl ChannelArgument {
    /// Channel named by the argument, if any.
    pub fn channel_id(&self) -> Option<&str> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|v| !v.is_empty())
        }

        match self {
            ChannelArgument::Absent => None,
            ChannelArgument::Id(id) => Some(id.as_str()).filter(|v| !v.is_empty()),
            ChannelArgument::Object { id, channel_id } => non_empty(id).or(non_empty(channel_id)),
        }
    }
}

impl From<&Value> for ChannelArgument {
    fn from(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);

        match value {
            Value::String(id) => ChannelArgument::Id(id.clone()),
            Value::Object(_) => ChannelArgument::Object {
                id: field("id"),
                channel_id: field("channel_id"),
            },
            _ => ChannelArgument::Absent,
        }
    }
}

/// Context captured when the picker opens.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerLaunch {
    pub current_user_id: String,
    pub channel_id: String,
    pub root_id: Option<String>,
}

impl PickerLaunch {
    pub fn resolve(argument: &ChannelArgument, host: &dyn HostState) -> Self {
        let snapshot = host.snapshot();

        let channel_id = argument
            .channel_id()
            .map(str::to_string)
            .unwrap_or(snapshot.current_channel_id);

        if channel_id.is_empty() {
            log::warn!("Picker opened without a channel");
        }

        Self {
            current_user_id: snapshot.current_user_id,
            channel_id,
            root_id: snapshot.selected_post_id.filter(|id| !id.is_empty()),
        }
    }

    /// The post that shares `sticker` in the launch channel.
    pub fn sticker_post(&self, sticker: &Sticker) -> Post {
        Post {
            channel_id: self.channel_id.clone(),
            root_id: self.root_id.clone().unwrap_or_default(),
            message: String::new(),
            file_ids: vec![sticker.file_id.clone()],
            ..Default::default()
        }
    }
}

/// Posts the selected sticker through the host's post endpoint.
pub async fn deliver_selection(
    client: &StickerClient,
    launch: &PickerLaunch,
    sticker: &Sticker,
) -> AppResult<Post> {
    let post = launch.sticker_post(sticker);

    match client.create_post(&post).await {
        Ok(created) => {
            log::info!(
                "Sent sticker '{}' to channel {}",
                sticker.name,
                launch.channel_id
            );
            Ok(created)
        }
        Err(e) => {
            log::error!("Failed to send sticker: {}", e);
            Err(e)
        }
    }
}
