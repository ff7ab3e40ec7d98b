//! Finds the sticker a post refers to. Posts written by older plugin versions
//! carry the sticker as a plain file attachment, newer ones put its identity
//! in props, and the newest do both. Whenever props identify the sticker the
//! host's own attachment preview must be hidden, or the image shows twice.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::models::Post;
use crate::routes::Locators;

pub const DEFAULT_DISPLAY_NAME: &str = "Sticker";

/// The ways a post can reference a sticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickerEncoding<'a> {
    /// Generic file attachment only.
    Attachment { file_id: &'a str },
    /// Sticker id and name in props.
    Props {
        sticker_id: &'a str,
        name: Option<&'a str>,
    },
    /// Props-based id on a post that also carries attachments. The host would
    /// render those as a second preview.
    PropsWithAttachments {
        sticker_id: &'a str,
        name: Option<&'a str>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSticker {
    pub image_locator: String,
    pub display_name: String,
    pub suppress_attachment_preview: bool,
}

pub fn classify(post: &Post) -> Option<StickerEncoding<'_>> {
    let name = sticker_name(post);
    let first_file = post.file_ids.iter().map(String::as_str).find(|f| !f.is_empty());

    match post.props.sticker_id.as_deref().filter(|id| !id.is_empty()) {
        Some(sticker_id) if first_file.is_some() => {
            Some(StickerEncoding::PropsWithAttachments { sticker_id, name })
        }
        Some(sticker_id) => Some(StickerEncoding::Props { sticker_id, name }),
        None => first_file.map(|file_id| StickerEncoding::Attachment { file_id }),
    }
}

fn sticker_name(post: &Post) -> Option<&str> {
    post.props
        .sticker_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
}

/// Resolves the image to show for a post, or `None` when it references no
/// sticker at all.
pub fn resolve(post: &Post, locators: &impl Locators) -> Option<ResolvedSticker> {
    let display_name = |name: Option<&str>| name.unwrap_or(DEFAULT_DISPLAY_NAME).to_string();

    let resolved = match classify(post)? {
        StickerEncoding::Attachment { file_id } => ResolvedSticker {
            image_locator: locators.host_file_locator(file_id),
            display_name: display_name(sticker_name(post)),
            suppress_attachment_preview: false,
        },
        StickerEncoding::Props { sticker_id, name }
        | StickerEncoding::PropsWithAttachments { sticker_id, name } => ResolvedSticker {
            image_locator: locators.image_locator(sticker_id),
            display_name: display_name(name),
            suppress_attachment_preview: true,
        },
    };

    Some(resolved)
}

/// Host capability that hides the generic attachment preview of one post.
/// Calling it again for the same post must be harmless.
pub trait AttachmentPreview: Send + Sync {
    fn hide_attachment_preview(&self, post_id: &str);
}

/// Remembers which posts have had their preview hidden.
#[derive(Debug, Default)]
pub struct HiddenPreviews {
    hidden: Mutex<HashSet<String>>,
}

impl HiddenPreviews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hidden(&self, post_id: &str) -> bool {
        self.hidden
            .lock()
            .map(|hidden| hidden.contains(post_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.hidden.lock().map(|hidden| hidden.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttachmentPreview for HiddenPreviews {
    fn hide_attachment_preview(&self, post_id: &str) {
        match self.hidden.lock() {
            Ok(mut hidden) => {
                if hidden.insert(post_id.to_string()) {
                    log::debug!("Hiding attachment preview for post {}", post_id);
                }
            }
            Err(e) => log::warn!("Preview registry poisoned: {}", e),
        }
    }
}

/// Resolves a post for display and applies preview suppression when the
/// encoding asks for it.
pub fn render(
    post: &Post,
    locators: &impl Locators,
    preview: &dyn AttachmentPreview,
) -> Option<ResolvedSticker> {
    let resolved = resolve(post, locators);

    match &resolved {
        Some(sticker) if sticker.suppress_attachment_preview && !post.id.is_empty() => {
            preview.hide_attachment_preview(&post.id);
        }
        Some(_) => {}
        None => log::debug!("Post {} has no sticker reference", post.id),
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostProps;
    use crate::routes::Routes;

    fn routes() -> Routes {
        Routes::new("https://chat.example.com", "com.example.sticker").unwrap()
    }

    fn post(sticker_id: Option<&str>, name: Option<&str>, file_ids: &[&str]) -> Post {
        Post {
            id: "p1".to_string(),
            channel_id: "c1".to_string(),
            file_ids: file_ids.iter().map(|f| f.to_string()).collect(),
            props: PostProps {
                sticker_id: sticker_id.map(str::to_string),
                sticker_name: name.map(str::to_string),
                file_id: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_encodings() {
        assert_eq!(
            classify(&post(None, None, &["f1"])),
            Some(StickerEncoding::Attachment { file_id: "f1" })
        );
        assert_eq!(
            classify(&post(Some("s1"), Some("cat"), &[])),
            Some(StickerEncoding::Props {
                sticker_id: "s1",
                name: Some("cat")
            })
        );
        assert_eq!(
            classify(&post(Some("s1"), None, &["f1"])),
            Some(StickerEncoding::PropsWithAttachments {
                sticker_id: "s1",
                name: None
            })
        );
        assert_eq!(classify(&post(Some(""), None, &[])), None);
    }

    #[test]
    fn test_props_take_priority_over_attachment() {
        let resolved = resolve(&post(Some("s1"), Some("cat"), &["f1"]), &routes()).unwrap();

        assert!(resolved.image_locator.ends_with("/api/v1/stickers/s1/image"));
        assert!(!resolved.image_locator.contains("/api/v4/files/"));
        assert_eq!(resolved.display_name, "cat");
        assert!(resolved.suppress_attachment_preview);
    }

    #[test]
    fn test_attachment_only_uses_host_file() {
        let resolved = resolve(&post(None, None, &["f1", "f2"]), &routes()).unwrap();

        assert_eq!(
            resolved.image_locator,
            "https://chat.example.com/api/v4/files/f1"
        );
        assert_eq!(resolved.display_name, DEFAULT_DISPLAY_NAME);
        assert!(!resolved.suppress_attachment_preview);
    }

    #[test]
    fn test_props_only_still_suppresses_preview() {
        let resolved = resolve(&post(Some("s1"), None, &[]), &routes()).unwrap();
        assert_eq!(resolved.display_name, "Sticker");
        assert!(resolved.suppress_attachment_preview);
    }

    #[test]
    fn test_server_sticker_post_is_hidden() {
        // Posts created by the plugin's send endpoint carry props and no file_ids
        let mut server_post = post(Some("s1"), Some("cat"), &[]);
        server_post.post_type = "custom_sticker".to_string();
        server_post.props.file_id = Some("f1".to_string());

        let previews = HiddenPreviews::new();
        let resolved = render(&server_post, &routes(), &previews).unwrap();

        assert!(resolved.image_locator.ends_with("/api/v1/stickers/s1/image"));
        assert_eq!(resolved.display_name, "cat");
        assert!(previews.is_hidden("p1"));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let posts = [
            post(None, None, &["f1"]),
            post(Some("s1"), Some("cat"), &[]),
            post(Some("s1"), Some("cat"), &["f1"]),
        ];

        for p in &posts {
            let first = resolve(p, &routes());
            assert!(first.is_some());
            assert_eq!(resolve(p, &routes()), first);
            assert_eq!(classify(p), classify(p));
        }
    }

    #[test]
    fn test_no_reference_resolves_to_none() {
        assert_eq!(resolve(&post(None, Some("cat"), &[]), &routes()), None);
        assert_eq!(resolve(&post(None, None, &[""]), &routes()), None);
    }

    #[test]
    fn test_render_hides_preview_once() {
        let previews = HiddenPreviews::new();
        let v3 = post(Some("s1"), Some("cat"), &["f1"]);

        render(&v3, &routes(), &previews).unwrap();
        render(&v3, &routes(), &previews).unwrap();

        assert!(previews.is_hidden("p1"));
        assert_eq!(previews.len(), 1);
    }

    #[test]
    fn test_render_leaves_attachment_posts_alone() {
        let previews = HiddenPreviews::new();

        render(&post(None, None, &["f1"]), &routes(), &previews).unwrap();
        assert!(previews.is_empty());

        let mut props_only = post(Some("s1"), None, &[]);
        props_only.id = "p2".to_string();
        render(&props_only, &routes(), &previews).unwrap();

        assert!(previews.is_hidden("p2"));
        assert!(!previews.is_hidden("p1"));
        assert_eq!(previews.len(), 1);
    }
}
