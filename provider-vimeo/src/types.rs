//! Vimeo API response types
//!
//! Only the fields the sync engine reads are modeled; everything else in the
//! response is ignored.

use serde::Deserialize;

/// Video resource (`/videos/{id}`, items of `/me/videos`)
#[derive(Debug, Clone, Deserialize)]
pub struct VimeoVideo {
    /// e.g. `/videos/123456`
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Public player link
    #[serde(default)]
    pub link: Option<String>,
    /// RFC 3339
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub pictures: Option<VimeoPictures>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VimeoPictures {
    #[serde(default)]
    pub sizes: Vec<VimeoPictureSize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VimeoPictureSize {
    #[serde(default)]
    pub width: Option<u32>,
    pub link: String,
}

/// Paged collection envelope
#[derive(Debug, Deserialize)]
pub struct VimeoCollection<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub paging: Option<VimeoPaging>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VimeoPaging {
    #[serde(default)]
    pub next: Option<String>,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Default, Deserialize)]
pub struct VimeoErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Project (folder) resource
#[derive(Debug, Deserialize)]
pub struct VimeoProject {
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Webhook subscription as echoed back on creation.
///
/// Vimeo has returned the identifier under different keys over time.
#[derive(Debug, Default, Deserialize)]
pub struct VimeoWebhook {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub webhook_id: Option<serde_json::Value>,
}

impl VimeoWebhook {
    /// First identifier present: `uri`, then `id`, then `webhook_id`.
    pub fn subscription_id(&self) -> Option<String> {
        fn scalar(value: &serde_json::Value) -> Option<String> {
            match value {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        }

        self.uri
            .clone()
            .filter(|uri| !uri.is_empty())
            .or_else(|| self.id.as_ref().and_then(scalar))
            .or_else(|| self.webhook_id.as_ref().and_then(scalar))
    }
}

/// Text track resource (`/videos/{id}/texttracks`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VimeoTextTrack {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_id_precedence() {
        let hook: VimeoWebhook =
            serde_json::from_str(r#"{"uri": "/me/webhooks/9", "id": 9}"#).unwrap();
        assert_eq!(hook.subscription_id().as_deref(), Some("/me/webhooks/9"));

        let hook: VimeoWebhook = serde_json::from_str(r#"{"id": 9}"#).unwrap();
        assert_eq!(hook.subscription_id().as_deref(), Some("9"));

        let hook: VimeoWebhook = serde_json::from_str(r#"{"webhook_id": "w-1"}"#).unwrap();
        assert_eq!(hook.subscription_id().as_deref(), Some("w-1"));

        let hook: VimeoWebhook = serde_json::from_str("{}").unwrap();
        assert_eq!(hook.subscription_id(), None);
    }

    #[test]
    fn test_collection_defaults() {
        let collection: VimeoCollection<VimeoVideo> = serde_json::from_str("{}").unwrap();
        assert!(collection.data.is_empty());
        assert!(collection.paging.is_none());
    }
}
