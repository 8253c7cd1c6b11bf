//! Wire types exchanged with the chatlens render service.
//!
//! The service renders chat templates against named test cases, lists the
//! available templates/test cases/special tokens, and pushes change
//! notifications over a server-sent-events stream. Everything here is plain
//! serde data so that both the client and alternative service implementations
//! can share one definition of the protocol.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Template file listing (`GET`).
pub const FILES_PATH: &str = "api/files";
/// Test case names (`GET`).
pub const TEST_CASES_PATH: &str = "api/test-cases";
/// Special token vocabulary (`GET`).
pub const TOKENS_PATH: &str = "api/tokens";
/// Startup hint naming the template the service considers active (`GET`).
pub const ACTIVE_TEMPLATE_PATH: &str = "api/active-template";
/// Render a template against a test case (`POST`).
pub const RENDER_PATH: &str = "api/render";
/// Push notification stream (`GET`, `text/event-stream`).
pub const EVENTS_PATH: &str = "api/events";

/// Token name to literal text, e.g. `bos_token` → `<s>`.
pub type TokenMap = BTreeMap<String, String>;

/// Body of a render request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub filepath: String,
    pub test_case: String,
    pub add_generation_prompt: bool,
    pub add_system_prompt: bool,
}

/// Body of a render response. Exactly one of the fields is expected to be set;
/// a non-null `error` always wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RenderUpdate {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RenderUpdate {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            content: None,
            error: Some(error.into()),
        }
    }

    /// Collapse the two optional fields into rendered text or an error message.
    pub fn into_result(self) -> Result<String, String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.content.unwrap_or_default()),
        }
    }
}

/// Response of the active-template hint endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActiveTemplate {
    #[serde(default)]
    pub path: Option<String>,
}

/// Push notification kinds emitted by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// A template file's content changed on disk.
    TemplateChanged { path: String },
    /// A template file was added, removed, or renamed.
    TemplateListChanged,
    /// The special token vocabulary (and with it the test data) changed.
    VocabularyChanged,
    /// The client's own code changed; the client must reload completely.
    UiChanged,
}

impl Notification {
    pub const TEMPLATE_CHANGED: &'static str = "template_changed";
    pub const TEMPLATE_LIST_CHANGED: &'static str = "template_list_changed";
    pub const VOCABULARY_CHANGED: &'static str = "vocabulary_changed";
    pub const UI_CHANGED: &'static str = "ui_changed";

    /// Event name used on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::TemplateChanged { .. } => Self::TEMPLATE_CHANGED,
            Notification::TemplateListChanged => Self::TEMPLATE_LIST_CHANGED,
            Notification::VocabularyChanged => Self::VOCABULARY_CHANGED,
            Notification::UiChanged => Self::UI_CHANGED,
        }
    }

    /// Decode a notification from an SSE event name and its `data` payload.
    pub fn decode(event: &str, data: &str) -> Result<Self, NotificationDecodeError> {
        match event {
            Self::TEMPLATE_CHANGED => {
                let payload: TemplateChangedPayload = serde_json::from_str(data).map_err(
                    |err| NotificationDecodeError::Payload {
                        event: event.to_string(),
                        message: err.to_string(),
                    },
                )?;
                Ok(Notification::TemplateChanged { path: payload.path })
            }
            Self::TEMPLATE_LIST_CHANGED => Ok(Notification::TemplateListChanged),
            Self::VOCABULARY_CHANGED => Ok(Notification::VocabularyChanged),
            Self::UI_CHANGED => Ok(Notification::UiChanged),
            other => Err(NotificationDecodeError::UnknownEvent(other.to_string())),
        }
    }

    /// Encode the `data` payload that accompanies [`Notification::event_name`].
    pub fn encode_data(&self) -> String {
        match self {
            Notification::TemplateChanged { path } => {
                serde_json::json!({ "path": path }).to_string()
            }
            _ => "{}".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TemplateChangedPayload {
    path: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationDecodeError {
    #[error("unknown notification event `{0}`")]
    UnknownEvent(String),
    #[error("invalid payload for `{event}`: {message}")]
    Payload { event: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_wins_over_content() {
        let update = RenderUpdate {
            content: Some("ignored".into()),
            error: Some("TemplateSyntaxError: boom".into()),
        };
        assert_eq!(
            update.into_result(),
            Err("TemplateSyntaxError: boom".to_string())
        );
    }

    #[test]
    fn null_content_is_empty_success() {
        let update: RenderUpdate =
            serde_json::from_str(r#"{"content":null,"error":null}"#).expect("valid json");
        assert_eq!(update.into_result(), Ok(String::new()));
    }

    #[test]
    fn render_request_uses_snake_case_fields() {
        let request = RenderRequest {
            filepath: "llama.jinja".into(),
            test_case: "basic".into(),
            add_generation_prompt: true,
            add_system_prompt: false,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "filepath": "llama.jinja",
                "test_case": "basic",
                "add_generation_prompt": true,
                "add_system_prompt": false,
            })
        );
    }

    #[test]
    fn decode_template_changed() {
        let decoded = Notification::decode("template_changed", r#"{"path":"qwen/chat.jinja"}"#)
            .expect("decodes");
        assert_eq!(
            decoded,
            Notification::TemplateChanged {
                path: "qwen/chat.jinja".into()
            }
        );
    }

    #[test]
    fn decode_payloadless_kinds_ignore_data() {
        assert_eq!(
            Notification::decode("ui_changed", ""),
            Ok(Notification::UiChanged)
        );
        assert_eq!(
            Notification::decode("vocabulary_changed", "{}"),
            Ok(Notification::VocabularyChanged)
        );
    }

    #[test]
    fn decode_rejects_unknown_event_and_bad_payload() {
        assert!(matches!(
            Notification::decode("reticulate", "{}"),
            Err(NotificationDecodeError::UnknownEvent(name)) if name == "reticulate"
        ));
        assert!(matches!(
            Notification::decode("template_changed", "{}"),
            Err(NotificationDecodeError::Payload { .. })
        ));
    }

    #[test]
    fn event_name_and_data_decode_back() {
        let original = Notification::TemplateChanged {
            path: "a \"quoted\" name.jinja".into(),
        };
        let decoded = Notification::decode(original.event_name(), &original.encode_data())
            .expect("decodes");
        assert_eq!(decoded, original);
    }
}
