//! Wire payloads spoken on both sides of the relay endpoint.
//!
//! [`ChatRequestBody`] is the JSON body accepted by `POST /api/chat` and
//! produced by the panel-side stream client. [`events`] defines the
//! incremental message-part events the endpoint streams back, and
//! [`upstream`] the provider protocol the generation backend consumes.

use serde::{Deserialize, Serialize};

use crate::core::message::{Message, MessagePart, Role};

pub mod events;
pub mod upstream;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// One conversation-history entry as carried over the wire.
///
/// Entries arrive either as a plain `content` string (legacy shape) or as a
/// pre-structured `parts` list; [`HistoryEntry::plain_text`] normalizes both
/// before the conversation is forwarded upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<MessagePart>>,
}

impl HistoryEntry {
    pub fn plain_text(&self) -> String {
        if let Some(content) = &self.content {
            return content.clone();
        }
        let mut text = String::new();
        for part in self.parts.iter().flatten() {
            if let MessagePart::Text { text: t } = part {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(t);
            }
        }
        text
    }
}

impl From<&Message> for HistoryEntry {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: None,
            parts: Some(msg.parts.clone()),
        }
    }
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub id: String,
    pub messages: Vec<HistoryEntry>,
    /// Model to route to, in `provider/modelId` form.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}
