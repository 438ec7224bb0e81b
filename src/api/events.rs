//! The incremental event envelope streamed by the relay endpoint.
//!
//! Events travel as SSE `data:` lines, one JSON object per line. The first
//! event of a response is always [`StreamEvent::Start`] carrying the
//! creation timestamp; the stream terminates with [`StreamEvent::Finish`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::message::ToolInvocation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    #[serde(rename_all = "camelCase")]
    Start {
        message_id: String,
        created_at: DateTime<Utc>,
    },
    TextDelta {
        text: String,
    },
    ReasoningDelta {
        text: String,
    },
    ToolInvocation {
        invocation: ToolInvocation,
    },
    Source {
        id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    File {
        media_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        url: String,
    },
    StepStart,
    #[serde(rename = "error")]
    StreamError {
        message: String,
    },
    Finish,
}

/// Strip the SSE `data:` prefix from a line, tolerating both the spaced and
/// unspaced variants providers emit.
pub fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}
