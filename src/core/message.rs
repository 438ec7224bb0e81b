use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_assistant(self) -> bool {
        self == Role::Assistant
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// Lifecycle of a tool invocation. The state only moves forward through
/// partial-call → call → (result | error), never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCallState {
    PartialCall,
    Call,
    Result,
    Error,
}

impl ToolCallState {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolCallState::PartialCall => "partial-call",
            ToolCallState::Call => "call",
            ToolCallState::Result => "result",
            ToolCallState::Error => "error",
        }
    }

    fn rank(self) -> u8 {
        match self {
            ToolCallState::PartialCall => 0,
            ToolCallState::Call => 1,
            ToolCallState::Result | ToolCallState::Error => 2,
        }
    }

    /// Whether a transition to `next` respects the forward-only ordering.
    /// Re-entering the same state is allowed (streamed updates repeat it).
    pub fn can_advance_to(self, next: ToolCallState) -> bool {
        next == self || next.rank() > self.rank()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolStateError {
    pub from: ToolCallState,
    pub to: ToolCallState,
}

impl fmt::Display for ToolStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tool invocation state cannot move from {} to {}",
            self.from.as_str(),
            self.to.as_str()
        )
    }
}

impl std::error::Error for ToolStateError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolCallState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolInvocation {
    pub fn partial(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            state: ToolCallState::PartialCall,
            args: None,
            result: None,
            error_message: None,
        }
    }

    /// Merge a streamed update into this invocation, enforcing forward-only
    /// state transitions.
    pub fn advance(&mut self, update: ToolInvocation) -> Result<(), ToolStateError> {
        if !self.state.can_advance_to(update.state) {
            return Err(ToolStateError {
                from: self.state,
                to: update.state,
            });
        }
        self.state = update.state;
        if !update.tool_name.is_empty() {
            self.tool_name = update.tool_name;
        }
        if update.args.is_some() {
            self.args = update.args;
        }
        if update.result.is_some() {
            self.result = update.result;
        }
        if update.error_message.is_some() {
            self.error_message = update.error_message;
        }
        Ok(())
    }
}

/// One typed fragment of a conversation turn's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    ToolInvocation {
        #[serde(rename = "toolInvocation")]
        invocation: ToolInvocation,
    },
    Source {
        id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    File {
        #[serde(rename = "mediaType")]
        media_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        url: String,
    },
    StepStart,
}

const FAILED_METADATA_KEY: &str = "error";

/// One conversation turn. Parts preserve arrival order; an in-progress
/// assistant message grows monotonically while its stream is live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<MessagePart>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![MessagePart::Text { text: text.into() }],
            created_at: Utc::now(),
            metadata: None,
        }
    }

    pub fn assistant_at(created_at: DateTime<Utc>) -> Self {
        Self {
            role: Role::Assistant,
            parts: Vec::new(),
            created_at,
            metadata: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_assistant(&self) -> bool {
        self.role.is_assistant()
    }

    /// Append a streamed text delta, coalescing into the trailing text part.
    pub fn push_text_delta(&mut self, delta: &str) {
        if let Some(MessagePart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
            return;
        }
        self.parts.push(MessagePart::Text {
            text: delta.to_string(),
        });
    }

    /// Append a streamed reasoning delta, coalescing into the trailing
    /// reasoning part.
    pub fn push_reasoning_delta(&mut self, delta: &str) {
        if let Some(MessagePart::Reasoning { text }) = self.parts.last_mut() {
            text.push_str(delta);
            return;
        }
        self.parts.push(MessagePart::Reasoning {
            text: delta.to_string(),
        });
    }

    /// Fold a tool-invocation update into the part with the same call id,
    /// or append a new part for an unseen id.
    pub fn apply_tool_invocation(&mut self, update: ToolInvocation) -> Result<(), ToolStateError> {
        for part in self.parts.iter_mut() {
            if let MessagePart::ToolInvocation { invocation } = part {
                if invocation.tool_call_id == update.tool_call_id {
                    return invocation.advance(update);
                }
            }
        }
        self.parts.push(MessagePart::ToolInvocation { invocation: update });
        Ok(())
    }

    pub fn has_reasoning(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, MessagePart::Reasoning { .. }))
    }

    pub fn reasoning_char_count(&self) -> usize {
        self.parts
            .iter()
            .map(|p| match p {
                MessagePart::Reasoning { text } => text.chars().count(),
                _ => 0,
            })
            .sum()
    }

    /// Concatenated text-part content, used for logging and for normalizing
    /// history before it is forwarded upstream.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let MessagePart::Text { text } = part {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(FAILED_METADATA_KEY.to_string(), Value::String(reason.into()));
    }

    pub fn failure(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(FAILED_METADATA_KEY))
            .and_then(Value::as_str)
    }
}

/// Deterministic "thinking duration" estimate for a reasoning trace of
/// `total_chars` characters: `max(1, round(total_chars / 100))` seconds.
pub fn thinking_duration_secs(total_chars: usize) -> u64 {
    ((total_chars as f64) / 100.0).round().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thinking_duration_is_deterministic() {
        assert_eq!(thinking_duration_secs(250), 3);
        assert_eq!(thinking_duration_secs(0), 1);
        assert_eq!(thinking_duration_secs(49), 1);
        assert_eq!(thinking_duration_secs(100), 1);
        assert_eq!(thinking_duration_secs(1000), 10);
    }

    #[test]
    fn tool_state_never_moves_backward() {
        let mut inv = ToolInvocation::partial("c1", "search");
        inv.advance(ToolInvocation {
            state: ToolCallState::Call,
            args: Some(json!({"q": "rust"})),
            ..ToolInvocation::partial("c1", "search")
        })
        .unwrap();
        inv.advance(ToolInvocation {
            state: ToolCallState::Result,
            result: Some(json!({"hits": 3})),
            ..ToolInvocation::partial("c1", "search")
        })
        .unwrap();

        let regression = inv.advance(ToolInvocation {
            state: ToolCallState::Call,
            ..ToolInvocation::partial("c1", "search")
        });
        assert!(regression.is_err());

        let crossover = inv.advance(ToolInvocation {
            state: ToolCallState::Error,
            ..ToolInvocation::partial("c1", "search")
        });
        assert!(crossover.is_err());
        assert_eq!(inv.state, ToolCallState::Result);
    }

    #[test]
    fn text_deltas_coalesce_into_trailing_part() {
        let mut msg = Message::assistant_at(Utc::now());
        msg.push_text_delta("Hel");
        msg.push_text_delta("lo");
        msg.push_reasoning_delta("because");
        msg.push_text_delta("!");
        assert_eq!(msg.parts.len(), 3);
        assert_eq!(msg.plain_text(), "Hello\n!");
    }

    #[test]
    fn tool_updates_fold_by_call_id() {
        let mut msg = Message::assistant_at(Utc::now());
        msg.apply_tool_invocation(ToolInvocation::partial("c1", "lookup"))
            .unwrap();
        msg.apply_tool_invocation(ToolInvocation {
            state: ToolCallState::Call,
            args: Some(json!({"key": "v"})),
            ..ToolInvocation::partial("c1", "lookup")
        })
        .unwrap();
        assert_eq!(msg.parts.len(), 1);
        match &msg.parts[0] {
            MessagePart::ToolInvocation { invocation } => {
                assert_eq!(invocation.state, ToolCallState::Call);
                assert!(invocation.args.is_some());
            }
            other => panic!("expected tool invocation, got {other:?}"),
        }
    }

    #[test]
    fn part_tags_match_the_wire_shape() {
        let part = MessagePart::ToolInvocation {
            invocation: ToolInvocation::partial("c1", "lookup"),
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains(r#""type":"tool-invocation""#));
        assert!(json.contains(r#""toolInvocation""#));
        assert!(json.contains(r#""toolCallId":"c1""#));

        let file: MessagePart = serde_json::from_str(
            r#"{"type":"file","mediaType":"image/png","url":"https://x/y.png"}"#,
        )
        .unwrap();
        assert!(matches!(file, MessagePart::File { .. }));
    }

    #[test]
    fn failure_marker_round_trips() {
        let mut msg = Message::assistant_at(Utc::now());
        assert!(msg.failure().is_none());
        msg.mark_failed("upstream unreachable");
        assert_eq!(msg.failure(), Some("upstream unreachable"));
    }
}
