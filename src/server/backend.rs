//! The hosted generation capability behind the relay endpoint.
//!
//! [`GenerationBackend`] is the seam the endpoint streams through;
//! [`OpenAiCompatBackend`] is the production implementation speaking the
//! OpenAI-compatible chat completions SSE protocol.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::events::{extract_data_payload, StreamEvent};
use crate::api::{upstream, ChatRequestBody};
use crate::core::message::{ToolCallState, ToolInvocation};
use crate::utils::url::construct_api_url;

/// A validated, normalized request ready for the upstream provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub system: Option<String>,
    pub history: Vec<upstream::ChatMessage>,
    pub temperature: f64,
    pub top_p: Option<f64>,
    pub top_k: Option<f64>,
    pub max_output_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Normalize a validated endpoint body: history entries collapse to
    /// plain text, the system prompt stays separate for injection.
    pub fn from_body(body: &ChatRequestBody) -> Self {
        let history = body
            .messages
            .iter()
            .map(|entry| upstream::ChatMessage {
                role: entry.role.as_str().to_string(),
                content: entry.plain_text(),
            })
            .collect();
        Self {
            model: body.model.clone(),
            system: body.system.clone().filter(|s| !s.trim().is_empty()),
            history,
            temperature: body.temperature,
            top_p: body.top_p,
            top_k: body.top_k,
            max_output_tokens: body.max_output_tokens,
        }
    }

    fn into_upstream_request(self) -> upstream::ChatRequest {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        if let Some(system) = self.system {
            messages.push(upstream::ChatMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.extend(self.history);
        upstream::ChatRequest {
            model: self.model,
            messages,
            stream: true,
            temperature: Some(self.temperature),
            top_p: self.top_p,
            top_k: self.top_k,
            max_tokens: self.max_output_tokens,
        }
    }
}

/// Submit a conversation, receive incremental message-part events. The
/// implementation must terminate every stream with [`StreamEvent::Finish`],
/// after an error event if one occurred.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn stream_generation(
        &self,
        request: GenerationRequest,
        events: mpsc::UnboundedSender<StreamEvent>,
    );
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API error: <empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return format!("API error: {summary}");
            }
        }
        return format!("API error: {trimmed}");
    }

    format!("API error: {trimmed}")
}

#[derive(Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates tool-call argument fragments across deltas, keyed by the
/// provider's slot index.
#[derive(Default)]
struct ToolCallAccumulator {
    builders: BTreeMap<u32, ToolCallBuilder>,
}

impl ToolCallAccumulator {
    /// Fold one delta in; returns the partial-call event to relay.
    fn absorb(&mut self, delta: upstream::ChatToolCallDelta) -> Option<StreamEvent> {
        let index = delta.index.unwrap_or(0);
        let builder = self.builders.entry(index).or_default();
        if let Some(id) = delta.id {
            builder.id = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                builder.name = name;
            }
            if let Some(arguments) = function.arguments {
                builder.arguments.push_str(&arguments);
            }
        }
        if builder.id.is_empty() {
            return None;
        }
        Some(StreamEvent::ToolInvocation {
            invocation: ToolInvocation::partial(builder.id.clone(), builder.name.clone()),
        })
    }

    /// The provider signalled the calls are complete: emit each one in
    /// `call` state with its parsed arguments.
    fn complete(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.builders)
            .into_values()
            .filter(|b| !b.id.is_empty())
            .map(|b| {
                let args = serde_json::from_str(&b.arguments).ok();
                StreamEvent::ToolInvocation {
                    invocation: ToolInvocation {
                        tool_call_id: b.id,
                        tool_name: b.name,
                        state: ToolCallState::Call,
                        args,
                        result: None,
                        error_message: None,
                    },
                }
            })
            .collect()
    }
}

/// Cross-payload relay state: tool-call assembly plus the reasoning →
/// response phase boundary.
#[derive(Default)]
struct RelayState {
    tools: ToolCallAccumulator,
    saw_reasoning: bool,
    answer_started: bool,
}

/// Map one upstream SSE data payload to relay events. Returns `true` when
/// the stream should end.
fn relay_data_payload(
    payload: &str,
    state: &mut RelayState,
    events: &mpsc::UnboundedSender<StreamEvent>,
) -> bool {
    if payload == "[DONE]" {
        for event in state.tools.complete() {
            let _ = events.send(event);
        }
        let _ = events.send(StreamEvent::Finish);
        return true;
    }

    match serde_json::from_str::<upstream::ChatResponse>(payload) {
        Ok(response) => {
            for choice in response.choices {
                if let Some(text) = choice.delta.reasoning_content {
                    if !text.is_empty() {
                        state.saw_reasoning = true;
                        let _ = events.send(StreamEvent::ReasoningDelta { text });
                    }
                }
                if let Some(text) = choice.delta.content {
                    if !text.is_empty() {
                        // The first visible token after a reasoning phase
                        // gets a step marker ahead of it.
                        if state.saw_reasoning && !state.answer_started {
                            let _ = events.send(StreamEvent::StepStart);
                        }
                        state.answer_started = true;
                        let _ = events.send(StreamEvent::TextDelta { text });
                    }
                }
                for delta in choice.delta.tool_calls.into_iter().flatten() {
                    if let Some(event) = state.tools.absorb(delta) {
                        let _ = events.send(event);
                    }
                }
                if choice.finish_reason.as_deref() == Some("tool_calls") {
                    for event in state.tools.complete() {
                        let _ = events.send(event);
                    }
                }
            }
            false
        }
        Err(_) => {
            if payload.trim().is_empty() {
                return false;
            }
            let _ = events.send(StreamEvent::StreamError {
                message: format_api_error(payload),
            });
            let _ = events.send(StreamEvent::Finish);
            true
        }
    }
}

pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatBackend {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatBackend {
    async fn stream_generation(
        &self,
        request: GenerationRequest,
        events: mpsc::UnboundedSender<StreamEvent>,
    ) {
        let chat_url = construct_api_url(&self.base_url, "chat/completions");
        let upstream_request = request.into_upstream_request();

        let response = self
            .client
            .post(chat_url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&upstream_request)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let _ = events.send(StreamEvent::StreamError {
                    message: format_api_error(&e.to_string()),
                });
                let _ = events.send(StreamEvent::Finish);
                return;
            }
        };

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            let _ = events.send(StreamEvent::StreamError {
                message: format_api_error(&error_text),
            });
            let _ = events.send(StreamEvent::Finish);
            return;
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut state = RelayState::default();

        while let Some(chunk) = stream.next().await {
            let Ok(chunk_bytes) = chunk else {
                let _ = events.send(StreamEvent::StreamError {
                    message: "upstream stream interrupted".to_string(),
                });
                let _ = events.send(StreamEvent::Finish);
                return;
            };
            buffer.extend_from_slice(&chunk_bytes);

            while let Some(newline_pos) = memchr(b'\n', &buffer) {
                let line = match std::str::from_utf8(&buffer[..newline_pos]) {
                    Ok(s) => s.trim().to_string(),
                    Err(e) => {
                        debug!("invalid UTF-8 in upstream stream: {e}");
                        buffer.drain(..=newline_pos);
                        continue;
                    }
                };
                buffer.drain(..=newline_pos);

                if let Some(payload) = extract_data_payload(&line) {
                    if relay_data_payload(payload, &mut state, &events) {
                        return;
                    }
                }
            }
        }

        // Upstream closed without [DONE]; terminate the relay cleanly.
        let _ = events.send(StreamEvent::Finish);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HistoryEntry;
    use crate::core::message::Role;

    fn drain(rx: &mut mpsc::UnboundedReceiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn content_deltas_become_text_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = RelayState::default();

        let ended = relay_data_payload(
            r#"{"choices":[{"delta":{"content":"Hello"}}]}"#,
            &mut state,
            &tx,
        );
        assert!(!ended);
        assert!(relay_data_payload("[DONE]", &mut state, &tx));

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta {
                    text: "Hello".into()
                },
                StreamEvent::Finish
            ]
        );
    }

    #[test]
    fn reasoning_gets_a_step_marker_before_the_answer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = RelayState::default();

        relay_data_payload(
            r#"{"choices":[{"delta":{"reasoning_content":"thinking..."}}]}"#,
            &mut state,
            &tx,
        );
        relay_data_payload(
            r#"{"choices":[{"delta":{"content":"ans"}}]}"#,
            &mut state,
            &tx,
        );
        relay_data_payload(
            r#"{"choices":[{"delta":{"content":"wer"}}]}"#,
            &mut state,
            &tx,
        );
        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                StreamEvent::ReasoningDelta {
                    text: "thinking...".into()
                },
                StreamEvent::StepStart,
                StreamEvent::TextDelta { text: "ans".into() },
                StreamEvent::TextDelta { text: "wer".into() },
            ]
        );
    }

    #[test]
    fn plain_answers_get_no_step_marker() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = RelayState::default();

        relay_data_payload(
            r#"{"choices":[{"delta":{"content":"answer"}}]}"#,
            &mut state,
            &tx,
        );
        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![StreamEvent::TextDelta {
                text: "answer".into()
            }]
        );
    }

    #[test]
    fn tool_calls_advance_from_partial_to_call() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = RelayState::default();

        relay_data_payload(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"search","arguments":"{\"q\":"}}]}}]}"#,
            &mut state,
            &tx,
        );
        relay_data_payload(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"rust\"}"}}]},"finish_reason":"tool_calls"}]}"#,
            &mut state,
            &tx,
        );

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        match &events[0] {
            StreamEvent::ToolInvocation { invocation } => {
                assert_eq!(invocation.state, ToolCallState::PartialCall);
                assert_eq!(invocation.tool_call_id, "c1");
            }
            other => panic!("expected partial call, got {other:?}"),
        }
        match &events[2] {
            StreamEvent::ToolInvocation { invocation } => {
                assert_eq!(invocation.state, ToolCallState::Call);
                assert_eq!(invocation.args, Some(serde_json::json!({"q": "rust"})));
            }
            other => panic!("expected completed call, got {other:?}"),
        }
    }

    #[test]
    fn error_payloads_end_the_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = RelayState::default();

        let ended = relay_data_payload(
            r#"{"error":{"message":"model overloaded"}}"#,
            &mut state,
            &tx,
        );
        assert!(ended);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                StreamEvent::StreamError {
                    message: "API error: model overloaded".into()
                },
                StreamEvent::Finish
            ]
        );
    }

    #[test]
    fn api_errors_prefer_the_embedded_summary() {
        assert_eq!(
            format_api_error(r#"{"error":{"message":"  rate   limited "}}"#),
            "API error: rate limited"
        );
        assert_eq!(
            format_api_error(r#"{"status":"failed"}"#),
            r#"API error: {"status":"failed"}"#
        );
        assert_eq!(format_api_error("plain failure"), "API error: plain failure");
        assert_eq!(format_api_error("  "), "API error: <empty>");
    }

    #[test]
    fn normalization_injects_the_system_prompt_first() {
        let body = ChatRequestBody {
            id: "1".into(),
            messages: vec![HistoryEntry {
                role: Role::User,
                content: Some("hi".into()),
                parts: None,
            }],
            model: "openai/gpt-4o".into(),
            system: Some("Be terse.".into()),
            temperature: 0.3,
            top_p: Some(0.9),
            top_k: None,
            max_output_tokens: Some(128),
        };

        let request = GenerationRequest::from_body(&body).into_upstream_request();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].content, "hi");
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(128));
        assert!(request.stream);
    }
}
