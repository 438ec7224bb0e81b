use std::fmt;

use chrono::Utc;
use tracing::debug;

use crate::api::events::StreamEvent;
use crate::core::message::Message;

/// Submission lifecycle of one panel.
///
/// `Submitted` covers the window between dispatch and the first stream
/// event; the typing indicator is derived from it, so the indicator clears
/// exactly at the transition into `Streaming` or back to `Idle`, whichever
/// is observed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    Idle,
    Submitted,
    Streaming,
}

impl PanelStatus {
    pub fn is_idle(self) -> bool {
        self == PanelStatus::Idle
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitError {
    EmptyInput,
    Busy,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::EmptyInput => write!(f, "nothing to send"),
            SubmitError::Busy => write!(f, "a response is still in flight"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Everything the dispatcher needs to open a stream for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionTicket {
    pub stream_id: u64,
    pub history: Vec<Message>,
}

/// One conversation thread bound to a single model.
///
/// The session owns its transcript exclusively; stream events are folded in
/// one at a time by the event loop, so event processing is atomic with
/// respect to the transcript.
pub struct PanelSession {
    pub model_id: String,
    transcript: Vec<Message>,
    status: PanelStatus,
    current_stream_id: u64,
    awaiting_turn_start: bool,
}

impl PanelSession {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            transcript: Vec::new(),
            status: PanelStatus::Idle,
            current_stream_id: 0,
            awaiting_turn_start: false,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn status(&self) -> PanelStatus {
        self.status
    }

    pub fn response_count(&self) -> usize {
        self.transcript.iter().filter(|m| m.is_assistant()).count()
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        self.current_stream_id == stream_id
    }

    /// Start a submission: append the user turn and hand back the ticket the
    /// dispatcher needs. Rejected while a previous turn is in flight or when
    /// the trimmed input is empty.
    pub fn begin_submission(&mut self, input: &str) -> Result<SubmissionTicket, SubmitError> {
        if !self.status.is_idle() {
            return Err(SubmitError::Busy);
        }
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SubmitError::EmptyInput);
        }

        self.transcript.push(Message::user_text(trimmed));
        self.status = PanelStatus::Submitted;
        self.awaiting_turn_start = true;
        self.current_stream_id += 1;

        Ok(SubmissionTicket {
            stream_id: self.current_stream_id,
            history: self.transcript.clone(),
        })
    }

    /// Fold one stream event into the transcript. Events tagged with a
    /// superseded stream id belong to an abandoned stream and are dropped.
    pub fn apply_event(&mut self, stream_id: u64, event: StreamEvent) {
        if !self.is_current_stream(stream_id) {
            debug!(
                panel = %self.model_id,
                stream_id, "dropping event for superseded stream"
            );
            return;
        }

        match event {
            StreamEvent::Start { created_at, .. } => {
                // Exactly one new assistant message per turn; a repeated
                // start marker must not open a second one.
                if self.awaiting_turn_start {
                    self.transcript.push(Message::assistant_at(created_at));
                    self.awaiting_turn_start = false;
                }
                self.status = PanelStatus::Streaming;
            }
            StreamEvent::TextDelta { text } => {
                self.ensure_turn_started();
                if let Some(msg) = self.trailing_assistant_mut() {
                    msg.push_text_delta(&text);
                }
            }
            StreamEvent::ReasoningDelta { text } => {
                self.ensure_turn_started();
                if let Some(msg) = self.trailing_assistant_mut() {
                    msg.push_reasoning_delta(&text);
                }
            }
            StreamEvent::ToolInvocation { invocation } => {
                self.ensure_turn_started();
                if let Some(msg) = self.trailing_assistant_mut() {
                    if let Err(e) = msg.apply_tool_invocation(invocation) {
                        debug!(panel = %self.model_id, error = %e, "ignoring tool state regression");
                    }
                }
            }
            StreamEvent::Source { id, url, title } => {
                self.ensure_turn_started();
                if let Some(msg) = self.trailing_assistant_mut() {
                    msg.parts
                        .push(crate::core::message::MessagePart::Source { id, url, title });
                }
            }
            StreamEvent::File {
                media_type,
                filename,
                url,
            } => {
                self.ensure_turn_started();
                if let Some(msg) = self.trailing_assistant_mut() {
                    msg.parts.push(crate::core::message::MessagePart::File {
                        media_type,
                        filename,
                        url,
                    });
                }
            }
            StreamEvent::StepStart => {
                self.ensure_turn_started();
                if let Some(msg) = self.trailing_assistant_mut() {
                    msg.parts.push(crate::core::message::MessagePart::StepStart);
                }
            }
            StreamEvent::StreamError { message } => {
                self.fail_turn(&message);
            }
            StreamEvent::Finish => {
                self.status = PanelStatus::Idle;
                self.awaiting_turn_start = false;
            }
        }
    }

    /// A stream that skips the start marker still opens exactly one
    /// assistant message on its first delta.
    fn ensure_turn_started(&mut self) {
        if self.awaiting_turn_start {
            self.transcript.push(Message::assistant_at(Utc::now()));
            self.awaiting_turn_start = false;
        }
        self.status = PanelStatus::Streaming;
    }

    /// Leave no turn dangling in streaming state: the turn is marked failed
    /// rather than silently truncated, even when no content arrived yet.
    fn fail_turn(&mut self, reason: &str) {
        if self.awaiting_turn_start {
            self.transcript.push(Message::assistant_at(Utc::now()));
            self.awaiting_turn_start = false;
        }
        if let Some(msg) = self.trailing_assistant_mut() {
            msg.mark_failed(reason);
        }
        self.status = PanelStatus::Idle;
    }

    fn trailing_assistant_mut(&mut self) -> Option<&mut Message> {
        self.transcript.last_mut().filter(|m| m.is_assistant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::events::StreamEvent;

    fn start_event() -> StreamEvent {
        StreamEvent::Start {
            message_id: "m1".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn submit_appends_one_user_and_one_assistant_message() {
        let mut panel = PanelSession::new("openai/gpt-4o");
        let ticket = panel.begin_submission("  hello there  ").unwrap();
        assert_eq!(panel.transcript().len(), 1);
        assert_eq!(panel.transcript()[0].plain_text(), "hello there");
        assert_eq!(panel.status(), PanelStatus::Submitted);

        panel.apply_event(ticket.stream_id, start_event());
        assert_eq!(panel.status(), PanelStatus::Streaming);
        panel.apply_event(
            ticket.stream_id,
            StreamEvent::TextDelta { text: "hi".into() },
        );
        panel.apply_event(ticket.stream_id, StreamEvent::Finish);

        assert_eq!(panel.status(), PanelStatus::Idle);
        assert_eq!(panel.transcript().len(), 2);
        assert_eq!(panel.response_count(), 1);
        assert_eq!(panel.transcript()[1].plain_text(), "hi");
    }

    #[test]
    fn whitespace_submission_is_rejected_without_side_effects() {
        let mut panel = PanelSession::new("openai/gpt-4o");
        assert_eq!(
            panel.begin_submission("   \n\t "),
            Err(SubmitError::EmptyInput)
        );
        assert!(panel.transcript().is_empty());
        assert_eq!(panel.status(), PanelStatus::Idle);
    }

    #[test]
    fn submission_is_rejected_while_in_flight() {
        let mut panel = PanelSession::new("openai/gpt-4o");
        panel.begin_submission("first").unwrap();
        assert_eq!(panel.begin_submission("second"), Err(SubmitError::Busy));
        assert_eq!(panel.transcript().len(), 1);
    }

    #[test]
    fn repeated_start_markers_open_exactly_one_assistant_message() {
        let mut panel = PanelSession::new("openai/gpt-4o");
        let ticket = panel.begin_submission("q").unwrap();
        panel.apply_event(ticket.stream_id, start_event());
        panel.apply_event(ticket.stream_id, start_event());
        panel.apply_event(
            ticket.stream_id,
            StreamEvent::TextDelta { text: "a".into() },
        );
        assert_eq!(panel.transcript().len(), 2);
    }

    #[test]
    fn delta_without_start_marker_still_opens_one_turn() {
        let mut panel = PanelSession::new("openai/gpt-4o");
        let ticket = panel.begin_submission("q").unwrap();
        panel.apply_event(
            ticket.stream_id,
            StreamEvent::TextDelta { text: "a".into() },
        );
        panel.apply_event(
            ticket.stream_id,
            StreamEvent::TextDelta { text: "b".into() },
        );
        assert_eq!(panel.transcript().len(), 2);
        assert_eq!(panel.transcript()[1].plain_text(), "ab");
        assert_eq!(panel.status(), PanelStatus::Streaming);
    }

    #[test]
    fn stale_stream_events_are_dropped() {
        let mut panel = PanelSession::new("openai/gpt-4o");
        let ticket = panel.begin_submission("q").unwrap();
        panel.apply_event(
            ticket.stream_id + 7,
            StreamEvent::TextDelta {
                text: "ghost".into(),
            },
        );
        assert_eq!(panel.transcript().len(), 1);
        assert_eq!(panel.status(), PanelStatus::Submitted);
    }

    #[test]
    fn error_before_any_content_still_marks_the_turn() {
        let mut panel = PanelSession::new("openai/gpt-4o");
        let ticket = panel.begin_submission("q").unwrap();
        panel.apply_event(
            ticket.stream_id,
            StreamEvent::StreamError {
                message: "connection reset".into(),
            },
        );
        assert_eq!(panel.status(), PanelStatus::Idle);
        assert_eq!(panel.transcript().len(), 2);
        assert!(panel.transcript()[1].parts.is_empty());
        assert_eq!(panel.transcript()[1].failure(), Some("connection reset"));
    }

    #[test]
    fn error_after_content_marks_the_turn_failed() {
        let mut panel = PanelSession::new("openai/gpt-4o");
        let ticket = panel.begin_submission("q").unwrap();
        panel.apply_event(ticket.stream_id, start_event());
        panel.apply_event(
            ticket.stream_id,
            StreamEvent::TextDelta {
                text: "partial answ".into(),
            },
        );
        panel.apply_event(
            ticket.stream_id,
            StreamEvent::StreamError {
                message: "upstream closed".into(),
            },
        );
        assert_eq!(panel.status(), PanelStatus::Idle);
        assert_eq!(panel.transcript().len(), 2);
        assert_eq!(panel.transcript()[1].failure(), Some("upstream closed"));
    }
}
