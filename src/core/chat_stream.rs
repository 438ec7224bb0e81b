use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::events::{extract_data_payload, StreamEvent};
use crate::api::ChatRequestBody;
use crate::utils::url::construct_api_url;

/// One stream event routed back to the panel that requested it.
#[derive(Clone, Debug)]
pub struct PanelStreamUpdate {
    pub panel_id: String,
    pub stream_id: u64,
    pub event: StreamEvent,
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub endpoint_base: String,
    pub panel_id: String,
    pub stream_id: u64,
    pub body: ChatRequestBody,
}

fn format_endpoint_error(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "request failed with an empty response body".to_string();
    }
    format!("request failed: {trimmed}")
}

/// Opens relay-endpoint streams on behalf of panels and multiplexes their
/// events onto one channel the chat loop drains.
///
/// Every spawned stream is tied to a child of the service's shutdown token,
/// so tearing the application down stops all in-flight requests at once. A
/// panel removed mid-stream is simply abandoned: its task keeps draining but
/// the workspace discards events for panels it no longer owns.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<PanelStreamUpdate>,
    shutdown: CancellationToken,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PanelStreamUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                shutdown: CancellationToken::new(),
            },
            rx,
        )
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            let StreamParams {
                client,
                endpoint_base,
                panel_id,
                stream_id,
                body,
            } = params;

            let send = |event: StreamEvent| {
                let _ = tx.send(PanelStreamUpdate {
                    panel_id: panel_id.clone(),
                    stream_id,
                    event,
                });
            };

            tokio::select! {
                _ = async {
                    let chat_url = construct_api_url(&endpoint_base, "api/chat");
                    match client.post(chat_url).json(&body).send().await {
                        Ok(response) => {
                            if !response.status().is_success() {
                                let error_text = response
                                    .text()
                                    .await
                                    .unwrap_or_else(|_| "<no body>".to_string());
                                send(StreamEvent::StreamError {
                                    message: format_endpoint_error(&error_text),
                                });
                                send(StreamEvent::Finish);
                                return;
                            }

                            let mut stream = response.bytes_stream();
                            let mut buffer: Vec<u8> = Vec::new();

                            while let Some(chunk) = stream.next().await {
                                let Ok(chunk_bytes) = chunk else {
                                    send(StreamEvent::StreamError {
                                        message: "stream interrupted".to_string(),
                                    });
                                    send(StreamEvent::Finish);
                                    return;
                                };
                                buffer.extend_from_slice(&chunk_bytes);

                                while let Some(newline_pos) = memchr(b'\n', &buffer) {
                                    let line = match std::str::from_utf8(&buffer[..newline_pos]) {
                                        Ok(s) => s.trim().to_string(),
                                        Err(e) => {
                                            debug!("invalid UTF-8 in stream: {e}");
                                            buffer.drain(..=newline_pos);
                                            continue;
                                        }
                                    };
                                    buffer.drain(..=newline_pos);

                                    let Some(payload) = extract_data_payload(&line) else {
                                        continue;
                                    };
                                    match serde_json::from_str::<StreamEvent>(payload) {
                                        Ok(event) => {
                                            let finished = matches!(event, StreamEvent::Finish);
                                            send(event);
                                            if finished {
                                                return;
                                            }
                                        }
                                        Err(e) => {
                                            debug!("unparsable stream event: {e}: {payload}");
                                        }
                                    }
                                }
                            }

                            // The transport closed without a finish marker;
                            // panels must still leave streaming state.
                            send(StreamEvent::Finish);
                        }
                        Err(e) => {
                            send(StreamEvent::StreamError {
                                message: format_endpoint_error(&e.to_string()),
                            });
                            send(StreamEvent::Finish);
                        }
                    }
                } => {}
                _ = cancel.cancelled() => {}
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, update: PanelStreamUpdate) {
        let _ = self.tx.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_keep_their_panel_and_stream_tags() {
        let (service, mut rx) = ChatStreamService::new();
        service.send_for_test(PanelStreamUpdate {
            panel_id: "openai/gpt-4o".into(),
            stream_id: 3,
            event: StreamEvent::TextDelta { text: "hi".into() },
        });

        let update = rx.try_recv().expect("expected one update");
        assert_eq!(update.panel_id, "openai/gpt-4o");
        assert_eq!(update.stream_id, 3);
        assert!(matches!(update.event, StreamEvent::TextDelta { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn endpoint_errors_read_like_sentences() {
        assert_eq!(
            format_endpoint_error("  503 service unavailable  "),
            "request failed: 503 service unavailable"
        );
        assert_eq!(
            format_endpoint_error("  "),
            "request failed with an empty response body"
        );
    }
}
