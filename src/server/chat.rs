use std::convert::Infallible;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::events::StreamEvent;
use crate::server::backend::GenerationRequest;
use crate::server::schema::parse_chat_request;
use crate::server::AppState;

/// `POST /api/chat`: bot check, schema validation, then relay the
/// generation stream as SSE. The bot check runs first and the body is
/// validated in full before any upstream call.
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    if state.bots.is_bot(&headers).await {
        return (StatusCode::FORBIDDEN, "bot traffic rejected").into_response();
    }

    let body = match parse_chat_request(payload) {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "rejecting chat request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let request = GenerationRequest::from_body(&body);
    let (tx, rx) = mpsc::unbounded_channel();

    // The first event always carries the turn's creation timestamp.
    let created_at = Utc::now();
    let _ = tx.send(StreamEvent::Start {
        message_id: format!("{}-{}", body.id, created_at.timestamp_millis()),
        created_at,
    });

    let backend = state.backend.clone();
    tokio::spawn(async move {
        backend.stream_generation(request, tx).await;
    });

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
    .filter_map(|event| async move {
        Event::default()
            .json_data(&event)
            .ok()
            .map(Ok::<_, Infallible>)
    });

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::server::backend::GenerationBackend;
    use crate::server::bot::{BotDetector, NoBotDetector};
    use crate::server::{build_router, AppState};

    struct ScriptedBackend {
        events: Vec<StreamEvent>,
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn stream_generation(
            &self,
            _request: GenerationRequest,
            events: mpsc::UnboundedSender<StreamEvent>,
        ) {
            for event in &self.events {
                let _ = events.send(event.clone());
            }
        }
    }

    struct AlwaysBot;

    #[async_trait]
    impl BotDetector for AlwaysBot {
        async fn is_bot(&self, _headers: &HeaderMap) -> bool {
            true
        }
    }

    fn state_with(events: Vec<StreamEvent>, bots: Arc<dyn BotDetector>) -> AppState {
        AppState {
            backend: Arc::new(ScriptedBackend { events }),
            bots,
        }
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_model_yields_400_before_any_generation() {
        let app = build_router(state_with(Vec::new(), Arc::new(NoBotDetector)));
        let response = app
            .oneshot(chat_request(
                r#"{"id":"1","messages":[],"model":"","temperature":0.7}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn out_of_range_temperature_yields_400() {
        let app = build_router(state_with(Vec::new(), Arc::new(NoBotDetector)));
        let response = app
            .oneshot(chat_request(
                r#"{"id":"1","messages":[],"model":"openai/gpt-4o","temperature":1.5}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bot_verdict_yields_403_even_for_invalid_bodies() {
        let app = build_router(state_with(Vec::new(), Arc::new(AlwaysBot)));
        let response = app
            .oneshot(chat_request(r#"{"id":"1","messages":[],"model":""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn valid_requests_stream_start_first_and_finish_last() {
        let app = build_router(state_with(
            vec![
                StreamEvent::TextDelta {
                    text: "hello".into(),
                },
                StreamEvent::Finish,
            ],
            Arc::new(NoBotDetector),
        ));
        let response = app
            .oneshot(chat_request(
                r#"{"id":"req-9","messages":[{"role":"user","content":"hi"}],"model":"openai/gpt-4o"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();

        let start = text.find(r#""type":"start""#).expect("missing start event");
        let delta = text
            .find(r#""type":"text-delta""#)
            .expect("missing text delta");
        let finish = text.find(r#""type":"finish""#).expect("missing finish");
        assert!(start < delta && delta < finish);
        assert!(text.contains(r#""messageId":"req-9-"#));
        assert!(text.contains("createdAt"));
    }
}
