//! Bot-traffic screening for the chat endpoint.
//!
//! The check runs before validation's side effects: a positive verdict
//! short-circuits with 403 and no generation request is ever constructed.

use async_trait::async_trait;
use axum::http::HeaderMap;

#[async_trait]
pub trait BotDetector: Send + Sync {
    async fn is_bot(&self, headers: &HeaderMap) -> bool;
}

/// Pass-through detector for deployments without bot screening.
pub struct NoBotDetector;

#[async_trait]
impl BotDetector for NoBotDetector {
    async fn is_bot(&self, _headers: &HeaderMap) -> bool {
        false
    }
}

const CRAWLER_MARKERS: &[&str] = &["bot", "crawler", "spider", "scraper", "headless"];

/// Heuristic detector matching well-known crawler markers in the
/// User-Agent header.
pub struct UserAgentBotDetector;

#[async_trait]
impl BotDetector for UserAgentBotDetector {
    async fn is_bot(&self, headers: &HeaderMap) -> bool {
        let Some(agent) = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        let agent = agent.to_ascii_lowercase();
        CRAWLER_MARKERS.iter().any(|marker| agent.contains(marker))
    }
}
