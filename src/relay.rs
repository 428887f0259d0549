//! The relay: `GET /tts?q=&tl=` forwarded to the upstream speech endpoint,
//! with the audio streamed back and cross-origin reads allowed.

use crate::config_loader::Settings;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::TryStreamExt;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const AUDIO_MPEG: &str = "audio/mpeg";
pub const MISSING_TEXT: &str = "Missing query parameter \"q\"";
pub const PROXY_ERROR: &str = "Proxy error";

#[derive(Debug, Deserialize)]
pub struct TtsQuery {
    pub q: Option<String>,
    pub tl: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Shared by every request; read-only after construction.
#[derive(Clone)]
pub struct RelayState {
    client: Client,
    upstream_url: Arc<str>,
}

impl RelayState {
    pub fn new(
        upstream_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            upstream_url: Arc::from(upstream_url),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        Self::new(
            &settings.upstream_url,
            &settings.user_agent,
            Duration::from_secs(settings.upstream_timeout_secs),
        )
    }
}

/// Upstream request URL with every parameter percent-encoded.
pub fn upstream_url(base: &str, text: &str, language: &str) -> Result<Url, String> {
    Url::parse_with_params(
        base,
        &[
            ("ie", "UTF-8"),
            ("client", "tw-ob"),
            ("tl", language),
            ("q", text),
        ],
    )
    .map_err(|e| e.to_string())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn tts(State(state): State<RelayState>, Query(query): Query<TtsQuery>) -> Response {
    let text = query.q.unwrap_or_default();
    if text.is_empty() {
        return (StatusCode::BAD_REQUEST, MISSING_TEXT).into_response();
    }
    let language = query
        .tl
        .filter(|tl| !tl.is_empty())
        .unwrap_or_else(|| "en".to_string());

    let url = match upstream_url(&state.upstream_url, &text, &language) {
        Ok(url) => url,
        Err(e) => {
            error!("Proxy error: bad upstream URL '{}': {}", state.upstream_url, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, PROXY_ERROR).into_response();
        }
    };

    info!("Relaying {} chars (tl={})", text.chars().count(), language);
    let resp = match state.client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            error!("Proxy error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, PROXY_ERROR).into_response();
        }
    };

    let status = resp.status();
    if !status.is_success() {
        warn!("Upstream TTS failed: {}", status.as_u16());
        return (
            StatusCode::BAD_GATEWAY,
            format!("Upstream TTS failed: {}", status.as_u16()),
        )
            .into_response();
    }

    let stream = resp
        .bytes_stream()
        .inspect_err(|e| error!("Upstream stream aborted: {}", e));
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, AUDIO_MPEG)],
        Body::from_stream(stream),
    )
        .into_response()
}

pub fn router(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tts", get(tts))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_url_encodes_everything() {
        let url = upstream_url(
            "https://translate.google.com/translate_tts",
            "¿qué tal? a&b=c",
            "es",
        )
        .unwrap();
        assert_eq!(url.path(), "/translate_tts");
        let query = url.query().unwrap();
        assert!(query.starts_with("ie=UTF-8&client=tw-ob&tl=es&q="));
        assert!(!query.contains("a&b"));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[3], ("q".to_string(), "¿qué tal? a&b=c".to_string()));
    }

    #[test]
    fn test_upstream_url_rejects_bad_base() {
        assert!(upstream_url("::nope::", "hi", "en").is_err());
    }
}
