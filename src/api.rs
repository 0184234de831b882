//! HTTP API and web page for the converter.
//!
//! Routes:
//! - `GET /` single-page UI
//! - `GET /api/status`, `GET /api/languages`, `GET /api/history?limit=N`
//! - `POST /api/convert`

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::history::ConversionRecord;
use crate::languages::{self, Language};
use crate::service::{ConversionRequest, ConversionService};

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ConversionService>,
    pub display_count: usize,
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct StatusResponse {
    version: &'static str,
    translation_enabled: bool,
    default_language: String,
    history_backend: String,
    history_records: usize,
}

#[derive(Serialize)]
struct HistoryEntry {
    #[serde(flatten)]
    record: ConversionRecord,
    language_name: String,
}

#[derive(Serialize)]
struct HistoryResponse {
    records: Vec<HistoryEntry>,
}

#[derive(Serialize)]
struct ConvertResponse {
    status: &'static str,
    audio_base64: String,
    mime_type: &'static str,
    filename: String,
    download_href: String,
    text_spoken: String,
    language: String,
    translated: bool,
    word_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/api/status", get(handle_status))
        .route("/api/languages", get(handle_languages))
        .route("/api/history", get(handle_history))
        .route("/api/convert", post(handle_convert))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: ApiState, host: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Text-to-speech converter listening on http://{addr}");

    axum::serve(listener, router(state)).await
}

// --- Handlers ---

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        translation_enabled: state.service.translation_enabled(),
        default_language: state.service.default_language().to_string(),
        history_backend: state.service.history_backend(),
        history_records: state.service.history_len(),
    })
}

async fn handle_languages() -> Json<&'static [Language]> {
    Json(languages::all())
}

async fn handle_history(
    State(state): State<ApiState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(state.display_count);
    let records = state
        .service
        .recent(limit)
        .into_iter()
        .map(|record| HistoryEntry {
            language_name: record.language_name().to_string(),
            record,
        })
        .collect();
    Ok(Json(HistoryResponse { records }))
}

async fn handle_convert(
    State(state): State<ApiState>,
    payload: Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, AppError> {
    let Json(req) = payload?;
    let preview: String = req.text.chars().take(60).collect();
    info!(
        "HTTP /api/convert [{}]: \"{}{}\"",
        req.language.as_deref().unwrap_or("default"),
        preview.replace('\n', " "),
        if req.text.chars().count() > 60 { "..." } else { "" },
    );

    let conversion = state.service.convert(req).await?;
    for warning in &conversion.warnings {
        warn!("{warning}");
    }

    Ok(Json(ConvertResponse {
        status: "ok",
        audio_base64: conversion.audio_base64(),
        mime_type: "audio/mpeg",
        download_href: conversion.download_href(),
        filename: conversion.filename,
        text_spoken: conversion.text_spoken,
        language: conversion.language,
        translated: conversion.translated,
        word_count: conversion.word_count,
        warnings: conversion.warnings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ConversionLedger;
    use crate::service::tests::{service_with, FakeSynthesizer, FakeTranslator};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let service = service_with(
            Arc::new(FakeSynthesizer::default()),
            None,
            ConversionLedger::in_memory(),
        );
        router(ApiState {
            service: Arc::new(service),
            display_count: 5,
        })
    }

    fn convert_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/convert")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn serves_index_page() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8_lossy(&bytes);
        assert!(page.contains("Text-to-Speech"));
        assert!(page.contains("How to Use"));
    }

    #[tokio::test]
    async fn lists_languages() {
        let response = app()
            .oneshot(Request::builder().uri("/api/languages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body[0], json!({"code": "en", "name": "English"}));
        assert_eq!(body.as_array().unwrap().len(), languages::all().len());
    }

    #[tokio::test]
    async fn convert_then_history() {
        let app = app();

        let response = app
            .clone()
            .oneshot(convert_request(json!({"text": "hi", "language": "en"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["audio_base64"], "SUQzZmFrZQ==");
        assert!(body["download_href"]
            .as_str()
            .unwrap()
            .starts_with("data:audio/mp3;base64,"));
        assert!(body.get("warnings").is_none());

        app.clone()
            .oneshot(convert_request(json!({"text": "bye", "language": "es", "translate": false})))
            .await
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/api/history?limit=10").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        let records = body["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["text"], "bye");
        assert_eq!(records[0]["language_name"], "Spanish");
        assert_eq!(records[1]["text"], "hi");
    }

    #[tokio::test]
    async fn empty_text_is_bad_request() {
        let response = app()
            .oneshot(convert_request(json!({"text": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Please enter some text to convert to speech.");
    }

    #[tokio::test]
    async fn missing_text_field_is_json_bad_request() {
        let response = app()
            .oneshot(convert_request(json!({"language": "en"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().contains("text"));
    }

    #[tokio::test]
    async fn malformed_body_is_json_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/convert")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn bad_history_limit_is_json_bad_request() {
        let response = app()
            .oneshot(Request::builder().uri("/api/history?limit=abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn translation_failure_is_reported_as_warning() {
        let service = service_with(
            Arc::new(FakeSynthesizer::default()),
            Some(FakeTranslator { fail: true }),
            ConversionLedger::in_memory(),
        );
        let app = router(ApiState {
            service: Arc::new(service),
            display_count: 5,
        });

        let response = app
            .oneshot(convert_request(json!({"text": "hello", "language": "de"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["text_spoken"], "hello");
        assert_eq!(body["translated"], false);
        let warnings = body["warnings"].as_array().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].as_str().unwrap().starts_with("Translation error"));
    }

    #[tokio::test]
    async fn status_reports_history() {
        let response = app()
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["history_backend"], "session");
        assert_eq!(body["history_records"], 0);
        assert_eq!(body["translation_enabled"], false);
    }
}
