//! HTTP API server for integration with other systems.
//!
//! Exposes the pipeline over plain text bodies: post a script, get WAV back.
//! One pipeline (and its clip cache) serves every request.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{PlannedSegment, PodcastPipeline, PodcastResult, SegmentFailure};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

const SEGMENTS_HEADER: HeaderName = HeaderName::from_static("x-samtale-segments");
const DROPPED_HEADER: HeaderName = HeaderName::from_static("x-samtale-dropped");

/// Shared application state.
struct AppState {
    pipeline: PodcastPipeline,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Serve, &settings)?;
    let pipeline = PodcastPipeline::new(&settings)?;
    let backend = pipeline.backend_name().to_string();

    let app = router(pipeline);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Samtale API Server");
    println!();
    Output::success(&format!("Listening on http://{} ({} backend)", addr, backend));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Segments", "POST /segments  (script as text body)");
    Output::kv("Podcast", "POST /podcast   (script as text body, returns audio/wav)");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(pipeline: PodcastPipeline) -> Router {
    let state = Arc::new(AppState { pipeline });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([SEGMENTS_HEADER, DROPPED_HEADER]);

    Router::new()
        .route("/health", get(health))
        .route("/segments", post(segments))
        .route("/podcast", post(podcast))
        .layer(cors)
        .with_state(state)
}

// === Response Types ===

#[derive(Serialize)]
struct SegmentsResponse {
    count: usize,
    segments: Vec<PlannedSegment>,
}

/// Returned whenever there is no audio to send.
#[derive(Serialize)]
struct PodcastResponse {
    script: String,
    error: Option<String>,
    audio: Option<()>,
    stage: String,
    segments: usize,
    synthesized: usize,
    failures: Vec<SegmentFailure>,
}

impl From<PodcastResult> for PodcastResponse {
    fn from(result: PodcastResult) -> Self {
        Self {
            stage: result.stage.to_string(),
            script: result.script,
            error: result.error,
            audio: None,
            segments: result.segments,
            synthesized: result.synthesized,
            failures: result.failures,
        }
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn segments(State(state): State<Arc<AppState>>, script: String) -> impl IntoResponse {
    let segments = state.pipeline.plan(&script);
    Json(SegmentsResponse {
        count: segments.len(),
        segments,
    })
}

async fn podcast(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let result = state.pipeline.run_bytes(&body).await;
    debug!("Clip cache: {:?}", state.pipeline.cache_stats());

    if result.error.is_some() {
        // Nothing parsed means the body itself was unusable.
        let status = if result.segments == 0 {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        return (status, Json(PodcastResponse::from(result))).into_response();
    }

    let wav = match result.wav_bytes() {
        Ok(Some(wav)) => wav,
        Ok(None) => return Json(PodcastResponse::from(result)).into_response(),
        Err(e) => {
            error!("Failed to encode WAV: {}", e);
            let mut response = PodcastResponse::from(result);
            response.error = Some(e.to_string());
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response();
        }
    };

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/wav")),
            (SEGMENTS_HEADER, HeaderValue::from(result.synthesized)),
            (DROPPED_HEADER, HeaderValue::from(result.dropped().count())),
        ],
        wav,
    )
        .into_response()
}
