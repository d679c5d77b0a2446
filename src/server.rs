//! HTTP surface for the static site.
//!
//! - `GET /api/daily-data`: best available document, annotated with its origin
//! - `POST /api/daily-data`: fire-and-forget forced sync
//! - `GET /api/health`: freshness verdict from the status record

use crate::error::PipelineError;
use crate::freshness::HealthReport;
use crate::models::DailyDocument;
use crate::pipeline::Pipeline;
use crate::utils::today_local;
use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

#[derive(Debug, Serialize)]
struct DailyDataBody<'a> {
    #[serde(flatten)]
    document: &'a DailyDocument,
    #[serde(rename = "_source")]
    source: &'static str,
    #[serde(rename = "_isFresh")]
    is_fresh: bool,
    #[serde(rename = "_timestamp")]
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct TriggerBody {
    message: &'static str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn rfc3339(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/daily-data", get(daily_data).post(trigger_sync))
        .route("/api/health", get(health))
        .layer(build_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn daily_data(State(state): State<AppState>) -> Response {
    let now = Utc::now();
    match state.pipeline.serve_document(today_local(), now).await {
        Ok(resolved) => Json(DailyDataBody {
            document: &resolved.document,
            source: resolved.tier.origin(),
            is_fresh: resolved.is_fresh,
            timestamp: rfc3339(now),
        })
        .into_response(),
        Err(e @ PipelineError::ExhaustedFallback) => {
            error!(error = %e, "No document available at any tier");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Failed to fetch data".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Unexpected error while resolving document");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn trigger_sync(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(r) = state.pipeline.retry().cancel().await {
        info!(date = %r.date, attempt = r.attempt, "Manual trigger supersedes pending retry");
    }
    if state.pipeline.is_syncing() {
        info!("Sync in flight; the triggered run will follow it");
    }
    let pipeline = Arc::clone(&state.pipeline);
    tokio::spawn(async move {
        let outcome = pipeline.sync(true).await;
        if outcome.is_success() {
            info!(?outcome, "Triggered sync finished");
        } else {
            warn!(?outcome, "Triggered sync failed");
        }
    });

    Json(TriggerBody {
        message: "Data sync triggered",
        timestamp: rfc3339(Utc::now()),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.pipeline.health(today_local(), Utc::now()).await)
}

/// Serve the API on `bind` with the freshness watcher running alongside,
/// until Ctrl-C or SIGTERM.
pub async fn serve(pipeline: Arc<Pipeline>, bind: SocketAddr) -> Result<(), PipelineError> {
    let watcher = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.watch().await })
    };

    let app = build_app(AppState { pipeline });
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watcher.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Received shutdown signal, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app_in(dir: &std::path::Path) -> (Router, Arc<Pipeline>) {
        let mut config = PipelineConfig::builtin()
            .unwrap()
            .with_output_dir(dir.join("out"));
        config.snapshot_file = dir.join("snapshot.json");
        config.retry.interval_minutes = 0;
        let pipeline = Arc::new(Pipeline::new(config, Vec::new()));
        let app = build_app(AppState {
            pipeline: Arc::clone(&pipeline),
        });
        (app, pipeline)
    }

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_daily_data_falls_back_to_static() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app_in(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/daily-data")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_of(response).await;
        assert_eq!(json["_source"], "static");
        assert_eq!(json["_isFresh"], false);
        assert!(json["_timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(json["news"].as_array().is_some_and(|n| !n.is_empty()));
        assert!(json["hotToys"].is_array());
    }

    #[tokio::test]
    async fn test_daily_data_serves_todays_json() {
        let dir = tempfile::tempdir().unwrap();
        let (app, pipeline) = app_in(dir.path());
        let today = today_local();
        pipeline.generate_for(today, today).await.unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/daily-data")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = json_of(response).await;
        assert_eq!(json["_source"], "json");
        assert_eq!(json["_isFresh"], true);
        assert_eq!(json["date"], today.to_string());
    }

    #[tokio::test]
    async fn test_health_without_status() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app_in(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_of(response).await;
        assert_eq!(json["isFresh"], false);
        assert_eq!(json["needsUpdate"], true);
        assert_eq!(json["lastUpdated"], "unknown");
        assert_eq!(json["message"], "sync status not found");
        assert!(json.get("hoursSinceSync").is_none());
    }

    #[tokio::test]
    async fn test_post_triggers_and_cancels_pending_retry() {
        let dir = tempfile::tempdir().unwrap();
        let (app, pipeline) = app_in(dir.path());
        pipeline
            .retry()
            .schedule(today_local(), 1, "upstream down", Utc::now())
            .await;

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/daily-data")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_of(response).await;
        assert_eq!(json["message"], "Data sync triggered");
        assert!(json["timestamp"].is_string());
        assert_eq!(pipeline.retry().pending().await, None);
    }
}
