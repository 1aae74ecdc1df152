//! HTTP run-test service.
//!
//! Exposes the test executor contract over HTTP so remote loops can share
//! one sandbox host.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use scrapi_core::executor::{TestExecutor, TestReport, TestRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Build the router.
pub fn router(executor: Arc<dyn TestExecutor>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/run-test", post(run_test))
        .layer(cors)
        .with_state(executor)
}

/// Serve on 127.0.0.1:`port` until the process exits.
pub async fn start(port: u16, executor: Arc<dyn TestExecutor>) -> anyhow::Result<()> {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    serve(listener, executor).await
}

/// Serve on an already-bound listener.
pub async fn serve(listener: TcpListener, executor: Arc<dyn TestExecutor>) -> anyhow::Result<()> {
    info!("run-test API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(executor)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn run_test(
    State(executor): State<Arc<dyn TestExecutor>>,
    Json(request): Json<TestRequest>,
) -> Json<TestReport> {
    let report = executor.run(&request).await;
    info!(passed = report.passed, returned_empty = report.returned_empty, "run-test");
    Json(report)
}
