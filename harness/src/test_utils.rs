//! Test Utilities Module
//!
//! Provides fixtures for testing the harness: a ready-made orchestrator,
//! threshold builders and a local HTTP server standing in for a target API.
//! This module is only compiled when running tests.

#![cfg(test)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, http::StatusCode, routing::get};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::collector::MetricsCollector;
use crate::experiment::VariantAssigner;
use crate::orchestrator::{TestOrchestrator, Threshold, Thresholds};

// ============================================================================
// Orchestrator Fixtures
// ============================================================================

/// Orchestrator over a fresh collector and assigner
pub fn orchestrator() -> TestOrchestrator {
    TestOrchestrator::new(
        Arc::new(MetricsCollector::new()),
        Arc::new(VariantAssigner::new()),
    )
}

/// Build a threshold map from `(metric, threshold)` pairs
pub fn thresholds(pairs: &[(&str, Threshold)]) -> Thresholds {
    pairs
        .iter()
        .map(|(metric, threshold)| (metric.to_string(), *threshold))
        .collect()
}

// ============================================================================
// Test Server
// ============================================================================

/// An axum router served on an ephemeral local port
pub struct TestServer {
    pub addr: SocketAddr,
}

impl TestServer {
    pub async fn spawn(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Test server failed");
        });
        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Routes mimicking a small admin API
///
/// - `/health` returns plain `ok`
/// - `/assets` returns a JSON list, the second entry without an owner
/// - `/fail` always returns 503
/// - `/slow` answers after 200ms
pub fn fixture_router() -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/assets", get(assets_handler))
        .route(
            "/fail",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "unavailable") }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                "slow"
            }),
        )
}

async fn assets_handler() -> Json<Value> {
    Json(json!([
        { "id": 1, "name": "crane", "owner": "ops" },
        { "id": 2, "name": "forklift" }
    ]))
}
