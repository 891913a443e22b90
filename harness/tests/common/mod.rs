//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

#![allow(dead_code)]

use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
use scenario_harness::{MetricsCollector, TestOrchestrator, VariantAssigner};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub price_cents: u64,
}

async fn product(Path(id): Path<u32>) -> Result<Json<Product>, StatusCode> {
    if id == 0 || id > 100 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(Product {
        id,
        name: format!("Product {id}"),
        price_cents: 999 + id as u64,
    }))
}

/// Create a router standing in for the target API
///
/// Every third hit on `/flaky` fails with 500.
pub fn create_test_app() -> Router {
    let hits = Arc::new(AtomicU64::new(0));
    Router::new()
        .route("/health", get(health))
        .route("/products/:id", get(product))
        .route(
            "/flaky",
            get(move || {
                let hits = hits.clone();
                async move {
                    if hits.fetch_add(1, Ordering::SeqCst) % 3 == 2 {
                        StatusCode::INTERNAL_SERVER_ERROR
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        )
}

/// Serve `router` on an ephemeral local port and return its address
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Orchestrator over a fresh collector and assigner
pub fn create_orchestrator() -> TestOrchestrator {
    TestOrchestrator::new(
        Arc::new(MetricsCollector::new()),
        Arc::new(VariantAssigner::new()),
    )
}
