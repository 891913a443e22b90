//! Timed HTTP client for API scenarios
//!
//! Every request is recorded as a `network` sample labelled `ok` or `error`,
//! and every call returns a `Result`. Callers that prefer to keep going with
//! an empty value use the `*_or_default` variants, which log the failure and
//! degrade instead of propagating it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::collector::{MetricsCollector, MetricsError, categories, labels};

/// Errors that can occur while probing an endpoint
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Successful response summary
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub latency: Duration,
    pub body_len: usize,
}

/// HTTP client that records request latency into a collector
///
/// Owned by the scenario that created it; the connection pool is released
/// when the probe is dropped.
pub struct HttpProbe {
    client: reqwest::Client,
    collector: Arc<MetricsCollector>,
    category: String,
}

impl HttpProbe {
    pub fn new(collector: Arc<MetricsCollector>, timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;
        Ok(Self {
            client,
            collector,
            category: categories::NETWORK.to_string(),
        })
    }

    /// Record into `category` instead of `network`
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Issue a GET, record its latency and check the status
    async fn send(&self, url: &str) -> Result<(reqwest::Response, Duration), ProbeError> {
        let start = Instant::now();
        let result = self.client.get(url).send().await;
        let latency = start.elapsed();

        let outcome = match result {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => Err(ProbeError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            }),
            Err(e) => Err(ProbeError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }),
        };

        let label = if outcome.is_ok() {
            labels::OK
        } else {
            labels::ERROR
        };
        self.collector
            .record_duration(&self.category, label, latency)
            .await?;
        debug!("GET {} -> {} in {:?}", url, label, latency);

        outcome.map(|response| (response, latency))
    }

    pub async fn get(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        let (response, latency) = self.send(url).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| ProbeError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(ProbeResponse {
            status,
            latency,
            body_len: body.len(),
        })
    }

    /// GET and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProbeError> {
        let (response, _) = self.send(url).await?;
        response.json::<T>().await.map_err(|e| ProbeError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// GET and decode, falling back to `T::default()` on any failure
    pub async fn get_json_or_default<T: DeserializeOwned + Default>(&self, url: &str) -> T {
        match self.get_json(url).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Using default value for {}: {}", url, e);
                T::default()
            }
        }
    }

    /// Fetch several endpoints concurrently; each result is settled independently
    pub async fn get_json_all<T: DeserializeOwned>(
        &self,
        urls: &[&str],
    ) -> Vec<Result<T, ProbeError>> {
        join_all(urls.iter().map(|url| self.get_json::<T>(url))).await
    }
}
