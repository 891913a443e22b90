use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::LoadProfile;

/// Counters from one load run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadSummary {
    pub completed: u64,
    pub failed: u64,
    pub elapsed: Duration,
}

impl LoadSummary {
    /// Iterations per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.completed + self.failed) as f64 / secs
        } else {
            0.0
        }
    }

    /// Failed iterations as a fraction (0.0 to 1.0)
    pub fn error_rate(&self) -> f64 {
        let total = self.completed + self.failed;
        if total > 0 {
            self.failed as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Spawn `profile.virtual_users` concurrent users, each running `body`
/// `profile.requests_per_user` times
///
/// `body` receives `(user_index, iteration)`. A failing iteration is counted
/// and the user moves on; it never stops the run.
pub async fn run_virtual_users<F, Fut>(profile: &LoadProfile, body: F) -> LoadSummary
where
    F: Fn(usize, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let start = Instant::now();
    let body = Arc::new(body);

    // Atomic counters for quick stats
    let completed = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));

    info!(
        "Starting {} virtual users x {} iterations",
        profile.virtual_users, profile.requests_per_user
    );

    let mut join_handles = Vec::with_capacity(profile.virtual_users);
    for user in 0..profile.virtual_users {
        let body = body.clone();
        let completed = completed.clone();
        let failed = failed.clone();
        let iterations = profile.requests_per_user;
        let think_time = profile.think_time;

        join_handles.push(tokio::spawn(async move {
            for iteration in 0..iterations {
                match body(user, iteration).await {
                    Ok(()) => {
                        completed.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        debug!("User {} iteration {} failed: {:#}", user, iteration, e);
                        failed.fetch_add(1, Ordering::SeqCst);
                    }
                }
                if think_time > Duration::ZERO && iteration + 1 < iterations {
                    tokio::time::sleep(think_time).await;
                }
            }
        }));
    }

    // Wait for all users to complete
    for handle in join_handles {
        if let Err(e) = handle.await {
            warn!("Virtual user task ended abnormally: {}", e);
        }
    }

    let summary = LoadSummary {
        completed: completed.load(Ordering::SeqCst),
        failed: failed.load(Ordering::SeqCst),
        elapsed: start.elapsed(),
    };
    info!(
        "Load finished: {} ok, {} failed, {:.0} ops/s",
        summary.completed,
        summary.failed,
        summary.throughput()
    );
    summary
}
