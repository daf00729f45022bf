//! Stress tests for TransiDB.
//!
//! These harnesses run many sessions on concurrent threads against one
//! store.

use crate::fixtures::create_project;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;
use transidb_core::TransientEntityStore;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total sessions run.
    pub total_ops: usize,
    /// Sessions that committed.
    pub successful_ops: usize,
    /// Sessions that failed.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Sessions per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Sessions committed by each thread.
    pub sessions_per_thread: usize,
    /// Entities created by each session.
    pub entities_per_session: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            sessions_per_thread: 50,
            entities_per_session: 3,
        }
    }
}

/// Commits sessions that create projects from many threads at once.
pub fn stress_concurrent_sessions(
    store: &TransientEntityStore,
    config: &StressConfig,
) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let (successful, failed) = (&successful, &failed);
            scope.spawn(move || {
                for s in 0..config.sessions_per_thread {
                    let result = store.transactional(false, |session| {
                        for e in 0..config.entities_per_session {
                            create_project(session, &format!("p-{t}-{s}-{e}"))?;
                        }
                        Ok(())
                    });
                    match result {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(err) => {
                            warn!(thread = t, session = s, error = %err, "stress session failed");
                            failed.fetch_add(1, Ordering::Relaxed)
                        }
                    };
                }
            });
        }
    });

    StressTestResult::new(
        successful.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    )
}

/// Enters the store's flush lock from many threads and measures the
/// highest number of threads inside it at once.
pub fn stress_flush_gate(store: &TransientEntityStore, config: &StressConfig) -> usize {
    let inside = AtomicUsize::new(0);
    let max_inside = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..config.threads {
            let (inside, max_inside) = (&inside, &max_inside);
            scope.spawn(move || {
                for _ in 0..config.sessions_per_thread {
                    let _gate = store.flush_lock().lock();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });

    max_inside.into_inner()
}
