//! Counters for one translation run.
//!
//! A `RunMetrics` is created per run and shared between tasks through an
//! `Arc`; every counter is a relaxed atomic.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct RunMetrics {
    /// Calls made to the completion service
    api_calls: AtomicUsize,

    /// Calls that failed or returned unusable content
    api_failures: AtomicUsize,

    /// Target files written
    files_written: AtomicUsize,

    /// Messages written across all target files
    keys_translated: AtomicUsize,

    /// Stale target messages dropped because the base no longer has them
    stale_keys_pruned: AtomicUsize,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_failure(&self) {
        self.api_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a written target file with its message counts
    pub fn record_file_written(&self, keys: usize, pruned: usize) {
        self.files_written.fetch_add(1, Ordering::Relaxed);
        self.keys_translated.fetch_add(keys, Ordering::Relaxed);
        self.stale_keys_pruned.fetch_add(pruned, Ordering::Relaxed);
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::Relaxed)
    }

    pub fn api_failures(&self) -> usize {
        self.api_failures.load(Ordering::Relaxed)
    }

    pub fn files_written(&self) -> usize {
        self.files_written.load(Ordering::Relaxed)
    }

    /// Snapshot of the counters
    pub fn report(&self) -> MetricsReport {
        let calls = self.api_calls();
        let failures = self.api_failures();
        let api_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            api_calls: calls,
            api_failures: failures,
            api_success_rate,
            files_written: self.files_written(),
            keys_translated: self.keys_translated.load(Ordering::Relaxed),
            stale_keys_pruned: self.stale_keys_pruned.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub api_calls: usize,
    pub api_failures: usize,

    /// API success rate as a percentage (0-100)
    pub api_success_rate: f64,

    pub files_written: usize,
    pub keys_translated: usize,
    pub stale_keys_pruned: usize,
}
