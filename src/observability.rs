//! Tracing setup and pipeline counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`)
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Counters for one registry's connection pipeline
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    connections_opened: AtomicU64,
    initializers_applied: AtomicU64,
    initializers_skipped: AtomicU64,
    initializers_incomplete: AtomicU64,
    initializers_failed: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "connections_opened", "Metric incremented");
    }

    pub fn initializer_applied(&self) {
        self.initializers_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn initializer_skipped(&self) {
        self.initializers_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn initializer_incomplete(&self) {
        self.initializers_incomplete.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "initializers_incomplete", "Metric incremented");
    }

    pub fn initializer_failed(&self) {
        self.initializers_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "initializers_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            initializers_applied: self.initializers_applied.load(Ordering::Relaxed),
            initializers_skipped: self.initializers_skipped.load(Ordering::Relaxed),
            initializers_incomplete: self.initializers_incomplete.load(Ordering::Relaxed),
            initializers_failed: self.initializers_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub connections_opened: u64,
    pub initializers_applied: u64,
    pub initializers_skipped: u64,
    pub initializers_incomplete: u64,
    pub initializers_failed: u64,
}
