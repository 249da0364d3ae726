//! Structured query-event observer.
//!
//! The engine emits start/end/log events around the interesting phases of an
//! evaluation (operator runs, grouping, scope downloads). Embedders that
//! want a profiler or a debug viewer implement [`QueryObserver`]; the
//! default forwards everything to `tracing` at debug level. There is no
//! global observer: the handle lives on the `QueryState`.

use std::sync::Arc;

/// Receiver for structured engine events. All methods default to no-ops so
/// implementors pick what they care about.
pub trait QueryObserver: Send + Sync {
    fn start_part(&self, key: &str, label: &str) {
        let _ = (key, label);
    }

    fn end_part(&self, label: &str) {
        let _ = label;
    }

    fn log(&self, key: &str, message: &str) {
        let _ = (key, message);
    }
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl QueryObserver for TracingObserver {
    fn start_part(&self, key: &str, label: &str) {
        tracing::debug!(key, label, "part start");
    }

    fn end_part(&self, label: &str) {
        tracing::debug!(label, "part end");
    }

    fn log(&self, key: &str, message: &str) {
        tracing::debug!(key, message, "part log");
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl QueryObserver for NoopObserver {}

/// The default observer handle.
pub fn default_observer() -> Arc<dyn QueryObserver> {
    Arc::new(TracingObserver)
}
