//! Thin, always-on tracing span helpers (no OTLP exporter — that's a
//! transport concern, out of scope here). Grounded on
//! `dashflow-observability::Traceable`, trimmed to the one shape this crate
//! needs: instrumenting an async operation with a named span.

use async_trait::async_trait;
use std::future::Future;

/// Implemented by components that want a uniform way to wrap async work in
/// a span carrying their own name plus the operation being performed.
#[async_trait]
pub trait Traceable {
    async fn execute_traced<F, T>(&self, operation: &str, f: F) -> T
    where
        F: Future<Output = T> + Send,
        T: Send;
}

/// `info_span!("memento.<component>", operation)`, matching the granularity
/// coordinator phase transitions and conflict resolutions log at (spec §1
/// "Logging").
#[must_use]
pub fn span(component: &str, operation: &str) -> tracing::Span {
    tracing::info_span!("memento", component, operation)
}
