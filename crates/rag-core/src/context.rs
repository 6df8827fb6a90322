//! Per-request logging context.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::Span;

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

/// Request-scoped context passed explicitly through router, agent and fusion calls.
///
/// Carries a process-unique request id and the tracing span every log line of
/// the request is recorded under.
#[derive(Debug, Clone)]
pub struct QueryContext {
    request_id: String,
    span: Span,
}

impl QueryContext {
    /// Start a new request of the given kind ("router", "agent", "search").
    pub fn new(kind: &'static str) -> Self {
        let n = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
        let request_id = format!("{}-{:06}", kind, n);
        let span = tracing::info_span!("request", id = %request_id, kind);
        Self { request_id, span }
    }

    /// Wrap an existing span, e.g. one created by an embedding application.
    pub fn with_span(request_id: impl Into<String>, span: Span) -> Self {
        Self {
            request_id: request_id.into(),
            span,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
