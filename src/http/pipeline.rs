//! Request pipeline composition.
//!
//! # Responsibilities
//! - Name the cross-cutting layers wrapped around the router
//! - Apply them in an explicit order, first element outermost
//!
//! # Design Decisions
//! - Order is data (`Vec<PipelineLayer>`), not a chain of `.layer()` calls,
//!   so it can be inspected and tested
//! - The standard order puts trace propagation outside sessions and sessions
//!   outside the access log, so log lines carry both ids

use axum::{middleware, Router};

use crate::http::access_log;
use crate::observability::tracing::propagate_trace_context;
use crate::observability::TracePropagation;
use crate::session::{ensure_session, SessionAssigner};

/// One cross-cutting concern wrapped around dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineLayer {
    TracePropagation,
    SessionAssignment,
    AccessLog,
}

/// State the layers need.
#[derive(Clone)]
pub struct PipelineContext {
    pub trace: TracePropagation,
    pub sessions: SessionAssigner,
}

impl PipelineLayer {
    fn apply(self, router: Router, cx: &PipelineContext) -> Router {
        match self {
            PipelineLayer::TracePropagation => router.layer(middleware::from_fn_with_state(
                cx.trace.clone(),
                propagate_trace_context,
            )),
            PipelineLayer::SessionAssignment => router.layer(middleware::from_fn_with_state(
                cx.sessions.clone(),
                ensure_session,
            )),
            PipelineLayer::AccessLog => router.layer(access_log::layer()),
        }
    }
}

/// Ordered layers, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    layers: Vec<PipelineLayer>,
}

impl Pipeline {
    pub fn new(layers: Vec<PipelineLayer>) -> Self {
        Self { layers }
    }

    /// Trace propagation, then session assignment, then access log.
    pub fn standard() -> Self {
        Self::new(vec![
            PipelineLayer::TracePropagation,
            PipelineLayer::SessionAssignment,
            PipelineLayer::AccessLog,
        ])
    }

    pub fn layers(&self) -> &[PipelineLayer] {
        &self.layers
    }

    /// Wrap `router` so that `layers()[0]` sees the request first.
    pub fn compose(&self, router: Router, cx: &PipelineContext) -> Router {
        // Router::layer makes the last call outermost.
        self.layers
            .iter()
            .rev()
            .fold(router, |router, layer| layer.apply(router, cx))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}
