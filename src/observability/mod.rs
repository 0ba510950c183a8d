//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     → logging.rs (structured log events, installed first)
//!     → bootstrap.rs (background exporter registration)
//!         → exporters.rs (collector once, managed exporter with retry)
//!         → profiling.rs (profiler agent with retry)
//!         → state.rs (terminal registration state)
//!
//! Per request:
//!     → tracing.rs (extract context, server span)
//!     → metrics.rs (route instruments, Prometheus scrape)
//!     → views.rs (HTTP server and RPC client stats, once registered)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Optional exporters never delay or block serving
//! - Metrics are cheap (atomic increments)

pub mod bootstrap;
pub mod exporters;
pub mod logging;
pub mod metrics;
pub mod profiling;
pub mod state;
pub mod tracing;
pub mod views;

pub use bootstrap::{BootstrapHandle, ObservabilityBootstrap};
pub use exporters::{Registrar, TelemetryError};
pub use metrics::{CurriedRoute, MetricsRegistry};
pub use state::{ExporterState, ExporterStatus};
pub use tracing::{TraceContext, TracePropagation};
pub use views::StatsViews;
