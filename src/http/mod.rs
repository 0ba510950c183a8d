//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, graceful shutdown)
//!     → pipeline.rs (ordered cross-cutting layers)
//!         → trace propagation
//!         → session assignment
//!         → access_log.rs
//!     → router
//!         → per-route instruments (page routes only)
//!         → pages.rs (Storefront) or session handlers
//!     → Send to client
//! ```

pub mod access_log;
pub mod pages;
pub mod pipeline;
pub mod server;

pub use pages::{Page, PageContext, PlaceholderStorefront, Storefront};
pub use pipeline::{Pipeline, PipelineContext, PipelineLayer};
pub use server::{AppState, HttpServer};
