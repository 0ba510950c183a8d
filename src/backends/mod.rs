//! Backend connection subsystem.
//!
//! # Data Flow
//! ```text
//! BackendAddrs (config)
//!     → pool.rs (dial every service, fail fast)
//!     → service.rs (one channel per ServiceKind)
//!     → instrument.rs (trace context + stats on every outbound RPC)
//!     → page handlers build RPC clients from the instrumented channels
//! ```
//!
//! # Design Decisions
//! - Backends are required dependencies: any dial failure aborts startup
//! - No retry here; optional telemetry is the only retried dependency
//! - Connections are created once and live until process exit

pub mod instrument;
pub mod pool;
pub mod service;

pub use instrument::RpcInstrumentation;
pub use pool::Backends;
pub use service::{BackendError, BackendService, ServiceKind};
