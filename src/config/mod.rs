//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → loader.rs (lookup, parse, required checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared by value/Arc with the subsystems that need it
//! ```
//!
//! # Design Decisions
//! - Required backend addresses are fatal when missing; everything else has a default
//! - The loader takes a lookup function so tests never mutate process env
//! - Config is read once at startup; there is no reload

pub mod loader;
pub mod schema;

pub use loader::{load_from_env, load_from_lookup, log_format_from_env, ConfigError};
pub use schema::{
    AssetConfig, BackendAddrs, GatewayConfig, ListenerConfig, LogFormat, SessionConfig,
    TelemetryConfig,
};
