//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits so a resolved config can be logged or dumped.

use serde::{Deserialize, Serialize};

use crate::backends::ServiceKind;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (port, address).
    pub listener: ListenerConfig,

    /// Addresses of the required backend services.
    pub backends: BackendAddrs,

    /// Tracing and profiling exporters.
    pub telemetry: TelemetryConfig,

    /// Session cookie settings.
    pub session: SessionConfig,

    /// Static asset serving.
    pub assets: AssetConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host part of the bind address. Empty means all interfaces.
    pub listen_addr: String,

    /// TCP port.
    pub port: u16,
}

impl ListenerConfig {
    /// The `host:port` string handed to the TCP listener.
    pub fn bind_address(&self) -> String {
        let host = if self.listen_addr.is_empty() {
            "0.0.0.0"
        } else {
            self.listen_addr.as_str()
        };
        format!("{}:{}", host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            listen_addr: String::new(),
            port: 8080,
        }
    }
}

/// Backend service addresses (`host:port`), one per [`ServiceKind`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendAddrs {
    pub product_catalog: String,
    pub currency: String,
    pub cart: String,
    pub recommendation: String,
    pub checkout: String,
    pub shipping: String,
    pub ad: String,

    /// Dial timeout applied to every backend connection, in seconds.
    pub connect_timeout_secs: u64,
}

impl BackendAddrs {
    /// Address configured for the given service.
    pub fn get(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::ProductCatalog => &self.product_catalog,
            ServiceKind::Currency => &self.currency,
            ServiceKind::Cart => &self.cart,
            ServiceKind::Recommendation => &self.recommendation,
            ServiceKind::Checkout => &self.checkout,
            ServiceKind::Shipping => &self.shipping,
            ServiceKind::Ad => &self.ad,
        }
    }

    pub(crate) fn set(&mut self, kind: ServiceKind, addr: String) {
        let slot = match kind {
            ServiceKind::ProductCatalog => &mut self.product_catalog,
            ServiceKind::Currency => &mut self.currency,
            ServiceKind::Cart => &mut self.cart,
            ServiceKind::Recommendation => &mut self.recommendation,
            ServiceKind::Checkout => &mut self.checkout,
            ServiceKind::Shipping => &mut self.shipping,
            ServiceKind::Ad => &mut self.ad,
        };
        *slot = addr;
    }
}

impl Default for BackendAddrs {
    fn default() -> Self {
        Self {
            product_catalog: String::new(),
            currency: String::new(),
            cart: String::new(),
            recommendation: String::new(),
            checkout: String::new(),
            shipping: String::new(),
            ad: String::new(),
            connect_timeout_secs: 3,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Register trace exporters in the background.
    pub tracing_enabled: bool,

    /// Start the profiling agent in the background.
    pub profiling_enabled: bool,

    /// Local OTLP collector (`host:port`). Registered once, never retried.
    pub collector_addr: Option<String>,

    /// Managed OTLP/HTTP endpoint. Registration is retried.
    pub cloud_trace_endpoint: Option<String>,

    /// Profiling collector base URL. Registration is retried.
    pub profiler_endpoint: Option<String>,

    /// Service name reported to exporters and the profiler.
    pub service_name: String,

    /// Service version reported to exporters and the profiler.
    pub service_version: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            tracing_enabled: true,
            profiling_enabled: true,
            collector_addr: None,
            cloud_trace_endpoint: None,
            profiler_endpoint: None,
            service_name: "frontend".to_string(),
            service_version: "1.0.0".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Prefix shared by every cookie the gateway sets.
    pub cookie_prefix: String,

    /// Cookie lifetime in seconds.
    pub max_age_secs: u64,
}

impl SessionConfig {
    pub fn session_cookie(&self) -> String {
        format!("{}session-id", self.cookie_prefix)
    }

    pub fn currency_cookie(&self) -> String {
        format!("{}currency", self.cookie_prefix)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_prefix: "shop_".to_string(),
            max_age_secs: 60 * 60 * 48,
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Local directory served under `/static`.
    pub static_dir: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            static_dir: "./static".to_string(),
        }
    }
}
