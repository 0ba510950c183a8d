//! Configuration loading from the process environment.

use thiserror::Error;

use crate::backends::ServiceKind;
use crate::config::schema::{GatewayConfig, LogFormat};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("environment variable {0:?} not set")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("environment variable {key:?} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub const DISABLE_TRACING: &str = "DISABLE_TRACING";
pub const DISABLE_PROFILER: &str = "DISABLE_PROFILER";
pub const COLLECTOR_SERVICE_ADDR: &str = "COLLECTOR_SERVICE_ADDR";
pub const CLOUD_TRACE_ENDPOINT: &str = "CLOUD_TRACE_ENDPOINT";
pub const PROFILER_COLLECTOR_ADDR: &str = "PROFILER_COLLECTOR_ADDR";
pub const PORT: &str = "PORT";
pub const LISTEN_ADDR: &str = "LISTEN_ADDR";
pub const STATIC_DIR: &str = "STATIC_DIR";
pub const LOG_FORMAT: &str = "LOG_FORMAT";

/// Load configuration from the process environment.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Log format to initialize logging with, before the full config is loaded.
///
/// Unparseable values fall back to the default here; [`load_from_env`]
/// reports them.
pub fn log_format_from_env() -> LogFormat {
    std::env::var(LOG_FORMAT)
        .ok()
        .and_then(|v| parse_log_format(&v))
        .unwrap_or_default()
}

fn parse_log_format(value: &str) -> Option<LogFormat> {
    match value.to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

/// Load configuration through an arbitrary variable lookup.
///
/// Empty values are treated as unset, matching how the deployment manifests
/// blank out optional variables.
pub fn load_from_lookup<F>(lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
    let mut config = GatewayConfig::default();

    for kind in ServiceKind::ALL {
        let addr = get(kind.env_key()).ok_or(ConfigError::Missing(kind.env_key()))?;
        config.backends.set(kind, addr);
    }

    config.telemetry.tracing_enabled = get(DISABLE_TRACING).is_none();
    config.telemetry.profiling_enabled = get(DISABLE_PROFILER).is_none();
    config.telemetry.collector_addr = get(COLLECTOR_SERVICE_ADDR);
    config.telemetry.cloud_trace_endpoint = get(CLOUD_TRACE_ENDPOINT);
    config.telemetry.profiler_endpoint = get(PROFILER_COLLECTOR_ADDR);

    if let Some(format) = get(LOG_FORMAT) {
        config.telemetry.log_format =
            parse_log_format(&format).ok_or_else(|| ConfigError::Invalid {
                key: LOG_FORMAT,
                value: format.clone(),
                reason: "expected `json` or `pretty`".to_string(),
            })?;
    }

    if let Some(port) = get(PORT) {
        config.listener.port = port.parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                key: PORT,
                value: port.clone(),
                reason: e.to_string(),
            }
        })?;
    }
    if let Some(addr) = get(LISTEN_ADDR) {
        config.listener.listen_addr = addr;
    }
    if let Some(dir) = get(STATIC_DIR) {
        config.assets.static_dir = dir;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required_env() -> HashMap<String, String> {
        ServiceKind::ALL
            .iter()
            .enumerate()
            .map(|(i, kind)| (kind.env_key().to_string(), format!("svc-{}:{}", i, 5000 + i)))
            .collect()
    }

    fn load(env: &HashMap<String, String>) -> Result<GatewayConfig, ConfigError> {
        load_from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_required_only() {
        let config = load(&required_env()).unwrap();
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.listener.bind_address(), "0.0.0.0:8080");
        assert!(config.telemetry.tracing_enabled);
        assert!(config.telemetry.profiling_enabled);
        assert!(config.telemetry.collector_addr.is_none());
        assert_eq!(config.backends.connect_timeout_secs, 3);
        let index = ServiceKind::ALL
            .iter()
            .position(|&k| k == ServiceKind::Currency)
            .unwrap();
        assert_eq!(
            config.backends.get(ServiceKind::Currency),
            format!("svc-{}:{}", index, 5000 + index)
        );
    }

    #[test]
    fn test_missing_backend_is_fatal() {
        for kind in ServiceKind::ALL {
            let mut env = required_env();
            env.remove(kind.env_key());
            match load(&env) {
                Err(ConfigError::Missing(key)) => assert_eq!(key, kind.env_key()),
                other => panic!("expected missing {}, got {:?}", kind.env_key(), other),
            }
        }
    }

    #[test]
    fn test_empty_backend_counts_as_missing() {
        let mut env = required_env();
        env.insert("CART_SERVICE_ADDR".into(), String::new());
        let err = load(&env).unwrap_err();
        assert_eq!(err.to_string(), "environment variable \"CART_SERVICE_ADDR\" not set");
    }

    #[test]
    fn test_optional_overrides() {
        let mut env = required_env();
        env.insert(DISABLE_TRACING.into(), "1".into());
        env.insert(DISABLE_PROFILER.into(), "true".into());
        env.insert(PORT.into(), "9090".into());
        env.insert(LISTEN_ADDR.into(), "127.0.0.1".into());
        env.insert(COLLECTOR_SERVICE_ADDR.into(), "collector:4318".into());
        env.insert(LOG_FORMAT.into(), "pretty".into());

        let config = load(&env).unwrap();
        assert!(!config.telemetry.tracing_enabled);
        assert!(!config.telemetry.profiling_enabled);
        assert_eq!(config.listener.bind_address(), "127.0.0.1:9090");
        assert_eq!(config.telemetry.collector_addr.as_deref(), Some("collector:4318"));
        assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_invalid_port() {
        let mut env = required_env();
        env.insert(PORT.into(), "eighty".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { key: "PORT", .. })));
    }
}
