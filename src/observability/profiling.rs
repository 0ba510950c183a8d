//! Continuous profiling agent.
//!
//! The agent announces this process to a profiling collector, tagged with the
//! service name and version, so the collector can start pulling profiles.
//! Registration is retried by the bootstrap and never blocks serving.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::observability::exporters::{signal_url, Registrar, TelemetryError};

const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct AgentRegistration<'a> {
    service: &'a str,
    service_version: &'a str,
    pid: u32,
}

/// Registers the process with a profiling collector.
pub struct ProfilerAgent {
    endpoint: Option<String>,
    service: String,
    version: String,
    client: reqwest::Client,
}

impl ProfilerAgent {
    pub fn new(endpoint: Option<String>, service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            endpoint,
            service: service.into(),
            version: version.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Registrar for ProfilerAgent {
    fn name(&self) -> &'static str {
        "profiler"
    }

    async fn register(&self) -> Result<(), TelemetryError> {
        let base = self
            .endpoint
            .as_deref()
            .ok_or(TelemetryError::NotConfigured("profiler"))?;
        let url = signal_url(base, "v1/agents")?;

        let response = self
            .client
            .post(url)
            .timeout(REGISTRATION_TIMEOUT)
            .json(&AgentRegistration {
                service: &self.service,
                service_version: &self.version,
                pid: std::process::id(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Rejected(status.as_u16()));
        }

        tracing::info!(service = %self.service, version = %self.version, "started profiler");
        Ok(())
    }
}
