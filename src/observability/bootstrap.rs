//! Background bootstrap of optional exporters.
//!
//! # Responsibilities
//! - Decide once, at startup, whether tracing and profiling are enabled
//! - Run each registration on its own task so neither can delay the other,
//!   nor the listener
//! - Retry the managed exporter and the profiler with linear backoff, then
//!   give up for good
//!
//! # Design Decisions
//! - The local collector is registered once with no retry; the managed
//!   exporter gets three attempts. The asymmetry is intentional.
//! - Tasks are never restarted; their handles can be aborted by the embedder
//! - Sleeping and registrars are injectable for deterministic tests

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::TelemetryConfig;
use crate::observability::exporters::{
    register_collector, service_resource, ManagedTraceExporter, Registrar, TraceSinks,
};
use crate::observability::profiling::ProfilerAgent;
use crate::observability::state::{ExporterState, ExporterStatus};
use crate::observability::views::StatsViews;
use crate::resilience::{retry_bounded, RetryOutcome, RetryPolicy, Sleeper, TokioSleeper};

/// Managed trace exporter: 3 attempts, 20s, 40s, 60s.
pub const TRACING_RETRY: RetryPolicy = RetryPolicy::linear(3, Duration::from_secs(20));
/// Profiler: 3 attempts, 10s, 20s, 30s.
pub const PROFILING_RETRY: RetryPolicy = RetryPolicy::linear(3, Duration::from_secs(10));

/// Launches the optional exporters in the background.
pub struct ObservabilityBootstrap {
    tracing_enabled: bool,
    profiling_enabled: bool,
    collector_addr: Option<String>,
    sinks: Arc<TraceSinks>,
    trace_registrar: Arc<dyn Registrar>,
    profiler: Arc<dyn Registrar>,
    sleeper: Arc<dyn Sleeper>,
    trace_status: ExporterStatus,
    profiler_status: ExporterStatus,
}

/// Handles to the spawned registration tasks.
pub struct BootstrapHandle {
    pub tracing: Option<JoinHandle<ExporterState>>,
    pub profiling: Option<JoinHandle<ExporterState>>,
    pub trace_status: ExporterStatus,
    pub profiler_status: ExporterStatus,
}

impl BootstrapHandle {
    /// Cancel any registration still in progress.
    pub fn abort(&self) {
        self.tracing.iter().chain(self.profiling.iter()).for_each(|h| h.abort());
    }
}

impl ObservabilityBootstrap {
    pub fn new(config: &TelemetryConfig, views: StatsViews) -> Self {
        let resource = service_resource(&config.service_name, &config.service_version);
        let sinks = Arc::new(TraceSinks::new(resource.clone()));
        let trace_registrar = Arc::new(ManagedTraceExporter::new(
            config.cloud_trace_endpoint.clone(),
            Arc::clone(&sinks),
            resource,
            views,
        ));
        let profiler = Arc::new(ProfilerAgent::new(
            config.profiler_endpoint.clone(),
            config.service_name.clone(),
            config.service_version.clone(),
        ));

        Self {
            tracing_enabled: config.tracing_enabled,
            profiling_enabled: config.profiling_enabled,
            collector_addr: config.collector_addr.clone(),
            sinks,
            trace_registrar,
            profiler,
            sleeper: Arc::new(TokioSleeper),
            trace_status: ExporterStatus::new(),
            profiler_status: ExporterStatus::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_trace_registrar(mut self, registrar: Arc<dyn Registrar>) -> Self {
        self.trace_registrar = registrar;
        self
    }

    pub fn with_profiler(mut self, profiler: Arc<dyn Registrar>) -> Self {
        self.profiler = profiler;
        self
    }

    /// State of the managed trace exporter registration.
    pub fn trace_status(&self) -> ExporterStatus {
        self.trace_status.clone()
    }

    /// State of the profiler registration.
    pub fn profiler_status(&self) -> ExporterStatus {
        self.profiler_status.clone()
    }

    /// Spawn the enabled registrations and return immediately.
    pub fn launch(self) -> BootstrapHandle {
        let trace_status = self.trace_status.clone();
        let profiler_status = self.profiler_status.clone();

        let tracing = if self.tracing_enabled {
            tracing::info!("Tracing enabled.");
            let sinks = self.sinks;
            let collector_addr = self.collector_addr;
            let registrar = self.trace_registrar;
            let sleeper = Arc::clone(&self.sleeper);
            let status = self.trace_status;
            Some(tokio::spawn(async move {
                register_collector(&sinks, collector_addr.as_deref()).await;
                register_with_retry(registrar.as_ref(), TRACING_RETRY, sleeper.as_ref(), &status).await
            }))
        } else {
            tracing::info!("Tracing disabled.");
            None
        };

        let profiling = if self.profiling_enabled {
            tracing::info!("Profiling enabled.");
            let profiler = self.profiler;
            let sleeper = self.sleeper;
            let status = self.profiler_status;
            Some(tokio::spawn(async move {
                register_with_retry(profiler.as_ref(), PROFILING_RETRY, sleeper.as_ref(), &status).await
            }))
        } else {
            tracing::info!("Profiling disabled.");
            None
        };

        BootstrapHandle {
            tracing,
            profiling,
            trace_status,
            profiler_status,
        }
    }
}

async fn register_with_retry(
    registrar: &dyn Registrar,
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    status: &ExporterStatus,
) -> ExporterState {
    let name = registrar.name();
    let outcome = retry_bounded(name, policy, sleeper, |_| registrar.register()).await;

    let state = match outcome {
        RetryOutcome::Succeeded { attempt } => {
            tracing::info!(retry = attempt, "registered {}", name);
            ExporterState::Registered
        }
        RetryOutcome::Exhausted { attempts } => {
            tracing::warn!(
                attempts = attempts,
                "could not initialize {} after retrying, giving up",
                name
            );
            ExporterState::GaveUp
        }
    };
    status.finish(state);
    state
}
