//! A single backend service connection.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint};

use crate::backends::instrument::RpcInstrumentation;
use crate::observability::views::StatsViews;

/// The fixed set of RPC services the gateway depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Currency,
    ProductCatalog,
    Cart,
    Recommendation,
    Shipping,
    Checkout,
    Ad,
}

impl ServiceKind {
    /// Every backend, in dial order.
    pub const ALL: [ServiceKind; 7] = [
        ServiceKind::Currency,
        ServiceKind::ProductCatalog,
        ServiceKind::Cart,
        ServiceKind::Recommendation,
        ServiceKind::Shipping,
        ServiceKind::Checkout,
        ServiceKind::Ad,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Currency => "currency",
            ServiceKind::ProductCatalog => "productcatalog",
            ServiceKind::Cart => "cart",
            ServiceKind::Recommendation => "recommendation",
            ServiceKind::Shipping => "shipping",
            ServiceKind::Checkout => "checkout",
            ServiceKind::Ad => "ad",
        }
    }

    /// Environment variable holding this service's address.
    pub fn env_key(self) -> &'static str {
        match self {
            ServiceKind::Currency => "CURRENCY_SERVICE_ADDR",
            ServiceKind::ProductCatalog => "PRODUCT_CATALOG_SERVICE_ADDR",
            ServiceKind::Cart => "CART_SERVICE_ADDR",
            ServiceKind::Recommendation => "RECOMMENDATION_SERVICE_ADDR",
            ServiceKind::Shipping => "SHIPPING_SERVICE_ADDR",
            ServiceKind::Checkout => "CHECKOUT_SERVICE_ADDR",
            ServiceKind::Ad => "AD_SERVICE_ADDR",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for backend connection setup.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid address {addr:?} for {service}: {source}")]
    InvalidAddress {
        service: ServiceKind,
        addr: String,
        source: tonic::transport::Error,
    },

    #[error("grpc: failed to connect {service} at {addr}: {source}")]
    Dial {
        service: ServiceKind,
        addr: String,
        source: tonic::transport::Error,
    },

    #[error("grpc: timed out after {timeout:?} connecting {service} at {addr}")]
    Timeout {
        service: ServiceKind,
        addr: String,
        timeout: Duration,
    },
}

impl BackendError {
    /// The service that could not be reached.
    pub fn service(&self) -> ServiceKind {
        match self {
            BackendError::InvalidAddress { service, .. }
            | BackendError::Dial { service, .. }
            | BackendError::Timeout { service, .. } => *service,
        }
    }
}

/// An established connection to one backend service.
#[derive(Debug, Clone)]
pub struct BackendService {
    kind: ServiceKind,
    addr: String,
    channel: Channel,
    instrumentation: RpcInstrumentation,
}

impl BackendService {
    /// Dial the service, waiting at most `timeout` for the connection.
    pub async fn connect(
        kind: ServiceKind,
        addr: &str,
        timeout: Duration,
        views: StatsViews,
    ) -> Result<Self, BackendError> {
        let endpoint = endpoint(kind, addr)?.connect_timeout(timeout);

        let channel = match tokio::time::timeout(timeout, endpoint.connect()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(source)) => {
                return Err(BackendError::Dial {
                    service: kind,
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(BackendError::Timeout {
                    service: kind,
                    addr: addr.to_string(),
                    timeout,
                })
            }
        };

        tracing::info!(service = %kind, addr = %addr, "Backend connected");
        Ok(Self::from_channel(kind, addr, channel, views))
    }

    /// Build the service without dialing; the connection is made on first use.
    pub fn connect_lazy(
        kind: ServiceKind,
        addr: &str,
        timeout: Duration,
        views: StatsViews,
    ) -> Result<Self, BackendError> {
        let channel = endpoint(kind, addr)?.connect_timeout(timeout).connect_lazy();
        Ok(Self::from_channel(kind, addr, channel, views))
    }

    fn from_channel(kind: ServiceKind, addr: &str, channel: Channel, views: StatsViews) -> Self {
        Self {
            kind,
            addr: addr.to_string(),
            channel,
            instrumentation: RpcInstrumentation::new(kind, views),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The channel wrapped with trace propagation and RPC stats.
    ///
    /// Generated clients are built on top of this, e.g.
    /// `CartServiceClient::new(backend.channel())`.
    pub fn channel(&self) -> InterceptedService<Channel, RpcInstrumentation> {
        InterceptedService::new(self.channel.clone(), self.instrumentation.clone())
    }

    /// The bare channel, for callers that install their own interceptors.
    pub fn raw_channel(&self) -> Channel {
        self.channel.clone()
    }
}

fn endpoint(kind: ServiceKind, addr: &str) -> Result<Endpoint, BackendError> {
    let uri = if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    };
    Endpoint::from_shared(uri).map_err(|source| BackendError::InvalidAddress {
        service: kind,
        addr: addr.to_string(),
        source,
    })
}
