//! Backend connection set.
//!
//! # Responsibilities
//! - Dial every required backend before the listener starts
//! - Abort on the first unreachable service
//! - Hand connections to page handlers

use std::time::Duration;

use crate::backends::service::{BackendError, BackendService, ServiceKind};
use crate::config::BackendAddrs;
use crate::observability::views::StatsViews;

/// One connection per [`ServiceKind`], created once at startup.
#[derive(Debug, Clone)]
pub struct Backends {
    currency: BackendService,
    product_catalog: BackendService,
    cart: BackendService,
    recommendation: BackendService,
    shipping: BackendService,
    checkout: BackendService,
    ad: BackendService,
}

impl Backends {
    /// Dial all backends in [`ServiceKind::ALL`] order. The first failure is
    /// returned as-is.
    pub async fn connect_all(addrs: &BackendAddrs, views: &StatsViews) -> Result<Self, BackendError> {
        let timeout = Duration::from_secs(addrs.connect_timeout_secs);
        let dial = move |kind: ServiceKind| {
            let addr = addrs.get(kind);
            tracing::debug!(service = %kind, addr = %addr, timeout = ?timeout, "Dialing backend");
            BackendService::connect(kind, addr, timeout, views.clone())
        };

        // Struct fields are evaluated in source order.
        let backends = Self {
            currency: dial(ServiceKind::Currency).await?,
            product_catalog: dial(ServiceKind::ProductCatalog).await?,
            cart: dial(ServiceKind::Cart).await?,
            recommendation: dial(ServiceKind::Recommendation).await?,
            shipping: dial(ServiceKind::Shipping).await?,
            checkout: dial(ServiceKind::Checkout).await?,
            ad: dial(ServiceKind::Ad).await?,
        };

        tracing::info!(count = ServiceKind::ALL.len(), "All backends connected");
        Ok(backends)
    }

    /// Build every backend without dialing.
    pub fn connect_lazy(addrs: &BackendAddrs, views: &StatsViews) -> Result<Self, BackendError> {
        let timeout = Duration::from_secs(addrs.connect_timeout_secs);
        let lazy = move |kind: ServiceKind| {
            BackendService::connect_lazy(kind, addrs.get(kind), timeout, views.clone())
        };

        Ok(Self {
            currency: lazy(ServiceKind::Currency)?,
            product_catalog: lazy(ServiceKind::ProductCatalog)?,
            cart: lazy(ServiceKind::Cart)?,
            recommendation: lazy(ServiceKind::Recommendation)?,
            shipping: lazy(ServiceKind::Shipping)?,
            checkout: lazy(ServiceKind::Checkout)?,
            ad: lazy(ServiceKind::Ad)?,
        })
    }

    /// Connection to the given service.
    pub fn get(&self, kind: ServiceKind) -> &BackendService {
        match kind {
            ServiceKind::Currency => &self.currency,
            ServiceKind::ProductCatalog => &self.product_catalog,
            ServiceKind::Cart => &self.cart,
            ServiceKind::Recommendation => &self.recommendation,
            ServiceKind::Shipping => &self.shipping,
            ServiceKind::Checkout => &self.checkout,
            ServiceKind::Ad => &self.ad,
        }
    }

    /// Every connection, in [`ServiceKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = &BackendService> {
        ServiceKind::ALL.into_iter().map(move |kind| self.get(kind))
    }
}
