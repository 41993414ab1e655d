//! Venue quoting: one provider per AMM family, dispatched by venue kind.
//!
//! Providers are read-only and side-effect free. "No quote" (None) is an
//! expected outcome for missing pools, reverts, timeouts, and unsupported
//! route shapes; the scanner simply skips the venue for that tick.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

mod concentrated;
mod constant_product;

pub use concentrated::ConcentratedQuoter;
pub use constant_product::ConstantProductQuoter;

use crate::config::Catalogue;
use crate::types::{DexKind, Quote, Route, Venue};
use async_trait::async_trait;
use ethers::providers::Middleware;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// A read-only source of swap quotes for one AMM family.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Net-of-fee output amount for swapping `amount_in` along `route` on
    /// `venue`, in human units of the route's final token. None means no
    /// quote is available.
    async fn quote(&self, venue: &Venue, route: &Route, amount_in: Decimal) -> Option<Decimal>;
}

/// Dispatches quoting to the provider matching the venue's kind.
pub struct QuoteEngine<M> {
    constant_product: ConstantProductQuoter<M>,
    concentrated: ConcentratedQuoter<M>,
}

impl<M: Middleware + 'static> QuoteEngine<M> {
    pub fn new(provider: Arc<M>, catalogue: Arc<Catalogue>, rpc_timeout: Duration) -> Self {
        Self {
            constant_product: ConstantProductQuoter::new(
                provider.clone(),
                catalogue.clone(),
                rpc_timeout,
            ),
            concentrated: ConcentratedQuoter::new(provider, catalogue, rpc_timeout),
        }
    }

    pub async fn quote(
        &self,
        venue: &Venue,
        route: &Route,
        amount_in: Decimal,
    ) -> Option<Quote> {
        let amount_out = match venue.kind {
            DexKind::ConstantProduct => {
                self.constant_product.quote(venue, route, amount_in).await?
            }
            DexKind::ConcentratedLiquidity => {
                self.concentrated.quote(venue, route, amount_in).await?
            }
        };
        Some(Quote {
            venue: venue.name.clone(),
            kind: venue.kind,
            route: route.clone(),
            amount_in,
            amount_out,
        })
    }
}
