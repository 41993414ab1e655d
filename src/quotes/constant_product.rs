//! Constant-product (V2 style) quoting through the venue router.
//!
//! `getAmountsOut` handles multi-hop paths in one call and already embeds
//! the venue's trading fee in the returned amounts.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use super::QuoteProvider;
use crate::config::Catalogue;
use crate::contracts::IUniswapV2Router02;
use crate::types::{from_raw_units, to_raw_units, Route, Venue};
use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct ConstantProductQuoter<M> {
    provider: Arc<M>,
    catalogue: Arc<Catalogue>,
    rpc_timeout: Duration,
}

impl<M: Middleware + 'static> ConstantProductQuoter<M> {
    pub fn new(provider: Arc<M>, catalogue: Arc<Catalogue>, rpc_timeout: Duration) -> Self {
        Self {
            provider,
            catalogue,
            rpc_timeout,
        }
    }

    fn route_addresses(&self, route: &Route) -> Option<Vec<Address>> {
        route
            .tokens()
            .iter()
            .map(|s| self.catalogue.token(s).map(|t| t.address))
            .collect()
    }
}

#[async_trait]
impl<M: Middleware + 'static> QuoteProvider for ConstantProductQuoter<M> {
    async fn quote(&self, venue: &Venue, route: &Route, amount_in: Decimal) -> Option<Decimal> {
        if amount_in <= Decimal::ZERO {
            return None;
        }
        let path = self.route_addresses(route)?;
        let first = self.catalogue.token(&route.tokens()[0])?;
        let last = self.catalogue.token(route.tokens().last()?)?;
        let raw_in = to_raw_units(amount_in, first.decimals)?;

        let router = IUniswapV2Router02::new(venue.router, self.provider.clone());
        let call = router.get_amounts_out(raw_in, path);
        let amounts: Vec<U256> = match tokio::time::timeout(self.rpc_timeout, call.call()).await {
            Ok(Ok(amounts)) => amounts,
            Ok(Err(e)) => {
                // reverts here usually mean a missing pool or zero liquidity
                debug!("{} getAmountsOut failed for {}: {}", venue.name, route, e);
                return None;
            }
            Err(_) => {
                debug!("{} getAmountsOut timed out for {}", venue.name, route);
                return None;
            }
        };

        let raw_out = *amounts.last()?;
        if raw_out.is_zero() {
            return None;
        }
        from_raw_units(raw_out, last.decimals)
    }
}
