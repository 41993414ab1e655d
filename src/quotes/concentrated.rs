//! Concentrated-liquidity quoting through a CrocSwap-style query contract.
//!
//! `queryPrice` returns the pool's current sqrt price in Q64.64 fixed
//! point for the (base, quote) pair with base < quote by address. The
//! price is a raw-unit ratio, so its decimal-unit meaning depends on the
//! two tokens' decimals. When the tokens have equal decimals the raw and
//! human ratios coincide and the quote is safe; for unequal decimals the
//! unit convention for this deployment is unverified, so no quote is
//! produced rather than a possibly wrong number.
//!
//! Spot price only: these quotes carry no depth information and are
//! treated as low confidence by the rest of the system.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use super::QuoteProvider;
use crate::config::Catalogue;
use crate::contracts::ICrocQuery;
use crate::types::{Route, Venue};
use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::types::U256;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct ConcentratedQuoter<M> {
    provider: Arc<M>,
    catalogue: Arc<Catalogue>,
    rpc_timeout: Duration,
}

impl<M: Middleware + 'static> ConcentratedQuoter<M> {
    pub fn new(provider: Arc<M>, catalogue: Arc<Catalogue>, rpc_timeout: Duration) -> Self {
        Self {
            provider,
            catalogue,
            rpc_timeout,
        }
    }
}

/// Q64.64 sqrt price to a Decimal price (quote per base, raw units).
/// None when squaring overflows the Decimal range.
pub(crate) fn q64_sqrt_to_price(sqrt_q64: u128) -> Option<Decimal> {
    let two_pow_64 = Decimal::from_i128_with_scale(1i128 << 64, 0);
    let hi = (sqrt_q64 >> 64) as u64;
    let lo = sqrt_q64 as u64;
    let sqrt =
        Decimal::from(hi).checked_add(Decimal::from(lo).checked_div(two_pow_64)?)?;
    sqrt.checked_mul(sqrt)
}

#[async_trait]
impl<M: Middleware + 'static> QuoteProvider for ConcentratedQuoter<M> {
    async fn quote(&self, venue: &Venue, route: &Route, amount_in: Decimal) -> Option<Decimal> {
        if amount_in <= Decimal::ZERO || !route.is_direct() {
            return None;
        }
        let params = match self.catalogue.concentrated_params(&venue.name) {
            Some(p) => p,
            None => {
                // venue has no verified query contract, never guess
                debug!("{} has no query contract configured, skipping", venue.name);
                return None;
            }
        };
        let token_in = self.catalogue.token(&route.tokens()[0])?;
        let token_out = self.catalogue.token(&route.tokens()[1])?;
        if token_in.decimals != token_out.decimals {
            debug!(
                "{} unit convention unresolved for {}/{} (decimals {} vs {}), no quote",
                venue.name, token_in.symbol, token_out.symbol, token_in.decimals, token_out.decimals
            );
            return None;
        }

        let (base, quote_token) = if token_in.address < token_out.address {
            (token_in, token_out)
        } else {
            (token_out, token_in)
        };

        let query = ICrocQuery::new(params.query_contract, self.provider.clone());
        let call = query.query_price(base.address, quote_token.address, U256::from(params.pool_idx));
        let sqrt_q64: u128 = match tokio::time::timeout(self.rpc_timeout, call.call()).await {
            Ok(Ok(p)) => p,
            Ok(Err(e)) => {
                debug!("{} queryPrice failed for {}: {}", venue.name, route, e);
                return None;
            }
            Err(_) => {
                debug!("{} queryPrice timed out for {}", venue.name, route);
                return None;
            }
        };
        if sqrt_q64 == 0 {
            return None;
        }

        // price is quote-per-base; invert when swapping quote -> base
        let price = q64_sqrt_to_price(sqrt_q64)?;
        let unit_out = if token_in.address == base.address {
            price
        } else {
            Decimal::ONE.checked_div(price)?
        };

        amount_in
            .checked_mul(unit_out)?
            .checked_mul(Decimal::ONE - venue.fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_q64_unity_price() {
        // sqrt price of exactly 1.0 in Q64.64
        let one = 1u128 << 64;
        assert_eq!(q64_sqrt_to_price(one).unwrap(), dec!(1));
    }

    #[test]
    fn test_q64_known_price() {
        // sqrt = 2.0 -> price = 4.0
        let two = 2u128 << 64;
        assert_eq!(q64_sqrt_to_price(two).unwrap(), dec!(4));
        // sqrt = 1.5 -> price = 2.25
        let one_and_half = (3u128 << 64) / 2;
        assert_eq!(q64_sqrt_to_price(one_and_half).unwrap(), dec!(2.25));
    }

    #[test]
    fn test_q64_overflow_is_none() {
        assert!(q64_sqrt_to_price(u128::MAX).is_none());
    }
}
