//! Constant-product slippage and price-impact model.
//!
//! Pure math lives in free functions over `Decimal` so it is unit-testable
//! without a chain. `SlippageModel` layers the on-chain reserve lookups on
//! top (factory getPair, pair getReserves) and fails closed: if a leg's
//! pool state cannot be resolved, the check reports invalid.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use crate::config::Catalogue;
use crate::contracts::{IUniswapV2Factory, IUniswapV2Pair};
use crate::types::{from_raw_units, DexKind, Venue};
use ethers::providers::Middleware;
use ethers::types::Address;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const HIGH_IMPACT_PCT: Decimal = Decimal::ONE;
const VERY_HIGH_IMPACT_PCT: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Full breakdown of a single swap leg against a constant-product pool.
#[derive(Debug, Clone)]
pub struct SlippageBreakdown {
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub spot_price: Decimal,
    pub effective_price: Decimal,
    pub price_impact_pct: Decimal,
    pub slippage_pct: Decimal,
    pub reserve_in: Decimal,
    pub reserve_out: Decimal,
    pub is_high_impact: bool,
    pub is_very_high_impact: bool,
}

/// Combined result of the two-leg arbitrage slippage check.
#[derive(Debug, Clone)]
pub struct ArbSlippageCheck {
    pub is_valid: bool,
    pub total_slippage_pct: Decimal,
    pub buy: Option<SlippageBreakdown>,
    pub sell: Option<SlippageBreakdown>,
    pub reason: Option<String>,
}

impl ArbSlippageCheck {
    fn invalid(reason: &str) -> Self {
        ArbSlippageCheck {
            is_valid: false,
            total_slippage_pct: Decimal::ZERO,
            buy: None,
            sell: None,
            reason: Some(reason.to_string()),
        }
    }
}

/// Net-of-fee constant-product output: a_net * Rout / (Rin + a_net) with
/// a_net = a * (1 - fee). None for non-positive inputs or fee >= 1.
pub fn constant_product_out(
    amount_in: Decimal,
    reserve_in: Decimal,
    reserve_out: Decimal,
    fee: Decimal,
) -> Option<Decimal> {
    if amount_in <= Decimal::ZERO
        || reserve_in <= Decimal::ZERO
        || reserve_out <= Decimal::ZERO
        || fee < Decimal::ZERO
        || fee >= Decimal::ONE
    {
        return None;
    }
    let a_net = amount_in.checked_mul(Decimal::ONE - fee)?;
    a_net
        .checked_mul(reserve_out)?
        .checked_div(reserve_in.checked_add(a_net)?)
}

/// Compute the full slippage breakdown for one leg. None on degenerate
/// inputs (the caller treats that as an invalid leg, never as zero
/// slippage).
pub fn leg_breakdown(
    amount_in: Decimal,
    reserve_in: Decimal,
    reserve_out: Decimal,
    fee: Decimal,
) -> Option<SlippageBreakdown> {
    let amount_out = constant_product_out(amount_in, reserve_in, reserve_out, fee)?;
    let spot_price = reserve_out.checked_div(reserve_in)?;
    let effective_price = amount_out.checked_div(amount_in)?;
    let price_impact_pct = amount_in
        .checked_div(reserve_in)?
        .checked_mul(Decimal::from(100))?;
    let slippage_pct = (spot_price - effective_price)
        .checked_div(spot_price)?
        .checked_mul(Decimal::from(100))?;

    Some(SlippageBreakdown {
        amount_in,
        amount_out,
        spot_price,
        effective_price,
        price_impact_pct,
        slippage_pct,
        reserve_in,
        reserve_out,
        is_high_impact: price_impact_pct > HIGH_IMPACT_PCT,
        is_very_high_impact: price_impact_pct > VERY_HIGH_IMPACT_PCT,
    })
}

/// Combine two resolved legs into the final check. Boundary inclusive:
/// a total exactly at the maximum passes.
pub fn combine_legs(
    buy: SlippageBreakdown,
    sell: SlippageBreakdown,
    max_slippage_pct: Decimal,
) -> ArbSlippageCheck {
    let total = buy.slippage_pct + sell.slippage_pct;
    ArbSlippageCheck {
        is_valid: total <= max_slippage_pct,
        total_slippage_pct: total,
        buy: Some(buy),
        sell: Some(sell),
        reason: None,
    }
}

/// Largest trade size that keeps price impact at or below `max_impact_pct`:
/// reserve_in * max_impact / 100.
pub fn optimal_trade_size(reserve_in: Decimal, max_impact_pct: Decimal) -> Option<Decimal> {
    if reserve_in <= Decimal::ZERO || max_impact_pct <= Decimal::ZERO {
        return None;
    }
    reserve_in
        .checked_mul(max_impact_pct)?
        .checked_div(Decimal::from(100))
}

/// On-chain slippage model for constant-product venues.
pub struct SlippageModel<M> {
    provider: Arc<M>,
    catalogue: Arc<Catalogue>,
    rpc_timeout: Duration,
}

impl<M: Middleware + 'static> SlippageModel<M> {
    pub fn new(provider: Arc<M>, catalogue: Arc<Catalogue>, rpc_timeout: Duration) -> Self {
        Self {
            provider,
            catalogue,
            rpc_timeout,
        }
    }

    /// Fetch pool reserves oriented as (reserve_in, reserve_out) in human
    /// units. None when the venue has no pool for the pair, the venue is
    /// not constant-product, or any RPC read fails.
    pub async fn fetch_reserves(
        &self,
        venue: &Venue,
        token_in: &str,
        token_out: &str,
    ) -> Option<(Decimal, Decimal)> {
        if venue.kind != DexKind::ConstantProduct {
            return None;
        }
        let factory_addr = venue.factory?;
        let tin = self.catalogue.token(token_in)?;
        let tout = self.catalogue.token(token_out)?;

        let factory = IUniswapV2Factory::new(factory_addr, self.provider.clone());
        let pair_addr: Address = tokio::time::timeout(
            self.rpc_timeout,
            factory.get_pair(tin.address, tout.address).call(),
        )
        .await
        .ok()?
        .ok()?;
        if pair_addr == Address::zero() {
            debug!("no {} pool for {}/{}", venue.name, token_in, token_out);
            return None;
        }

        let pair = IUniswapV2Pair::new(pair_addr, self.provider.clone());
        let (r0, r1, _) = tokio::time::timeout(self.rpc_timeout, pair.get_reserves().call())
            .await
            .ok()?
            .ok()?;
        let token0: Address = tokio::time::timeout(self.rpc_timeout, pair.token_0().call())
            .await
            .ok()?
            .ok()?;

        let (raw_in, raw_out) = if token0 == tin.address {
            (r0, r1)
        } else {
            (r1, r0)
        };
        let reserve_in = from_raw_units(raw_in.into(), tin.decimals)?;
        let reserve_out = from_raw_units(raw_out.into(), tout.decimals)?;
        Some((reserve_in, reserve_out))
    }

    /// Slippage breakdown for a single leg on a venue.
    pub async fn leg_slippage(
        &self,
        venue: &Venue,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
    ) -> Option<SlippageBreakdown> {
        let (reserve_in, reserve_out) = self.fetch_reserves(venue, token_in, token_out).await?;
        leg_breakdown(amount_in, reserve_in, reserve_out, venue.fee)
    }

    /// Two-leg arbitrage slippage check. The sell leg's input is the buy
    /// leg's computed output, so the check mirrors the actual trade flow.
    /// Boundary inclusive: total == max passes. Fails closed when either
    /// leg cannot be resolved.
    pub async fn validate_arbitrage_slippage(
        &self,
        buy_venue: &Venue,
        sell_venue: &Venue,
        token_in: &str,
        token_out: &str,
        amount: Decimal,
        max_slippage_pct: Decimal,
    ) -> ArbSlippageCheck {
        let buy = match self.leg_slippage(buy_venue, token_in, token_out, amount).await {
            Some(b) => b,
            None => {
                warn!(
                    "slippage check failed closed: no buy-leg pool state on {}",
                    buy_venue.name
                );
                return ArbSlippageCheck::invalid("buy leg unresolvable");
            }
        };
        let sell = match self
            .leg_slippage(sell_venue, token_out, token_in, buy.amount_out)
            .await
        {
            Some(s) => s,
            None => {
                warn!(
                    "slippage check failed closed: no sell-leg pool state on {}",
                    sell_venue.name
                );
                return ArbSlippageCheck::invalid("sell leg unresolvable");
            }
        };

        combine_legs(buy, sell, max_slippage_pct)
    }

    /// Approximate pool depth in USD: sum of both reserves priced through
    /// the supplied per-token USD prices. None when a price is unavailable.
    pub async fn pool_liquidity_usd(
        &self,
        venue: &Venue,
        token_in: &str,
        token_out: &str,
        price_in_usd: Option<Decimal>,
        price_out_usd: Option<Decimal>,
    ) -> Option<Decimal> {
        let (reserve_in, reserve_out) = self.fetch_reserves(venue, token_in, token_out).await?;
        let value_in = reserve_in.checked_mul(price_in_usd?)?;
        let value_out = reserve_out.checked_mul(price_out_usd?)?;
        value_in.checked_add(value_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_output_less_than_spot_rate() {
        // 1 WETH into a 100 WETH / 350_000 USDC pool at 0.3% fee
        let out = constant_product_out(dec!(1), dec!(100), dec!(350000), dec!(0.003)).unwrap();
        assert!(out < dec!(3500));
        assert!(out > dec!(3400));
    }

    #[test]
    fn test_degenerate_inputs_are_none() {
        assert!(constant_product_out(dec!(0), dec!(100), dec!(100), dec!(0.003)).is_none());
        assert!(constant_product_out(dec!(-1), dec!(100), dec!(100), dec!(0.003)).is_none());
        assert!(constant_product_out(dec!(1), dec!(0), dec!(100), dec!(0.003)).is_none());
        assert!(constant_product_out(dec!(1), dec!(100), dec!(0), dec!(0.003)).is_none());
        assert!(constant_product_out(dec!(1), dec!(100), dec!(100), dec!(1)).is_none());
        assert!(leg_breakdown(dec!(1), dec!(0), dec!(100), dec!(0.003)).is_none());
    }

    #[test]
    fn test_slippage_increases_with_trade_size() {
        let small = leg_breakdown(dec!(1), dec!(100), dec!(350000), dec!(0.003)).unwrap();
        let large = leg_breakdown(dec!(10), dec!(100), dec!(350000), dec!(0.003)).unwrap();
        assert!(large.slippage_pct > small.slippage_pct);
        assert!(large.price_impact_pct > small.price_impact_pct);
        assert!(small.slippage_pct > Decimal::ZERO);
    }

    #[test]
    fn test_impact_flags() {
        // 0.5% of the pool: neither flag
        let low = leg_breakdown(dec!(0.5), dec!(100), dec!(350000), dec!(0.003)).unwrap();
        assert!(!low.is_high_impact);
        // 2% of the pool: high but not very high
        let mid = leg_breakdown(dec!(2), dec!(100), dec!(350000), dec!(0.003)).unwrap();
        assert!(mid.is_high_impact);
        assert!(!mid.is_very_high_impact);
        // 10% of the pool: both
        let high = leg_breakdown(dec!(10), dec!(100), dec!(350000), dec!(0.003)).unwrap();
        assert!(high.is_very_high_impact);
    }

    #[test]
    fn test_optimal_trade_size() {
        // 1% max impact on a 100-unit reserve
        assert_eq!(optimal_trade_size(dec!(100), dec!(1)).unwrap(), dec!(1));
        assert!(optimal_trade_size(dec!(0), dec!(1)).is_none());
        assert!(optimal_trade_size(dec!(100), dec!(0)).is_none());
    }

    #[test]
    fn test_two_leg_check_is_boundary_inclusive() {
        let leg = |pct: Decimal| SlippageBreakdown {
            amount_in: dec!(1),
            amount_out: dec!(1),
            spot_price: dec!(1),
            effective_price: dec!(1),
            price_impact_pct: pct,
            slippage_pct: pct,
            reserve_in: dec!(100),
            reserve_out: dec!(100),
            is_high_impact: false,
            is_very_high_impact: false,
        };
        // 0.25 + 0.25 against a 0.5 maximum passes exactly at the boundary
        let at_boundary = combine_legs(leg(dec!(0.25)), leg(dec!(0.25)), dec!(0.5));
        assert!(at_boundary.is_valid);
        assert_eq!(at_boundary.total_slippage_pct, dec!(0.5));

        let over = combine_legs(leg(dec!(0.25)), leg(dec!(0.26)), dec!(0.5));
        assert!(!over.is_valid);
    }

    #[test]
    fn test_effective_price_below_spot() {
        let b = leg_breakdown(dec!(1), dec!(100), dec!(350000), dec!(0.003)).unwrap();
        assert!(b.effective_price < b.spot_price);
        assert_eq!(b.spot_price, dec!(3500));
    }
}
