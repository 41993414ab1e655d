//! Cross-venue scanner: quote fan-out, profitability math, opportunity
//! emission.
//!
//! The pure profitability math (`assess_direction`) is separated from the
//! async orchestration so the detection rules are testable without a
//! chain. Each tick quotes every venue/route combination for both
//! directions of every catalogue pair through a bounded-concurrency
//! fan-out; a hung venue costs one timed-out future, never the tick.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use crate::config::{AppConfig, Catalogue};
use crate::notify::Notifier;
use crate::prices::{gas_cost_usd, GasPriceFetcher, PriceOracle};
use crate::quotes::QuoteEngine;
use crate::ratelimit::RateLimiter;
use crate::routing::MultiHopRouter;
use crate::storage::HistorySink;
use crate::types::{unix_now, DexKind, Opportunity, Quote, Route};
use anyhow::Result;
use ethers::providers::Middleware;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_HELD_OPPORTUNITIES: usize = 100;
const STATUS_LOG_EVERY_TICKS: u64 = 20;

/// Static gas model for arbitrage transactions.
pub struct GasEstimator;

impl GasEstimator {
    pub const BASE_TX_GAS: u64 = 21_000;
    pub const CONSTANT_PRODUCT_SWAP_GAS: u64 = 130_000;
    pub const CONCENTRATED_SWAP_GAS: u64 = 180_000;
    pub const FLASHLOAN_OVERHEAD_GAS: u64 = 50_000;

    pub fn leg_gas(kind: DexKind, hops: usize) -> u64 {
        let per_swap = match kind {
            DexKind::ConstantProduct => Self::CONSTANT_PRODUCT_SWAP_GAS,
            DexKind::ConcentratedLiquidity => Self::CONCENTRATED_SWAP_GAS,
        };
        per_swap * hops.max(1) as u64
    }

    /// Total gas for a flashloan arbitrage across two quoted legs.
    pub fn estimate_arbitrage(buy: &Quote, sell: &Quote) -> u64 {
        Self::BASE_TX_GAS
            + Self::FLASHLOAN_OVERHEAD_GAS
            + Self::leg_gas(buy.kind, buy.hops())
            + Self::leg_gas(sell.kind, sell.hops())
    }
}

/// Everything the profitability math needs besides the two quotes.
#[derive(Debug, Clone)]
pub struct ProfitInputs {
    pub token_in: String,
    pub token_out: String,
    pub amount: Decimal,
    pub gas_price_gwei: Decimal,
    pub eth_usd: Decimal,
    /// USD price of the borrowed token; None means USD accounting abstains.
    pub token_in_usd: Option<Decimal>,
    /// USD price of the output token; None means USD accounting abstains.
    pub token_out_usd: Option<Decimal>,
    pub profit_threshold_pct: Decimal,
    pub min_profit_usd: Decimal,
    pub flashloan_fee_bps: u32,
}

/// Evaluate one buy/sell quote pair against the emission thresholds.
///
/// `buy` and `sell` are same-direction quotes; the side quoting less
/// output is the buy side (token_out is cheap there) and the side
/// quoting more is the sell side. Two routes on the same venue are a
/// valid pairing; the same venue-and-route against itself is not. With
/// USD prices known, net profit deducts gas and the flashloan fee and
/// the opportunity must clear both the percentage threshold and the USD
/// dust floor. When USD accounting abstains for the output token, the
/// percentage is computed in token terms, profit_usd is reported as
/// zero, and the dust floor is skipped.
pub fn assess_direction(buy: &Quote, sell: &Quote, inputs: &ProfitInputs) -> Option<Opportunity> {
    if buy.venue == sell.venue && buy.route == sell.route {
        return None;
    }
    let gross_tokens = sell.amount_out - buy.amount_out;
    if gross_tokens <= Decimal::ZERO || buy.amount_out <= Decimal::ZERO {
        return None;
    }

    let gas_estimate = GasEstimator::estimate_arbitrage(buy, sell);
    let gas_usd = gas_cost_usd(gas_estimate, inputs.gas_price_gwei, inputs.eth_usd);
    let flashloan_fee_tokens =
        inputs.amount * Decimal::from(inputs.flashloan_fee_bps) / Decimal::from(10_000);
    let flashloan_fee_usd = inputs
        .token_in_usd
        .map(|p| flashloan_fee_tokens * p)
        .unwrap_or(Decimal::ZERO);

    let (profit_pct, profit_usd) = match inputs.token_out_usd {
        Some(out_usd) => {
            let gross_usd = gross_tokens * out_usd;
            let net_usd = gross_usd - gas_usd - flashloan_fee_usd;
            let notional = inputs.amount * buy.amount_out;
            if notional <= Decimal::ZERO {
                return None;
            }
            let pct = net_usd / notional * Decimal::from(100);
            if net_usd < inputs.min_profit_usd {
                return None;
            }
            (pct, net_usd)
        }
        None => {
            // token-terms percentage only; no dust floor without a price
            let pct = gross_tokens / buy.amount_out * Decimal::from(100);
            (pct, Decimal::ZERO)
        }
    };

    if profit_pct < inputs.profit_threshold_pct {
        return None;
    }

    Some(Opportunity {
        timestamp: unix_now(),
        token_in: inputs.token_in.clone(),
        token_out: inputs.token_out.clone(),
        buy_venue: buy.venue.clone(),
        sell_venue: sell.venue.clone(),
        buy_route: buy.route.clone(),
        sell_route: sell.route.clone(),
        buy_price: buy.amount_out,
        sell_price: sell.amount_out,
        amount: inputs.amount,
        gross_profit_tokens: gross_tokens,
        profit_pct,
        profit_usd,
        gas_estimate,
        gas_cost_usd: gas_usd,
        flashloan_fee_usd,
    })
}

/// Every unordered pairing of same-direction quotes, oriented so the
/// lower output is the buy side. Pairings of a quote against itself
/// (same venue and route) and zero-spread pairings are skipped.
pub fn oriented_pairs(quotes: &[Quote]) -> Vec<(&Quote, &Quote)> {
    let mut pairs = Vec::new();
    for i in 0..quotes.len() {
        for j in (i + 1)..quotes.len() {
            let (a, b) = (&quotes[i], &quotes[j]);
            if a.venue == b.venue && a.route == b.route {
                continue;
            }
            if a.amount_out == b.amount_out {
                continue;
            }
            if a.amount_out < b.amount_out {
                pairs.push((a, b));
            } else {
                pairs.push((b, a));
            }
        }
    }
    pairs
}

pub struct Scanner<M> {
    config: Arc<AppConfig>,
    catalogue: Arc<Catalogue>,
    quotes: Arc<QuoteEngine<M>>,
    router: MultiHopRouter,
    gas: Arc<GasPriceFetcher<M>>,
    oracle: Arc<PriceOracle<M>>,
    notifier: Arc<Notifier>,
    history: Option<Arc<HistorySink>>,
    rpc_limiter: Arc<RateLimiter>,
    opportunities: Vec<Opportunity>,
    tick_count: u64,
}

impl<M: Middleware + 'static> Scanner<M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<AppConfig>,
        catalogue: Arc<Catalogue>,
        quotes: Arc<QuoteEngine<M>>,
        gas: Arc<GasPriceFetcher<M>>,
        oracle: Arc<PriceOracle<M>>,
        notifier: Arc<Notifier>,
        history: Option<Arc<HistorySink>>,
    ) -> Self {
        let router = MultiHopRouter::new(catalogue.bridge_tokens.clone());
        let rpc_limiter = Arc::new(RateLimiter::per_second(config.rpc_max_calls_per_sec));
        Self {
            config,
            catalogue,
            quotes,
            router,
            gas,
            oracle,
            notifier,
            history,
            rpc_limiter,
            opportunities: Vec::new(),
            tick_count: 0,
        }
    }

    /// Run one detection pass over every catalogue pair, both directions.
    /// Returns the opportunities found this tick, best first.
    pub async fn scan_tick(&mut self) -> Result<Vec<Opportunity>> {
        self.tick_count += 1;
        let gas_price_gwei = self.gas.gas_price_gwei().await;
        let eth_usd = self.oracle.eth_usd().await;

        let mut found = Vec::new();
        for (a, b) in self.catalogue.scan_pairs() {
            for (token_in, token_out) in [(a.clone(), b.clone()), (b, a)] {
                found.extend(
                    self.scan_direction(&token_in, &token_out, gas_price_gwei, eth_usd)
                        .await,
                );
            }
        }

        found.sort_by(|x, y| y.profit_pct.cmp(&x.profit_pct));
        for opp in &found {
            self.emit(opp);
        }

        if self.tick_count % STATUS_LOG_EVERY_TICKS == 0 {
            info!(
                "🔍 tick {}: {} opportunities held, gas {} gwei, ETH ${}",
                self.tick_count,
                self.opportunities.len(),
                gas_price_gwei,
                eth_usd
            );
        }
        Ok(found)
    }

    async fn scan_direction(
        &self,
        token_in: &str,
        token_out: &str,
        gas_price_gwei: Decimal,
        eth_usd: Decimal,
    ) -> Vec<Opportunity> {
        let Some(token) = self.catalogue.token(token_in) else {
            return Vec::new();
        };
        let amount = token.scan_amount;
        let routes = self.candidate_routes(token_in, token_out);
        if routes.is_empty() {
            return Vec::new();
        }

        let mut jobs = Vec::new();
        for venue in self.catalogue.venues() {
            for route in &routes {
                // concentrated venues only quote direct pairs
                if venue.kind.is_concentrated() && !route.is_direct() {
                    continue;
                }
                jobs.push((venue.clone(), route.clone()));
            }
        }

        let engine = self.quotes.clone();
        let limiter = self.rpc_limiter.clone();
        let quotes: Vec<Quote> = stream::iter(jobs)
            .map(|(venue, route)| {
                let engine = engine.clone();
                let limiter = limiter.clone();
                async move {
                    limiter.acquire().await;
                    engine.quote(&venue, &route, amount).await
                }
            })
            .buffer_unordered(self.config.quote_concurrency)
            .filter_map(|q| async move { q })
            .collect()
            .await;

        if quotes.len() < 2 {
            debug!("{}->{}: {} quotes, skipping", token_in, token_out, quotes.len());
            return Vec::new();
        }

        let inputs = ProfitInputs {
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            amount,
            gas_price_gwei,
            eth_usd,
            token_in_usd: self.oracle.token_price_usd(token_in).await,
            token_out_usd: self.oracle.token_price_usd(token_out).await,
            profit_threshold_pct: self.config.profit_threshold_pct,
            min_profit_usd: self.config.min_profit_usd,
            flashloan_fee_bps: self.config.flashloan_fee_bps,
        };
        oriented_pairs(&quotes)
            .into_iter()
            .filter_map(|(buy, sell)| assess_direction(buy, sell, &inputs))
            .collect()
    }

    fn candidate_routes(&self, token_in: &str, token_out: &str) -> Vec<Route> {
        let max_hops = if self.config.enable_multi_hop {
            self.config.max_hops
        } else {
            1
        };
        match self.router.find_routes(token_in, token_out, max_hops, None) {
            Ok(routes) => routes,
            Err(e) => {
                warn!("route enumeration failed for {}->{}: {}", token_in, token_out, e);
                Vec::new()
            }
        }
    }

    fn emit(&mut self, opp: &Opportunity) {
        info!(
            "💰 opportunity: {} buy {} sell {} profit {:.4}% (${:.2})",
            opp.pair_label(),
            opp.buy_venue,
            opp.sell_venue,
            opp.profit_pct,
            opp.profit_usd
        );

        self.opportunities.push(opp.clone());
        if self.opportunities.len() > MAX_HELD_OPPORTUNITIES {
            let overflow = self.opportunities.len() - MAX_HELD_OPPORTUNITIES;
            self.opportunities.drain(..overflow);
        }

        if let Some(history) = &self.history {
            if let Err(e) = history.log_opportunity(opp) {
                warn!("history sink write failed: {}", e);
            }
        }

        if self.notifier.is_enabled() {
            let notifier = self.notifier.clone();
            let opp = opp.clone();
            tokio::spawn(async move {
                notifier.notify_opportunity(&opp).await;
            });
        }
    }

    pub fn recent_opportunities(&self) -> &[Opportunity] {
        &self.opportunities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slippage::constant_product_out;
    use rust_decimal_macros::dec;

    fn quote(venue: &str, amount_in: Decimal, amount_out: Decimal) -> Quote {
        Quote {
            venue: venue.to_string(),
            kind: DexKind::ConstantProduct,
            route: Route::direct("WETH", "USDC").unwrap(),
            amount_in,
            amount_out,
        }
    }

    fn inputs() -> ProfitInputs {
        ProfitInputs {
            token_in: "WETH".into(),
            token_out: "USDC".into(),
            amount: dec!(1),
            gas_price_gwei: dec!(0.02),
            eth_usd: dec!(3500),
            token_in_usd: Some(dec!(3500)),
            token_out_usd: Some(dec!(1)),
            profit_threshold_pct: dec!(0.3),
            min_profit_usd: dec!(1),
            flashloan_fee_bps: 9,
        }
    }

    #[test]
    fn test_gas_estimator_constants() {
        let buy = quote("a", dec!(1), dec!(3500));
        let sell = quote("b", dec!(1), dec!(3520));
        // base + flashloan + two single-hop constant-product swaps
        assert_eq!(GasEstimator::estimate_arbitrage(&buy, &sell), 331_000);
    }

    #[test]
    fn test_concentrated_leg_costs_more() {
        assert!(
            GasEstimator::leg_gas(DexKind::ConcentratedLiquidity, 1)
                > GasEstimator::leg_gas(DexKind::ConstantProduct, 1)
        );
        assert_eq!(GasEstimator::leg_gas(DexKind::ConstantProduct, 2), 260_000);
    }

    #[test]
    fn test_oriented_pairs_cover_every_combination() {
        let quotes = vec![
            quote("mid", dec!(1), dec!(3500)),
            quote("low", dec!(1), dec!(3450)),
            quote("high", dec!(1), dec!(3550)),
        ];
        let pairs = oriented_pairs(&quotes);
        // 3 quotes -> 3 unordered pairings, each oriented buy-low
        assert_eq!(pairs.len(), 3);
        for (buy, sell) in &pairs {
            assert!(buy.amount_out < sell.amount_out);
        }

        // a quote can never pair against itself
        let solo = vec![quote("only", dec!(1), dec!(3500))];
        assert!(oriented_pairs(&solo).is_empty());

        // zero spread is not a pairing
        let flat = vec![quote("a", dec!(1), dec!(3500)), quote("b", dec!(1), dec!(3500))];
        assert!(oriented_pairs(&flat).is_empty());
    }

    #[test]
    fn test_same_venue_different_routes_can_pair() {
        let mut direct = quote("syncswap", dec!(1), dec!(3450));
        direct.route = Route::direct("WETH", "USDC").unwrap();
        let mut bridged = quote("syncswap", dec!(1), dec!(3550));
        bridged.route = Route::new(vec!["WETH".into(), "USDT".into(), "USDC".into()]).unwrap();

        let quotes = vec![direct, bridged];
        let pairs = oriented_pairs(&quotes);
        assert_eq!(pairs.len(), 1);
        let mut cheap = inputs();
        cheap.profit_threshold_pct = dec!(0.1);
        let opp = assess_direction(pairs[0].0, pairs[0].1, &cheap).unwrap();
        assert_eq!(opp.buy_venue, opp.sell_venue);
        assert_ne!(opp.buy_route, opp.sell_route);
    }

    #[test]
    fn test_every_qualifying_pair_is_emitted() {
        let quotes = vec![
            quote("a", dec!(1), dec!(3500)),
            quote("b", dec!(1), dec!(3510)),
            quote("c", dec!(1), dec!(3520)),
        ];
        let mut cheap = inputs();
        cheap.profit_threshold_pct = dec!(0.1);
        cheap.min_profit_usd = dec!(1);
        let found: Vec<_> = oriented_pairs(&quotes)
            .into_iter()
            .filter_map(|(buy, sell)| assess_direction(buy, sell, &cheap))
            .collect();
        // a->b, a->c, b->c all clear a 0.1% threshold at ~$10 spreads
        assert_eq!(found.len(), 3);
        let mut seen: Vec<(String, String)> = found
            .iter()
            .map(|o| (o.buy_venue.clone(), o.sell_venue.clone()))
            .collect();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), "b".to_string()),
                ("a".to_string(), "c".to_string()),
                ("b".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_emission_needs_both_thresholds() {
        let buy = quote("a", dec!(1), dec!(3500));
        let sell = quote("b", dec!(1), dec!(3520));

        // clears both: $20 gross vs tiny gas and ~$3.15 fee
        let opp = assess_direction(&buy, &sell, &inputs()).unwrap();
        assert!(opp.profit_usd > dec!(1));
        assert!(opp.profit_pct >= dec!(0.4));

        // percentage threshold not met
        let mut strict = inputs();
        strict.profit_threshold_pct = dec!(5);
        assert!(assess_direction(&buy, &sell, &strict).is_none());

        // dust floor not met
        let mut dusty = inputs();
        dusty.min_profit_usd = dec!(1000);
        assert!(assess_direction(&buy, &sell, &dusty).is_none());
    }

    #[test]
    fn test_no_opportunity_when_spread_is_negative() {
        // buy side quoting more than the sell side is a losing trade
        let buy = quote("a", dec!(1), dec!(3520));
        let sell = quote("b", dec!(1), dec!(3500));
        assert!(assess_direction(&buy, &sell, &inputs()).is_none());
    }

    #[test]
    fn test_same_venue_and_route_is_rejected() {
        let buy = quote("a", dec!(1), dec!(3500));
        let sell = quote("a", dec!(1), dec!(3520));
        assert!(assess_direction(&buy, &sell, &inputs()).is_none());
    }

    #[test]
    fn test_usd_abstention_reports_zero_usd() {
        let buy = quote("a", dec!(1), dec!(100));
        let sell = quote("b", dec!(1), dec!(102));
        let mut no_usd = inputs();
        no_usd.token_in_usd = None;
        no_usd.token_out_usd = None;
        let opp = assess_direction(&buy, &sell, &no_usd).unwrap();
        assert_eq!(opp.profit_usd, Decimal::ZERO);
        assert_eq!(opp.flashloan_fee_usd, Decimal::ZERO);
        // 2/100 in token terms
        assert_eq!(opp.profit_pct, dec!(2));
    }

    #[test]
    fn test_two_pool_weth_usdc_scenario() {
        // pool A: 100 WETH / 350_000 USDC, pool B: 95 WETH / 342_000 USDC,
        // both 0.3% fee, probing with 1 WETH
        let amount = dec!(1);
        let out_a = constant_product_out(amount, dec!(100), dec!(350000), dec!(0.003)).unwrap();
        let out_b = constant_product_out(amount, dec!(95), dec!(342000), dec!(0.003)).unwrap();
        // pool B trades WETH at a premium
        assert!(out_b > out_a);

        let quotes = vec![quote("pool_a", amount, out_a), quote("pool_b", amount, out_b)];
        let pairs = oriented_pairs(&quotes);
        assert_eq!(pairs.len(), 1);
        let (buy, sell) = pairs[0];
        assert_eq!(buy.venue, "pool_a");
        assert_eq!(sell.venue, "pool_b");

        let mut cheap = inputs();
        cheap.profit_threshold_pct = dec!(0.1);
        let opp = assess_direction(buy, sell, &cheap).unwrap();
        assert_eq!(opp.buy_venue, "pool_a");
        assert_eq!(opp.sell_venue, "pool_b");
        assert!(opp.gross_profit_tokens > Decimal::ZERO);
        assert!(opp.profit_usd > Decimal::ZERO);
        assert_eq!(opp.gas_estimate, 331_000);
    }
}
