//! Core data structures shared across the scanner and execution pipeline.
//!
//! Token and Venue are loaded once from the catalogue at startup and are
//! immutable for the process lifetime. Quote and Route are recomputed every
//! scan tick. Opportunity is created by the detector, handed to the
//! execution pipeline exactly once, and never mutated afterwards.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// AMM families we can quote against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DexKind {
    /// x * y = k pools (Uniswap V2 style)
    ConstantProduct,
    /// Concentrated liquidity (Ambient/CrocSwap style price queries)
    ConcentratedLiquidity,
}

impl DexKind {
    pub fn is_concentrated(&self) -> bool {
        matches!(self, DexKind::ConcentratedLiquidity)
    }
}

impl fmt::Display for DexKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DexKind::ConstantProduct => write!(f, "constant_product"),
            DexKind::ConcentratedLiquidity => write!(f, "concentrated"),
        }
    }
}

/// Token descriptor from the catalogue. Symbol is the unique key.
/// `scan_amount` is the probe trade size (human units) used when quoting
/// this token as the input side of a pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    pub scan_amount: Decimal,
}

/// Venue (DEX) descriptor from the catalogue. Name is the unique key.
///
/// `fee` is the nominal trading fee as a fraction (0.003 = 0.30%).
/// Constant-product venues carry a factory address for pair lookups;
/// concentrated venues quote through a dedicated query contract instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    pub kind: DexKind,
    pub router: Address,
    pub factory: Option<Address>,
    pub fee: Decimal,
}

/// An ordered swap path of token symbols. length - 1 = number of hops.
///
/// Simple routes never repeat a token. Circular routes (for circular
/// arbitrage discovery) close back on their start token but may not
/// repeat any other token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route(Vec<String>);

impl Route {
    /// Build a simple route. Returns None for fewer than 2 tokens or any
    /// repeated token.
    pub fn new(tokens: Vec<String>) -> Option<Self> {
        if tokens.len() < 2 {
            return None;
        }
        for (i, t) in tokens.iter().enumerate() {
            if tokens[i + 1..].contains(t) {
                return None;
            }
        }
        Some(Route(tokens))
    }

    /// Build a circular route (first token == last token). Interior tokens
    /// must still be distinct.
    pub fn closed(tokens: Vec<String>) -> Option<Self> {
        if tokens.len() < 3 || tokens.first() != tokens.last() {
            return None;
        }
        let interior = &tokens[..tokens.len() - 1];
        for (i, t) in interior.iter().enumerate() {
            if interior[i + 1..].contains(t) {
                return None;
            }
        }
        Some(Route(tokens))
    }

    pub fn direct(token_in: &str, token_out: &str) -> Option<Self> {
        Route::new(vec![token_in.to_string(), token_out.to_string()])
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn hops(&self) -> usize {
        self.0.len() - 1
    }

    pub fn is_direct(&self) -> bool {
        self.0.len() == 2
    }

    /// Consecutive (token_in, token_out) legs of the route.
    pub fn legs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.windows(2).map(|w| (w[0].as_str(), w[1].as_str()))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.join("->"))
    }
}

/// A single venue quote: output amount for a fixed input along a route.
///
/// `amount_out` is already net of the venue's trading fee (router quoting
/// functions embed the fee). It must never be fee-adjusted a second time.
#[derive(Debug, Clone)]
pub struct Quote {
    pub venue: String,
    pub kind: DexKind,
    pub route: Route,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
}

impl Quote {
    pub fn hops(&self) -> usize {
        self.route.hops()
    }
}

/// A detected arbitrage opportunity. Immutable once created; consumed at
/// most once by the execution pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Opportunity {
    pub timestamp: i64,
    pub token_in: String,
    pub token_out: String,
    pub buy_venue: String,
    pub sell_venue: String,
    pub buy_route: Route,
    pub sell_route: Route,
    /// Output amount received for `amount` on the buy venue.
    pub buy_price: Decimal,
    /// Output amount received for the same input on the sell venue.
    pub sell_price: Decimal,
    pub amount: Decimal,
    /// sell_price - buy_price, in token_out units.
    pub gross_profit_tokens: Decimal,
    /// Net profit percentage after gas and flashloan fee.
    pub profit_pct: Decimal,
    /// Net profit in USD (0 when USD accounting abstains for the pair).
    pub profit_usd: Decimal,
    pub gas_estimate: u64,
    pub gas_cost_usd: Decimal,
    pub flashloan_fee_usd: Decimal,
}

impl Opportunity {
    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.token_in, self.token_out)
    }
}

/// Flat record of an execution attempt, written to the history sink and
/// the notification channels.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub timestamp: i64,
    pub token_in: String,
    pub token_out: String,
    pub buy_venue: String,
    pub sell_venue: String,
    pub status: String,
    pub tx_hash: Option<String>,
    pub profit_usd: Decimal,
    pub gas_cost_usd: Decimal,
    pub error: Option<String>,
}

/// Result of the flashloan contract's read-only simulation entry point.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Expected profit in token_in units.
    pub profit_tokens: Decimal,
    /// Expected profit in USD (0 when USD accounting abstains).
    pub profit_usd: Decimal,
}

/// Running execution statistics for the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    pub evaluated: u64,
    pub passed_validation: u64,
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total_profit_usd: Decimal,
    pub total_gas_usd: Decimal,
}

impl ExecutionStats {
    pub fn success_rate(&self) -> Decimal {
        if self.executed == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.succeeded) / Decimal::from(self.executed) * Decimal::from(100)
    }

    pub fn net_profit_usd(&self) -> Decimal {
        self.total_profit_usd - self.total_gas_usd
    }
}

fn decimal_scale(decimals: u8) -> Option<Decimal> {
    // 10^28 is the largest power of ten Decimal can hold
    if decimals > 28 {
        return None;
    }
    Some(Decimal::from_i128_with_scale(
        10i128.pow(decimals as u32),
        0,
    ))
}

/// Convert a human-unit amount to raw on-chain units (10^decimals scaling).
/// Returns None if the scaled amount does not fit the Decimal range.
pub fn to_raw_units(amount: Decimal, decimals: u8) -> Option<U256> {
    let scale = decimal_scale(decimals)?;
    let scaled = amount.checked_mul(scale)?.trunc();
    if scaled.is_sign_negative() {
        return None;
    }
    U256::from_dec_str(&scaled.to_string()).ok()
}

/// Convert raw on-chain units back to a human-unit Decimal.
/// Returns None when the raw value exceeds Decimal's range (~7.9e28).
pub fn from_raw_units(raw: U256, decimals: u8) -> Option<Decimal> {
    let value: Decimal = raw.to_string().parse().ok()?;
    let scale = decimal_scale(decimals)?;
    value.checked_div(scale)
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_route_rejects_repeats_and_short_paths() {
        assert!(Route::new(vec!["WETH".into()]).is_none());
        assert!(Route::new(vec!["WETH".into(), "WETH".into()]).is_none());
        assert!(Route::new(vec!["WETH".into(), "USDC".into(), "WETH".into()]).is_none());
        assert!(Route::new(vec!["WETH".into(), "USDC".into()]).is_some());
    }

    #[test]
    fn test_circular_route_closes_on_start() {
        let r = Route::closed(vec!["WETH".into(), "USDC".into(), "WETH".into()]).unwrap();
        assert_eq!(r.hops(), 2);
        // interior repeats still rejected
        assert!(Route::closed(vec![
            "WETH".into(),
            "USDC".into(),
            "USDC".into(),
            "WETH".into()
        ])
        .is_none());
        // must actually close
        assert!(Route::closed(vec!["WETH".into(), "USDC".into(), "USDT".into()]).is_none());
    }

    #[test]
    fn test_route_legs() {
        let r = Route::new(vec!["A".into(), "B".into(), "C".into()]).unwrap();
        let legs: Vec<_> = r.legs().collect();
        assert_eq!(legs, vec![("A", "B"), ("B", "C")]);
        assert_eq!(r.hops(), 2);
    }

    #[test]
    fn test_raw_unit_round_trip() {
        let amount = dec!(1.5);
        let raw = to_raw_units(amount, 18).unwrap();
        assert_eq!(raw, U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(from_raw_units(raw, 18).unwrap(), amount);

        // 6-decimal token (USDC style)
        let raw = to_raw_units(dec!(350000), 6).unwrap();
        assert_eq!(raw, U256::from(350_000_000_000u64));
    }

    #[test]
    fn test_from_raw_units_overflow_is_none() {
        // 10^40 raw units exceeds Decimal's range
        let huge = U256::from(10u8).pow(U256::from(40u8));
        assert!(from_raw_units(huge, 18).is_none());
    }

    #[test]
    fn test_stats_success_rate() {
        let stats = ExecutionStats {
            executed: 4,
            succeeded: 3,
            ..Default::default()
        };
        assert_eq!(stats.success_rate(), dec!(75));
    }
}
