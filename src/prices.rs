//! Gas price and USD price feeds with caching and fallback ladders.
//!
//! Both fetchers degrade instead of failing: fresh cache, live fetch,
//! stale cache, hardcoded default, with escalating log severity. A price
//! read can therefore never abort a scan tick.
//!
//! USD accounting is deliberately narrow: stablecoins are pinned at 1.0,
//! ETH/WETH goes through Chainlink with a DEX pool-ratio fallback, and
//! every other symbol abstains (None) rather than reporting a number we
//! cannot back.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use crate::config::Catalogue;
use crate::contracts::IChainlinkAggregator;
use crate::slippage::SlippageModel;
use crate::types::DexKind;
use ethers::providers::Middleware;
use ethers::types::Address;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const GAS_CACHE_SECS: u64 = 60;
const GAS_STALE_BOUND_SECS: u64 = 300;
const ETH_CACHE_SECS: u64 = 60;
const ETH_STALE_BOUND_SECS: u64 = 1800;
const CHAINLINK_STALENESS_WARN_SECS: u64 = 3600;

const STABLECOINS: [&str; 3] = ["USDC", "USDT", "DAI"];

#[derive(Debug, Clone, Copy)]
struct CachedValue {
    value: Decimal,
    fetched_at: Instant,
}

impl CachedValue {
    fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Current gas price in gwei, cached for 60s with a 300s stale-cache
/// fallback and a conservative hardcoded default after that.
pub struct GasPriceFetcher<M> {
    provider: Arc<M>,
    cache: Mutex<Option<CachedValue>>,
    default_gwei: Decimal,
    rpc_timeout: Duration,
}

impl<M: Middleware + 'static> GasPriceFetcher<M> {
    pub fn new(provider: Arc<M>, rpc_timeout: Duration) -> Self {
        Self {
            provider,
            cache: Mutex::new(None),
            // L2-calibrated default
            default_gwei: Decimal::new(2, 2),
            rpc_timeout,
        }
    }

    pub async fn gas_price_gwei(&self) -> Decimal {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = *cache {
            if cached.age() < Duration::from_secs(GAS_CACHE_SECS) {
                return cached.value;
            }
        }

        match tokio::time::timeout(self.rpc_timeout, self.provider.get_gas_price()).await {
            Ok(Ok(wei)) => {
                if let Some(gwei) = crate::types::from_raw_units(wei, 9) {
                    *cache = Some(CachedValue {
                        value: gwei,
                        fetched_at: Instant::now(),
                    });
                    return gwei;
                }
            }
            Ok(Err(e)) => debug!("eth_gasPrice failed: {}", e),
            Err(_) => debug!("eth_gasPrice timed out"),
        }

        if let Some(cached) = *cache {
            if cached.age() < Duration::from_secs(GAS_STALE_BOUND_SECS) {
                warn!(
                    "gas price fetch failed, using {}s-old cached value",
                    cached.age().as_secs()
                );
                return cached.value;
            }
        }
        warn!("gas price unavailable, using default {} gwei", self.default_gwei);
        self.default_gwei
    }
}

/// USD cost of `gas_units` at `gas_price_gwei` with ETH at `eth_usd`.
pub fn gas_cost_usd(gas_units: u64, gas_price_gwei: Decimal, eth_usd: Decimal) -> Decimal {
    let eth = Decimal::from(gas_units) * gas_price_gwei / Decimal::from(1_000_000_000u64);
    eth * eth_usd
}

/// ETH/USD price: Chainlink preferred, DEX WETH/USDC pool ratio fallback,
/// then stale cache, then a hardcoded default.
pub struct EthPriceFetcher<M> {
    provider: Arc<M>,
    catalogue: Arc<Catalogue>,
    slippage: Arc<SlippageModel<M>>,
    chainlink_feed: Option<Address>,
    cache: Mutex<Option<CachedValue>>,
    default_usd: Decimal,
    rpc_timeout: Duration,
}

impl<M: Middleware + 'static> EthPriceFetcher<M> {
    pub fn new(
        provider: Arc<M>,
        catalogue: Arc<Catalogue>,
        slippage: Arc<SlippageModel<M>>,
        rpc_timeout: Duration,
    ) -> Self {
        let chainlink_feed = catalogue.chainlink_eth_usd;
        Self {
            provider,
            catalogue,
            slippage,
            chainlink_feed,
            cache: Mutex::new(None),
            default_usd: Decimal::from(3500),
            rpc_timeout,
        }
    }

    async fn fetch_chainlink(&self) -> Option<Decimal> {
        let feed_addr = self.chainlink_feed?;
        let feed = IChainlinkAggregator::new(feed_addr, self.provider.clone());

        let decimals: u8 = tokio::time::timeout(self.rpc_timeout, feed.decimals().call())
            .await
            .ok()?
            .ok()?;
        let (_, answer, _, updated_at, _) =
            tokio::time::timeout(self.rpc_timeout, feed.latest_round_data().call())
                .await
                .ok()?
                .ok()?;
        if answer.is_negative() || answer.is_zero() {
            return None;
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let updated = updated_at.as_u64();
        if now.saturating_sub(updated) > CHAINLINK_STALENESS_WARN_SECS {
            warn!(
                "chainlink ETH/USD round is {}s old, still using it",
                now.saturating_sub(updated)
            );
        }

        let raw: Decimal = answer.to_string().parse().ok()?;
        raw.checked_div(Decimal::from(10u64.checked_pow(decimals as u32)?))
    }

    async fn fetch_dex_ratio(&self) -> Option<Decimal> {
        for venue in self.catalogue.venues() {
            if venue.kind != DexKind::ConstantProduct {
                continue;
            }
            if let Some((weth, usdc)) =
                self.slippage.fetch_reserves(venue, "WETH", "USDC").await
            {
                if weth > Decimal::ZERO {
                    return usdc.checked_div(weth);
                }
            }
        }
        None
    }

    pub async fn price_usd(&self) -> Decimal {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = *cache {
            if cached.age() < Duration::from_secs(ETH_CACHE_SECS) {
                return cached.value;
            }
        }

        if let Some(price) = self.fetch_chainlink().await {
            *cache = Some(CachedValue {
                value: price,
                fetched_at: Instant::now(),
            });
            return price;
        }

        if let Some(price) = self.fetch_dex_ratio().await {
            warn!("chainlink unavailable, using DEX pool ratio for ETH/USD: {}", price);
            *cache = Some(CachedValue {
                value: price,
                fetched_at: Instant::now(),
            });
            return price;
        }

        if let Some(cached) = *cache {
            if cached.age() < Duration::from_secs(ETH_STALE_BOUND_SECS) {
                warn!(
                    "ETH/USD fetch failed, using {}s-old cached value",
                    cached.age().as_secs()
                );
                return cached.value;
            }
        }
        warn!("ETH/USD unavailable, using default ${}", self.default_usd);
        self.default_usd
    }
}

/// Per-token USD pricing with deliberate abstention.
pub struct PriceOracle<M> {
    eth: EthPriceFetcher<M>,
}

impl<M: Middleware + 'static> PriceOracle<M> {
    pub fn new(eth: EthPriceFetcher<M>) -> Self {
        Self { eth }
    }

    /// USD price for a token symbol, or None when USD accounting must
    /// abstain for this token.
    pub async fn token_price_usd(&self, symbol: &str) -> Option<Decimal> {
        if STABLECOINS.contains(&symbol) {
            return Some(Decimal::ONE);
        }
        if symbol == "ETH" || symbol == "WETH" {
            return Some(self.eth.price_usd().await);
        }
        None
    }

    pub async fn eth_usd(&self) -> Decimal {
        self.eth.price_usd().await
    }
}

pub fn is_stablecoin(symbol: &str) -> bool {
    STABLECOINS.contains(&symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_gas_cost_usd() {
        // 200k gas at 0.02 gwei, ETH at $3500
        let cost = gas_cost_usd(200_000, dec!(0.02), dec!(3500));
        assert_eq!(cost, dec!(0.014));
    }

    #[test]
    fn test_stablecoin_set() {
        assert!(is_stablecoin("USDC"));
        assert!(is_stablecoin("DAI"));
        assert!(!is_stablecoin("WETH"));
        assert!(!is_stablecoin("usdc"));
    }
}
