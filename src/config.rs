//! Configuration management
//!
//! Process settings come from the environment (.env supported); the venue
//! and token catalogue comes from a JSON file. Both are loaded and
//! validated once at startup. Downstream code never re-checks them.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use crate::types::{DexKind, Token, Venue};
use anyhow::{bail, Context, Result};
use ethers::types::Address;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub private_key: Option<String>,
    pub flashloan_contract: Option<Address>,
    pub catalogue_file: String,

    pub profit_threshold_pct: Decimal,
    pub min_profit_usd: Decimal,
    pub max_slippage_pct: Decimal,
    pub max_gas_price_gwei: Decimal,
    pub flashloan_fee_bps: u32,

    pub enable_multi_hop: bool,
    pub max_hops: usize,
    pub scan_interval_secs: u64,
    pub quote_concurrency: usize,
    pub rpc_max_calls_per_sec: u32,
    pub rpc_timeout_secs: u64,
    pub confirmation_timeout_secs: u64,
    pub dry_run: bool,

    pub cb_max_failures: usize,
    pub cb_window_secs: u64,
    pub cb_cooldown_secs: u64,

    pub relay_rpc_url: Option<String>,
    pub private_rpc_url: Option<String>,
    pub prefer_private: bool,

    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub discord_webhook: Option<String>,

    pub history_enabled: bool,
    pub history_dir: String,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e)),
        None => Ok(default),
    }
}

fn env_address_opt(key: &str) -> Result<Option<Address>> {
    match env_opt(key) {
        Some(v) => Ok(Some(
            Address::from_str(&v).with_context(|| format!("invalid {}", key))?,
        )),
        None => Ok(None),
    }
}

pub fn load_config() -> Result<AppConfig> {
    dotenv::dotenv().ok();

    let config = AppConfig {
        rpc_url: std::env::var("RPC_URL").context("RPC_URL not set")?,
        chain_id: std::env::var("CHAIN_ID")
            .context("CHAIN_ID not set")?
            .parse()
            .context("invalid CHAIN_ID")?,
        private_key: env_opt("PRIVATE_KEY"),
        flashloan_contract: env_address_opt("FLASHLOAN_CONTRACT")?,
        catalogue_file: env_or("CATALOGUE_FILE", "config/catalogue.json"),

        profit_threshold_pct: env_parse_or("PROFIT_THRESHOLD_PCT", Decimal::new(5, 1))?,
        min_profit_usd: env_parse_or("MIN_PROFIT_USD", Decimal::new(1, 0))?,
        max_slippage_pct: env_parse_or("MAX_SLIPPAGE_PCT", Decimal::new(5, 1))?,
        max_gas_price_gwei: env_parse_or("MAX_GAS_PRICE_GWEI", Decimal::new(1, 1))?,
        flashloan_fee_bps: env_parse_or("FLASHLOAN_FEE_BPS", 9u32)?,

        enable_multi_hop: env_parse_or("ENABLE_MULTI_HOP", false)?,
        max_hops: env_parse_or("MAX_HOPS", 2usize)?,
        scan_interval_secs: env_parse_or("SCAN_INTERVAL_SECS", 3u64)?,
        quote_concurrency: env_parse_or("QUOTE_CONCURRENCY", 8usize)?,
        rpc_max_calls_per_sec: env_parse_or("RPC_MAX_CALLS_PER_SEC", 20u32)?,
        rpc_timeout_secs: env_parse_or("RPC_TIMEOUT_SECS", 10u64)?,
        confirmation_timeout_secs: env_parse_or("CONFIRMATION_TIMEOUT_SECS", 300u64)?,
        dry_run: env_parse_or("DRY_RUN", true)?,

        cb_max_failures: env_parse_or("CB_MAX_FAILURES", 5usize)?,
        cb_window_secs: env_parse_or("CB_WINDOW_SECS", 300u64)?,
        cb_cooldown_secs: env_parse_or("CB_COOLDOWN_SECS", 600u64)?,

        relay_rpc_url: env_opt("RELAY_RPC_URL"),
        private_rpc_url: env_opt("PRIVATE_RPC_URL"),
        prefer_private: env_parse_or("PREFER_PRIVATE", true)?,

        telegram_bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
        telegram_chat_id: env_opt("TELEGRAM_CHAT_ID"),
        discord_webhook: env_opt("DISCORD_WEBHOOK"),

        history_enabled: env_parse_or("HISTORY_ENABLED", true)?,
        history_dir: env_or("HISTORY_DIR", "data/history"),
    };

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
    if config.profit_threshold_pct < Decimal::ZERO {
        bail!("PROFIT_THRESHOLD_PCT must be non-negative");
    }
    if config.max_slippage_pct <= Decimal::ZERO {
        bail!("MAX_SLIPPAGE_PCT must be positive");
    }
    if !(1..=3).contains(&config.max_hops) {
        bail!("MAX_HOPS must be between 1 and 3");
    }
    if config.quote_concurrency == 0 {
        bail!("QUOTE_CONCURRENCY must be at least 1");
    }
    if config.rpc_max_calls_per_sec == 0 {
        bail!("RPC_MAX_CALLS_PER_SEC must be at least 1");
    }
    if config.cb_max_failures == 0 {
        bail!("CB_MAX_FAILURES must be at least 1");
    }
    if !config.dry_run {
        if config.private_key.is_none() {
            bail!("PRIVATE_KEY required when DRY_RUN=false");
        }
        if config.flashloan_contract.is_none() {
            bail!("FLASHLOAN_CONTRACT required when DRY_RUN=false");
        }
    }
    Ok(())
}

// ── Venue/token catalogue ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawVenue {
    name: String,
    kind: DexKind,
    router: String,
    #[serde(default)]
    factory: Option<String>,
    /// Trading fee as a fraction, e.g. 0.003
    fee: Decimal,
    #[serde(default)]
    query_contract: Option<String>,
    #[serde(default)]
    pool_idx: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    symbol: String,
    address: String,
    decimals: u8,
    #[serde(default)]
    scan_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct RawCatalogue {
    venues: Vec<RawVenue>,
    tokens: Vec<RawToken>,
    #[serde(default)]
    bridge_tokens: Vec<String>,
    #[serde(default)]
    chainlink_eth_usd: Option<String>,
}

/// Per-venue extras for concentrated liquidity quoting.
#[derive(Debug, Clone)]
pub struct ConcentratedParams {
    pub query_contract: Address,
    pub pool_idx: u64,
}

/// Validated catalogue. Lookups by symbol/name; construction guarantees
/// addresses parse, keys are unique, and bridge tokens are known.
#[derive(Debug, Clone)]
pub struct Catalogue {
    venues: HashMap<String, Venue>,
    tokens: HashMap<String, Token>,
    concentrated: HashMap<String, ConcentratedParams>,
    pub bridge_tokens: Vec<String>,
    pub chainlink_eth_usd: Option<Address>,
}

impl Catalogue {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read catalogue {:?}", path.as_ref()))?;
        let raw: RawCatalogue = serde_json::from_str(&raw).context("invalid catalogue JSON")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawCatalogue) -> Result<Self> {
        let mut tokens = HashMap::new();
        for t in raw.tokens {
            let address = Address::from_str(&t.address)
                .with_context(|| format!("bad address for token {}", t.symbol))?;
            if tokens
                .insert(
                    t.symbol.clone(),
                    Token {
                        symbol: t.symbol.clone(),
                        address,
                        decimals: t.decimals,
                        scan_amount: t.scan_amount.unwrap_or(Decimal::ONE),
                    },
                )
                .is_some()
            {
                bail!("duplicate token symbol {}", t.symbol);
            }
        }

        let mut venues = HashMap::new();
        let mut concentrated = HashMap::new();
        for v in raw.venues {
            let router = Address::from_str(&v.router)
                .with_context(|| format!("bad router for venue {}", v.name))?;
            let factory = match &v.factory {
                Some(f) => Some(
                    Address::from_str(f)
                        .with_context(|| format!("bad factory for venue {}", v.name))?,
                ),
                None => None,
            };
            if v.kind == DexKind::ConstantProduct && factory.is_none() {
                bail!("constant-product venue {} needs a factory", v.name);
            }
            if v.kind == DexKind::ConcentratedLiquidity {
                if let Some(q) = &v.query_contract {
                    concentrated.insert(
                        v.name.clone(),
                        ConcentratedParams {
                            query_contract: Address::from_str(q).with_context(|| {
                                format!("bad query contract for venue {}", v.name)
                            })?,
                            pool_idx: v.pool_idx.unwrap_or(420),
                        },
                    );
                }
            }
            if venues
                .insert(
                    v.name.clone(),
                    Venue {
                        name: v.name.clone(),
                        kind: v.kind,
                        router,
                        factory,
                        fee: v.fee,
                    },
                )
                .is_some()
            {
                bail!("duplicate venue name {}", v.name);
            }
        }

        if venues.is_empty() || tokens.len() < 2 {
            bail!("catalogue needs at least one venue and two tokens");
        }
        for b in &raw.bridge_tokens {
            if !tokens.contains_key(b) {
                bail!("bridge token {} not in token list", b);
            }
        }

        let chainlink_eth_usd = match raw.chainlink_eth_usd {
            Some(a) => Some(Address::from_str(&a).context("bad chainlink_eth_usd address")?),
            None => None,
        };

        Ok(Catalogue {
            venues,
            tokens,
            concentrated,
            bridge_tokens: raw.bridge_tokens,
            chainlink_eth_usd,
        })
    }

    pub fn token(&self, symbol: &str) -> Option<&Token> {
        self.tokens.get(symbol)
    }

    pub fn venue(&self, name: &str) -> Option<&Venue> {
        self.venues.get(name)
    }

    pub fn concentrated_params(&self, venue: &str) -> Option<&ConcentratedParams> {
        self.concentrated.get(venue)
    }

    pub fn venues(&self) -> impl Iterator<Item = &Venue> {
        self.venues.values()
    }

    pub fn token_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.tokens.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Unordered token pairs to scan, in a stable order.
    pub fn scan_pairs(&self) -> Vec<(String, String)> {
        let symbols = self.token_symbols();
        let mut pairs = Vec::new();
        for i in 0..symbols.len() {
            for j in (i + 1)..symbols.len() {
                pairs.push((symbols[i].clone(), symbols[j].clone()));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "venues": [
            {"name": "syncswap", "kind": "constant_product",
             "router": "0x80e38291e06339d10AAB483C65695D004dBD5C69",
             "factory": "0x37BAc764494c8db4e54BDE72f6965beA9fa0AC2d",
             "fee": 0.003},
            {"name": "ambient", "kind": "concentrated_liquidity",
             "router": "0xaaaaAAAACB71BF2C8CaE522EA5fa455571A74106",
             "fee": 0.003,
             "query_contract": "0x62223e90605845Cf5CC6DAE6E0de4CDA130d6DDf",
             "pool_idx": 420}
        ],
        "tokens": [
            {"symbol": "WETH", "address": "0x5300000000000000000000000000000000000004", "decimals": 18},
            {"symbol": "USDC", "address": "0x06eFdBFf2a14a7c8E15944D1F4A48F9F95F663A4", "decimals": 6}
        ],
        "bridge_tokens": ["WETH"]
    }"#;

    #[test]
    fn test_catalogue_parses_and_resolves() {
        let raw: RawCatalogue = serde_json::from_str(SAMPLE).unwrap();
        let cat = Catalogue::from_raw(raw).unwrap();
        assert_eq!(cat.token("WETH").unwrap().decimals, 18);
        assert_eq!(cat.venue("syncswap").unwrap().kind, DexKind::ConstantProduct);
        assert!(cat.venue("ambient").unwrap().factory.is_none());
        assert_eq!(cat.concentrated_params("ambient").unwrap().pool_idx, 420);
        assert_eq!(cat.scan_pairs(), vec![("USDC".to_string(), "WETH".to_string())]);
    }

    #[test]
    fn test_catalogue_rejects_unknown_bridge_token() {
        let mut raw: RawCatalogue = serde_json::from_str(SAMPLE).unwrap();
        raw.bridge_tokens = vec!["DAI".to_string()];
        assert!(Catalogue::from_raw(raw).is_err());
    }

    #[test]
    fn test_catalogue_rejects_cp_venue_without_factory() {
        let mut raw: RawCatalogue = serde_json::from_str(SAMPLE).unwrap();
        raw.venues[0].factory = None;
        assert!(Catalogue::from_raw(raw).is_err());
    }
}
