//! MEV-aware transaction submission with ordered fallback channels.
//!
//! Channels are resolved once at startup from config into a fixed order:
//! private relay, then private RPC, then the public mempool. Submission
//! walks the list and stops at the first accepted hash. With
//! prefer_private disabled the private channels are bypassed entirely.
//!
//! A channel "fails" by erroring or returning no hash; either way the
//! next channel is tried. Only when every channel fails does submission
//! itself fail.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use crate::config::AppConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Bytes, H256};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

const RELAY_HTTP_TIMEOUT_SECS: u64 = 15;

/// One way of getting a signed transaction on chain.
#[async_trait]
pub trait SubmissionChannel: Send + Sync {
    fn name(&self) -> &str;
    fn is_private(&self) -> bool;
    /// Ok(Some(hash)) on acceptance; Ok(None) or Err means the caller
    /// should try the next channel.
    async fn submit(&self, raw_tx: &Bytes, max_block: Option<u64>) -> Result<Option<H256>>;
}

/// Flashbots-style relay speaking eth_sendPrivateTransaction over HTTP.
pub struct RelayChannel {
    url: String,
    client: reqwest::Client,
}

impl RelayChannel {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(RELAY_HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { url, client }
    }
}

#[async_trait]
impl SubmissionChannel for RelayChannel {
    fn name(&self) -> &str {
        "relay"
    }

    fn is_private(&self) -> bool {
        true
    }

    async fn submit(&self, raw_tx: &Bytes, max_block: Option<u64>) -> Result<Option<H256>> {
        let mut tx_param = json!({
            "tx": format!("{}", raw_tx),
            "preferences": { "fast": true }
        });
        if let Some(block) = max_block {
            tx_param["maxBlockNumber"] = json!(format!("{:#x}", block));
        }
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_sendPrivateTransaction",
            "params": [tx_param]
        });

        let resp: serde_json::Value = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("relay request failed")?
            .json()
            .await
            .context("relay returned non-JSON")?;

        if let Some(err) = resp.get("error") {
            warn!("relay rejected transaction: {}", err);
            return Ok(None);
        }
        let hash = resp
            .get("result")
            .and_then(|r| r.as_str())
            .and_then(|s| s.parse::<H256>().ok());
        Ok(hash)
    }
}

/// Direct submission to a private (non-broadcasting) RPC endpoint.
pub struct PrivateRpcChannel {
    provider: Provider<Http>,
}

impl PrivateRpcChannel {
    pub fn new(url: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(url).context("invalid private RPC url")?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl SubmissionChannel for PrivateRpcChannel {
    fn name(&self) -> &str {
        "private_rpc"
    }

    fn is_private(&self) -> bool {
        true
    }

    async fn submit(&self, raw_tx: &Bytes, _max_block: Option<u64>) -> Result<Option<H256>> {
        let pending = self
            .provider
            .send_raw_transaction(raw_tx.clone())
            .await
            .context("private rpc send failed")?;
        Ok(Some(*pending))
    }
}

/// Plain public mempool submission through the main provider.
pub struct PublicMempoolChannel<M> {
    provider: Arc<M>,
}

impl<M: Middleware + 'static> PublicMempoolChannel<M> {
    pub fn new(provider: Arc<M>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<M: Middleware + 'static> SubmissionChannel for PublicMempoolChannel<M> {
    fn name(&self) -> &str {
        "public"
    }

    fn is_private(&self) -> bool {
        false
    }

    async fn submit(&self, raw_tx: &Bytes, _max_block: Option<u64>) -> Result<Option<H256>> {
        let pending = self
            .provider
            .send_raw_transaction(raw_tx.clone())
            .await
            .map_err(|e| anyhow::anyhow!("public send failed: {}", e))?;
        Ok(Some(*pending))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelStats {
    pub attempts: u64,
    pub accepted: u64,
}

/// Ordered channel list with first-success semantics.
pub struct SubmissionRouter {
    channels: Vec<Box<dyn SubmissionChannel>>,
    prefer_private: bool,
    stats: Mutex<HashMap<String, ChannelStats>>,
}

impl SubmissionRouter {
    pub fn new(channels: Vec<Box<dyn SubmissionChannel>>, prefer_private: bool) -> Self {
        Self {
            channels,
            prefer_private,
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the channel list from config, in priority order.
    pub fn from_config<M: Middleware + 'static>(
        config: &AppConfig,
        provider: Arc<M>,
    ) -> Result<Self> {
        let mut channels: Vec<Box<dyn SubmissionChannel>> = Vec::new();
        if let Some(url) = &config.relay_rpc_url {
            channels.push(Box::new(RelayChannel::new(url.clone())));
        }
        if let Some(url) = &config.private_rpc_url {
            channels.push(Box::new(PrivateRpcChannel::new(url)?));
        }
        channels.push(Box::new(PublicMempoolChannel::new(provider)));

        let router = Self::new(channels, config.prefer_private);
        info!(
            "📡 submission channels: [{}], active: {}",
            router
                .channels
                .iter()
                .map(|c| c.name())
                .collect::<Vec<_>>()
                .join(", "),
            router.active_channel()
        );
        Ok(router)
    }

    /// Name of the channel a submission would try first.
    pub fn active_channel(&self) -> &str {
        self.channels
            .iter()
            .find(|c| self.prefer_private || !c.is_private())
            .map(|c| c.name())
            .unwrap_or("none")
    }

    pub fn has_private_channel(&self) -> bool {
        self.channels.iter().any(|c| c.is_private())
    }

    pub fn channel_stats(&self) -> HashMap<String, ChannelStats> {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn bump(&self, name: &str, accepted: bool) {
        if let Ok(mut stats) = self.stats.lock() {
            let entry = stats.entry(name.to_string()).or_default();
            entry.attempts += 1;
            if accepted {
                entry.accepted += 1;
            }
        }
    }

    /// Try each eligible channel in order; return the first accepted hash
    /// with the channel that took it. None when every channel failed.
    pub async fn send_best_effort(
        &self,
        raw_tx: &Bytes,
        max_block: Option<u64>,
    ) -> Option<(H256, String)> {
        for channel in &self.channels {
            if channel.is_private() && !self.prefer_private {
                continue;
            }
            match channel.submit(raw_tx, max_block).await {
                Ok(Some(hash)) => {
                    self.bump(channel.name(), true);
                    info!("📤 transaction accepted by {} channel: {:?}", channel.name(), hash);
                    return Some((hash, channel.name().to_string()));
                }
                Ok(None) => {
                    self.bump(channel.name(), false);
                    warn!("{} channel declined, trying next", channel.name());
                }
                Err(e) => {
                    self.bump(channel.name(), false);
                    warn!("{} channel failed: {}, trying next", channel.name(), e);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockChannel {
        name: String,
        private: bool,
        result: Option<H256>,
        error: bool,
        calls: Arc<AtomicUsize>,
    }

    impl MockChannel {
        fn boxed(
            name: &str,
            private: bool,
            result: Option<H256>,
            error: bool,
            calls: Arc<AtomicUsize>,
        ) -> Box<dyn SubmissionChannel> {
            Box::new(MockChannel {
                name: name.to_string(),
                private,
                result,
                error,
                calls,
            })
        }
    }

    #[async_trait]
    impl SubmissionChannel for MockChannel {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_private(&self) -> bool {
            self.private
        }

        async fn submit(&self, _raw_tx: &Bytes, _max_block: Option<u64>) -> Result<Option<H256>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.error {
                anyhow::bail!("mock failure");
            }
            Ok(self.result)
        }
    }

    fn raw() -> Bytes {
        Bytes::from(vec![0xde, 0xad])
    }

    #[tokio::test]
    async fn test_first_success_stops_the_walk() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let hash = H256::repeat_byte(1);
        let router = SubmissionRouter::new(
            vec![
                MockChannel::boxed("relay", true, Some(hash), false, first.clone()),
                MockChannel::boxed("public", false, Some(H256::repeat_byte(2)), false, second.clone()),
            ],
            true,
        );
        let (got, channel) = router.send_best_effort(&raw(), None).await.unwrap();
        assert_eq!(got, hash);
        assert_eq!(channel, "relay");
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_on_error_and_decline() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hash = H256::repeat_byte(3);
        let router = SubmissionRouter::new(
            vec![
                MockChannel::boxed("relay", true, None, true, calls.clone()),
                MockChannel::boxed("private_rpc", true, None, false, calls.clone()),
                MockChannel::boxed("public", false, Some(hash), false, calls.clone()),
            ],
            true,
        );
        let (got, channel) = router.send_best_effort(&raw(), None).await.unwrap();
        assert_eq!(got, hash);
        assert_eq!(channel, "public");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_all_channels_fail() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = SubmissionRouter::new(
            vec![
                MockChannel::boxed("relay", true, None, true, calls.clone()),
                MockChannel::boxed("public", false, None, true, calls.clone()),
            ],
            true,
        );
        assert!(router.send_best_effort(&raw(), None).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let stats = router.channel_stats();
        assert_eq!(stats["relay"].attempts, 1);
        assert_eq!(stats["relay"].accepted, 0);
    }

    #[tokio::test]
    async fn test_prefer_private_false_skips_private_channels() {
        let private_calls = Arc::new(AtomicUsize::new(0));
        let public_calls = Arc::new(AtomicUsize::new(0));
        let hash = H256::repeat_byte(4);
        let router = SubmissionRouter::new(
            vec![
                MockChannel::boxed("relay", true, Some(H256::repeat_byte(9)), false, private_calls.clone()),
                MockChannel::boxed("public", false, Some(hash), false, public_calls.clone()),
            ],
            false,
        );
        assert_eq!(router.active_channel(), "public");
        let (got, _) = router.send_best_effort(&raw(), None).await.unwrap();
        assert_eq!(got, hash);
        assert_eq!(private_calls.load(Ordering::SeqCst), 0);
        assert_eq!(public_calls.load(Ordering::SeqCst), 1);
    }
}
