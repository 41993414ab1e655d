//! Guarded execution pipeline.
//!
//! Every opportunity runs the same gauntlet: circuit breaker check,
//! structural validation, live slippage re-check, on-chain simulation,
//! then either a dry-run stop or a real flashloan submission with a
//! bounded confirmation wait. Any stage can reject; rejections carry the
//! typed reason and only infrastructure failures feed the breaker.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerState, BreakerStatus, CircuitBreaker};

use crate::config::{AppConfig, Catalogue};
use crate::contracts::i_flashloan_arbitrage::ArbitrageParams;
use crate::contracts::IFlashloanArbitrage;
use crate::error::ExecutionError;
use crate::notify::Notifier;
use crate::prices::{gas_cost_usd, GasPriceFetcher, PriceOracle};
use crate::slippage::SlippageModel;
use crate::storage::HistorySink;
use crate::submission::SubmissionRouter;
use crate::types::{
    from_raw_units, to_raw_units, unix_now, ExecutionRecord, ExecutionStats, Opportunity,
    SimulationReport,
};
use ethers::providers::Middleware;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{BlockNumber, H256, U256};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const FLASHLOAN_DEADLINE_SECS: u64 = 300;
const MIN_PROFIT_FRACTION: Decimal = Decimal::from_parts(8, 0, 0, false, 1); // 0.8
const GAS_SAFETY_NUM: u64 = 12;
const GAS_SAFETY_DEN: u64 = 10;
const RECEIPT_POLL_SECS: u64 = 5;
const MAX_BLOCKS_AHEAD: u64 = 25;

/// Terminal outcome of one pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// All checks passed; execution was withheld by dry-run mode.
    DryRun { report: SimulationReport },
    /// Transaction landed and succeeded.
    Confirmed {
        tx_hash: H256,
        channel: String,
        gas_used: u64,
        gas_cost_usd: Decimal,
        profit_usd: Decimal,
    },
    /// Transaction landed but reverted on chain.
    Reverted { tx_hash: H256 },
    /// A stage rejected the opportunity.
    Rejected(ExecutionError),
    /// The breaker was open; nothing was attempted.
    BreakerOpen { remaining_secs: u64 },
}

impl PipelineOutcome {
    pub fn status_label(&self) -> &'static str {
        match self {
            PipelineOutcome::DryRun { .. } => "dry_run",
            PipelineOutcome::Confirmed { .. } => "confirmed",
            PipelineOutcome::Reverted { .. } => "reverted",
            PipelineOutcome::Rejected(_) => "rejected",
            PipelineOutcome::BreakerOpen { .. } => "breaker_open",
        }
    }
}

pub struct ExecutionPipeline<M> {
    provider: Arc<M>,
    wallet: Option<LocalWallet>,
    config: Arc<AppConfig>,
    catalogue: Arc<Catalogue>,
    slippage: Arc<SlippageModel<M>>,
    gas: Arc<GasPriceFetcher<M>>,
    oracle: Arc<PriceOracle<M>>,
    submission: Arc<SubmissionRouter>,
    notifier: Arc<Notifier>,
    history: Option<Arc<HistorySink>>,
    breaker: CircuitBreaker,
    stats: ExecutionStats,
}

impl<M: Middleware + 'static> ExecutionPipeline<M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<M>,
        wallet: Option<LocalWallet>,
        config: Arc<AppConfig>,
        catalogue: Arc<Catalogue>,
        slippage: Arc<SlippageModel<M>>,
        gas: Arc<GasPriceFetcher<M>>,
        oracle: Arc<PriceOracle<M>>,
        submission: Arc<SubmissionRouter>,
        notifier: Arc<Notifier>,
        history: Option<Arc<HistorySink>>,
    ) -> Self {
        let breaker = CircuitBreaker::new(
            config.cb_max_failures,
            config.cb_window_secs,
            config.cb_cooldown_secs,
        );
        Self {
            provider,
            wallet,
            config,
            catalogue,
            slippage,
            gas,
            oracle,
            submission,
            notifier,
            history,
            breaker,
            stats: ExecutionStats::default(),
        }
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    pub fn breaker_status(&self) -> BreakerStatus {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.breaker.status_at(now)
    }

    /// Run one opportunity through the full pipeline.
    pub async fn process(&mut self, opp: &Opportunity) -> PipelineOutcome {
        self.stats.evaluated += 1;

        if self.breaker.is_tripped() {
            let remaining_secs = self.breaker.cooldown_remaining();
            warn!(
                "⛔ breaker open, skipping {} ({}s remaining)",
                opp.pair_label(),
                remaining_secs
            );
            return PipelineOutcome::BreakerOpen { remaining_secs };
        }

        let outcome = match self.run_stages(opp).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.counts_as_breaker_failure() {
                    self.breaker.record_failure(e.tag());
                    self.stats.failed += 1;
                    if self.notifier.is_enabled() {
                        let notifier = self.notifier.clone();
                        let message = e.to_string();
                        tokio::spawn(async move {
                            notifier.notify_error(&message).await;
                        });
                    }
                }
                PipelineOutcome::Rejected(e)
            }
        };

        self.record_outcome(opp, &outcome);
        outcome
    }

    async fn run_stages(&mut self, opp: &Opportunity) -> Result<PipelineOutcome, ExecutionError> {
        self.validate(opp)?;
        self.check_slippage(opp).await?;
        self.stats.passed_validation += 1;

        let report = self.simulate(opp).await?;

        if self.config.dry_run {
            info!(
                "📝 dry run: {} would execute with expected profit {} {} (${:.2})",
                opp.pair_label(),
                report.profit_tokens,
                opp.token_in,
                report.profit_usd
            );
            return Ok(PipelineOutcome::DryRun { report });
        }

        self.execute(opp, &report).await
    }

    fn validate(&self, opp: &Opportunity) -> Result<(), ExecutionError> {
        if opp.amount <= Decimal::ZERO {
            return Err(ExecutionError::Validation("non-positive amount".into()));
        }
        for symbol in [&opp.token_in, &opp.token_out] {
            if self.catalogue.token(symbol).is_none() {
                return Err(ExecutionError::Validation(format!("unknown token {}", symbol)));
            }
        }
        for venue in [&opp.buy_venue, &opp.sell_venue] {
            if self.catalogue.venue(venue).is_none() {
                return Err(ExecutionError::Validation(format!("unknown venue {}", venue)));
            }
        }
        if opp.buy_venue == opp.sell_venue {
            return Err(ExecutionError::Validation("buy and sell venue identical".into()));
        }
        if opp.profit_pct < self.config.profit_threshold_pct {
            return Err(ExecutionError::InsufficientProfit {
                actual_pct: opp.profit_pct,
                required_pct: self.config.profit_threshold_pct,
            });
        }
        Ok(())
    }

    async fn check_slippage(&self, opp: &Opportunity) -> Result<(), ExecutionError> {
        // catalogue membership was checked in validate
        let buy_venue = self
            .catalogue
            .venue(&opp.buy_venue)
            .ok_or_else(|| ExecutionError::Validation("buy venue vanished".into()))?;
        let sell_venue = self
            .catalogue
            .venue(&opp.sell_venue)
            .ok_or_else(|| ExecutionError::Validation("sell venue vanished".into()))?;

        let check = self
            .slippage
            .validate_arbitrage_slippage(
                buy_venue,
                sell_venue,
                &opp.token_in,
                &opp.token_out,
                opp.amount,
                self.config.max_slippage_pct,
            )
            .await;
        if !check.is_valid {
            return Err(ExecutionError::SlippageExceeded {
                total_pct: check.total_slippage_pct,
                max_pct: self.config.max_slippage_pct,
            });
        }
        Ok(())
    }

    async fn simulate(&self, opp: &Opportunity) -> Result<SimulationReport, ExecutionError> {
        let Some(contract_addr) = self.config.flashloan_contract else {
            // dry-run deployments without a contract skip on-chain simulation
            return Ok(SimulationReport {
                profit_tokens: self.expected_profit_in_borrow_units(opp),
                profit_usd: opp.profit_usd,
            });
        };

        let params = self.build_params(opp).await?;
        let contract = IFlashloanArbitrage::new(contract_addr, self.provider.clone());
        let expected: U256 = contract
            .simulate_arbitrage(params)
            .call()
            .await
            .map_err(|e| ExecutionError::Simulation(e.to_string()))?;
        if expected.is_zero() {
            return Err(ExecutionError::Simulation("zero expected profit".into()));
        }

        let token_in = self
            .catalogue
            .token(&opp.token_in)
            .ok_or_else(|| ExecutionError::Validation("unknown borrow token".into()))?;
        let profit_tokens = from_raw_units(expected, token_in.decimals)
            .ok_or_else(|| ExecutionError::Simulation("profit out of range".into()))?;
        let profit_usd = match self.oracle.token_price_usd(&opp.token_in).await {
            Some(price) => profit_tokens * price,
            None => Decimal::ZERO,
        };
        Ok(SimulationReport {
            profit_tokens,
            profit_usd,
        })
    }

    async fn execute(
        &mut self,
        opp: &Opportunity,
        report: &SimulationReport,
    ) -> Result<PipelineOutcome, ExecutionError> {
        let wallet = self
            .wallet
            .as_ref()
            .ok_or_else(|| ExecutionError::Validation("no wallet configured".into()))?;
        let contract_addr = self
            .config
            .flashloan_contract
            .ok_or_else(|| ExecutionError::Validation("no flashloan contract".into()))?;

        let gas_price_gwei = self.gas.gas_price_gwei().await;
        if gas_price_gwei > self.config.max_gas_price_gwei {
            return Err(ExecutionError::Validation(format!(
                "gas price {} gwei above ceiling {}",
                gas_price_gwei, self.config.max_gas_price_gwei
            )));
        }

        let params = self.build_params(opp).await?;
        let contract = IFlashloanArbitrage::new(contract_addr, self.provider.clone());
        let mut tx = contract.execute_arbitrage(params).tx;
        tx.set_from(wallet.address());
        tx.set_chain_id(self.config.chain_id);

        let nonce = self
            .provider
            .get_transaction_count(wallet.address(), None)
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))?;
        tx.set_nonce(nonce);

        let gas_price_wei = to_raw_units(gas_price_gwei, 9)
            .ok_or_else(|| ExecutionError::Rpc("gas price out of range".into()))?;
        tx.set_gas_price(gas_price_wei);

        let gas_limit = self
            .provider
            .estimate_gas(&tx, None)
            .await
            .map_err(|e| ExecutionError::Simulation(format!("estimateGas failed: {}", e)))?;
        tx.set_gas(gas_limit * GAS_SAFETY_NUM / GAS_SAFETY_DEN);

        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))?;
        let raw_tx = tx.rlp_signed(&signature);

        let current_block = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))?
            .as_u64();

        self.stats.executed += 1;
        let (tx_hash, channel) = self
            .submission
            .send_best_effort(&raw_tx, Some(current_block + MAX_BLOCKS_AHEAD))
            .await
            .ok_or_else(|| ExecutionError::Submission("no channel accepted".into()))?;

        info!(
            "⏳ awaiting confirmation of {:?} via {} (expected profit ${:.2})",
            tx_hash, channel, report.profit_usd
        );
        let receipt = self.wait_for_receipt(tx_hash).await?;

        let gas_used = receipt
            .gas_used
            .map(|g| g.as_u64())
            .unwrap_or_default();
        let eth_usd = self.oracle.eth_usd().await;
        let gas_usd = gas_cost_usd(gas_used, gas_price_gwei, eth_usd);

        let succeeded = receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false);
        if succeeded {
            self.breaker.record_success();
            self.stats.succeeded += 1;
            self.stats.total_profit_usd += report.profit_usd;
            self.stats.total_gas_usd += gas_usd;
            info!(
                "✅ arbitrage confirmed: {:?}, gas ${:.4}, success rate {:.1}%",
                tx_hash,
                gas_usd,
                self.stats.success_rate()
            );
            Ok(PipelineOutcome::Confirmed {
                tx_hash,
                channel,
                gas_used,
                gas_cost_usd: gas_usd,
                profit_usd: report.profit_usd,
            })
        } else {
            self.breaker.record_failure("reverted");
            self.stats.failed += 1;
            self.stats.total_gas_usd += gas_usd;
            warn!("❌ arbitrage reverted on chain: {:?}", tx_hash);
            Ok(PipelineOutcome::Reverted { tx_hash })
        }
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<ethers::types::TransactionReceipt, ExecutionError> {
        let deadline = Duration::from_secs(self.config.confirmation_timeout_secs);
        let poll = Duration::from_secs(RECEIPT_POLL_SECS);
        let started = std::time::Instant::now();
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) => warn!("receipt poll failed: {}", e),
            }
            if started.elapsed() >= deadline {
                return Err(ExecutionError::Rpc(format!(
                    "confirmation of {:?} timed out after {}s",
                    tx_hash,
                    deadline.as_secs()
                )));
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Expected profit translated into borrow-token units at the buy rate.
    fn expected_profit_in_borrow_units(&self, opp: &Opportunity) -> Decimal {
        if opp.buy_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        opp.gross_profit_tokens * opp.amount / opp.buy_price
    }

    async fn build_params(&self, opp: &Opportunity) -> Result<ArbitrageParams, ExecutionError> {
        let token_in = self
            .catalogue
            .token(&opp.token_in)
            .ok_or_else(|| ExecutionError::Validation("unknown borrow token".into()))?;
        let token_out = self
            .catalogue
            .token(&opp.token_out)
            .ok_or_else(|| ExecutionError::Validation("unknown target token".into()))?;
        let buy_venue = self
            .catalogue
            .venue(&opp.buy_venue)
            .ok_or_else(|| ExecutionError::Validation("unknown buy venue".into()))?;
        let sell_venue = self
            .catalogue
            .venue(&opp.sell_venue)
            .ok_or_else(|| ExecutionError::Validation("unknown sell venue".into()))?;

        let amount = to_raw_units(opp.amount, token_in.decimals)
            .ok_or_else(|| ExecutionError::Validation("amount out of range".into()))?;
        let min_profit = to_raw_units(
            self.expected_profit_in_borrow_units(opp) * MIN_PROFIT_FRACTION,
            token_in.decimals,
        )
        .ok_or_else(|| ExecutionError::Validation("min profit out of range".into()))?;

        let latest = self
            .provider
            .get_block(BlockNumber::Latest)
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))?
            .ok_or_else(|| ExecutionError::Rpc("no latest block".into()))?;
        let deadline = latest.timestamp + U256::from(FLASHLOAN_DEADLINE_SECS);

        let slippage_bps = (self.config.max_slippage_pct * Decimal::from(100))
            .trunc()
            .to_string()
            .parse::<u64>()
            .map_err(|_| ExecutionError::Validation("slippage out of range".into()))?;

        Ok(ArbitrageParams {
            token_borrow: token_in.address,
            amount,
            token_target: token_out.address,
            buy_router: buy_venue.router,
            sell_router: sell_venue.router,
            min_profit,
            deadline,
            slippage_bps: U256::from(slippage_bps),
        })
    }

    fn record_outcome(&self, opp: &Opportunity, outcome: &PipelineOutcome) {
        let (tx_hash, profit_usd, gas_usd, error) = match outcome {
            PipelineOutcome::Confirmed {
                tx_hash,
                gas_cost_usd,
                profit_usd,
                ..
            } => (Some(format!("{:?}", tx_hash)), *profit_usd, *gas_cost_usd, None),
            PipelineOutcome::Reverted { tx_hash } => (
                Some(format!("{:?}", tx_hash)),
                Decimal::ZERO,
                Decimal::ZERO,
                Some("reverted".to_string()),
            ),
            PipelineOutcome::DryRun { report } => {
                (None, report.profit_usd, Decimal::ZERO, None)
            }
            PipelineOutcome::Rejected(e) => {
                (None, Decimal::ZERO, Decimal::ZERO, Some(e.to_string()))
            }
            PipelineOutcome::BreakerOpen { remaining_secs } => (
                None,
                Decimal::ZERO,
                Decimal::ZERO,
                Some(format!("breaker open, {}s remaining", remaining_secs)),
            ),
        };

        let record = ExecutionRecord {
            timestamp: unix_now(),
            token_in: opp.token_in.clone(),
            token_out: opp.token_out.clone(),
            buy_venue: opp.buy_venue.clone(),
            sell_venue: opp.sell_venue.clone(),
            status: outcome.status_label().to_string(),
            tx_hash,
            profit_usd,
            gas_cost_usd: gas_usd,
            error,
        };

        if let Some(history) = &self.history {
            if let Err(e) = history.log_execution(&record) {
                warn!("history sink write failed: {}", e);
            }
        }

        if self.notifier.is_enabled() && !matches!(outcome, PipelineOutcome::Rejected(_)) {
            let notifier = self.notifier.clone();
            tokio::spawn(async move {
                notifier.notify_execution(&record).await;
            });
        }
    }
}
