//! Flashloan DEX Arbitrage Bot
//!
//! Scans constant-product and concentrated-liquidity venues for price
//! discrepancies, validates candidates through the slippage model and
//! on-chain simulation, and executes profitable flashloan arbitrages
//! through MEV-aware submission channels.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use anyhow::{Context, Result};
use clap::Parser;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use flasharb_bot::config::{load_config, Catalogue};
use flasharb_bot::execution::{ExecutionPipeline, PipelineOutcome};
use flasharb_bot::notify::Notifier;
use flasharb_bot::prices::{EthPriceFetcher, GasPriceFetcher, PriceOracle};
use flasharb_bot::quotes::QuoteEngine;
use flasharb_bot::scanner::Scanner;
use flasharb_bot::slippage::SlippageModel;
use flasharb_bot::storage::HistorySink;
use flasharb_bot::submission::SubmissionRouter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flasharb-bot", about = "Cross-venue flashloan arbitrage bot")]
struct Args {
    /// Path to the venue/token catalogue JSON (overrides CATALOGUE_FILE)
    #[arg(long)]
    catalogue: Option<String>,

    /// Force live execution even if DRY_RUN=true in the environment
    #[arg(long)]
    live: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = load_config()?;
    if let Some(path) = args.catalogue {
        config.catalogue_file = path;
    }
    if args.live {
        config.dry_run = false;
        if config.private_key.is_none() || config.flashloan_contract.is_none() {
            anyhow::bail!("--live requires PRIVATE_KEY and FLASHLOAN_CONTRACT");
        }
    }
    let config = Arc::new(config);

    info!("🤖 flasharb-bot starting");
    info!("   chain id: {}", config.chain_id);
    info!("   mode: {}", if config.dry_run { "DRY RUN" } else { "LIVE" });
    info!("   profit threshold: {}%", config.profit_threshold_pct);
    info!("   max slippage: {}%", config.max_slippage_pct);
    info!("   scan interval: {}s", config.scan_interval_secs);

    let catalogue = Arc::new(
        Catalogue::load(&config.catalogue_file)
            .with_context(|| format!("loading catalogue {}", config.catalogue_file))?,
    );
    info!(
        "   catalogue: {} venues, {} tokens",
        catalogue.venues().count(),
        catalogue.token_symbols().len()
    );

    let provider = Arc::new(
        Provider::<Http>::try_from(config.rpc_url.as_str()).context("invalid RPC_URL")?,
    );
    let block = provider
        .get_block_number()
        .await
        .context("RPC endpoint unreachable")?;
    info!("   connected, latest block {}", block);

    let wallet = match &config.private_key {
        Some(key) => {
            let wallet: LocalWallet = key.parse().context("invalid PRIVATE_KEY")?;
            let wallet = wallet.with_chain_id(config.chain_id);
            info!("   wallet: {:?}", wallet.address());
            Some(wallet)
        }
        None => None,
    };

    let rpc_timeout = Duration::from_secs(config.rpc_timeout_secs);
    let quotes = Arc::new(QuoteEngine::new(
        provider.clone(),
        catalogue.clone(),
        rpc_timeout,
    ));
    let slippage = Arc::new(SlippageModel::new(
        provider.clone(),
        catalogue.clone(),
        rpc_timeout,
    ));
    let gas = Arc::new(GasPriceFetcher::new(provider.clone(), rpc_timeout));
    let oracle = Arc::new(PriceOracle::new(EthPriceFetcher::new(
        provider.clone(),
        catalogue.clone(),
        slippage.clone(),
        rpc_timeout,
    )));
    let submission = Arc::new(SubmissionRouter::from_config(&config, provider.clone())?);
    if !config.dry_run && !submission.has_private_channel() {
        warn!("⚠️ live mode without a private submission channel, transactions will be public");
    }

    let notifier = Arc::new(Notifier::new(
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
        config.discord_webhook.clone(),
    ));
    let history = if config.history_enabled {
        Some(Arc::new(HistorySink::new(&config.history_dir)?))
    } else {
        None
    };

    let mut scanner = Scanner::new(
        config.clone(),
        catalogue.clone(),
        quotes,
        gas.clone(),
        oracle.clone(),
        notifier.clone(),
        history.clone(),
    );
    let mut pipeline = ExecutionPipeline::new(
        provider,
        wallet,
        config.clone(),
        catalogue,
        slippage,
        gas,
        oracle,
        submission,
        notifier.clone(),
        history,
    );

    if notifier.is_enabled() {
        notifier
            .notify_status(&format!(
                "flasharb-bot started ({})",
                if config.dry_run { "dry run" } else { "live" }
            ))
            .await;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.scan_interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!("🔍 scan loop running");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let found = match scanner.scan_tick().await {
                    Ok(found) => found,
                    Err(e) => {
                        error!("scan tick failed: {}", e);
                        continue;
                    }
                };
                for opp in &found {
                    let outcome = pipeline.process(opp).await;
                    match &outcome {
                        PipelineOutcome::Confirmed { tx_hash, profit_usd, .. } => {
                            info!("✅ executed {:?} for ${:.2}", tx_hash, profit_usd);
                        }
                        PipelineOutcome::Reverted { tx_hash } => {
                            warn!("❌ reverted {:?}", tx_hash);
                        }
                        PipelineOutcome::DryRun { .. } => {}
                        PipelineOutcome::Rejected(e) => {
                            info!("⏭️  rejected {}: {}", opp.pair_label(), e);
                        }
                        PipelineOutcome::BreakerOpen { .. } => {
                            // breaker applies to every queued opportunity
                            break;
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 shutdown requested");
                break;
            }
        }
    }

    let stats = pipeline.stats();
    info!(
        "final stats: {} evaluated, {} executed, {} succeeded, {} failed, net ${:.2}",
        stats.evaluated,
        stats.executed,
        stats.succeeded,
        stats.failed,
        stats.net_profit_usd()
    );
    if notifier.is_enabled() {
        notifier.notify_status("flasharb-bot stopped").await;
    }
    Ok(())
}
