//! Append-only JSONL history sink.
//!
//! One record per line, annual files: opportunities_YYYY.jsonl and
//! executions_YYYY.jsonl. Durable storage proper (a relational store)
//! lives outside this process; these files are the hand-off format.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use crate::types::{ExecutionRecord, Opportunity};
use anyhow::{Context, Result};
use chrono::Datelike;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct HistorySink {
    base_dir: PathBuf,
}

impl HistorySink {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("failed to create history directory {:?}", base_dir))?;
        Ok(Self { base_dir })
    }

    fn file_path(&self, prefix: &str) -> PathBuf {
        let year = chrono::Utc::now().year();
        self.base_dir.join(format!("{}_{}.jsonl", prefix, year))
    }

    fn append<T: Serialize>(&self, prefix: &str, record: &T) -> Result<()> {
        let path = self.file_path(prefix);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open history file {:?}", path))?;
        let json = serde_json::to_string(record).context("failed to serialize history record")?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    pub fn log_opportunity(&self, opp: &Opportunity) -> Result<()> {
        self.append("opportunities", opp)
    }

    pub fn log_execution(&self, record: &ExecutionRecord) -> Result<()> {
        self.append("executions", record)
    }

    pub fn opportunities_path(&self) -> PathBuf {
        self.file_path("opportunities")
    }

    pub fn executions_path(&self) -> PathBuf {
        self.file_path("executions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Route;
    use rust_decimal_macros::dec;
    use std::env;
    use std::io::BufRead;

    fn sample_opportunity() -> Opportunity {
        Opportunity {
            timestamp: 1_700_000_000,
            token_in: "WETH".into(),
            token_out: "USDC".into(),
            buy_venue: "syncswap".into(),
            sell_venue: "zebra".into(),
            buy_route: Route::direct("WETH", "USDC").unwrap(),
            sell_route: Route::direct("USDC", "WETH").unwrap(),
            buy_price: dec!(3465),
            sell_price: dec!(3520),
            amount: dec!(1),
            gross_profit_tokens: dec!(55),
            profit_pct: dec!(1.5),
            profit_usd: dec!(52),
            gas_estimate: 330_000,
            gas_cost_usd: dec!(0.02),
            flashloan_fee_usd: dec!(3.15),
        }
    }

    #[test]
    fn test_appends_one_line_per_record() {
        let dir = env::temp_dir().join("flasharb_history_test");
        let _ = fs::remove_dir_all(&dir);
        let sink = HistorySink::new(&dir).unwrap();

        sink.log_opportunity(&sample_opportunity()).unwrap();
        sink.log_opportunity(&sample_opportunity()).unwrap();

        let file = fs::File::open(sink.opportunities_path()).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed["buy_venue"], "syncswap");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_execution_records_go_to_their_own_file() {
        let dir = env::temp_dir().join("flasharb_history_exec_test");
        let _ = fs::remove_dir_all(&dir);
        let sink = HistorySink::new(&dir).unwrap();

        let record = ExecutionRecord {
            timestamp: 1_700_000_000,
            token_in: "WETH".into(),
            token_out: "USDC".into(),
            buy_venue: "syncswap".into(),
            sell_venue: "zebra".into(),
            status: "dry_run".into(),
            tx_hash: None,
            profit_usd: dec!(12),
            gas_cost_usd: dec!(0.02),
            error: None,
        };
        sink.log_execution(&record).unwrap();
        assert!(sink.executions_path().exists());
        assert!(!sink.opportunities_path().exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
