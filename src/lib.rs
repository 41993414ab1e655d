//! Flashloan DEX arbitrage bot: cross-venue price discrepancy detection
//! and guarded execution on a single chain.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

pub mod config;
pub mod contracts;
pub mod error;
pub mod execution;
pub mod notify;
pub mod prices;
pub mod quotes;
pub mod ratelimit;
pub mod routing;
pub mod scanner;
pub mod slippage;
pub mod storage;
pub mod submission;
pub mod types;

pub use config::{AppConfig, Catalogue};
pub use error::ExecutionError;
pub use execution::{CircuitBreaker, ExecutionPipeline, PipelineOutcome};
pub use scanner::Scanner;
pub use types::{DexKind, Opportunity, Quote, Route, Token, Venue};
