//! Typed error taxonomy for the execution pipeline.
//!
//! Every rejection and failure the pipeline can produce is one of these
//! variants, so callers (stats, breaker, notifications) can branch on the
//! category instead of parsing strings.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Opportunity failed structural validation (unknown venue/token,
    /// non-positive amount).
    #[error("invalid opportunity: {0}")]
    Validation(String),

    /// Net profit below the configured threshold.
    #[error("profit {actual_pct}% below required {required_pct}%")]
    InsufficientProfit {
        actual_pct: Decimal,
        required_pct: Decimal,
    },

    /// Combined two-leg slippage above the configured maximum, or a leg's
    /// pool state could not be resolved (fails closed).
    #[error("total slippage {total_pct}% exceeds maximum {max_pct}%")]
    SlippageExceeded {
        total_pct: Decimal,
        max_pct: Decimal,
    },

    /// On-chain read-only simulation reverted or reported a loss.
    #[error("simulation failed: {0}")]
    Simulation(String),

    /// Every submission channel declined or errored.
    #[error("all submission channels failed: {0}")]
    Submission(String),

    /// Circuit breaker is open; the pipeline refused to run.
    #[error("circuit breaker open, {remaining_secs}s cooldown remaining")]
    BreakerOpen { remaining_secs: u64 },

    /// Transport-level RPC failure outside the stages above.
    #[error("rpc failure: {0}")]
    Rpc(String),
}

impl ExecutionError {
    /// Whether this failure counts toward the circuit breaker window.
    /// A short-circuited attempt (breaker already open) must not re-feed
    /// the breaker, and thin-margin rejections are business-as-usual.
    /// Slippage does count: it also covers legs whose pool state fails
    /// closed, and a persistent run of those should trip the breaker
    /// instead of looping forever.
    pub fn counts_as_breaker_failure(&self) -> bool {
        match self {
            ExecutionError::BreakerOpen { .. } => false,
            ExecutionError::InsufficientProfit { .. } => false,
            ExecutionError::Validation(_) => false,
            ExecutionError::SlippageExceeded { .. } => true,
            ExecutionError::Simulation(_) => true,
            ExecutionError::Submission(_) => true,
            ExecutionError::Rpc(_) => true,
        }
    }

    /// Short machine-readable tag for records and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            ExecutionError::Validation(_) => "validation",
            ExecutionError::InsufficientProfit { .. } => "insufficient_profit",
            ExecutionError::SlippageExceeded { .. } => "slippage_exceeded",
            ExecutionError::Simulation(_) => "simulation_failed",
            ExecutionError::Submission(_) => "submission_failed",
            ExecutionError::BreakerOpen { .. } => "breaker_open",
            ExecutionError::Rpc(_) => "rpc_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_breaker_counting_rules() {
        assert!(!ExecutionError::BreakerOpen { remaining_secs: 10 }.counts_as_breaker_failure());
        assert!(!ExecutionError::InsufficientProfit {
            actual_pct: dec!(0.1),
            required_pct: dec!(0.5)
        }
        .counts_as_breaker_failure());
        assert!(ExecutionError::SlippageExceeded {
            total_pct: dec!(1.2),
            max_pct: dec!(0.5)
        }
        .counts_as_breaker_failure());
        assert!(ExecutionError::Simulation("revert".into()).counts_as_breaker_failure());
        assert!(ExecutionError::Submission("no channel".into()).counts_as_breaker_failure());
    }

    #[test]
    fn test_repeated_slippage_rejections_trip_the_breaker() {
        use crate::execution::CircuitBreaker;

        let mut cb = CircuitBreaker::new(5, 300, 600);
        for i in 0..5 {
            let e = ExecutionError::SlippageExceeded {
                total_pct: dec!(1.2),
                max_pct: dec!(0.5),
            };
            assert!(e.counts_as_breaker_failure());
            cb.record_failure_at(1000 + i, e.tag());
        }
        assert!(cb.is_tripped_at(1004));
    }

    #[test]
    fn test_error_display() {
        let e = ExecutionError::SlippageExceeded {
            total_pct: dec!(1.2),
            max_pct: dec!(0.5),
        };
        assert_eq!(e.to_string(), "total slippage 1.2% exceeds maximum 0.5%");
        assert_eq!(e.tag(), "slippage_exceeded");
    }
}
