use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::EngineError;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for a bonification
pub type BonificationId = Uuid;

/// compliance status of a bonification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BonificationStatus {
    /// not yet evaluated
    #[default]
    Pending,
    /// compliant over the lookback window
    Met,
    /// currently non-compliant, evaluation not reached yet
    AtRisk,
    /// evaluation passed without compliance
    Lost,
}

/// what a prepayment reduces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReductionMode {
    /// keep the installment, shorten the remaining term
    ReduceTerm,
    /// keep the remaining term, lower the installment
    ReducePayment,
}

impl fmt::Display for ReductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionMode::ReduceTerm => write!(f, "reduce_term"),
            ReductionMode::ReducePayment => write!(f, "reduce_payment"),
        }
    }
}

impl FromStr for ReductionMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reduce_term" | "plazo" => Ok(ReductionMode::ReduceTerm),
            "reduce_payment" | "cuota" => Ok(ReductionMode::ReducePayment),
            other => Err(EngineError::validation(
                "mode",
                format!("unknown reduction mode '{}'", other),
            )),
        }
    }
}

/// repayment phase a period belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// no charge, interest capitalized or forgiven
    Deferred,
    /// installment equals accrued interest
    InterestOnly,
    /// french annuity
    Amortizing,
}

/// why an installment was recomputed at a given period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recalculation {
    /// first amortizing period
    PhaseStart,
    /// review boundary or bonification change moved the rate
    RateChange,
    /// an applied prepayment lowered the principal
    Prepayment,
}
