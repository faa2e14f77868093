pub mod config;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod loan;
pub mod prepayment;
pub mod rates;
pub mod schedule;
pub mod store;
pub mod types;
pub mod views;

// re-export key types
pub use config::{BonificationChangePolicy, DeferredInterestPolicy, EngineConfig};
pub use decimal::{Money, Rate};
pub use engine::LoanEngine;
pub use errors::{EngineError, Result};
pub use events::{Event, EventStore};
pub use loan::{BillingTerms, CostTerms, IrregularPayments, Loan, LoanBuilder, PrepaymentRecord};
pub use prepayment::{apply, simulate, AppliedPrepayment, SimulationResult};
pub use rates::{
    apply_assessments, calculate_bonification_savings, evaluate_bonifications, resolve_rate, AlertKind,
    Bonification, BonificationAlert, BonificationAssessment, BonificationRule, BonificationSaving,
    BonificationTerms, CardActivity, ComplianceObservation, ComplianceSource, EvaluationResult, RateConfig,
    RateResolver, SavingsBreakdown, StaticComplianceSource, VariableTerms,
};
pub use schedule::{build_schedule, PaymentPeriod, PaymentPlan};
pub use store::{InMemoryLoanStore, LoanStore};
pub use types::{BonificationId, BonificationStatus, LoanId, Phase, Recalculation, ReductionMode};
pub use views::LoanView;

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
