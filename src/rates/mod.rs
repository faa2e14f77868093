pub mod bonification;
pub mod compliance;
pub mod evaluator;
pub mod resolver;
pub mod savings;

pub use bonification::{Bonification, BonificationRule, BonificationTerms};
pub use compliance::{CardActivity, ComplianceObservation, ComplianceSource, StaticComplianceSource};
pub use evaluator::{
    apply_assessments, evaluate_bonifications, AlertKind, BonificationAlert, BonificationAssessment,
    EvaluationResult,
};
pub use resolver::{resolve_rate, RateConfig, RateResolver, VariableTerms};
pub use savings::{calculate_bonification_savings, BonificationSaving, SavingsBreakdown};
