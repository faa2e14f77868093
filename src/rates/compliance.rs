use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::rates::bonification::Bonification;
use crate::types::BonificationId;

/// card activity for one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardActivity {
    pub transactions: u32,
    pub amount: Money,
}

/// already-computed compliance facts for one bonification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComplianceObservation {
    /// monthly deposit totals, oldest first
    MonthlyDeposits(Vec<Money>),
    /// monthly card usage, oldest first
    CardActivity(Vec<CardActivity>),
    /// whether the linked product is currently held
    ProductActive(bool),
}

/// supplies compliance facts gathered from account and transaction data
pub trait ComplianceSource {
    fn observe(&self, bonification: &Bonification, as_of: NaiveDate) -> Option<ComplianceObservation>;
}

/// compliance facts held in memory, keyed by bonification
#[derive(Debug, Clone, Default)]
pub struct StaticComplianceSource {
    observations: HashMap<BonificationId, ComplianceObservation>,
}

impl StaticComplianceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: BonificationId, observation: ComplianceObservation) -> Self {
        self.observations.insert(id, observation);
        self
    }

    pub fn insert(&mut self, id: BonificationId, observation: ComplianceObservation) {
        self.observations.insert(id, observation);
    }
}

impl ComplianceSource for StaticComplianceSource {
    fn observe(&self, bonification: &Bonification, _as_of: NaiveDate) -> Option<ComplianceObservation> {
        self.observations.get(&bonification.id).cloned()
    }
}
