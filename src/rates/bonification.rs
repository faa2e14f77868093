use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BonificationChangePolicy;
use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::rates::compliance::ComplianceObservation;
use crate::types::{BonificationId, BonificationStatus};

/// what the lender requires to keep a bonification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BonificationRule {
    PayrollDeposit { minimum_monthly_amount: Money },
    CardUsage { minimum_transactions: u32, minimum_amount: Money },
    HomeInsurance { active: bool },
    LifeInsurance { active: bool },
    PensionPlan { active: bool },
    AlarmService { active: bool },
    Other { description: String },
}

impl BonificationRule {
    pub fn label(&self) -> &str {
        match self {
            BonificationRule::PayrollDeposit { .. } => "payroll deposit",
            BonificationRule::CardUsage { .. } => "card usage",
            BonificationRule::HomeInsurance { .. } => "home insurance",
            BonificationRule::LifeInsurance { .. } => "life insurance",
            BonificationRule::PensionPlan { .. } => "pension plan",
            BonificationRule::AlarmService { .. } => "alarm service",
            BonificationRule::Other { description } => description,
        }
    }

    /// observation implied by the rule itself when no external signal exists
    pub fn fallback_observation(&self) -> Option<ComplianceObservation> {
        match self {
            BonificationRule::HomeInsurance { active }
            | BonificationRule::LifeInsurance { active }
            | BonificationRule::PensionPlan { active }
            | BonificationRule::AlarmService { active } => {
                Some(ComplianceObservation::ProductActive(*active))
            }
            _ => None,
        }
    }

    /// whether the observation satisfies the rule over the last `lookback_months`
    pub fn is_satisfied(&self, observation: &ComplianceObservation, lookback_months: u32) -> Result<bool> {
        let window = lookback_months.max(1) as usize;

        match (self, observation) {
            (
                BonificationRule::PayrollDeposit {
                    minimum_monthly_amount,
                },
                ComplianceObservation::MonthlyDeposits(deposits),
            ) => Ok(deposits.len() >= window
                && deposits[deposits.len() - window..]
                    .iter()
                    .all(|amount| amount >= minimum_monthly_amount)),
            (
                BonificationRule::CardUsage {
                    minimum_transactions,
                    minimum_amount,
                },
                ComplianceObservation::CardActivity(months),
            ) => Ok(months.len() >= window
                && months[months.len() - window..].iter().all(|month| {
                    month.transactions >= *minimum_transactions && month.amount >= *minimum_amount
                })),
            (
                BonificationRule::HomeInsurance { .. }
                | BonificationRule::LifeInsurance { .. }
                | BonificationRule::PensionPlan { .. }
                | BonificationRule::AlarmService { .. }
                | BonificationRule::Other { .. },
                ComplianceObservation::ProductActive(active),
            ) => Ok(*active),
            (rule, _) => Err(EngineError::validation(
                "compliance",
                format!("observation does not match a {} rule", rule.label()),
            )),
        }
    }
}

/// one status change of a bonification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// review that decided the change
    pub decided_on: NaiveDate,
    /// first accrual date the change governs; None reaches every period
    pub effective_from: Option<NaiveDate>,
    pub from: BonificationStatus,
    pub to: BonificationStatus,
}

/// contractual rate discount conditioned on banking products
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bonification {
    pub id: BonificationId,
    pub name: String,
    /// percentage-point discount as a fraction, 0.003 = 0.30pp
    pub rate_reduction_points: Rate,
    pub lookback_months: u32,
    pub rule: BonificationRule,
    pub annual_cost: Money,
    pub status: BonificationStatus,
    /// changes in the order they were decided
    #[serde(default)]
    pub history: Vec<StatusChange>,
}

impl Bonification {
    pub fn new(name: impl Into<String>, rate_reduction_points: Rate, rule: BonificationRule) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            rate_reduction_points,
            lookback_months: 1,
            rule,
            annual_cost: Money::ZERO,
            status: BonificationStatus::Pending,
            history: Vec::new(),
        }
    }

    pub fn with_lookback(mut self, months: u32) -> Self {
        self.lookback_months = months;
        self
    }

    pub fn with_annual_cost(mut self, cost: Money) -> Self {
        self.annual_cost = cost;
        self
    }

    pub fn with_status(mut self, status: BonificationStatus) -> Self {
        self.status = status;
        self
    }

    /// status governing a period that starts on `date`
    pub fn status_on(&self, date: NaiveDate, policy: BonificationChangePolicy) -> BonificationStatus {
        if policy == BonificationChangePolicy::Retroactive {
            return self.status;
        }
        // later decisions win over earlier ones
        match self
            .history
            .iter()
            .rev()
            .find(|change| change.effective_from.map_or(true, |from| from <= date))
        {
            Some(change) => change.to,
            None => self.history.first().map_or(self.status, |change| change.from),
        }
    }

    /// effective date of the latest change
    pub fn status_since(&self) -> Option<NaiveDate> {
        self.history.last().and_then(|change| change.effective_from)
    }

    /// date of the review that set the current status
    pub fn last_decided_on(&self) -> Option<NaiveDate> {
        self.history.last().map(|change| change.decided_on)
    }

    /// record a status change decided on `decided_on`, taking effect on `effective_from`
    pub fn transition(&mut self, status: BonificationStatus, decided_on: NaiveDate, effective_from: Option<NaiveDate>) {
        if status == self.status {
            return;
        }
        self.history.push(StatusChange {
            decided_on,
            effective_from,
            from: self.status,
            to: status,
        });
        self.status = status;
    }
}

/// bonification package attached to a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonificationTerms {
    pub items: Vec<Bonification>,
    /// cap on the combined discount
    pub max_bonification_rate: Rate,
    /// months between evaluations after the first one
    pub review_period_months: u32,
    /// every configured bonification applies up to this date
    pub max_bonification_end_date: Option<NaiveDate>,
    pub period_end_date: Option<NaiveDate>,
    pub evaluation_date: Option<NaiveDate>,
    pub evaluation_offset_days: u32,
}

impl Default for BonificationTerms {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            max_bonification_rate: Rate::ZERO,
            review_period_months: 12,
            max_bonification_end_date: None,
            period_end_date: None,
            evaluation_date: None,
            evaluation_offset_days: 0,
        }
    }
}

impl BonificationTerms {
    pub fn is_guaranteed(&self, date: NaiveDate) -> bool {
        self.max_bonification_end_date.map_or(false, |end| date <= end)
    }

    /// explicit evaluation date, else `evaluation_offset_days` before the period end
    pub fn effective_evaluation_date(&self) -> Option<NaiveDate> {
        self.evaluation_date.or_else(|| {
            self.period_end_date
                .map(|end| end - Duration::days(self.evaluation_offset_days as i64))
        })
    }

    /// latest evaluation on or before `date` and the evaluation on or after it;
    /// evaluations repeat every `review_period_months` from the first one
    pub fn evaluation_checkpoints(&self, date: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        let Some(first) = self.effective_evaluation_date() else {
            return (None, None);
        };
        if date < first {
            return (None, Some(first));
        }
        if self.review_period_months == 0 {
            return (Some(first), (date == first).then_some(first));
        }

        let checkpoint = |k: u32| first.checked_add_months(Months::new(k * self.review_period_months));
        let mut passed = first;
        let mut k = 1;
        loop {
            match checkpoint(k) {
                Some(next) if next <= date => {
                    passed = next;
                    k += 1;
                }
                next => {
                    let upcoming = if passed == date { Some(passed) } else { next };
                    return (Some(passed), upcoming);
                }
            }
        }
    }

    /// bonifications counted towards the discount of a period starting on `date`
    pub fn counted_on(&self, date: NaiveDate, policy: BonificationChangePolicy) -> Vec<&Bonification> {
        if self.is_guaranteed(date) {
            return self.items.iter().collect();
        }
        self.items
            .iter()
            .filter(|b| b.status_on(date, policy) == BonificationStatus::Met)
            .collect()
    }

    /// unclamped discount for a period starting on `date`
    pub fn raw_discount_on(&self, date: NaiveDate, policy: BonificationChangePolicy) -> Rate {
        self.counted_on(date, policy)
            .iter()
            .map(|b| b.rate_reduction_points)
            .sum()
    }

    /// sum of every configured discount
    pub fn configured_points(&self) -> Rate {
        self.items.iter().map(|b| b.rate_reduction_points).sum()
    }

    pub fn find(&self, id: BonificationId) -> Option<&Bonification> {
        self.items.iter().find(|b| b.id == id)
    }
}
