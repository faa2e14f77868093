use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::types::{LoanId, Phase, Recalculation};

/// one billing period of a payment plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPeriod {
    pub index: u32,
    /// YYYY-MM of the charge month
    pub label: String,
    pub accrual_start: NaiveDate,
    pub accrual_end: NaiveDate,
    pub accrual_days: u32,
    pub charge_date: NaiveDate,
    pub annual_rate: Rate,
    pub phase: Phase,
    pub opening_principal: Money,
    pub installment: Money,
    pub interest_component: Money,
    pub principal_component: Money,
    /// interest added to principal instead of charged
    pub capitalized_interest: Money,
    pub ending_principal: Money,
    pub is_prorated: bool,
    pub is_interest_only: bool,
    pub is_deferred: bool,
    pub recalculation: Option<Recalculation>,
}

/// derived projection of a loan's payments; regenerated, never edited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPlan {
    loan_id: LoanId,
    periods: Vec<PaymentPeriod>,
    total_interest: Money,
    final_payoff_date: Option<NaiveDate>,
}

impl PaymentPlan {
    pub(crate) fn new(loan_id: LoanId, periods: Vec<PaymentPeriod>) -> Self {
        let total_interest = periods
            .iter()
            .map(|p| p.interest_component + p.capitalized_interest)
            .sum();
        let final_payoff_date = periods.last().map(|p| p.charge_date);

        Self {
            loan_id,
            periods,
            total_interest,
            final_payoff_date,
        }
    }

    pub fn loan_id(&self) -> LoanId {
        self.loan_id
    }

    pub fn periods(&self) -> &[PaymentPeriod] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn period(&self, index: u32) -> Option<&PaymentPeriod> {
        self.periods.iter().find(|p| p.index == index)
    }

    /// first period charged strictly after `date`
    pub fn next_after(&self, date: NaiveDate) -> Option<&PaymentPeriod> {
        self.periods.iter().find(|p| p.charge_date > date)
    }

    /// periods charged strictly after `date`
    pub fn remaining_after(&self, date: NaiveDate) -> &[PaymentPeriod] {
        let start = self
            .periods
            .iter()
            .position(|p| p.charge_date > date)
            .unwrap_or(self.periods.len());
        &self.periods[start..]
    }

    /// principal owed once every charge up to `date` is paid
    pub fn outstanding_after(&self, date: NaiveDate) -> Money {
        match self.next_after(date) {
            Some(period) => period.opening_principal,
            None => Money::ZERO,
        }
    }

    pub fn total_interest(&self) -> Money {
        self.total_interest
    }

    pub fn total_principal(&self) -> Money {
        self.periods.iter().map(|p| p.principal_component).sum()
    }

    pub fn total_paid(&self) -> Money {
        self.periods.iter().map(|p| p.installment).sum()
    }

    pub fn final_payoff_date(&self) -> Option<NaiveDate> {
        self.final_payoff_date
    }

    pub fn json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
