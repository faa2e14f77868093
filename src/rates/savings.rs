use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::loan::Loan;
use crate::rates::bonification::Bonification;
use crate::schedule::annuity;
use crate::schedule::builder::build_schedule;
use crate::schedule::plan::PaymentPlan;
use crate::types::BonificationId;

/// share of the monthly saving attributable to one bonification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonificationSaving {
    pub bonification_id: BonificationId,
    pub name: String,
    pub rate_reduction_points: Rate,
    pub share: Decimal,
    pub savings_per_month: Money,
    pub savings_per_year: Money,
    pub annual_cost: Money,
    /// yearly saving minus what the linked product costs
    pub net_annual_benefit: Money,
}

/// installment with and without bonifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsBreakdown {
    pub base_payment: Money,
    pub bonified_payment: Money,
    pub base_rate: Rate,
    pub bonified_rate: Rate,
    pub discount: Rate,
    pub remaining_months: u32,
    pub per_bonification: Vec<BonificationSaving>,
    pub total_savings_per_month: Money,
    pub total_savings_per_year: Money,
}

/// savings of the discount in force when the outstanding principal was last
/// set: at signing, or at the latest applied prepayment
pub fn calculate_bonification_savings(loan: &Loan) -> Result<SavingsBreakdown> {
    let config = EngineConfig::default();
    let plan = build_schedule(loan, &config)?;
    let as_of = loan
        .prepayments
        .iter()
        .map(|p| p.date)
        .max()
        .unwrap_or(loan.signing_date);
    let period_start = plan.next_after(as_of).map_or(as_of, |p| p.accrual_start);

    let counted = loan
        .bonifications
        .counted_on(period_start, config.bonification_change);
    savings_for(loan, &plan, as_of, &counted)
}

/// savings of `counted` bonifications over the periods of `plan` charged after
/// `as_of`, on the principal outstanding at that date
pub fn savings_for(
    loan: &Loan,
    plan: &PaymentPlan,
    as_of: NaiveDate,
    counted: &[&Bonification],
) -> Result<SavingsBreakdown> {
    let remaining = plan.remaining_after(as_of);
    let principal = plan.outstanding_after(as_of);
    let remaining_months = remaining.len() as u32;
    let period_index = remaining.first().map_or(loan.total_term_months, |p| p.index);
    let base_rate = loan.rate.base_rate(period_index)?;

    let raw: Rate = counted.iter().map(|b| b.rate_reduction_points).sum();
    let cap = loan.bonifications.max_bonification_rate.max(Rate::ZERO);
    let discount = raw.min(cap).max(Rate::ZERO);
    let bonified_rate = (base_rate - discount).max(Rate::ZERO);

    let base_payment = annuity::installment(principal, base_rate, remaining_months);
    let bonified_payment = annuity::installment(principal, bonified_rate, remaining_months);
    let total_savings_per_month = (base_payment - bonified_payment).max(Money::ZERO);
    let total_savings_per_year = total_savings_per_month * Decimal::from(12);

    let per_bonification = counted
        .iter()
        .map(|b| {
            let share = if raw.is_zero() {
                Decimal::ZERO
            } else {
                b.rate_reduction_points.as_decimal() / raw.as_decimal()
            };
            let savings_per_month = total_savings_per_month * share;
            let savings_per_year = total_savings_per_year * share;
            BonificationSaving {
                bonification_id: b.id,
                name: b.name.clone(),
                rate_reduction_points: b.rate_reduction_points,
                share,
                savings_per_month,
                savings_per_year,
                annual_cost: b.annual_cost,
                net_annual_benefit: savings_per_year - b.annual_cost,
            }
        })
        .collect();

    Ok(SavingsBreakdown {
        base_payment,
        bonified_payment,
        base_rate,
        bonified_rate,
        discount,
        remaining_months,
        per_bonification,
        total_savings_per_month,
        total_savings_per_year,
    })
}
