//! serializable views of a loan and its plan

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::loan::Loan;
use crate::schedule::plan::PaymentPlan;
use crate::types::{BonificationId, BonificationStatus, LoanId};

/// loan summary as of a given date
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub name: String,
    pub property_id: Option<String>,
    pub as_of: NaiveDate,
    pub financial: FinancialView,
    pub next_payment: Option<NextPaymentView>,
    pub bonifications: Vec<BonificationView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinancialView {
    pub principal_initial: Money,
    pub principal_outstanding: Money,
    pub total_term_months: u32,
    pub remaining_periods: u32,
    pub total_interest: Money,
    pub interest_remaining: Money,
    pub final_payoff_date: Option<NaiveDate>,
    pub prepayment_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextPaymentView {
    pub label: String,
    pub charge_date: NaiveDate,
    pub annual_rate: Rate,
    pub installment: Money,
    pub interest_component: Money,
    pub principal_component: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BonificationView {
    pub id: BonificationId,
    pub name: String,
    pub kind: String,
    pub rate_reduction_points: Rate,
    pub status: BonificationStatus,
    pub status_since: Option<NaiveDate>,
}

impl LoanView {
    pub fn from_plan(loan: &Loan, plan: &PaymentPlan, as_of: NaiveDate) -> Self {
        let remaining = plan.remaining_after(as_of);

        LoanView {
            id: loan.id,
            name: loan.name.clone(),
            property_id: loan.property_id.clone(),
            as_of,
            financial: FinancialView {
                principal_initial: loan.principal_initial,
                principal_outstanding: plan.outstanding_after(as_of),
                total_term_months: loan.total_term_months,
                remaining_periods: remaining.len() as u32,
                total_interest: plan.total_interest(),
                interest_remaining: remaining
                    .iter()
                    .map(|p| p.interest_component + p.capitalized_interest)
                    .sum(),
                final_payoff_date: plan.final_payoff_date(),
                prepayment_count: loan.prepayments.len() as u32,
            },
            next_payment: remaining.first().map(|p| NextPaymentView {
                label: p.label.clone(),
                charge_date: p.charge_date,
                annual_rate: p.annual_rate,
                installment: p.installment,
                interest_component: p.interest_component,
                principal_component: p.principal_component,
            }),
            bonifications: loan
                .bonifications
                .items
                .iter()
                .map(|b| BonificationView {
                    id: b.id,
                    name: b.name.clone(),
                    kind: b.rule.label().to_string(),
                    rate_reduction_points: b.rate_reduction_points,
                    status: b.status,
                    status_since: b.status_since(),
                })
                .collect(),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
