use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::loan::{Loan, PrepaymentRecord};
use crate::schedule::annuity::{self, InstallmentSplit};
use crate::schedule::builder::build_schedule;
use crate::schedule::calendar::add_months;
use crate::schedule::plan::{PaymentPeriod, PaymentPlan};
use crate::types::{Phase, ReductionMode};

/// outcome of a prepayment scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub amount: Money,
    pub date: NaiveDate,
    pub mode: ReductionMode,
    pub fee: Money,
    /// rate of the first period charged after the prepayment
    pub rate: Rate,
    pub outstanding_before: Money,
    pub new_outstanding: Money,
    pub original_remaining_periods: u32,
    pub new_remaining_periods: u32,
    pub original_installment: Money,
    pub new_installment: Money,
    pub new_payoff_date: NaiveDate,
    pub interest_saved: Money,
    /// periods until cumulative interest saved covers the fee
    pub break_even_periods: Option<u32>,
}

impl SimulationResult {
    pub fn periods_saved(&self) -> u32 {
        self.original_remaining_periods
            .saturating_sub(self.new_remaining_periods)
    }

    /// interest saved net of the fee
    pub fn net_benefit(&self) -> Money {
        self.interest_saved - self.fee
    }

    pub fn json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// committed prepayment: updated loan and its regenerated plan
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedPrepayment {
    pub loan: Loan,
    pub plan: PaymentPlan,
    pub result: SimulationResult,
}

fn validate_amount(amount: Money, outstanding: Money) -> Result<()> {
    if !amount.is_positive() {
        return Err(EngineError::validation(
            "amount",
            format!("{} must be greater than 0", amount),
        ));
    }
    if amount > outstanding {
        return Err(EngineError::validation(
            "amount",
            format!("{} must not exceed the outstanding principal {}", amount, outstanding),
        ));
    }
    Ok(())
}

/// smallest period count whose cumulative interest saving covers `fee`
fn break_even(original: &[Money], reduced: &[Money], fee: Money) -> Option<u32> {
    if !fee.is_positive() {
        return Some(0);
    }

    let mut cumulative = Money::ZERO;
    for (k, interest) in original.iter().enumerate() {
        let new_interest = reduced.get(k).copied().unwrap_or(Money::ZERO);
        cumulative += *interest - new_interest;
        if cumulative >= fee {
            return Some(k as u32 + 1);
        }
    }
    None
}

fn interest_of(rows: &[InstallmentSplit]) -> Vec<Money> {
    rows.iter().map(|r| r.interest).collect()
}

/// interest charged or capitalized per period
fn accrued_interest(periods: &[PaymentPeriod]) -> Vec<Money> {
    periods
        .iter()
        .map(|p| p.interest_component + p.capitalized_interest)
        .collect()
}

fn first_amortizing_installment(periods: &[PaymentPeriod]) -> Money {
    periods
        .iter()
        .find(|p| p.phase == Phase::Amortizing)
        .map_or(Money::ZERO, |p| p.installment)
}

/// both sides of a prepayment scenario, period by period
struct Projection {
    original_installment: Money,
    new_installment: Money,
    original_interest: Vec<Money>,
    reduced_interest: Vec<Money>,
    new_payoff_date: NaiveDate,
}

/// constant-rate annuity projection from the prepayment date
fn project_amortizing(
    outstanding: Money,
    reduced_principal: Money,
    rate: Rate,
    periods: u32,
    date: NaiveDate,
    mode: ReductionMode,
    last_charge: Option<NaiveDate>,
) -> Result<Projection> {
    let current = annuity::installment(outstanding, rate, periods);
    let original = annuity::project(outstanding, rate, current, periods);

    let (new_installment, reduced, new_payoff_date) = match mode {
        ReductionMode::ReduceTerm => {
            let months = annuity::term_for_installment(reduced_principal, rate, current)?;
            let rows = annuity::project(reduced_principal, rate, current, months);
            (current, rows, add_months(date, months)?)
        }
        ReductionMode::ReducePayment => {
            let installment = annuity::installment(reduced_principal, rate, periods);
            let rows = annuity::project(reduced_principal, rate, installment, periods);
            let payoff = match last_charge {
                Some(last) if reduced_principal.is_positive() => last,
                _ => date,
            };
            (installment, rows, payoff)
        }
    };

    Ok(Projection {
        original_installment: current,
        new_installment,
        original_interest: interest_of(&original),
        reduced_interest: interest_of(&reduced),
        new_payoff_date,
    })
}

/// grace periods still ahead: replay the prepayment through the plan builder
fn project_through_grace(
    loan: &Loan,
    remaining: &[PaymentPeriod],
    record: PrepaymentRecord,
    reduced_principal: Money,
    config: &EngineConfig,
) -> Result<Projection> {
    let date = record.date;
    let mut prepaid = loan.clone();
    prepaid.principal_outstanding = reduced_principal;
    prepaid.prepayments.push(record);
    let projected = build_schedule(&prepaid, config)?;
    let after = projected.remaining_after(date);

    Ok(Projection {
        original_installment: first_amortizing_installment(remaining),
        new_installment: first_amortizing_installment(after),
        original_interest: accrued_interest(remaining),
        reduced_interest: accrued_interest(after),
        new_payoff_date: after.last().map_or(date, |p| p.charge_date),
    })
}

/// simulate prepaying `amount` on `date` without touching the loan
pub fn simulate(
    loan: &Loan,
    amount: Money,
    date: NaiveDate,
    mode: ReductionMode,
    config: &EngineConfig,
) -> Result<SimulationResult> {
    validate_amount(amount, loan.principal_outstanding)?;

    let plan = build_schedule(loan, config)?;
    let remaining = plan.remaining_after(date);
    let next = remaining.first().ok_or_else(|| {
        EngineError::degenerate(format!("no periods remain after {}", date))
    })?;
    let outstanding = next.opening_principal;
    validate_amount(amount, outstanding)?;

    let periods = remaining.len() as u32;
    let rate = next.annual_rate;

    let fee = loan.costs.prepayment_fee(amount, outstanding);
    let reduced_principal = outstanding - amount;

    let projection = if remaining.iter().any(|p| p.phase != Phase::Amortizing) {
        let record = PrepaymentRecord {
            date,
            amount,
            mode,
            fee,
        };
        project_through_grace(loan, remaining, record, reduced_principal, config)?
    } else {
        let last_charge = remaining.last().map(|p| p.charge_date);
        project_amortizing(outstanding, reduced_principal, rate, periods, date, mode, last_charge)?
    };

    let interest_saved = projection.original_interest.iter().copied().sum::<Money>()
        - projection.reduced_interest.iter().copied().sum::<Money>();
    let break_even_periods = break_even(&projection.original_interest, &projection.reduced_interest, fee);

    debug!(
        "loan {}: prepayment {} on {} ({}), fee {}, saves {}, break-even {:?}",
        loan.id, amount, date, mode, fee, interest_saved, break_even_periods
    );

    Ok(SimulationResult {
        amount,
        date,
        mode,
        fee,
        rate,
        outstanding_before: outstanding,
        new_outstanding: reduced_principal,
        original_remaining_periods: periods,
        new_remaining_periods: projection.reduced_interest.len() as u32,
        original_installment: projection.original_installment,
        new_installment: projection.new_installment,
        new_payoff_date: projection.new_payoff_date,
        interest_saved,
        break_even_periods,
    })
}

/// commit a prepayment: lower the outstanding principal, record it and
/// regenerate the plan
pub fn apply(
    loan: &Loan,
    amount: Money,
    date: NaiveDate,
    mode: ReductionMode,
    config: &EngineConfig,
) -> Result<AppliedPrepayment> {
    let result = simulate(loan, amount, date, mode, config)?;

    let mut updated = loan.clone();
    updated.principal_outstanding = result.new_outstanding;
    updated.prepayments.push(PrepaymentRecord {
        date,
        amount,
        mode,
        fee: result.fee,
    });
    let plan = build_schedule(&updated, config)?;

    Ok(AppliedPrepayment {
        loan: updated,
        plan,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Recalculation;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reference_loan() -> Loan {
        Loan::builder()
            .name("Piso Zaragoza")
            .principal(Money::from_major(180_000))
            .signing_date(date(2024, 1, 1))
            .term_months(360)
            .fixed_rate(Rate::from_percentage(3))
            .partial_prepayment_fee(Rate::from_percentage(1))
            .build()
            .unwrap()
    }

    #[test]
    fn test_reduce_payment_after_a_year() {
        let loan = reference_loan();
        let result = simulate(
            &loan,
            Money::from_major(20_000),
            date(2025, 1, 15),
            ReductionMode::ReducePayment,
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(result.fee, Money::from_str_exact("200.00").unwrap());
        assert_eq!(result.original_remaining_periods, 348);
        assert_eq!(result.new_remaining_periods, 348);
        assert!(result.new_installment < result.original_installment);
        assert!(result.interest_saved.is_positive());
        assert!(result.break_even_periods.is_some());
        assert_eq!(result.new_payoff_date, date(2054, 1, 1));
        assert_eq!(result.new_outstanding, result.outstanding_before - Money::from_major(20_000));
    }

    #[test]
    fn test_reduce_term_shortens_payoff() {
        let loan = reference_loan();
        let result = simulate(
            &loan,
            Money::from_major(20_000),
            date(2025, 1, 15),
            ReductionMode::ReduceTerm,
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(result.new_installment, result.original_installment);
        assert!(result.new_remaining_periods < result.original_remaining_periods);
        assert!(result.periods_saved() > 0);
        assert_eq!(
            result.new_payoff_date,
            add_months(date(2025, 1, 15), result.new_remaining_periods).unwrap()
        );

        let reduced_payment = simulate(
            &loan,
            Money::from_major(20_000),
            date(2025, 1, 15),
            ReductionMode::ReducePayment,
            &EngineConfig::default(),
        )
        .unwrap();
        // shortening the term saves more interest than lowering the installment
        assert!(result.interest_saved > reduced_payment.interest_saved);
    }

    #[test]
    fn test_full_payoff_saves_all_remaining_interest() {
        let mut loan = reference_loan();
        loan.costs.full_cancellation_fee_rate = Rate::from_decimal(dec!(0.005));
        let plan = build_schedule(&loan, &EngineConfig::default()).unwrap();

        let result = simulate(
            &loan,
            Money::from_major(180_000),
            date(2024, 1, 15),
            ReductionMode::ReduceTerm,
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(result.new_remaining_periods, 0);
        assert_eq!(result.new_outstanding, Money::ZERO);
        assert_eq!(result.interest_saved, plan.total_interest());
        assert_eq!(result.fee, Money::from_major(900));
        // 450.00 + 449.23 falls short of the fee, the third period covers it
        assert_eq!(result.break_even_periods, Some(3));
    }

    #[test]
    fn test_amount_bounds_are_validated() {
        let loan = reference_loan();
        let config = EngineConfig::default();

        let zero = simulate(&loan, Money::ZERO, date(2025, 1, 15), ReductionMode::ReduceTerm, &config).unwrap_err();
        assert!(matches!(zero, EngineError::Validation { ref message, .. } if message.contains("greater than 0")));

        let too_much = simulate(
            &loan,
            Money::from_major(180_000),
            date(2025, 1, 15),
            ReductionMode::ReduceTerm,
            &config,
        )
        .unwrap_err();
        assert!(matches!(too_much, EngineError::Validation { ref message, .. } if message.contains("outstanding")));
    }

    #[test]
    fn test_fee_never_recovered() {
        let mut loan = reference_loan();
        loan.costs.fixed_operation_cost = Money::from_major(100_000);
        let result = simulate(
            &loan,
            Money::from_major(1_000),
            date(2025, 1, 15),
            ReductionMode::ReducePayment,
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(result.break_even_periods, None);
        assert!(result.net_benefit().is_negative());
    }

    #[test]
    fn test_apply_commits_and_regenerates() {
        let loan = reference_loan();
        let config = EngineConfig::default();
        let applied = apply(
            &loan,
            Money::from_major(20_000),
            date(2025, 1, 15),
            ReductionMode::ReducePayment,
            &config,
        )
        .unwrap();

        assert_eq!(applied.loan.principal_outstanding, applied.result.new_outstanding);
        assert_eq!(applied.loan.prepayments.len(), 1);
        assert_eq!(applied.loan.prepayments[0].fee, applied.result.fee);

        let period = applied.plan.period(12).unwrap();
        assert_eq!(period.recalculation, Some(Recalculation::Prepayment));
        assert_eq!(period.opening_principal, applied.result.new_outstanding);
        assert_eq!(period.installment, applied.result.new_installment);
        assert_eq!(applied.plan.periods().last().unwrap().ending_principal, Money::ZERO);
        // the original loan is untouched
        assert!(loan.prepayments.is_empty());
    }

    #[test]
    fn test_nothing_left_to_prepay_is_degenerate() {
        let loan = reference_loan();
        let err = simulate(
            &loan,
            Money::from_major(1_000),
            date(2054, 3, 1),
            ReductionMode::ReduceTerm,
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ArithmeticDegenerate { .. }));
    }

    #[test]
    fn test_reduce_term_during_interest_only_shortens_applied_plan() {
        let loan = Loan::builder()
            .principal(Money::from_major(100_000))
            .signing_date(date(2024, 1, 1))
            .term_months(120)
            .fixed_rate(Rate::from_percentage(3))
            .interest_only_months(24)
            .build()
            .unwrap();
        let config = EngineConfig::default();
        let prepaid_on = date(2024, 6, 15);

        let applied = apply(&loan, Money::from_major(20_000), prepaid_on, ReductionMode::ReduceTerm, &config).unwrap();
        let result = &applied.result;

        assert!(applied.plan.len() < 120);
        assert_eq!(result.new_remaining_periods as usize, applied.plan.remaining_after(prepaid_on).len());
        assert_eq!(Some(result.new_payoff_date), applied.plan.final_payoff_date());
        assert!(result.periods_saved() > 0);
        // the installment keeps the size it would have had without the prepayment
        let start = applied.plan.period(24).unwrap();
        assert_eq!(start.installment, annuity::installment(Money::from_major(100_000), Rate::from_percentage(3), 96));
        assert_eq!(result.new_installment, result.original_installment);
        assert_eq!(result.new_installment, start.installment);
        assert!(result.interest_saved.is_positive());
        assert_eq!(applied.plan.periods().last().unwrap().ending_principal, Money::ZERO);

        let reduced_payment =
            simulate(&loan, Money::from_major(20_000), prepaid_on, ReductionMode::ReducePayment, &config).unwrap();
        assert_eq!(reduced_payment.new_remaining_periods, reduced_payment.original_remaining_periods);
        assert!(reduced_payment.new_installment < reduced_payment.original_installment);
    }
}
