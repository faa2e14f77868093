use log::{debug, warn};

use crate::config::{DeferredInterestPolicy, EngineConfig};
use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::loan::{Loan, PrepaymentRecord};
use crate::rates::resolver::RateResolver;
use crate::schedule::annuity;
use crate::schedule::calendar::BillingCalendar;
use crate::schedule::plan::{PaymentPeriod, PaymentPlan};
use crate::types::{Phase, Recalculation, ReductionMode};

/// running state carried from one period to the next
struct ScheduleState {
    balance: Money,
    installment: Money,
    /// rate the current installment was computed at; None before amortizing
    installment_rate: Option<Rate>,
    /// index one past the last period
    maturity: u32,
    /// principal prepaid under ReduceTerm before the first installment was set
    term_reduction: Money,
}

impl ScheduleState {
    fn new(loan: &Loan) -> Self {
        Self {
            balance: loan.principal_initial,
            installment: Money::ZERO,
            installment_rate: None,
            maturity: loan.total_term_months,
            term_reduction: Money::ZERO,
        }
    }

    fn remaining(&self, index: u32) -> u32 {
        self.maturity.saturating_sub(index)
    }

    /// keep the installment and pull maturity in to repay the balance
    fn shorten_term(&mut self, loan: &Loan, index: u32, rate: Rate) {
        match annuity::term_for_installment(self.balance, rate, self.installment) {
            Ok(months) => {
                self.maturity = (index + months).min(loan.total_term_months);
            }
            Err(e) => {
                warn!("loan {}: {}, recomputing installment instead", loan.id, e);
                self.installment = annuity::installment(self.balance, rate, self.remaining(index));
            }
        }
    }
}

/// phase of `index` from the loan's grace terms
fn phase_of(loan: &Loan, index: u32) -> Phase {
    let deferred = loan.irregular.deferred_first_payment_months;
    let interest_only = loan.irregular.interest_only_months;

    if index < deferred {
        Phase::Deferred
    } else if index < deferred + interest_only {
        Phase::InterestOnly
    } else if index == 0 && loan.irregular.prorate_first_period {
        // broken first period charges interest only
        Phase::InterestOnly
    } else {
        Phase::Amortizing
    }
}

/// applied prepayments keyed by the period they take effect at
fn scheduled_prepayments<'a>(
    loan: &'a Loan,
    calendar: &BillingCalendar,
) -> Result<Vec<(u32, &'a PrepaymentRecord)>> {
    let mut records: Vec<&PrepaymentRecord> = loan.prepayments.iter().collect();
    records.sort_by_key(|r| r.date);

    let mut scheduled = Vec::with_capacity(records.len());
    for record in records {
        match calendar.first_period_charged_after(record.date, loan.total_term_months)? {
            Some(index) => scheduled.push((index, record)),
            None => warn!(
                "loan {}: prepayment of {} on {} is after the last charge, ignored",
                loan.id, record.amount, record.date
            ),
        }
    }
    Ok(scheduled)
}

/// project the full payment plan of a loan
pub fn build_schedule(loan: &Loan, config: &EngineConfig) -> Result<PaymentPlan> {
    loan.validate_terms(config)?;

    let calendar = loan.calendar()?;
    let resolver = RateResolver::new(loan, config)?;
    let prepayments = scheduled_prepayments(loan, &calendar)?;

    let mut state = ScheduleState::new(loan);
    let mut periods = Vec::with_capacity(loan.total_term_months as usize);
    let mut index = 0;

    while index < state.maturity {
        // prepayments reduce principal before the period's interest
        let mut prepaid: Option<ReductionMode> = None;
        for (_, record) in prepayments.iter().filter(|(at, _)| *at == index) {
            let applied = record.amount.min(state.balance);
            state.balance -= applied;
            if state.installment_rate.is_none() && record.mode == ReductionMode::ReduceTerm {
                state.term_reduction += applied;
            }
            prepaid = Some(record.mode);
        }
        if !state.balance.is_positive() {
            break;
        }

        let window = calendar.accrual_window(index)?;
        let charge_date = calendar.charge_date(index)?;
        let rate = resolver.resolve(index)?;
        let phase = phase_of(loan, index);
        let is_prorated = index == 0 && loan.irregular.prorate_first_period;
        let opening_principal = state.balance;

        let interest = if is_prorated {
            opening_principal.apply_rate(rate, window.days())
        } else {
            annuity::monthly_interest(opening_principal, rate)
        };

        let mut period = PaymentPeriod {
            index,
            label: charge_date.format("%Y-%m").to_string(),
            accrual_start: window.start,
            accrual_end: window.end,
            accrual_days: window.days(),
            charge_date,
            annual_rate: rate,
            phase,
            opening_principal,
            installment: Money::ZERO,
            interest_component: Money::ZERO,
            principal_component: Money::ZERO,
            capitalized_interest: Money::ZERO,
            ending_principal: opening_principal,
            is_prorated,
            is_interest_only: false,
            is_deferred: false,
            recalculation: None,
        };

        match phase {
            Phase::Deferred => {
                let capitalized = match config.deferred_interest {
                    DeferredInterestPolicy::Capitalize => interest,
                    DeferredInterestPolicy::Forgive => Money::ZERO,
                };
                state.balance += capitalized;
                period.capitalized_interest = capitalized;
                period.ending_principal = state.balance;
                period.is_deferred = true;
            }
            Phase::InterestOnly => {
                period.installment = interest;
                period.interest_component = interest;
                period.is_interest_only = true;
            }
            Phase::Amortizing => {
                let recalculation = match state.installment_rate {
                    None => Some(Recalculation::PhaseStart),
                    Some(_) if prepaid.is_some() => Some(Recalculation::Prepayment),
                    Some(previous) if previous != rate => Some(Recalculation::RateChange),
                    Some(_) if loan.rate.is_review_boundary(index) => Some(Recalculation::RateChange),
                    Some(_) => None,
                };

                match (recalculation, prepaid) {
                    (Some(Recalculation::PhaseStart), _) if state.term_reduction.is_positive() => {
                        // size the installment as if nothing had been prepaid
                        let unreduced = state.balance + state.term_reduction;
                        state.installment = annuity::installment(unreduced, rate, state.remaining(index));
                        state.term_reduction = Money::ZERO;
                        state.shorten_term(loan, index, rate);
                    }
                    (Some(Recalculation::Prepayment), Some(ReductionMode::ReduceTerm)) => {
                        state.shorten_term(loan, index, rate);
                    }
                    (Some(_), _) => {
                        state.installment = annuity::installment(state.balance, rate, state.remaining(index));
                    }
                    (None, _) => {}
                }

                if let Some(reason) = recalculation {
                    debug!(
                        "loan {}: period {} installment {} at {} over {} months ({:?})",
                        loan.id,
                        index,
                        state.installment,
                        rate,
                        state.remaining(index),
                        reason
                    );
                }
                state.installment_rate = Some(rate);

                let split = annuity::split_installment(
                    state.balance,
                    rate,
                    state.installment,
                    index + 1 == state.maturity,
                );
                state.balance = split.ending_balance;

                period.installment = split.installment;
                period.interest_component = split.interest;
                period.principal_component = split.principal;
                period.ending_principal = split.ending_balance;
                period.recalculation = recalculation;
            }
        }

        periods.push(period);
        index += 1;
    }

    let plan = PaymentPlan::new(loan.id, periods);
    debug!(
        "loan {}: plan of {} periods, total interest {}, payoff {:?}",
        loan.id,
        plan.len(),
        plan.total_interest(),
        plan.final_payoff_date()
    );
    Ok(plan)
}
