use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use log::{debug, info};

use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::events::{Event, EventStore};
use crate::loan::Loan;
use crate::prepayment::{self, AppliedPrepayment, SimulationResult};
use crate::rates::compliance::ComplianceSource;
use crate::rates::evaluator::{apply_assessments, evaluate_bonifications, EvaluationResult};
use crate::rates::resolver::RateResolver;
use crate::schedule::builder::build_schedule;
use crate::schedule::plan::PaymentPlan;
use crate::store::LoanStore;
use crate::types::{LoanId, ReductionMode};
use crate::views::LoanView;

/// wires a loan store, a clock and an event log around the pure engine
/// functions; every recompute trigger takes `&mut self`
pub struct LoanEngine<'a, S: LoanStore> {
    store: S,
    config: EngineConfig,
    time: &'a SafeTimeProvider,
    events: EventStore,
}

impl<'a, S: LoanStore> LoanEngine<'a, S> {
    pub fn new(store: S, config: EngineConfig, time: &'a SafeTimeProvider) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            time,
            events: EventStore::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.time.now().date_naive()
    }

    /// validate, persist and project a new loan
    pub fn register(&mut self, loan: Loan) -> Result<PaymentPlan> {
        loan.validate(&self.config)?;
        let plan = build_schedule(&loan, &self.config)?;
        self.persist(&loan)?;
        self.publish_plan(&plan);
        info!("registered loan {} ({})", loan.id, loan.name);
        Ok(plan)
    }

    pub fn loan(&self, id: LoanId) -> Result<Loan> {
        self.store.get(id)
    }

    pub fn remove(&mut self, id: LoanId) -> Result<()> {
        self.store.delete(id)?;
        self.events.emit(Event::LoanDeleted {
            loan_id: id,
            timestamp: self.time.now(),
        });
        Ok(())
    }

    /// current plan, regenerated from the stored loan
    pub fn plan(&self, id: LoanId) -> Result<PaymentPlan> {
        build_schedule(&self.store.get(id)?, &self.config)
    }

    pub fn view(&self, id: LoanId) -> Result<LoanView> {
        let loan = self.store.get(id)?;
        let plan = build_schedule(&loan, &self.config)?;
        Ok(LoanView::from_plan(&loan, &plan, self.today()))
    }

    /// rate applicable to the next charge
    pub fn current_rate(&self, id: LoanId) -> Result<Rate> {
        let loan = self.store.get(id)?;
        let index = loan
            .calendar()?
            .first_period_charged_after(self.today(), loan.total_term_months)?
            .unwrap_or(loan.total_term_months.saturating_sub(1));
        RateResolver::new(&loan, &self.config)?.resolve(index)
    }

    pub fn simulate_prepayment(&mut self, id: LoanId, amount: Money, mode: ReductionMode) -> Result<SimulationResult> {
        let loan = self.store.get(id)?;
        let result = prepayment::simulate(&loan, amount, self.today(), mode, &self.config)?;
        self.events.emit(Event::PrepaymentSimulated {
            loan_id: id,
            amount,
            mode,
            interest_saved: result.interest_saved,
            timestamp: self.time.now(),
        });
        Ok(result)
    }

    /// prepay today and persist the updated loan
    pub fn apply_prepayment(&mut self, id: LoanId, amount: Money, mode: ReductionMode) -> Result<AppliedPrepayment> {
        let loan = self.store.get(id)?;
        let applied = prepayment::apply(&loan, amount, self.today(), mode, &self.config)?;

        self.persist(&applied.loan)?;
        self.events.emit(Event::PrepaymentApplied {
            loan_id: id,
            amount,
            fee: applied.result.fee,
            mode,
            new_outstanding: applied.loan.principal_outstanding,
            timestamp: self.time.now(),
        });
        self.publish_plan(&applied.plan);
        Ok(applied)
    }

    /// evaluate bonifications as of today and persist any status change
    pub fn review_bonifications(&mut self, id: LoanId, source: &dyn ComplianceSource) -> Result<EvaluationResult> {
        let loan = self.store.get(id)?;
        let result = evaluate_bonifications(&loan, self.today(), source, &self.config)?;

        if !result.statuses.iter().any(|a| a.changed()) {
            debug!("loan {}: no bonification status changed", id);
            return Ok(result);
        }

        let updated = apply_assessments(&loan, &result, &self.config)?;
        let plan = build_schedule(&updated, &self.config)?;
        self.persist(&updated)?;

        let now = self.time.now();
        for assessment in result.statuses.iter().filter(|a| a.changed()) {
            let effective_from = updated
                .bonifications
                .find(assessment.bonification_id)
                .and_then(|b| b.status_since());
            self.events.emit(Event::BonificationStatusChanged {
                loan_id: id,
                bonification_id: assessment.bonification_id,
                old_status: assessment.previous,
                new_status: assessment.status,
                effective_from,
                timestamp: now,
            });
        }
        self.publish_plan(&plan);
        Ok(result)
    }

    /// record the index value fixed at the next review boundary
    pub fn update_index(&mut self, id: LoanId, value: Rate) -> Result<PaymentPlan> {
        let mut loan = self.store.get(id)?;
        let calendar = loan.calendar()?;
        let next = calendar
            .first_period_charged_after(self.today(), loan.total_term_months)?
            .ok_or_else(|| EngineError::validation("date", format!("loan {} has no periods left", id)))?;
        let boundary = loan
            .rate
            .next_review_index(next)
            .ok_or_else(|| EngineError::configuration("fixed-rate loan has no reference index"))?;
        let review_date = calendar.accrual_window(boundary)?.start;

        let terms = loan
            .rate
            .variable_terms_mut()
            .ok_or_else(|| EngineError::configuration("fixed-rate loan has no reference index"))?;
        let old_value = terms
            .index_revisions
            .range(..=boundary)
            .next_back()
            .map(|(_, v)| *v)
            .or(terms.current_index_value);
        terms.index_revisions.insert(boundary, value);
        terms.next_review_date = Some(review_date);
        let reference_index = terms.reference_index.clone();

        let plan = build_schedule(&loan, &self.config)?;
        self.persist(&loan)?;
        self.events.emit(Event::IndexReviewed {
            loan_id: id,
            reference_index,
            old_value,
            new_value: value,
            timestamp: self.time.now(),
        });
        self.publish_plan(&plan);
        Ok(plan)
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    fn persist(&mut self, loan: &Loan) -> Result<()> {
        self.store.put(loan)?;
        self.events.emit(Event::LoanStored {
            loan_id: loan.id,
            timestamp: self.time.now(),
        });
        Ok(())
    }

    fn publish_plan(&mut self, plan: &PaymentPlan) {
        let now = self.time.now();
        for period in plan.periods() {
            if let Some(reason) = period.recalculation {
                self.events.emit(Event::InstallmentRecalculated {
                    loan_id: plan.loan_id(),
                    period_index: period.index,
                    installment: period.installment,
                    annual_rate: period.annual_rate,
                    reason,
                    timestamp: now,
                });
            }
        }
        self.events.emit(Event::PlanGenerated {
            loan_id: plan.loan_id(),
            periods: plan.len() as u32,
            total_interest: plan.total_interest(),
            final_payoff_date: plan.final_payoff_date(),
            timestamp: now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::bonification::{Bonification, BonificationRule};
    use crate::rates::compliance::{ComplianceObservation, StaticComplianceSource};
    use crate::rates::resolver::VariableTerms;
    use crate::store::InMemoryLoanStore;
    use crate::types::{BonificationStatus, Recalculation};
    use chrono::{Duration, TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn clock(y: i32, m: u32, d: u32) -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()))
    }

    fn fixed_loan() -> Loan {
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
    fn test_register_persists_and_emits() {
        let time = clock(2024, 1, 1);
        let mut engine = LoanEngine::new(InMemoryLoanStore::new(), EngineConfig::default(), &time).unwrap();
        let loan = fixed_loan();
        let id = loan.id;

        let plan = engine.register(loan).unwrap();
        assert_eq!(plan.len(), 360);
        assert_eq!(engine.loan(id).unwrap().name, "Piso Zaragoza");

        let events = engine.take_events();
        assert!(events.iter().any(|e| matches!(e, Event::LoanStored { .. })));
        assert!(events.iter().any(|e| matches!(e, Event::PlanGenerated { periods: 360, .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::InstallmentRecalculated { reason: Recalculation::PhaseStart, period_index: 0, .. }
        )));
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_apply_prepayment_uses_clock() {
        let time = clock(2024, 1, 1);
        let control = time.test_control().unwrap();
        let mut engine = LoanEngine::new(InMemoryLoanStore::new(), EngineConfig::default(), &time).unwrap();
        let loan = fixed_loan();
        let id = loan.id;
        engine.register(loan).unwrap();

        control.advance(Duration::days(380));
        assert_eq!(engine.today(), date(2025, 1, 15));

        let simulated = engine.simulate_prepayment(id, Money::from_major(20_000), ReductionMode::ReducePayment).unwrap();
        let applied = engine.apply_prepayment(id, Money::from_major(20_000), ReductionMode::ReducePayment).unwrap();

        assert_eq!(applied.result, simulated);
        assert_eq!(applied.result.fee, Money::from_major(200));
        let stored = engine.loan(id).unwrap();
        assert_eq!(stored.prepayments.len(), 1);
        assert_eq!(stored.prepayments[0].date, date(2025, 1, 15));
        assert_eq!(engine.plan(id).unwrap(), applied.plan);
        assert!(engine
            .events()
            .iter()
            .any(|e| matches!(e, Event::PrepaymentApplied { .. })));
    }

    #[test]
    fn test_review_bonifications_persists_changes() {
        let time = clock(2025, 2, 3);
        let mut engine = LoanEngine::new(InMemoryLoanStore::new(), EngineConfig::default(), &time).unwrap();
        let payroll = Bonification::new("nomina", Rate::from_bps(40), BonificationRule::PayrollDeposit {
            minimum_monthly_amount: Money::from_major(1_800),
        })
        .with_status(BonificationStatus::Met);
        let bonification_id = payroll.id;
        let loan = Loan::builder()
            .name("Casa Sevilla")
            .principal(Money::from_major(160_000))
            .signing_date(date(2024, 1, 1))
            .term_months(240)
            .fixed_rate(Rate::from_decimal(dec!(0.032)))
            .max_bonification_rate(Rate::from_bps(100))
            .evaluation_date(date(2025, 1, 31))
            .bonification(payroll)
            .build()
            .unwrap();
        let id = loan.id;
        engine.register(loan).unwrap();
        engine.take_events();

        let source = StaticComplianceSource::new()
            .with(bonification_id, ComplianceObservation::MonthlyDeposits(vec![Money::ZERO]));
        let result = engine.review_bonifications(id, &source).unwrap();
        assert_eq!(result.status_of(bonification_id), Some(BonificationStatus::Lost));

        let stored = engine.loan(id).unwrap();
        assert_eq!(stored.bonifications.items[0].status, BonificationStatus::Lost);
        assert_eq!(engine.current_rate(id).unwrap().as_decimal(), dec!(0.032));
        assert!(engine.events().iter().any(|e| matches!(
            e,
            Event::BonificationStatusChanged { new_status: BonificationStatus::Lost, effective_from: Some(d), .. }
                if *d == date(2025, 2, 1)
        )));

        // a second review changes nothing
        engine.take_events();
        engine.review_bonifications(id, &source).unwrap();
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_update_index_at_next_review() {
        let time = clock(2024, 6, 10);
        let mut engine = LoanEngine::new(InMemoryLoanStore::new(), EngineConfig::default(), &time).unwrap();
        let loan = Loan::builder()
            .principal(Money::from_major(150_000))
            .signing_date(date(2024, 1, 1))
            .term_months(300)
            .variable_rate(VariableTerms::new(
                "EURIBOR-12M",
                Rate::from_decimal(dec!(0.035)),
                Rate::from_decimal(dec!(0.009)),
                12,
            ))
            .build()
            .unwrap();
        let id = loan.id;
        engine.register(loan).unwrap();

        let plan = engine.update_index(id, Rate::from_decimal(dec!(0.028))).unwrap();
        assert_eq!(plan.period(11).unwrap().annual_rate.as_decimal(), dec!(0.044));
        assert_eq!(plan.period(12).unwrap().annual_rate.as_decimal(), dec!(0.037));
        assert_eq!(plan.period(12).unwrap().recalculation, Some(Recalculation::RateChange));

        let stored = engine.loan(id).unwrap();
        match stored.rate {
            crate::rates::resolver::RateConfig::Variable(terms) => {
                assert_eq!(terms.next_review_date, Some(date(2025, 1, 1)));
            }
            other => panic!("unexpected rate {:?}", other),
        }
        assert!(engine.events().iter().any(|e| matches!(e, Event::IndexReviewed { .. })));
    }

    #[test]
    fn test_fixed_loan_has_no_index() {
        let time = clock(2024, 6, 10);
        let mut engine = LoanEngine::new(InMemoryLoanStore::new(), EngineConfig::default(), &time).unwrap();
        let loan = fixed_loan();
        let id = loan.id;
        engine.register(loan).unwrap();

        assert!(matches!(
            engine.update_index(id, Rate::from_percentage(2)),
            Err(EngineError::Configuration { .. })
        ));
    }

    #[test]
    fn test_remove_and_missing_loan() {
        let time = clock(2024, 1, 1);
        let mut engine = LoanEngine::new(InMemoryLoanStore::new(), EngineConfig::default(), &time).unwrap();
        let loan = fixed_loan();
        let id = loan.id;
        engine.register(loan).unwrap();

        engine.remove(id).unwrap();
        assert!(matches!(engine.plan(id), Err(EngineError::LoanNotFound { .. })));
        assert!(engine.events().iter().any(|e| matches!(e, Event::LoanDeleted { .. })));
    }
}
