use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::rates::bonification::{Bonification, BonificationTerms};
use crate::rates::resolver::{RateConfig, VariableTerms};
use crate::schedule::calendar::BillingCalendar;
use crate::types::{LoanId, ReductionMode};

/// grace phases and billing conventions at the start of the loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrregularPayments {
    pub interest_only_months: u32,
    pub deferred_first_payment_months: u32,
    /// first period accrues actual/365 from the signing date
    pub prorate_first_period: bool,
    /// charge the month after accrual instead of the accrual month
    pub charge_in_arrears: bool,
}

impl Default for IrregularPayments {
    fn default() -> Self {
        Self {
            interest_only_months: 0,
            deferred_first_payment_months: 0,
            prorate_first_period: false,
            charge_in_arrears: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingTerms {
    pub charge_day_of_month: u8,
    pub debit_account_id: Option<String>,
}

impl Default for BillingTerms {
    fn default() -> Self {
        Self {
            charge_day_of_month: 1,
            debit_account_id: None,
        }
    }
}

/// lender fees on early repayment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostTerms {
    pub partial_prepayment_fee_rate: Rate,
    pub full_cancellation_fee_rate: Rate,
    pub fixed_operation_cost: Money,
}

impl CostTerms {
    /// fee charged for prepaying `amount` out of `outstanding`
    pub fn prepayment_fee(&self, amount: Money, outstanding: Money) -> Money {
        let rate = if amount >= outstanding {
            self.full_cancellation_fee_rate
        } else {
            self.partial_prepayment_fee_rate
        };
        amount.times_rate(rate) + self.fixed_operation_cost
    }
}

/// prepayment already committed to the loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepaymentRecord {
    pub date: NaiveDate,
    pub amount: Money,
    pub mode: ReductionMode,
    pub fee: Money,
}

/// mortgage loan with its contractual terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub name: String,
    pub property_id: Option<String>,
    pub principal_initial: Money,
    pub principal_outstanding: Money,
    pub signing_date: NaiveDate,
    pub total_term_months: u32,
    pub rate: RateConfig,
    #[serde(default)]
    pub irregular: IrregularPayments,
    #[serde(default)]
    pub billing: BillingTerms,
    #[serde(default)]
    pub costs: CostTerms,
    #[serde(default)]
    pub bonifications: BonificationTerms,
    /// applied prepayments, oldest first
    #[serde(default)]
    pub prepayments: Vec<PrepaymentRecord>,
}

impl Loan {
    pub fn builder() -> LoanBuilder {
        LoanBuilder::new()
    }

    pub fn calendar(&self) -> Result<BillingCalendar> {
        BillingCalendar::new(
            self.signing_date,
            self.billing.charge_day_of_month,
            self.irregular.charge_in_arrears,
        )
    }

    /// structural checks needed to project a schedule
    pub fn validate_terms(&self, config: &EngineConfig) -> Result<()> {
        if !self.principal_initial.is_positive() {
            return Err(EngineError::validation("principal_initial", "must be positive"));
        }
        if self.principal_outstanding.is_negative() {
            return Err(EngineError::validation("principal_outstanding", "must not be negative"));
        }
        if self.principal_outstanding > self.principal_initial {
            return Err(EngineError::validation(
                "principal_outstanding",
                format!("{} exceeds the initial principal {}", self.principal_outstanding, self.principal_initial),
            ));
        }
        if self.total_term_months == 0 {
            return Err(EngineError::validation("total_term_months", "must be positive"));
        }
        if self.total_term_months > config.max_term_months {
            return Err(EngineError::validation(
                "total_term_months",
                format!("{} exceeds the maximum of {}", self.total_term_months, config.max_term_months),
            ));
        }
        let mut grace = self.irregular.interest_only_months + self.irregular.deferred_first_payment_months;
        // a prorated first period is a broken interest-only period of its own
        if grace == 0 && self.irregular.prorate_first_period {
            grace = 1;
        }
        if grace >= self.total_term_months {
            return Err(EngineError::validation(
                "irregular",
                format!("{} grace months leave no amortizing period in {}", grace, self.total_term_months),
            ));
        }
        self.calendar()?;
        self.rate.validate()
    }

    /// full validation, including the bonification cap
    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        self.validate_terms(config)?;
        let configured = self.bonifications.configured_points();
        if configured > self.bonifications.max_bonification_rate {
            return Err(EngineError::validation(
                "bonifications",
                format!(
                    "configured discounts {} exceed the cap {}",
                    configured, self.bonifications.max_bonification_rate
                ),
            ));
        }
        Ok(())
    }

    pub fn json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// builder for loans
pub struct LoanBuilder {
    name: Option<String>,
    property_id: Option<String>,
    principal: Option<Money>,
    signing_date: Option<NaiveDate>,
    term_months: Option<u32>,
    rate: Option<RateConfig>,
    irregular: IrregularPayments,
    billing: BillingTerms,
    costs: CostTerms,
    bonifications: BonificationTerms,
}

impl LoanBuilder {
    pub fn new() -> Self {
        Self {
            name: None,
            property_id: None,
            principal: None,
            signing_date: None,
            term_months: None,
            rate: None,
            irregular: IrregularPayments::default(),
            billing: BillingTerms::default(),
            costs: CostTerms::default(),
            bonifications: BonificationTerms::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn property_id(mut self, property_id: impl Into<String>) -> Self {
        self.property_id = Some(property_id.into());
        self
    }

    pub fn principal(mut self, principal: Money) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn signing_date(mut self, date: NaiveDate) -> Self {
        self.signing_date = Some(date);
        self
    }

    pub fn term_months(mut self, months: u32) -> Self {
        self.term_months = Some(months);
        self
    }

    pub fn rate(mut self, rate: RateConfig) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn fixed_rate(self, rate: Rate) -> Self {
        self.rate(RateConfig::fixed(rate))
    }

    pub fn variable_rate(self, terms: VariableTerms) -> Self {
        self.rate(RateConfig::Variable(terms))
    }

    pub fn mixed_rate(self, fixed_tranche_months: u32, fixed_tranche_rate: Rate, variable: VariableTerms) -> Self {
        self.rate(RateConfig::Mixed {
            fixed_tranche_months,
            fixed_tranche_rate,
            variable,
        })
    }

    pub fn interest_only_months(mut self, months: u32) -> Self {
        self.irregular.interest_only_months = months;
        self
    }

    pub fn deferred_months(mut self, months: u32) -> Self {
        self.irregular.deferred_first_payment_months = months;
        self
    }

    pub fn prorate_first_period(mut self, prorate: bool) -> Self {
        self.irregular.prorate_first_period = prorate;
        self
    }

    pub fn charge_in_arrears(mut self, arrears: bool) -> Self {
        self.irregular.charge_in_arrears = arrears;
        self
    }

    pub fn charge_day(mut self, day: u8) -> Self {
        self.billing.charge_day_of_month = day;
        self
    }

    pub fn debit_account(mut self, account: impl Into<String>) -> Self {
        self.billing.debit_account_id = Some(account.into());
        self
    }

    pub fn partial_prepayment_fee(mut self, rate: Rate) -> Self {
        self.costs.partial_prepayment_fee_rate = rate;
        self
    }

    pub fn full_cancellation_fee(mut self, rate: Rate) -> Self {
        self.costs.full_cancellation_fee_rate = rate;
        self
    }

    pub fn fixed_operation_cost(mut self, cost: Money) -> Self {
        self.costs.fixed_operation_cost = cost;
        self
    }

    pub fn max_bonification_rate(mut self, rate: Rate) -> Self {
        self.bonifications.max_bonification_rate = rate;
        self
    }

    pub fn bonification(mut self, bonification: Bonification) -> Self {
        self.bonifications.items.push(bonification);
        self
    }

    pub fn bonification_review_months(mut self, months: u32) -> Self {
        self.bonifications.review_period_months = months;
        self
    }

    /// every configured bonification applies until `date`
    pub fn guaranteed_until(mut self, date: NaiveDate) -> Self {
        self.bonifications.max_bonification_end_date = Some(date);
        self
    }

    pub fn bonification_period_end(mut self, date: NaiveDate, evaluation_offset_days: u32) -> Self {
        self.bonifications.period_end_date = Some(date);
        self.bonifications.evaluation_offset_days = evaluation_offset_days;
        self
    }

    pub fn evaluation_date(mut self, date: NaiveDate) -> Self {
        self.bonifications.evaluation_date = Some(date);
        self
    }

    pub fn build(self) -> Result<Loan> {
        let principal = self.principal.ok_or(EngineError::Configuration {
            message: "Principal required".to_string(),
        })?;

        let signing_date = self.signing_date.ok_or(EngineError::Configuration {
            message: "Signing date required".to_string(),
        })?;

        let total_term_months = self.term_months.ok_or(EngineError::Configuration {
            message: "Term required".to_string(),
        })?;

        let rate = self.rate.ok_or(EngineError::Configuration {
            message: "Rate required".to_string(),
        })?;

        let id = Uuid::new_v4();
        let name = self
            .name
            .unwrap_or_else(|| format!("LOAN-{}", id.to_string()[..8].to_uppercase()));

        let loan = Loan {
            id,
            name,
            property_id: self.property_id,
            principal_initial: principal,
            principal_outstanding: principal,
            signing_date,
            total_term_months,
            rate,
            irregular: self.irregular,
            billing: self.billing,
            costs: self.costs,
            bonifications: self.bonifications,
            prepayments: Vec::new(),
        };

        loan.validate_terms(&EngineConfig::default())?;
        Ok(loan)
    }
}

impl Default for LoanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::bonification::BonificationRule;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn builder() -> LoanBuilder {
        Loan::builder()
            .name("Piso Bilbao")
            .principal(Money::from_major(120_000))
            .signing_date(date(2024, 5, 14))
            .term_months(240)
            .fixed_rate(Rate::from_decimal(dec!(0.029)))
    }

    #[test]
    fn test_builder_defaults() {
        let loan = builder().build().unwrap();
        assert_eq!(loan.principal_outstanding, loan.principal_initial);
        assert_eq!(loan.billing.charge_day_of_month, 1);
        assert!(loan.irregular.charge_in_arrears);
        assert!(loan.prepayments.is_empty());
        assert!(loan.bonifications.items.is_empty());
    }

    #[test]
    fn test_builder_requires_core_terms() {
        let missing_rate = Loan::builder()
            .principal(Money::from_major(1_000))
            .signing_date(date(2024, 1, 1))
            .term_months(12)
            .build();
        assert!(matches!(missing_rate, Err(EngineError::Configuration { .. })));

        let generated = Loan::builder()
            .principal(Money::from_major(1_000))
            .signing_date(date(2024, 1, 1))
            .term_months(12)
            .fixed_rate(Rate::from_percentage(2))
            .build()
            .unwrap();
        assert!(generated.name.starts_with("LOAN-"));
    }

    #[test]
    fn test_invalid_terms_rejected() {
        assert!(matches!(
            builder().principal(Money::ZERO).build(),
            Err(EngineError::Validation { .. })
        ));
        assert!(builder().term_months(0).build().is_err());
        assert!(builder().charge_day(32).build().is_err());
        assert!(builder().interest_only_months(120).deferred_months(120).build().is_err());
    }

    #[test]
    fn test_validate_reports_bonification_cap() {
        let loan = builder()
            .max_bonification_rate(Rate::from_bps(50))
            .bonification(Bonification::new("nomina", Rate::from_bps(40), BonificationRule::PayrollDeposit {
                minimum_monthly_amount: Money::from_major(1_500),
            }))
            .bonification(Bonification::new("hogar", Rate::from_bps(20), BonificationRule::HomeInsurance {
                active: true,
            }))
            .build()
            .unwrap();

        let err = loan.validate(&EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "bonifications"));
        assert!(loan.validate_terms(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_prepayment_fee_rates() {
        let costs = CostTerms {
            partial_prepayment_fee_rate: Rate::from_percentage(1),
            full_cancellation_fee_rate: Rate::from_decimal(dec!(0.005)),
            fixed_operation_cost: Money::from_major(30),
        };
        let outstanding = Money::from_major(50_000);

        assert_eq!(costs.prepayment_fee(Money::from_major(10_000), outstanding), Money::from_major(130));
        assert_eq!(costs.prepayment_fee(outstanding, outstanding), Money::from_major(280));
    }

    #[test]
    fn test_json_snapshot() {
        let loan = builder().charge_day(28).debit_account("ES12-0000").build().unwrap();
        let json = loan.json().unwrap();
        assert!(json.contains("\"charge_day_of_month\": 28"));
        assert_eq!(Loan::from_json(&json).unwrap(), loan);
    }
}
