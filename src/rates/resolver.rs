use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::{BonificationChangePolicy, EngineConfig};
use crate::decimal::Rate;
use crate::errors::{EngineError, Result};
use crate::loan::Loan;
use crate::schedule::calendar::BillingCalendar;

/// interest-type configuration of a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateConfig {
    Fixed {
        annual_nominal_rate: Rate,
    },
    Variable(VariableTerms),
    Mixed {
        fixed_tranche_months: u32,
        fixed_tranche_rate: Rate,
        variable: VariableTerms,
    },
}

/// index + spread terms, reviewed every `review_period_months`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableTerms {
    pub reference_index: String,
    pub current_index_value: Option<Rate>,
    pub spread: Rate,
    pub review_period_months: u32,
    pub next_review_date: Option<NaiveDate>,
    /// projected index values keyed by the period index they take effect at
    #[serde(default)]
    pub index_revisions: BTreeMap<u32, Rate>,
}

impl VariableTerms {
    pub fn new(reference_index: impl Into<String>, current_index_value: Rate, spread: Rate, review_period_months: u32) -> Self {
        Self {
            reference_index: reference_index.into(),
            current_index_value: Some(current_index_value),
            spread,
            review_period_months,
            next_review_date: None,
            index_revisions: BTreeMap::new(),
        }
    }

    /// project an index value from `period_index` on
    pub fn with_revision(mut self, period_index: u32, value: Rate) -> Self {
        self.index_revisions.insert(period_index, value);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.current_index_value.is_none() {
            return Err(EngineError::configuration(format!(
                "variable rate on {} has no current index value",
                self.reference_index
            )));
        }
        if self.review_period_months == 0 {
            return Err(EngineError::configuration("review_period_months must be positive"));
        }
        Ok(())
    }

    /// rate for the `k`-th variable period; `origin` is the absolute index of
    /// the first variable period
    fn rate_at(&self, k: u32, origin: u32) -> Result<Rate> {
        self.validate()?;
        let boundary = origin + (k / self.review_period_months) * self.review_period_months;

        let index = match self.index_revisions.range(..=boundary).next_back() {
            Some((_, value)) => *value,
            None => self.current_index_value.ok_or_else(|| {
                EngineError::configuration("variable rate has no current index value")
            })?,
        };

        Ok(index + self.spread)
    }
}

impl RateConfig {
    pub fn fixed(rate: Rate) -> Self {
        RateConfig::Fixed {
            annual_nominal_rate: rate,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            RateConfig::Fixed { .. } => Ok(()),
            RateConfig::Variable(terms) => terms.validate(),
            RateConfig::Mixed {
                fixed_tranche_months,
                variable,
                ..
            } => {
                if *fixed_tranche_months == 0 {
                    return Err(EngineError::configuration(
                        "mixed rate requires a fixed tranche length",
                    ));
                }
                variable.validate()
            }
        }
    }

    /// whether the index is re-read at this period
    pub fn is_review_boundary(&self, period_index: u32) -> bool {
        match self {
            RateConfig::Fixed { .. } => false,
            RateConfig::Variable(terms) => {
                terms.review_period_months > 0 && period_index % terms.review_period_months == 0
            }
            RateConfig::Mixed {
                fixed_tranche_months,
                variable,
                ..
            } => {
                period_index >= *fixed_tranche_months
                    && variable.review_period_months > 0
                    && (period_index - fixed_tranche_months) % variable.review_period_months == 0
            }
        }
    }

    /// first review boundary at or after `period_index`; None for fixed rates
    pub fn next_review_index(&self, period_index: u32) -> Option<u32> {
        let round_up = |offset: u32, step: u32| {
            if step == 0 {
                offset
            } else {
                offset.div_ceil(step) * step
            }
        };
        match self {
            RateConfig::Fixed { .. } => None,
            RateConfig::Variable(terms) => Some(round_up(period_index, terms.review_period_months)),
            RateConfig::Mixed {
                fixed_tranche_months,
                variable,
                ..
            } => {
                let offset = period_index.saturating_sub(*fixed_tranche_months);
                Some(fixed_tranche_months + round_up(offset, variable.review_period_months))
            }
        }
    }

    pub fn variable_terms_mut(&mut self) -> Option<&mut VariableTerms> {
        match self {
            RateConfig::Fixed { .. } => None,
            RateConfig::Variable(terms) => Some(terms),
            RateConfig::Mixed { variable, .. } => Some(variable),
        }
    }

    /// nominal rate before bonifications
    pub fn base_rate(&self, period_index: u32) -> Result<Rate> {
        match self {
            RateConfig::Fixed {
                annual_nominal_rate,
            } => Ok(*annual_nominal_rate),
            RateConfig::Variable(terms) => terms.rate_at(period_index, 0),
            RateConfig::Mixed {
                fixed_tranche_months,
                fixed_tranche_rate,
                variable,
            } => {
                if *fixed_tranche_months == 0 {
                    return Err(EngineError::configuration(
                        "mixed rate requires a fixed tranche length",
                    ));
                }
                if period_index < *fixed_tranche_months {
                    Ok(*fixed_tranche_rate)
                } else {
                    variable.rate_at(period_index - fixed_tranche_months, *fixed_tranche_months)
                }
            }
        }
    }
}

/// resolves the applicable annual rate of a loan per period index
pub struct RateResolver<'a> {
    loan: &'a Loan,
    calendar: BillingCalendar,
    policy: BonificationChangePolicy,
}

impl<'a> RateResolver<'a> {
    pub fn new(loan: &'a Loan, config: &EngineConfig) -> Result<Self> {
        loan.rate.validate()?;
        Ok(Self {
            loan,
            calendar: loan.calendar()?,
            policy: config.bonification_change,
        })
    }

    pub fn base_rate(&self, period_index: u32) -> Result<Rate> {
        self.loan.rate.base_rate(period_index)
    }

    /// combined discount for a period, clamped to the bonification cap
    pub fn bonification_discount(&self, period_index: u32) -> Result<Rate> {
        let start = self.calendar.accrual_window(period_index)?.start;
        let terms = &self.loan.bonifications;
        let raw = terms.raw_discount_on(start, self.policy);
        let cap = terms.max_bonification_rate.max(Rate::ZERO);

        if raw > cap {
            warn!(
                "loan {}: bonifications total {} above cap {}, clamping",
                self.loan.id, raw, cap
            );
        }
        Ok(raw.min(cap).max(Rate::ZERO))
    }

    /// applicable rate: base minus bonification discount, never negative
    pub fn resolve(&self, period_index: u32) -> Result<Rate> {
        let base = self.base_rate(period_index)?;
        let discount = self.bonification_discount(period_index)?;
        Ok((base - discount).max(Rate::ZERO))
    }
}

/// applicable annual rate for a period under the default engine configuration
pub fn resolve_rate(loan: &Loan, period_index: u32) -> Result<Rate> {
    RateResolver::new(loan, &EngineConfig::default())?.resolve(period_index)
}
