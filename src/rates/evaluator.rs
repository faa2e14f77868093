use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{BonificationChangePolicy, EngineConfig};
use crate::errors::Result;
use crate::loan::Loan;
use crate::rates::bonification::Bonification;
use crate::rates::compliance::ComplianceSource;
use crate::rates::savings::{savings_for, SavingsBreakdown};
use crate::schedule::builder::build_schedule;
use crate::types::{BonificationId, BonificationStatus};

/// outcome of evaluating one bonification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonificationAssessment {
    pub bonification_id: BonificationId,
    pub name: String,
    pub previous: BonificationStatus,
    pub status: BonificationStatus,
    /// None when no compliance signal was available
    pub compliant: Option<bool>,
}

impl BonificationAssessment {
    pub fn changed(&self) -> bool {
        self.previous != self.status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    EvaluationApproaching { days_left: i64 },
    AtRisk,
    Lost,
    GuaranteeEnding { days_left: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonificationAlert {
    /// None for loan-wide alerts
    pub bonification_id: Option<BonificationId>,
    pub kind: AlertKind,
    pub date: NaiveDate,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub as_of: NaiveDate,
    /// next evaluation, or the latest one once none is scheduled
    pub evaluation_date: Option<NaiveDate>,
    pub statuses: Vec<BonificationAssessment>,
    pub alerts: Vec<BonificationAlert>,
    pub savings: SavingsBreakdown,
}

impl EvaluationResult {
    pub fn status_of(&self, id: BonificationId) -> Option<BonificationStatus> {
        self.statuses.iter().find(|a| a.bonification_id == id).map(|a| a.status)
    }
}

/// evaluation calendar and history a status is derived against
struct StatusContext {
    as_of: NaiveDate,
    /// latest evaluation on or before `as_of`
    passed: Option<NaiveDate>,
    /// evaluation on or after `as_of`
    upcoming: Option<NaiveDate>,
    guaranteed: bool,
    at_risk_window_days: u32,
}

/// derive a status from a compliance signal and the evaluation calendar
fn derive_status(bonification: &Bonification, compliant: Option<bool>, ctx: &StatusContext) -> BonificationStatus {
    let current = bonification.status;
    let was_met = matches!(current, BonificationStatus::Met | BonificationStatus::AtRisk);

    match (compliant, ctx.passed, ctx.upcoming) {
        (None, _, _) => current,
        (Some(true), _, _) => BonificationStatus::Met,
        (Some(false), None, None) => BonificationStatus::AtRisk,
        // before the first evaluation
        (Some(false), None, Some(_)) if was_met => BonificationStatus::AtRisk,
        (Some(false), None, Some(evaluation)) => {
            if (evaluation - ctx.as_of).num_days() <= ctx.at_risk_window_days as i64 {
                BonificationStatus::AtRisk
            } else {
                BonificationStatus::Pending
            }
        }
        (Some(false), Some(_), _) if ctx.guaranteed => BonificationStatus::AtRisk,
        // met since the last evaluation, the next one decides
        (Some(false), Some(passed), _)
            if current == BonificationStatus::Met
                && bonification.last_decided_on().map_or(false, |decided| decided >= passed) =>
        {
            BonificationStatus::AtRisk
        }
        (Some(false), Some(_), _) => BonificationStatus::Lost,
    }
}

/// judge every bonification of a loan as of `as_of`
pub fn evaluate_bonifications(
    loan: &Loan,
    as_of: NaiveDate,
    source: &dyn ComplianceSource,
    config: &EngineConfig,
) -> Result<EvaluationResult> {
    let terms = &loan.bonifications;
    let (passed, upcoming) = terms.evaluation_checkpoints(as_of);
    let evaluation_date = upcoming.or(passed);
    let guaranteed = terms.is_guaranteed(as_of);
    let ctx = StatusContext {
        as_of,
        passed,
        upcoming,
        guaranteed,
        at_risk_window_days: config.at_risk_window_days,
    };

    let mut statuses = Vec::with_capacity(terms.items.len());
    let mut alerts = Vec::new();

    for bonification in &terms.items {
        let observation = source
            .observe(bonification, as_of)
            .or_else(|| bonification.rule.fallback_observation());
        let compliant = match &observation {
            Some(obs) => Some(bonification.rule.is_satisfied(obs, bonification.lookback_months)?),
            None => None,
        };

        let status = derive_status(bonification, compliant, &ctx);

        match status {
            BonificationStatus::AtRisk => alerts.push(BonificationAlert {
                bonification_id: Some(bonification.id),
                kind: AlertKind::AtRisk,
                date: upcoming.unwrap_or(as_of),
                message: format!("{} ({}) is not being met", bonification.name, bonification.rule.label()),
            }),
            BonificationStatus::Lost if bonification.status != BonificationStatus::Lost => {
                alerts.push(BonificationAlert {
                    bonification_id: Some(bonification.id),
                    kind: AlertKind::Lost,
                    date: as_of,
                    message: format!("{} lost, {} no longer discounted", bonification.name, bonification.rate_reduction_points),
                })
            }
            _ => {}
        }

        statuses.push(BonificationAssessment {
            bonification_id: bonification.id,
            name: bonification.name.clone(),
            previous: bonification.status,
            status,
            compliant,
        });
    }

    let lead = config.alert_lead_days as i64;
    if let Some(evaluation) = upcoming {
        let days_left = (evaluation - as_of).num_days();
        if (0..=lead).contains(&days_left) {
            alerts.push(BonificationAlert {
                bonification_id: None,
                kind: AlertKind::EvaluationApproaching { days_left },
                date: evaluation,
                message: format!("bonification evaluation in {} days", days_left),
            });
        }
    }
    if let Some(end) = terms.max_bonification_end_date {
        let days_left = (end - as_of).num_days();
        if (0..=lead).contains(&days_left) {
            alerts.push(BonificationAlert {
                bonification_id: None,
                kind: AlertKind::GuaranteeEnding { days_left },
                date: end,
                message: format!("guaranteed bonification period ends in {} days", days_left),
            });
        }
    }

    // savings under the assessed statuses, from the next billing period
    let plan = build_schedule(loan, config)?;
    let counted: Vec<&Bonification> = terms
        .items
        .iter()
        .zip(&statuses)
        .filter(|(_, assessment)| guaranteed || assessment.status == BonificationStatus::Met)
        .map(|(bonification, _)| bonification)
        .collect();
    let savings = savings_for(loan, &plan, as_of, &counted)?;

    debug!(
        "loan {}: evaluated {} bonifications as of {}, {} alerts",
        loan.id,
        statuses.len(),
        as_of,
        alerts.len()
    );

    Ok(EvaluationResult {
        as_of,
        evaluation_date,
        statuses,
        alerts,
        savings,
    })
}

/// loan carrying the assessed statuses; changes take effect from the first
/// charge after the evaluation unless the policy is retroactive
pub fn apply_assessments(loan: &Loan, result: &EvaluationResult, config: &EngineConfig) -> Result<Loan> {
    let effective_from = match config.bonification_change {
        BonificationChangePolicy::Retroactive => None,
        BonificationChangePolicy::Prospective => {
            let calendar = loan.calendar()?;
            match calendar.first_period_charged_after(result.as_of, loan.total_term_months)? {
                Some(index) => Some(calendar.accrual_window(index)?.start),
                None => Some(result.as_of),
            }
        }
    };

    let mut updated = loan.clone();
    for bonification in updated.bonifications.items.iter_mut() {
        if let Some(status) = result.status_of(bonification.id) {
            bonification.transition(status, result.as_of, effective_from);
        }
    }
    Ok(updated)
}
