use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{BonificationId, BonificationStatus, LoanId, Recalculation, ReductionMode};

/// all events that can be emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // plan events
    PlanGenerated {
        loan_id: LoanId,
        periods: u32,
        total_interest: Money,
        final_payoff_date: Option<NaiveDate>,
        timestamp: DateTime<Utc>,
    },
    InstallmentRecalculated {
        loan_id: LoanId,
        period_index: u32,
        installment: Money,
        annual_rate: Rate,
        reason: Recalculation,
        timestamp: DateTime<Utc>,
    },
    IndexReviewed {
        loan_id: LoanId,
        reference_index: String,
        old_value: Option<Rate>,
        new_value: Rate,
        timestamp: DateTime<Utc>,
    },

    // bonification events
    BonificationStatusChanged {
        loan_id: LoanId,
        bonification_id: BonificationId,
        old_status: BonificationStatus,
        new_status: BonificationStatus,
        effective_from: Option<NaiveDate>,
        timestamp: DateTime<Utc>,
    },

    // prepayment events
    PrepaymentSimulated {
        loan_id: LoanId,
        amount: Money,
        mode: ReductionMode,
        interest_saved: Money,
        timestamp: DateTime<Utc>,
    },
    PrepaymentApplied {
        loan_id: LoanId,
        amount: Money,
        fee: Money,
        mode: ReductionMode,
        new_outstanding: Money,
        timestamp: DateTime<Utc>,
    },

    // store events
    LoanStored {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },
    LoanDeleted {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },
}

/// event store for tracking all engine events
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}
