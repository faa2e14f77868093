use std::collections::HashMap;

use crate::errors::{EngineError, Result};
use crate::loan::Loan;
use crate::types::LoanId;

/// object-store persistence for loan records
pub trait LoanStore {
    fn get(&self, id: LoanId) -> Result<Loan>;
    fn put(&mut self, loan: &Loan) -> Result<()>;
    fn delete(&mut self, id: LoanId) -> Result<()>;
}

/// keeps serialized loan snapshots in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoanStore {
    snapshots: HashMap<LoanId, String>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn contains(&self, id: LoanId) -> bool {
        self.snapshots.contains_key(&id)
    }
}

impl LoanStore for InMemoryLoanStore {
    fn get(&self, id: LoanId) -> Result<Loan> {
        let snapshot = self
            .snapshots
            .get(&id)
            .ok_or(EngineError::LoanNotFound { id })?;
        Loan::from_json(snapshot)
    }

    fn put(&mut self, loan: &Loan) -> Result<()> {
        self.snapshots.insert(loan.id, serde_json::to_string(loan)?);
        Ok(())
    }

    fn delete(&mut self, id: LoanId) -> Result<()> {
        self.snapshots
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::LoanNotFound { id })
    }
}
