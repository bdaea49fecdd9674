use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::events::LifeEvent;
use crate::lending::loan::Loan;
use crate::types::{Transaction, UserProfile};

/// Read access to the data the engine needs for one user.
pub trait FinancialDataSource {
    fn user_profile(&self, user_id: &str) -> Option<UserProfile>;

    /// All transactions for the user, oldest first.
    fn transaction_history(&self, user_id: &str) -> Vec<Transaction>;

    /// Built-in (as overridden) and custom events in play for the user.
    fn active_events(&self, user_id: &str) -> Vec<LifeEvent>;

    /// Loans whose schedules produce payments (approved or active).
    fn active_loans(&self, user_id: &str) -> Vec<Loan>;
}

/// A process-local store, mainly for tests and the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryStore {
    #[serde(default)]
    profiles: HashMap<String, UserProfile>,
    #[serde(default)]
    transactions: HashMap<String, Vec<Transaction>>,
    #[serde(default)]
    events: HashMap<String, Vec<LifeEvent>>,
    #[serde(default)]
    loans: HashMap<String, Vec<Loan>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_profile(&mut self, profile: UserProfile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    pub fn record_transaction(&mut self, tx: Transaction) {
        let list = self.transactions.entry(tx.user_id.clone()).or_default();
        let pos = list.partition_point(|t| t.date <= tx.date);
        list.insert(pos, tx);
    }

    pub fn add_event(&mut self, user_id: &str, event: LifeEvent) {
        let list = self.events.entry(user_id.to_string()).or_default();
        list.retain(|e| e.id != event.id);
        list.push(event);
    }

    /// Insert or replace a loan by id.
    pub fn upsert_loan(&mut self, loan: Loan) {
        let list = self.loans.entry(loan.user_id.clone()).or_default();
        list.retain(|l| l.id != loan.id);
        list.push(loan);
    }

    pub fn loan_mut(&mut self, user_id: &str, loan_id: &str) -> Option<&mut Loan> {
        self.loans
            .get_mut(user_id)
            .and_then(|ls| ls.iter_mut().find(|l| l.id == loan_id))
    }

    pub fn all_loans(&self, user_id: &str) -> Vec<Loan> {
        self.loans.get(user_id).cloned().unwrap_or_default()
    }
}

impl FinancialDataSource for InMemoryStore {
    fn user_profile(&self, user_id: &str) -> Option<UserProfile> {
        self.profiles.get(user_id).cloned()
    }

    fn transaction_history(&self, user_id: &str) -> Vec<Transaction> {
        self.transactions.get(user_id).cloned().unwrap_or_default()
    }

    fn active_events(&self, user_id: &str) -> Vec<LifeEvent> {
        self.events.get(user_id).cloned().unwrap_or_default()
    }

    fn active_loans(&self, user_id: &str) -> Vec<Loan> {
        self.loans
            .get(user_id)
            .map(|ls| ls.iter().filter(|l| l.status.is_servicing()).cloned().collect())
            .unwrap_or_default()
    }
}
