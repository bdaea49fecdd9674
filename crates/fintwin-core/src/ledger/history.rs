use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::FinTwinError;
use crate::types::{money_to_f64, MonthKey, Transaction};
use crate::FinTwinResult;

/// Totals for one calendar month of history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlyTotals {
    pub month: Option<MonthKey>,
    /// Sum of inflows.
    pub income: f64,
    /// Sum of absolute outflows.
    pub expense: f64,
    /// Sum of absolute amounts per category.
    pub by_category: BTreeMap<String, f64>,
    pub transaction_count: usize,
}

/// A user's transactions grouped by calendar month and category.
#[derive(Debug, Clone, Default)]
pub struct TransactionHistory {
    months: BTreeMap<MonthKey, MonthlyTotals>,
}

impl TransactionHistory {
    /// Group a transaction list, trusting that it belongs to one user.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut months: BTreeMap<MonthKey, MonthlyTotals> = BTreeMap::new();
        for tx in transactions {
            let key = MonthKey::from_date(tx.date);
            let totals = months.entry(key).or_insert_with(|| MonthlyTotals {
                month: Some(key),
                ..Default::default()
            });
            let amount = money_to_f64(tx.amount);
            if tx.is_inflow() {
                totals.income += amount;
            } else {
                totals.expense += amount.abs();
            }
            *totals
                .by_category
                .entry(tx.category.trim().to_lowercase())
                .or_insert(0.0) += amount.abs();
            totals.transaction_count += 1;
        }
        TransactionHistory { months }
    }

    /// Group a transaction list, rejecting rows that belong to another user.
    pub fn for_user(user_id: &str, transactions: &[Transaction]) -> FinTwinResult<Self> {
        if let Some(tx) = transactions.iter().find(|t| t.user_id != user_id) {
            return Err(FinTwinError::invalid(
                "transactions",
                format!(
                    "transaction dated {} belongs to user {}, expected {}",
                    tx.date, tx.user_id, user_id
                ),
            ));
        }
        Ok(Self::from_transactions(transactions))
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Number of distinct months with at least one transaction.
    pub fn months_observed(&self) -> usize {
        self.months.len()
    }

    pub fn first_month(&self) -> Option<MonthKey> {
        self.months.keys().next().copied()
    }

    pub fn last_month(&self) -> Option<MonthKey> {
        self.months.keys().next_back().copied()
    }

    pub fn months(&self) -> impl Iterator<Item = (&MonthKey, &MonthlyTotals)> {
        self.months.iter()
    }

    pub fn income_samples(&self) -> Vec<(MonthKey, f64)> {
        self.months.iter().map(|(k, t)| (*k, t.income)).collect()
    }

    pub fn expense_samples(&self) -> Vec<(MonthKey, f64)> {
        self.months.iter().map(|(k, t)| (*k, t.expense)).collect()
    }

    /// Monthly totals of `category`, only for months where it is non-zero.
    pub fn category_samples(&self, category: &str) -> Vec<(MonthKey, f64)> {
        let key = category.trim().to_lowercase();
        self.months
            .iter()
            .filter_map(|(k, t)| match t.by_category.get(&key) {
                Some(v) if *v != 0.0 => Some((*k, *v)),
                _ => None,
            })
            .collect()
    }

    pub fn categories(&self) -> BTreeSet<String> {
        self.months
            .values()
            .flat_map(|t| t.by_category.keys().cloned())
            .collect()
    }

    pub fn average_monthly_income(&self) -> Option<f64> {
        average(self.months.values().map(|t| t.income))
    }

    pub fn average_monthly_expense(&self) -> Option<f64> {
        average(self.months.values().map(|t| t.expense))
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}
