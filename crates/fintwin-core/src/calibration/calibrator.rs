use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::seasonality::{
    empirical_seasonality, Seasonality, DEFAULT_EXPENSE_SEASONALITY, FLAT_SEASONALITY,
};
use super::stats::{mean, median, population_std, STD_FLOOR};
use crate::ledger::history::TransactionHistory;
use crate::types::{money_to_f64, with_metadata_f64, ComputationOutput, MonthKey, Transaction, UserProfile};
use crate::FinTwinResult;

/// Minimum number of observed months for an estimate to be trusted.
pub const RELIABILITY_MIN_MONTHS: usize = 6;

/// Categories whose spend is assumed to shrink when income falls.
pub const DEFAULT_DISCRETIONARY_CATEGORIES: [&str; 8] = [
    "entertainment",
    "dining",
    "restaurants",
    "shopping",
    "clothing",
    "leisure",
    "travel",
    "subscriptions",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Statistical summary of one monthly flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibratedDistribution {
    pub label: String,
    pub mean: f64,
    /// Population standard deviation of the monthly totals.
    pub std_dev: f64,
    pub median: f64,
    pub seasonality: Seasonality,
    pub sample_size: usize,
    pub is_reliable: bool,
}

impl CalibratedDistribution {
    pub fn from_samples(label: &str, samples: &[(MonthKey, f64)]) -> Self {
        let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
        let m = mean(&values);
        CalibratedDistribution {
            label: label.to_string(),
            mean: m,
            std_dev: population_std(&values),
            median: median(&values),
            seasonality: empirical_seasonality(samples, m),
            sample_size: values.len(),
            is_reliable: values.len() >= RELIABILITY_MIN_MONTHS,
        }
    }

    /// Coefficient of variation with the mean floored at one currency unit.
    pub fn cv(&self) -> f64 {
        if self.sample_size < 2 {
            0.0
        } else {
            self.std_dev / self.mean.max(1.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Calibrated,
    ProfileFallback,
}

/// Parameters a sampler draws monthly values from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingModel {
    pub label: String,
    pub mean: f64,
    pub std_dev: f64,
    pub seasonality: Seasonality,
    pub source: ModelSource,
    /// Observed month-to-month variability (0 for fallbacks).
    pub cv: f64,
}

impl SamplingModel {
    pub fn seasonal_mean(&self, month_index: usize) -> f64 {
        self.mean * self.seasonality.get(month_index).copied().unwrap_or(1.0)
    }

    /// Standard deviation with the degenerate case floored.
    pub fn sampling_std(&self) -> f64 {
        if self.std_dev.is_finite() && self.std_dev > STD_FLOOR {
            self.std_dev
        } else {
            STD_FLOOR
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ModelSource::ProfileFallback
    }
}

/// Calibrated income/expense distributions for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    pub income: CalibratedDistribution,
    pub expense: CalibratedDistribution,
    pub by_category: BTreeMap<String, CalibratedDistribution>,
    pub months_observed: usize,
    pub first_month: Option<MonthKey>,
    pub last_month: Option<MonthKey>,
}

impl Calibration {
    pub fn from_history(history: &TransactionHistory) -> Self {
        let by_category = history
            .categories()
            .into_iter()
            .map(|c| {
                let dist = CalibratedDistribution::from_samples(&c, &history.category_samples(&c));
                (c, dist)
            })
            .collect();
        Calibration {
            income: CalibratedDistribution::from_samples("income", &history.income_samples()),
            expense: CalibratedDistribution::from_samples("expense", &history.expense_samples()),
            by_category,
            months_observed: history.months_observed(),
            first_month: history.first_month(),
            last_month: history.last_month(),
        }
    }

    /// Income model; stated income with flat seasonality when unreliable.
    pub fn income_model(&self, profile: &UserProfile) -> SamplingModel {
        if self.income.is_reliable {
            return calibrated_model(&self.income);
        }
        let m = money_to_f64(profile.monthly_income);
        SamplingModel {
            label: "income".into(),
            mean: m,
            std_dev: m * profile.variability_pct,
            seasonality: FLAT_SEASONALITY,
            source: ModelSource::ProfileFallback,
            cv: 0.0,
        }
    }

    /// Expense model; stated outflows with the default seasonal table when unreliable.
    pub fn expense_model(&self, profile: &UserProfile) -> SamplingModel {
        if self.expense.is_reliable {
            return calibrated_model(&self.expense);
        }
        let m = money_to_f64(profile.estimated_expense());
        SamplingModel {
            label: "expense".into(),
            mean: m,
            std_dev: m * profile.variability_pct,
            seasonality: DEFAULT_EXPENSE_SEASONALITY,
            source: ModelSource::ProfileFallback,
            cv: 0.0,
        }
    }

    /// Sum of reliable discretionary category means, else the stated variable spend.
    pub fn discretionary_mean(&self, profile: &UserProfile, categories: &[String]) -> f64 {
        let reliable: Vec<f64> = categories
            .iter()
            .filter_map(|c| self.by_category.get(&c.trim().to_lowercase()))
            .filter(|d| d.is_reliable)
            .map(|d| d.mean)
            .collect();
        if reliable.is_empty() {
            money_to_f64(profile.avg_variable_outflows)
        } else {
            reliable.iter().sum()
        }
    }

    /// One warning per flow that fell back to profile defaults.
    pub fn fallback_warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.income.is_reliable {
            out.push(format!(
                "Income history covers {} month(s) (< {}); using stated monthly income",
                self.income.sample_size, RELIABILITY_MIN_MONTHS
            ));
        }
        if !self.expense.is_reliable {
            out.push(format!(
                "Expense history covers {} month(s) (< {}); using stated outflows with default seasonality",
                self.expense.sample_size, RELIABILITY_MIN_MONTHS
            ));
        }
        out
    }
}

fn calibrated_model(dist: &CalibratedDistribution) -> SamplingModel {
    SamplingModel {
        label: dist.label.clone(),
        mean: dist.mean,
        std_dev: dist.std_dev,
        seasonality: dist.seasonality,
        source: ModelSource::Calibrated,
        cv: dist.cv(),
    }
}

pub fn default_discretionary_categories() -> Vec<String> {
    DEFAULT_DISCRETIONARY_CATEGORIES
        .iter()
        .map(|c| c.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationInput {
    pub profile: UserProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Calibrate income, expense and per-category distributions from history.
///
/// Short histories are not an error: distributions come back with
/// `is_reliable = false` and the envelope names the fallbacks consumers
/// will take.
pub fn calibrate(input: &CalibrationInput) -> FinTwinResult<ComputationOutput<Calibration>> {
    let start = Instant::now();
    input.profile.validate()?;

    let history = TransactionHistory::for_user(&input.profile.user_id, &input.transactions)?;
    let calibration = Calibration::from_history(&history);

    let mut warnings = calibration.fallback_warnings();
    let unreliable: Vec<&str> = calibration
        .by_category
        .iter()
        .filter(|(_, d)| !d.is_reliable)
        .map(|(c, _)| c.as_str())
        .collect();
    if !unreliable.is_empty() {
        warnings.push(format!(
            "Unreliable categories (< {} non-zero months): {}",
            RELIABILITY_MIN_MONTHS,
            unreliable.join(", ")
        ));
    }
    for w in calibration.fallback_warnings() {
        tracing::warn!(user_id = %input.profile.user_id, "{w}");
    }
    tracing::debug!(
        user_id = %input.profile.user_id,
        months = calibration.months_observed,
        categories = calibration.by_category.len(),
        "calibrated distributions"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Monthly-total calibration (population std, calendar-month seasonality)",
        &serde_json::json!({
            "reliability_min_months": RELIABILITY_MIN_MONTHS,
            "transactions": input.transactions.len(),
        }),
        warnings,
        elapsed,
        calibration,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SalaryFrequency;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn profile() -> UserProfile {
        UserProfile {
            user_id: "u1".into(),
            balance: dec!(2000),
            monthly_income: dec!(1500),
            salary_day: 1,
            salary_frequency: SalaryFrequency::Monthly,
            fixed_outflows: dec!(600),
            avg_variable_outflows: dec!(300),
            variability_pct: 0.1,
        }
    }

    fn tx(y: i32, m: u32, amount: Decimal, cat: &str) -> Transaction {
        Transaction {
            user_id: "u1".into(),
            amount,
            category: cat.into(),
            date: NaiveDate::from_ymd_opt(y, m, 10).unwrap(),
            event_tag: None,
        }
    }

    /// Salary and rent every month, dining only in the first `dining_months`.
    fn history(months: u32, dining_months: u32) -> Vec<Transaction> {
        let mut out = Vec::new();
        for i in 0..months {
            let m = i % 12 + 1;
            let y = 2024 + (i / 12) as i32;
            out.push(tx(y, m, dec!(1500), "salary"));
            out.push(tx(y, m, dec!(-600), "rent"));
            if i < dining_months {
                out.push(tx(y, m, dec!(-80), "dining"));
            }
        }
        out
    }

    #[test]
    fn test_reliable_history_uses_calibrated_models() {
        let input = CalibrationInput {
            profile: profile(),
            transactions: history(8, 8),
        };
        let out = calibrate(&input).unwrap();
        let cal = &out.result;
        assert_eq!(cal.months_observed, 8);
        assert!(cal.income.is_reliable);
        assert!((cal.income.mean - 1500.0).abs() < 1e-9);
        assert!(cal.income.std_dev.abs() < 1e-9);
        assert!((cal.expense.mean - 680.0).abs() < 1e-9);
        let model = cal.expense_model(&input.profile);
        assert_eq!(model.source, ModelSource::Calibrated);
        assert!((model.sampling_std() - STD_FLOOR).abs() < 1e-12);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_sparse_category_is_unreliable_alongside_reliable_ones() {
        let input = CalibrationInput {
            profile: profile(),
            transactions: history(9, 4),
        };
        let cal = calibrate(&input).unwrap().result;
        assert!(cal.by_category["rent"].is_reliable);
        assert!(cal.by_category["salary"].is_reliable);
        assert!(!cal.by_category["dining"].is_reliable);
        assert_eq!(cal.by_category["dining"].sample_size, 4);
    }

    #[test]
    fn test_short_history_falls_back_with_warnings() {
        let input = CalibrationInput {
            profile: profile(),
            transactions: history(3, 3),
        };
        let out = calibrate(&input).unwrap();
        let cal = &out.result;
        assert!(!cal.income.is_reliable);
        let income = cal.income_model(&input.profile);
        assert!(income.is_fallback());
        assert!((income.mean - 1500.0).abs() < 1e-9);
        assert!((income.std_dev - 150.0).abs() < 1e-9);
        assert_eq!(income.seasonality, FLAT_SEASONALITY);

        let expense = cal.expense_model(&input.profile);
        assert!((expense.mean - 900.0).abs() < 1e-9);
        assert_eq!(expense.seasonality, DEFAULT_EXPENSE_SEASONALITY);
        assert!(out.warnings.iter().any(|w| w.contains("using stated monthly income")));
        assert!(out.warnings.iter().any(|w| w.contains("using stated outflows")));
        assert!(out.warnings.iter().any(|w| w.starts_with("Unreliable categories")));
    }

    #[test]
    fn test_discretionary_mean_falls_back_to_stated_variable_spend() {
        let p = profile();
        let cats = default_discretionary_categories();
        let sparse = Calibration::from_history(&TransactionHistory::from_transactions(&history(9, 2)));
        assert!((sparse.discretionary_mean(&p, &cats) - 300.0).abs() < 1e-9);
        let full = Calibration::from_history(&TransactionHistory::from_transactions(&history(9, 9)));
        assert!((full.discretionary_mean(&p, &cats) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_history_is_not_an_error() {
        let input = CalibrationInput {
            profile: profile(),
            transactions: vec![],
        };
        let out = calibrate(&input).unwrap();
        assert_eq!(out.result.months_observed, 0);
        assert!(out.result.first_month.is_none());
    }

    proptest! {
        #[test]
        fn prop_reliability_tracks_distinct_months(months in 0u32..15) {
            let cal = Calibration::from_history(&TransactionHistory::from_transactions(&history(months, 0)));
            prop_assert_eq!(cal.income.is_reliable, months as usize >= RELIABILITY_MIN_MONTHS);
            prop_assert_eq!(cal.expense.is_reliable, months as usize >= RELIABILITY_MIN_MONTHS);
            prop_assert!(cal.income.std_dev >= 0.0);
        }
    }
}
