use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FinTwinError;
use crate::FinTwinResult;

/// All stored monetary values. Decimal so balances never drift.
pub type Money = Decimal;

/// Convert a stored amount into the f64 domain used by statistics and simulation.
pub fn money_to_f64(value: Money) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Convert a simulated f64 back into money, rounded to cents.
pub fn money_from_f64(value: f64) -> Money {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Profile & transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalaryFrequency {
    #[default]
    Monthly,
    Biweekly,
    Irregular,
}

/// Stated financial profile of a user. Read-only for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    /// Current account balance. May be negative (overdrawn).
    pub balance: Money,
    /// Stated monthly income, used whenever history is too short.
    pub monthly_income: Money,
    /// Day of month the salary usually lands.
    #[serde(default = "default_salary_day")]
    pub salary_day: u32,
    #[serde(default)]
    pub salary_frequency: SalaryFrequency,
    /// Rent, utilities and other committed monthly outflows.
    #[serde(default)]
    pub fixed_outflows: Money,
    /// Average discretionary spend per month.
    #[serde(default)]
    pub avg_variable_outflows: Money,
    /// Relative spread applied to fallback models (0.15 = 15%).
    #[serde(default = "default_variability_pct")]
    pub variability_pct: f64,
}

fn default_salary_day() -> u32 {
    1
}

fn default_variability_pct() -> f64 {
    0.15
}

impl UserProfile {
    /// Expense estimate used when there is not enough history.
    pub fn estimated_expense(&self) -> Money {
        self.fixed_outflows + self.avg_variable_outflows
    }

    pub fn validate(&self) -> FinTwinResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(FinTwinError::invalid("user_id", "Must not be empty"));
        }
        if self.monthly_income < Decimal::ZERO {
            return Err(FinTwinError::invalid("monthly_income", "Must be non-negative"));
        }
        if self.fixed_outflows < Decimal::ZERO {
            return Err(FinTwinError::invalid("fixed_outflows", "Must be non-negative"));
        }
        if self.avg_variable_outflows < Decimal::ZERO {
            return Err(FinTwinError::invalid(
                "avg_variable_outflows",
                "Must be non-negative",
            ));
        }
        if !(1..=31).contains(&self.salary_day) {
            return Err(FinTwinError::invalid("salary_day", "Must be between 1 and 31"));
        }
        if !self.variability_pct.is_finite() || !(0.0..=1.0).contains(&self.variability_pct) {
            return Err(FinTwinError::invalid(
                "variability_pct",
                "Must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// A historical account movement. Positive amounts are inflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: String,
    pub amount: Money,
    pub category: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_tag: Option<String>,
}

impl Transaction {
    pub fn is_inflow(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

// ---------------------------------------------------------------------------
// Calendar months
// ---------------------------------------------------------------------------

/// A calendar month, serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    pub year: i32,
    /// 1-based calendar month.
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> FinTwinResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(FinTwinError::DateError(format!("month {month} out of range")));
        }
        Ok(MonthKey { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Zero-based calendar index (January = 0).
    pub fn index(&self) -> usize {
        (self.month - 1) as usize
    }

    pub fn plus(&self, months: u32) -> Self {
        let total = self.year as i64 * 12 + (self.month as i64 - 1) + months as i64;
        MonthKey {
            year: total.div_euclid(12) as i32,
            month: total.rem_euclid(12) as u32 + 1,
        }
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(&self, other: &MonthKey) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = FinTwinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| FinTwinError::DateError(format!("expected YYYY-MM, got {s}")))?;
        let year = y
            .parse::<i32>()
            .map_err(|e| FinTwinError::DateError(format!("bad year in {s}: {e}")))?;
        let month = m
            .parse::<u32>()
            .map_err(|e| FinTwinError::DateError(format!("bad month in {s}: {e}")))?;
        MonthKey::new(year, month)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = FinTwinError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}

/// `date` shifted forward by `months`, clamped to the end of shorter months.
pub fn add_months(date: NaiveDate, months: u32) -> FinTwinResult<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| FinTwinError::DateError(format!("{date} + {months} months overflows")))
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

fn envelope<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    precision: &str,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: precision.to_string(),
        },
    }
}

/// Wrap a Decimal computation (amortization, money arithmetic).
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    envelope(
        methodology,
        assumptions,
        warnings,
        elapsed_us,
        "rust_decimal_128bit",
        result,
    )
}

/// Wrap a statistical / simulated computation.
pub fn with_metadata_f64<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    envelope(methodology, assumptions, warnings, elapsed_us, "ieee754_f64", result)
}
