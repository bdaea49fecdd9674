use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FinTwinError;
use crate::types::{money_to_f64, Money, MonthKey};
use crate::FinTwinResult;

/// z-score of the 90th percentile of a standard normal.
const Z_90: f64 = 1.281_551_565_545;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostDistribution {
    #[default]
    Normal,
    /// Uniform with the same mean and variance as the stated normal.
    Uniform,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    #[default]
    None,
    Yearly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventOrigin {
    #[default]
    Builtin,
    Custom { owner: String },
}

/// A scheduled expense with an uncertain cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Expected cost per month the event is active.
    pub cost_mean: Money,
    #[serde(default)]
    pub cost_std: Money,
    #[serde(default)]
    pub distribution: CostDistribution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub origin: EventOrigin,
}

impl LifeEvent {
    pub fn validate(&self) -> FinTwinResult<()> {
        if self.id.trim().is_empty() {
            return Err(FinTwinError::invalid("event.id", "Must not be empty"));
        }
        if self.start_date > self.end_date {
            return Err(FinTwinError::invalid(
                "event.start_date",
                format!(
                    "{}: start {} is after end {}",
                    self.id, self.start_date, self.end_date
                ),
            ));
        }
        if self.cost_mean.is_sign_negative() {
            return Err(FinTwinError::invalid(
                "event.cost_mean",
                format!("{}: must be non-negative", self.id),
            ));
        }
        if self.cost_std.is_sign_negative() {
            return Err(FinTwinError::invalid(
                "event.cost_std",
                format!("{}: must be non-negative", self.id),
            ));
        }
        Ok(())
    }

    /// Validate and check that a custom event belongs to `user_id`.
    pub fn validate_for(&self, user_id: &str) -> FinTwinResult<()> {
        self.validate()?;
        if let EventOrigin::Custom { owner } = &self.origin {
            if owner != user_id {
                return Err(FinTwinError::invalid(
                    "event.origin",
                    format!("{} is owned by {owner}, not {user_id}", self.id),
                ));
            }
        }
        Ok(())
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.origin, EventOrigin::Custom { .. })
    }

    pub fn start_month(&self) -> MonthKey {
        MonthKey::from_date(self.start_date)
    }

    pub fn end_month(&self) -> MonthKey {
        MonthKey::from_date(self.end_date)
    }

    /// Whether any day of `month` falls inside the event (or a yearly repeat).
    pub fn overlaps(&self, month: MonthKey) -> bool {
        let start = self.start_month();
        let end = self.end_month();
        match self.recurrence {
            Recurrence::None => start <= month && month <= end,
            Recurrence::Yearly => {
                if month < start {
                    return false;
                }
                let years = (month.year - start.year) as u32;
                // A span crossing New Year may still be running from last year's repeat.
                [years.saturating_sub(1), years].iter().any(|y| {
                    let s = start.plus(12 * y);
                    let e = end.plus(12 * y);
                    s <= month && month <= e
                })
            }
        }
    }

    pub fn mean_cost(&self) -> f64 {
        money_to_f64(self.cost_mean)
    }

    pub fn std_cost(&self) -> f64 {
        money_to_f64(self.cost_std)
    }

    /// Support of the uniform cost shape: `mean ± std·√3`.
    pub fn uniform_bounds(&self) -> (f64, f64) {
        let half = self.std_cost() * 3f64.sqrt();
        (self.mean_cost() - half, self.mean_cost() + half)
    }

    /// 10th and 90th percentile of a single month's cost, floored at zero.
    pub fn cost_range(&self) -> (f64, f64) {
        let (lo, hi) = match self.distribution {
            CostDistribution::Normal => (
                self.mean_cost() - Z_90 * self.std_cost(),
                self.mean_cost() + Z_90 * self.std_cost(),
            ),
            CostDistribution::Uniform => {
                let (a, b) = self.uniform_bounds();
                (a + 0.1 * (b - a), a + 0.9 * (b - a))
            }
        };
        (lo.max(0.0), hi.max(0.0))
    }

    /// Variance of one month's cost.
    pub fn cost_variance(&self) -> f64 {
        self.std_cost().powi(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(start: (i32, u32, u32), end: (i32, u32, u32)) -> LifeEvent {
        LifeEvent {
            id: "wedding".into(),
            name: "Wedding".into(),
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            cost_mean: dec!(1000),
            cost_std: dec!(200),
            distribution: CostDistribution::Normal,
            category: None,
            recurrence: Recurrence::None,
            origin: EventOrigin::Custom {
                owner: "u1".into(),
            },
        }
    }

    fn mk(y: i32, m: u32) -> MonthKey {
        MonthKey::new(y, m).unwrap()
    }

    #[test]
    fn test_overlap_one_off() {
        let e = event((2025, 6, 20), (2025, 7, 5));
        assert!(!e.overlaps(mk(2025, 5)));
        assert!(e.overlaps(mk(2025, 6)));
        assert!(e.overlaps(mk(2025, 7)));
        assert!(!e.overlaps(mk(2026, 6)));
    }

    #[test]
    fn test_overlap_yearly_including_new_year_span() {
        let mut e = event((2024, 12, 20), (2025, 1, 5));
        e.recurrence = Recurrence::Yearly;
        assert!(!e.overlaps(mk(2024, 11)));
        assert!(e.overlaps(mk(2025, 1)));
        assert!(e.overlaps(mk(2026, 12)));
        assert!(e.overlaps(mk(2027, 1)));
        assert!(!e.overlaps(mk(2026, 6)));
    }

    #[test]
    fn test_validation_rejects_inverted_dates_and_foreign_owner() {
        let e = event((2025, 7, 1), (2025, 6, 1));
        assert!(e.validate().is_err());
        let e = event((2025, 6, 1), (2025, 6, 30));
        assert!(e.validate_for("u1").is_ok());
        assert!(e.validate_for("someone-else").is_err());
    }

    #[test]
    fn test_uniform_shape_matches_variance() {
        let mut e = event((2025, 6, 1), (2025, 6, 30));
        e.distribution = CostDistribution::Uniform;
        let (a, b) = e.uniform_bounds();
        let var = (b - a).powi(2) / 12.0;
        assert!((var - e.cost_variance()).abs() < 1e-6);
        let (p10, p90) = e.cost_range();
        assert!(p10 < 1000.0 && p90 > 1000.0);
    }

    #[test]
    fn test_origin_serde_shape() {
        let json = serde_json::to_value(EventOrigin::Custom {
            owner: "u1".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"kind": "custom", "owner": "u1"}));
    }
}
