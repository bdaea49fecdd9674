use crate::types::MonthKey;

/// Twelve multipliers indexed by calendar month (January = 0).
pub type Seasonality = [f64; 12];

pub const FLAT_SEASONALITY: Seasonality = [1.0; 12];

/// Expense multipliers applied when a user's own history is too short.
pub const DEFAULT_EXPENSE_SEASONALITY: Seasonality =
    [1.0, 1.0, 1.4, 1.6, 1.0, 1.5, 1.4, 1.3, 1.6, 1.0, 1.0, 1.2];

/// Months above this multiplier are treated as high-expense months.
pub const HIGH_EXPENSE_THRESHOLD: f64 = 1.25;

const SEASONAL_EVENTS: [Option<&str>; 12] = [
    None,
    None,
    Some("Ramadan"),
    Some("Eid al-Fitr"),
    None,
    Some("Eid al-Adha / Summer Start"),
    Some("Summer Holidays"),
    Some("Summer Holidays"),
    Some("Back to School"),
    None,
    None,
    Some("Year End"),
];

/// Label of the seasonal event driving the default multiplier, if any.
pub fn seasonal_event(month_index: usize) -> Option<&'static str> {
    SEASONAL_EVENTS.get(month_index).copied().flatten()
}

pub fn is_high_expense_month(month_index: usize) -> bool {
    DEFAULT_EXPENSE_SEASONALITY
        .get(month_index)
        .is_some_and(|m| *m > HIGH_EXPENSE_THRESHOLD)
}

/// 1-based calendar months flagged as high-expense.
pub fn high_expense_months() -> Vec<u32> {
    (0..12)
        .filter(|i| is_high_expense_month(*i))
        .map(|i| i as u32 + 1)
        .collect()
}

/// Ratio of each calendar month's average total to the overall mean.
///
/// Months with no observations, or an overall mean of zero, stay at 1.0.
pub fn empirical_seasonality(samples: &[(MonthKey, f64)], overall_mean: f64) -> Seasonality {
    let mut out = FLAT_SEASONALITY;
    if overall_mean == 0.0 {
        return out;
    }
    let mut sums = [0.0f64; 12];
    let mut counts = [0usize; 12];
    for (month, value) in samples {
        sums[month.index()] += value;
        counts[month.index()] += 1;
    }
    for i in 0..12 {
        if counts[i] > 0 {
            out[i] = (sums[i] / counts[i] as f64) / overall_mean;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_expense_months_match_table() {
        assert_eq!(high_expense_months(), vec![3, 4, 6, 7, 8, 9]);
        assert!(!is_high_expense_month(11));
        assert!(!is_high_expense_month(12));
    }

    #[test]
    fn test_seasonal_event_labels() {
        assert_eq!(seasonal_event(2), Some("Ramadan"));
        assert_eq!(seasonal_event(8), Some("Back to School"));
        assert_eq!(seasonal_event(0), None);
        assert_eq!(seasonal_event(99), None);
    }

    #[test]
    fn test_empirical_ratio_and_defaults() {
        let samples = vec![
            (MonthKey::new(2024, 1).unwrap(), 100.0),
            (MonthKey::new(2025, 1).unwrap(), 140.0),
            (MonthKey::new(2024, 7).unwrap(), 60.0),
        ];
        let s = empirical_seasonality(&samples, 100.0);
        assert!((s[0] - 1.2).abs() < 1e-12);
        assert!((s[6] - 0.6).abs() < 1e-12);
        assert_eq!(s[3], 1.0);
        assert_eq!(empirical_seasonality(&samples, 0.0), FLAT_SEASONALITY);
    }
}
