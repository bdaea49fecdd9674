use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::FinTwinError;
use crate::simulation::monte_carlo::{simulate, MonteCarloInput};
use crate::simulation::sampling::entropy_seed;
use crate::simulation::stress::StressScenario;
use crate::types::{money_from_f64, with_metadata_f64, ComputationOutput};
use crate::FinTwinResult;

/// The single input varied across a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityVariable {
    /// Committed monthly savings, in currency units.
    MonthlySavings,
    /// Income reduction across the whole horizon, as a share (0.3 = 30%).
    IncomeDrop,
}

impl SensitivityVariable {
    pub fn default_grid(&self) -> Vec<f64> {
        match self {
            SensitivityVariable::MonthlySavings => vec![0.0, 50.0, 100.0, 200.0, 300.0, 500.0],
            SensitivityVariable::IncomeDrop => vec![0.0, 0.1, 0.2, 0.3, 0.5, 0.75, 1.0],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SensitivityVariable::MonthlySavings => "monthly savings",
            SensitivityVariable::IncomeDrop => "income drop",
        }
    }

    fn validate_point(&self, v: f64) -> FinTwinResult<()> {
        if !v.is_finite() {
            return Err(FinTwinError::invalid("grid", format!("non-finite value {v}")));
        }
        match self {
            SensitivityVariable::IncomeDrop if !(0.0..=1.0).contains(&v) => Err(FinTwinError::invalid(
                "grid",
                format!("income drop {v} outside 0..=1"),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub base: MonteCarloInput,
    pub variable: SensitivityVariable,
    /// Values to sweep; the variable's default grid when absent.
    #[serde(default)]
    pub grid: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub value: f64,
    pub resilience_score: u32,
    pub probability_negative: f64,
    pub final_p50: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub variable: SensitivityVariable,
    pub grid: Vec<f64>,
    pub scores: Vec<u32>,
    pub points: Vec<SensitivityPoint>,
    /// Score at the last grid value minus score at the first; the sign
    /// gives the direction of the effect across the sweep.
    pub impact: i64,
    /// Highest score minus lowest score over the whole grid.
    pub score_range: u32,
    pub summary: String,
    pub seed: u64,
}

fn apply(base: &MonteCarloInput, variable: SensitivityVariable, value: f64) -> MonteCarloInput {
    let mut input = base.clone();
    match variable {
        SensitivityVariable::MonthlySavings => {
            input.config.monthly_savings = money_from_f64(value);
        }
        SensitivityVariable::IncomeDrop => {
            input.config.stress_scenario =
                Some(StressScenario::income_drop(value, input.config.horizon_months));
        }
    }
    input
}

fn describe(variable: SensitivityVariable, grid: &[f64], impact: i64) -> String {
    let (first, last) = match (grid.first(), grid.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return "No grid points evaluated".to_string(),
    };
    let fmt = |v: f64| match variable {
        SensitivityVariable::MonthlySavings => format!("{v:.0}"),
        SensitivityVariable::IncomeDrop => format!("{:.0}%", v * 100.0),
    };
    let strength = match impact.unsigned_abs() {
        0..=4 => "little effect on",
        5..=19 => "a moderate effect on",
        _ => "a strong effect on",
    };
    format!(
        "Moving {} from {} to {} has {} resilience ({:+} points)",
        variable.label(),
        fmt(first),
        fmt(last),
        strength,
        impact
    )
}

/// Sweep one variable and record the resilience score at each point.
///
/// Every point reuses the same base seed, so differences between points
/// come from the variable and not from sampling noise.
pub fn run_sensitivity(input: &SensitivityInput) -> FinTwinResult<ComputationOutput<SensitivityResult>> {
    let start = Instant::now();
    let grid = input
        .grid
        .clone()
        .unwrap_or_else(|| input.variable.default_grid());
    if grid.is_empty() {
        return Err(FinTwinError::invalid("grid", "Must contain at least one value"));
    }
    for v in &grid {
        input.variable.validate_point(*v)?;
    }
    let seed = input.base.config.seed.unwrap_or_else(entropy_seed);

    let mut warnings = Vec::new();
    let mut points = Vec::with_capacity(grid.len());
    for (i, value) in grid.iter().enumerate() {
        let (result, w) = simulate(&apply(&input.base, input.variable, *value), seed)?;
        if i == 0 {
            warnings = w;
        }
        points.push(SensitivityPoint {
            value: *value,
            resilience_score: result.resilience_score,
            probability_negative: result.probability_negative,
            final_p50: result.months.last().map_or(result.starting_balance, |m| m.p50),
        });
    }

    let scores: Vec<u32> = points.iter().map(|p| p.resilience_score).collect();
    let impact = match (scores.first(), scores.last()) {
        (Some(f), Some(l)) => *l as i64 - *f as i64,
        _ => 0,
    };
    let score_range = match (scores.iter().max(), scores.iter().min()) {
        (Some(hi), Some(lo)) => hi - lo,
        _ => 0,
    };
    tracing::debug!(
        variable = ?input.variable,
        points = grid.len(),
        impact,
        score_range,
        "sensitivity sweep done"
    );

    let result = SensitivityResult {
        variable: input.variable,
        summary: describe(input.variable, &grid, impact),
        grid,
        scores,
        points,
        impact,
        score_range,
        seed,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "One-variable resilience sweep (common random numbers)",
        &serde_json::json!({
            "variable": input.variable,
            "iterations": input.base.config.iterations,
            "horizon_months": input.base.config.horizon_months,
            "seed": seed,
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::monte_carlo::SimulationConfig;
    use crate::types::{SalaryFrequency, UserProfile};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const SEED: u64 = 42;

    fn base() -> MonteCarloInput {
        let mut config = SimulationConfig::starting(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        config.seed = Some(SEED);
        MonteCarloInput {
            profile: UserProfile {
                user_id: "u1".into(),
                balance: dec!(100),
                monthly_income: dec!(400),
                salary_day: 1,
                salary_frequency: SalaryFrequency::Monthly,
                fixed_outflows: dec!(150),
                avg_variable_outflows: dec!(180),
                variability_pct: 0.15,
            },
            transactions: vec![],
            events: vec![],
            loans: vec![],
            config,
        }
    }

    #[test]
    fn test_savings_sweep_never_lowers_resilience() {
        let out = run_sensitivity(&SensitivityInput {
            base: base(),
            variable: SensitivityVariable::MonthlySavings,
            grid: None,
        })
        .unwrap()
        .result;
        assert_eq!(out.grid, SensitivityVariable::MonthlySavings.default_grid());
        assert_eq!(out.scores.len(), 6);
        assert!(out.scores.windows(2).all(|w| w[0] <= w[1]), "{:?}", out.scores);
        assert!(out.impact > 0);
        assert!(out.summary.starts_with("Moving monthly savings from 0 to 500"));
    }

    #[test]
    fn test_total_income_loss_is_worst_point() {
        let out = run_sensitivity(&SensitivityInput {
            base: base(),
            variable: SensitivityVariable::IncomeDrop,
            grid: None,
        })
        .unwrap()
        .result;
        assert_eq!(out.grid.len(), 7);
        assert!(out.scores[0] > out.scores[6]);
        assert!(out.impact < 0);
        assert_eq!(out.points[6].probability_negative, 1.0);
    }

    #[test]
    fn test_same_seed_same_scores() {
        let input = SensitivityInput {
            base: base(),
            variable: SensitivityVariable::MonthlySavings,
            grid: Some(vec![0.0, 100.0]),
        };
        let a = run_sensitivity(&input).unwrap().result;
        let b = run_sensitivity(&input).unwrap().result;
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.seed, SEED);
    }

    #[test]
    fn test_range_spans_all_points_regardless_of_order() {
        let out = run_sensitivity(&SensitivityInput {
            base: base(),
            variable: SensitivityVariable::IncomeDrop,
            grid: Some(vec![0.3, 1.0, 0.0]),
        })
        .unwrap()
        .result;
        let hi = *out.scores.iter().max().unwrap();
        let lo = *out.scores.iter().min().unwrap();
        assert_eq!(out.score_range, hi - lo);
        assert_eq!(out.score_range, out.scores[2] - out.scores[1]);
        assert!(out.score_range as i64 > out.impact.abs());
    }

    #[test]
    fn test_grid_validation() {
        let mut input = SensitivityInput {
            base: base(),
            variable: SensitivityVariable::IncomeDrop,
            grid: Some(vec![]),
        };
        assert!(run_sensitivity(&input).is_err());
        input.grid = Some(vec![0.2, 1.5]);
        assert!(run_sensitivity(&input).is_err());
        input.grid = Some(vec![f64::NAN]);
        assert!(run_sensitivity(&input).is_err());
    }
}
