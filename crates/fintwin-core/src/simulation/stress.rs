use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::monte_carlo::{simulate, MonteCarloInput, MonteCarloResult};
use super::sampling::entropy_seed;
use crate::error::FinTwinError;
use crate::types::{money_to_f64, with_metadata_f64, ComputationOutput, Money};
use crate::FinTwinResult;

const MAX_MULTIPLIER: f64 = 10.0;

fn one() -> f64 {
    1.0
}

/// A temporary shock applied to a window of projected months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    #[serde(default = "one")]
    pub income_multiplier: f64,
    #[serde(default = "one")]
    pub expense_multiplier: f64,
    /// Charged once, in the first active month.
    #[serde(default)]
    pub one_off_cost: Money,
    pub duration_months: u32,
    /// First active month, counted from the start of the projection.
    #[serde(default)]
    pub start_offset_months: u32,
    /// Share of discretionary spend cut while income is reduced.
    #[serde(default)]
    pub correlated_expense_reduction: Option<f64>,
}

impl StressScenario {
    pub fn validate(&self) -> FinTwinResult<()> {
        let in_range = |v: f64| v.is_finite() && (0.0..=MAX_MULTIPLIER).contains(&v);
        if !in_range(self.income_multiplier) {
            return Err(FinTwinError::invalid(
                "stress_scenario.income_multiplier",
                format!("Must be between 0 and {MAX_MULTIPLIER}"),
            ));
        }
        if !in_range(self.expense_multiplier) {
            return Err(FinTwinError::invalid(
                "stress_scenario.expense_multiplier",
                format!("Must be between 0 and {MAX_MULTIPLIER}"),
            ));
        }
        if self.one_off_cost < Decimal::ZERO {
            return Err(FinTwinError::invalid(
                "stress_scenario.one_off_cost",
                "Must be non-negative",
            ));
        }
        if self.duration_months == 0 {
            return Err(FinTwinError::invalid(
                "stress_scenario.duration_months",
                "Must be at least 1",
            ));
        }
        if let Some(r) = self.correlated_expense_reduction {
            if !r.is_finite() || !(0.0..=1.0).contains(&r) {
                return Err(FinTwinError::invalid(
                    "stress_scenario.correlated_expense_reduction",
                    "Must be between 0 and 1",
                ));
            }
        }
        Ok(())
    }

    /// Active for zero-based month `m` in `[start, start + duration)`.
    pub fn is_active(&self, month_index: u32) -> bool {
        month_index >= self.start_offset_months
            && month_index < self.start_offset_months.saturating_add(self.duration_months)
    }

    pub fn is_first_month(&self, month_index: u32) -> bool {
        month_index == self.start_offset_months
    }

    pub fn reduces_income(&self) -> bool {
        self.income_multiplier < 1.0
    }

    pub fn one_off(&self) -> f64 {
        money_to_f64(self.one_off_cost)
    }

    // -----------------------------------------------------------------------
    // Presets
    // -----------------------------------------------------------------------

    /// No income for `months`, spending unchanged.
    pub fn job_loss(months: u32) -> Self {
        StressScenario {
            name: format!("Job Loss ({months}m)"),
            income_multiplier: 0.0,
            expense_multiplier: 1.0,
            one_off_cost: Decimal::ZERO,
            duration_months: months,
            start_offset_months: 0,
            correlated_expense_reduction: None,
        }
    }

    /// Prices up by `pct` (0.15 = 15%) for the whole horizon.
    pub fn inflation(pct: f64, horizon_months: u32) -> Self {
        StressScenario {
            name: format!("Inflation (+{:.0}%)", pct * 100.0),
            income_multiplier: 1.0,
            expense_multiplier: 1.0 + pct,
            one_off_cost: Decimal::ZERO,
            duration_months: horizon_months,
            start_offset_months: 0,
            correlated_expense_reduction: None,
        }
    }

    /// A single unplanned bill in the first month.
    pub fn medical_emergency(cost: Money) -> Self {
        StressScenario {
            name: "Medical Emergency".to_string(),
            income_multiplier: 1.0,
            expense_multiplier: 1.0,
            one_off_cost: cost,
            duration_months: 1,
            start_offset_months: 0,
            correlated_expense_reduction: None,
        }
    }

    /// Income down by `pct` (0.3 = 30%) for `months`.
    pub fn income_drop(pct: f64, months: u32) -> Self {
        StressScenario {
            name: format!("Income Drop (-{:.0}%)", pct * 100.0),
            income_multiplier: (1.0 - pct).max(0.0),
            expense_multiplier: 1.0,
            one_off_cost: Decimal::ZERO,
            duration_months: months,
            start_offset_months: 0,
            correlated_expense_reduction: None,
        }
    }

    /// Named preset: `job_loss_3m`, `inflation`, `medical_emergency`.
    pub fn preset(name: &str, horizon_months: u32) -> FinTwinResult<Self> {
        match name {
            "job_loss_3m" | "job_loss" => Ok(Self::job_loss(3)),
            "inflation" => Ok(Self::inflation(0.15, horizon_months)),
            "medical_emergency" => Ok(Self::medical_emergency(Decimal::from(2000))),
            other => Err(FinTwinError::NotFound {
                entity: "stress preset".into(),
                id: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Baseline vs stressed comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestInput {
    pub base: MonteCarloInput,
    pub scenario: StressScenario,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestResult {
    pub scenario: StressScenario,
    pub baseline: MonteCarloResult,
    pub stressed: MonteCarloResult,
    pub delta_probability_negative: f64,
    pub delta_resilience: i64,
    pub actions: Vec<String>,
}

/// Run the same simulation with and without a scenario on common random numbers.
pub fn run_stress_test(input: &StressTestInput) -> FinTwinResult<ComputationOutput<StressTestResult>> {
    let start = Instant::now();
    input.scenario.validate()?;
    let seed = input.base.config.seed.unwrap_or_else(entropy_seed);

    let mut baseline_input = input.base.clone();
    baseline_input.config.stress_scenario = None;
    let (baseline, mut warnings) = simulate(&baseline_input, seed)?;

    let mut stressed_input = input.base.clone();
    stressed_input.config.stress_scenario = Some(input.scenario.clone());
    let (stressed, _) = simulate(&stressed_input, seed)?;

    let mut actions = Vec::new();
    if stressed.probability_negative > 0.2 {
        let worst = stressed.months.iter().map(|m| m.p10).fold(f64::INFINITY, f64::min);
        let cut = (-worst).max(0.0) / stressed.horizon_months as f64;
        actions.push(format!(
            "Reduce spending by {cut:.0}/month to keep the pessimistic path above zero"
        ));
    }
    if stressed.probability_needs_credit > 0.1 {
        actions.push("Arrange a standby credit line before the shock".to_string());
    }
    if actions.is_empty() {
        warnings.push(format!("{} is absorbed by current reserves", input.scenario.name));
    }

    let result = StressTestResult {
        scenario: input.scenario.clone(),
        delta_probability_negative: stressed.probability_negative - baseline.probability_negative,
        delta_resilience: stressed.resilience_score as i64 - baseline.resilience_score as i64,
        baseline,
        stressed,
        actions,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Monte Carlo stress comparison (common random numbers)",
        &serde_json::json!({
            "iterations": input.base.config.iterations,
            "horizon_months": input.base.config.horizon_months,
            "seed": seed,
        }),
        warnings,
        elapsed,
        result,
    ))
}
