use std::time::Instant;

use chrono::NaiveDate;
use rand::Rng;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::projection::{prepare, MonthPlan, Prepared};
use super::sampling::{entropy_seed, iteration_rng, percentile_sorted, sample_event_cost, sample_normal};
use super::stress::StressScenario;
use crate::calibration::calibrator::default_discretionary_categories;
use crate::error::FinTwinError;
use crate::events::LifeEvent;
use crate::lending::loan::Loan;
use crate::types::{with_metadata_f64, ComputationOutput, Money, MonthKey, Transaction, UserProfile};
use crate::FinTwinResult;

/// Balance below which a path would need emergency credit.
pub const CREDIT_FLOOR: f64 = -500.0;

pub const MAX_ITERATIONS: u32 = 100_000;

/// Consecutive median months under the credit floor that count as default.
pub const DEFAULT_CONSECUTIVE_MONTHS: usize = 3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_horizon")]
    pub horizon_months: u32,
    /// Committed monthly spending cut, added to every month's net flow.
    #[serde(default)]
    pub monthly_savings: Money,
    #[serde(default)]
    pub stress_scenario: Option<StressScenario>,
    /// Fallback share of discretionary spend cut when a scenario reduces income.
    #[serde(default = "default_correlated_reduction")]
    pub correlated_expense_reduction: f64,
    #[serde(default)]
    pub custom_events: Vec<LifeEvent>,
    /// Base seed; drawn from entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Month of this date is projection month 0.
    pub start_date: NaiveDate,
    #[serde(default = "default_discretionary_categories")]
    pub discretionary_categories: Vec<String>,
}

fn default_iterations() -> u32 {
    100
}

fn default_horizon() -> u32 {
    6
}

fn default_correlated_reduction() -> f64 {
    0.2
}

impl SimulationConfig {
    /// Defaults for a run beginning in the month of `start_date`.
    pub fn starting(start_date: NaiveDate) -> Self {
        SimulationConfig {
            iterations: default_iterations(),
            horizon_months: default_horizon(),
            monthly_savings: Decimal::ZERO,
            stress_scenario: None,
            correlated_expense_reduction: default_correlated_reduction(),
            custom_events: Vec::new(),
            seed: None,
            start_date,
            discretionary_categories: default_discretionary_categories(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloInput {
    pub profile: UserProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// Built-in (possibly overridden) events in play.
    #[serde(default)]
    pub events: Vec<LifeEvent>,
    /// Loans whose schedules are charged when approved or active.
    #[serde(default)]
    pub loans: Vec<Loan>,
    pub config: SimulationConfig,
}

/// Percentile band for one projected month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthPercentiles {
    pub month_index: u32,
    pub month: MonthKey,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    /// Share of paths below the credit floor in this month.
    pub stress_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub iterations: u32,
    pub horizon_months: u32,
    pub starting_balance: f64,
    pub months: Vec<MonthPercentiles>,
    /// Share of paths that ever go below zero.
    pub probability_negative: f64,
    /// Share of paths that ever go below the credit floor.
    pub probability_needs_credit: f64,
    pub credit_floor: f64,
    /// The median path stayed under the credit floor for
    /// `DEFAULT_CONSECUTIVE_MONTHS` months in a row.
    pub default_detected: bool,
    /// Month in which that run of months completed.
    pub default_month: Option<MonthKey>,
    pub resilience_score: u32,
    pub seed: u64,
}

impl MonteCarloResult {
    pub fn p10(&self) -> Vec<f64> {
        self.months.iter().map(|m| m.p10).collect()
    }

    pub fn p50(&self) -> Vec<f64> {
        self.months.iter().map(|m| m.p50).collect()
    }

    pub fn p90(&self) -> Vec<f64> {
        self.months.iter().map(|m| m.p90).collect()
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// One balance path; entry `k` is the balance at the end of month `k`.
fn simulate_path(prepared: &Prepared, base_seed: u64, iteration: u64) -> FinTwinResult<Vec<f64>> {
    let mut rng = iteration_rng(base_seed, iteration);
    let mut balance = prepared.starting_balance;
    let mut path = Vec::with_capacity(prepared.plans.len());
    for plan in &prepared.plans {
        balance += sample_net_flow(&mut rng, plan, prepared.monthly_savings)?;
        path.push(balance);
    }
    Ok(path)
}

fn sample_net_flow<R: Rng>(rng: &mut R, plan: &MonthPlan, monthly_savings: f64) -> FinTwinResult<f64> {
    let income = plan.stressed_income(sample_normal(rng, plan.income_mean, plan.income_std, "income")?);
    let expense = plan.stressed_expense(sample_normal(rng, plan.expense_mean, plan.expense_std, "expense")?);
    let mut events = 0.0;
    for e in &plan.events {
        events += sample_event_cost(rng, e)?;
    }
    let events = events.max(0.0);
    Ok(income - expense - events - plan.loan_payments - plan.one_off + monthly_savings)
}

/// Index of the month completing the first run of
/// `DEFAULT_CONSECUTIVE_MONTHS` balances below the credit floor.
fn detect_default(median: &[f64]) -> Option<usize> {
    let mut run = 0;
    for (k, balance) in median.iter().enumerate() {
        if *balance < CREDIT_FLOOR {
            run += 1;
            if run >= DEFAULT_CONSECUTIVE_MONTHS {
                return Some(k);
            }
        } else {
            run = 0;
        }
    }
    None
}

fn resilience(p_neg: f64, p_credit: f64, final_median: f64, final_p10: f64) -> u32 {
    let mut score = (1.0 - p_neg) * 40.0 + (1.0 - p_credit) * 30.0;
    if final_median > 0.0 {
        score += 15.0;
    }
    if final_p10 > 0.0 {
        score += 15.0;
    }
    score.clamp(0.0, 100.0).round() as u32
}

/// Run with an explicit base seed. Returns the result and calibration warnings.
pub(crate) fn simulate(input: &MonteCarloInput, base_seed: u64) -> FinTwinResult<(MonteCarloResult, Vec<String>)> {
    let cfg = &input.config;
    if cfg.iterations == 0 || cfg.iterations > MAX_ITERATIONS {
        return Err(FinTwinError::invalid(
            "iterations",
            format!("Must be between 1 and {MAX_ITERATIONS}"),
        ));
    }
    let prepared = prepare(input)?;
    let n = cfg.iterations as usize;
    let horizon = prepared.plans.len();

    tracing::debug!(
        user_id = %input.profile.user_id,
        iterations = n,
        horizon,
        seed = base_seed,
        stressed = cfg.stress_scenario.is_some(),
        "running monte carlo"
    );

    let paths: Vec<Vec<f64>> = (0..n as u64)
        .into_par_iter()
        .map(|k| simulate_path(&prepared, base_seed, k))
        .collect::<FinTwinResult<Vec<_>>>()?;

    let ever_negative = paths.iter().filter(|p| p.iter().any(|b| *b < 0.0)).count();
    let ever_credit = paths.iter().filter(|p| p.iter().any(|b| *b < CREDIT_FLOOR)).count();

    let mut months = Vec::with_capacity(horizon);
    let mut column = vec![0.0f64; n];
    for (k, plan) in prepared.plans.iter().enumerate() {
        for (slot, path) in column.iter_mut().zip(&paths) {
            *slot = path[k];
        }
        column.sort_by(|a, b| a.total_cmp(b));
        let below_floor = column.partition_point(|b| *b < CREDIT_FLOOR);
        months.push(MonthPercentiles {
            month_index: plan.index,
            month: plan.month,
            p10: percentile_sorted(&column, 10.0),
            p50: percentile_sorted(&column, 50.0),
            p90: percentile_sorted(&column, 90.0),
            stress_probability: below_floor as f64 / n as f64,
        });
    }

    let p_neg = ever_negative as f64 / n as f64;
    let p_credit = ever_credit as f64 / n as f64;
    let (final_median, final_p10) = months.last().map_or((0.0, 0.0), |m| (m.p50, m.p10));
    let median: Vec<f64> = months.iter().map(|m| m.p50).collect();
    let default_month = detect_default(&median).map(|k| months[k].month);
    if let Some(month) = default_month {
        tracing::debug!(user_id = %input.profile.user_id, %month, "median path defaults");
    }

    let result = MonteCarloResult {
        iterations: cfg.iterations,
        horizon_months: cfg.horizon_months,
        starting_balance: prepared.starting_balance,
        months,
        probability_negative: p_neg,
        probability_needs_credit: p_credit,
        credit_floor: CREDIT_FLOOR,
        default_detected: default_month.is_some(),
        default_month,
        resilience_score: resilience(p_neg, p_credit, final_median, final_p10),
        seed: base_seed,
    };
    Ok((result, prepared.warnings))
}

fn wrap(input: &MonteCarloInput, start: Instant, result: MonteCarloResult, warnings: Vec<String>) -> ComputationOutput<MonteCarloResult> {
    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata_f64(
        "Monte Carlo balance projection (independent ChaCha8 stream per iteration)",
        &serde_json::json!({
            "iterations": input.config.iterations,
            "horizon_months": input.config.horizon_months,
            "seed": result.seed,
            "credit_floor": CREDIT_FLOOR,
            "correlated_expense_reduction": input.config.correlated_expense_reduction,
            "stress_scenario": input.config.stress_scenario.as_ref().map(|s| &s.name),
        }),
        warnings,
        elapsed,
        result,
    )
}

/// Simulate balance paths and summarise percentiles and risk.
///
/// Uses `config.seed` when set, otherwise a fresh entropy seed; the seed
/// used is reported in the result so any run can be replayed.
pub fn run_monte_carlo(input: &MonteCarloInput) -> FinTwinResult<ComputationOutput<MonteCarloResult>> {
    let start = Instant::now();
    let seed = input.config.seed.unwrap_or_else(entropy_seed);
    let (result, warnings) = simulate(input, seed)?;
    Ok(wrap(input, start, result, warnings))
}

/// As [`run_monte_carlo`], drawing the base seed from `rng` when the config has none.
pub fn run_monte_carlo_with_rng<R: Rng>(
    input: &MonteCarloInput,
    rng: &mut R,
) -> FinTwinResult<ComputationOutput<MonteCarloResult>> {
    let start = Instant::now();
    let seed = match input.config.seed {
        Some(s) => s,
        None => rng.gen(),
    };
    let (result, warnings) = simulate(input, seed)?;
    Ok(wrap(input, start, result, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SalaryFrequency;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal_macros::dec;

    const SEED: u64 = 42;

    fn jan() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn input() -> MonteCarloInput {
        let mut config = SimulationConfig::starting(jan());
        config.seed = Some(SEED);
        MonteCarloInput {
            profile: UserProfile {
                user_id: "u1".into(),
                balance: dec!(850),
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
    fn test_fixed_seed_is_reproducible() {
        let a = run_monte_carlo(&input()).unwrap().result;
        let b = run_monte_carlo(&input()).unwrap().result;
        assert_eq!(a.months, b.months);
        assert_eq!(a.probability_negative, b.probability_negative);
        assert_eq!(a.seed, SEED);
    }

    #[test]
    fn test_job_loss_raises_probability_negative() {
        let baseline = run_monte_carlo(&input()).unwrap().result;
        let mut stressed_input = input();
        stressed_input.config.stress_scenario = Some(StressScenario::job_loss(3));
        let stressed = run_monte_carlo(&stressed_input).unwrap().result;
        assert!(
            stressed.probability_negative > baseline.probability_negative,
            "stressed {} vs baseline {}",
            stressed.probability_negative,
            baseline.probability_negative
        );
        assert!(stressed.resilience_score < baseline.resilience_score);
    }

    #[test]
    fn test_healthy_user_is_resilient() {
        let mut inp = input();
        inp.profile.balance = dec!(20000);
        inp.profile.monthly_income = dec!(5000);
        let r = run_monte_carlo(&inp).unwrap().result;
        assert_eq!(r.probability_negative, 0.0);
        assert_eq!(r.probability_needs_credit, 0.0);
        assert_eq!(r.resilience_score, 100);
        assert_eq!(r.months.len(), 6);
        assert_eq!(r.months[0].month, MonthKey::new(2025, 1).unwrap());
    }

    #[test]
    fn test_injected_rng_supplies_seed() {
        let mut inp = input();
        inp.config.seed = None;
        let mut rng_a = ChaCha8Rng::seed_from_u64(7);
        let mut rng_b = ChaCha8Rng::seed_from_u64(7);
        let a = run_monte_carlo_with_rng(&inp, &mut rng_a).unwrap().result;
        let b = run_monte_carlo_with_rng(&inp, &mut rng_b).unwrap().result;
        assert_eq!(a.seed, b.seed);
        assert_eq!(a.p50(), b.p50());
    }

    #[test]
    fn test_loan_payments_are_deducted() {
        let mut loan = Loan::pending("L1", "u1", dec!(600), 6, Decimal::ZERO, "", jan()).unwrap();
        crate::lending::loan::advisor_approve(&mut loan, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(), None).unwrap();
        let mut with_loan = input();
        with_loan.loans.push(loan);
        let base = run_monte_carlo(&input()).unwrap().result;
        let loaded = run_monte_carlo(&with_loan).unwrap().result;
        // Same random streams, so the median shifts by exactly the payments.
        for (k, (a, b)) in base.months.iter().zip(&loaded.months).enumerate() {
            let expected = 100.0 * (k as f64 + 1.0);
            assert!((a.p50 - b.p50 - expected).abs() < 1e-6, "month {k}");
        }
    }

    #[test]
    fn test_iteration_bounds() {
        let mut inp = input();
        inp.config.iterations = 0;
        assert!(run_monte_carlo(&inp).is_err());
        inp.config.iterations = MAX_ITERATIONS + 1;
        assert!(run_monte_carlo(&inp).is_err());
        inp.config.iterations = 1;
        let r = run_monte_carlo(&inp).unwrap().result;
        assert!(r.months.iter().all(|m| m.p10 == m.p50 && m.p50 == m.p90));
    }

    #[test]
    fn test_default_needs_three_months_under_floor() {
        assert_eq!(detect_default(&[100.0, -600.0, -700.0, 50.0, -800.0, -900.0]), None);
        assert_eq!(detect_default(&[100.0, -600.0, -700.0, -501.0, 20.0]), Some(3));
        assert_eq!(detect_default(&[-500.0, -500.0, -500.0]), None);
        assert_eq!(detect_default(&[]), None);
    }

    #[test]
    fn test_sustained_shortfall_is_flagged_as_default() {
        let mut broke = input();
        broke.profile.balance = Decimal::ZERO;
        broke.config.stress_scenario = Some(StressScenario::job_loss(6));
        let r = run_monte_carlo(&broke).unwrap().result;
        assert!(r.default_detected);
        // Month 0 alone stays above the floor; months 1 to 3 complete the run.
        assert_eq!(r.default_month, Some(r.months[3].month));

        let healthy = run_monte_carlo(&input()).unwrap().result;
        assert!(!healthy.default_detected);
        assert_eq!(healthy.default_month, None);
    }

    #[test]
    fn test_resilience_formula() {
        assert_eq!(resilience(0.0, 0.0, 1.0, 1.0), 100);
        assert_eq!(resilience(1.0, 1.0, -1.0, -1.0), 0);
        assert_eq!(resilience(0.5, 0.0, 10.0, -5.0), 65);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]
        #[test]
        fn prop_percentiles_are_ordered(
            seed in any::<u64>(),
            iterations in 1u32..60,
            balance in -2_000i64..5_000,
            income in 0i64..3_000,
        ) {
            let mut inp = input();
            inp.config.seed = Some(seed);
            inp.config.iterations = iterations;
            inp.profile.balance = Decimal::from(balance);
            inp.profile.monthly_income = Decimal::from(income);
            let r = run_monte_carlo(&inp).unwrap().result;
            for m in &r.months {
                prop_assert!(m.p10 <= m.p50 && m.p50 <= m.p90);
            }
            prop_assert!((0.0..=1.0).contains(&r.probability_negative));
            prop_assert!(r.resilience_score <= 100);
        }
    }
}
