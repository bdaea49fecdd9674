use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::monte_carlo::MonteCarloInput;
use super::stress::StressScenario;
use crate::calibration::seasonality::seasonal_event;
use crate::calibration::{Calibration, SamplingModel};
use crate::error::FinTwinError;
use crate::events::LifeEvent;
use crate::ledger::history::TransactionHistory;
use crate::lending::loan::Loan;
use crate::types::{money_to_f64, with_metadata_f64, ComputationOutput, MonthKey};
use crate::FinTwinResult;

pub const MAX_HORIZON_MONTHS: u32 = 120;

/// Expense draws never fall below this share of the seasonal mean.
pub const EXPENSE_FLOOR_SHARE: f64 = 0.5;

/// Inputs for the expected-value path. Iteration count and seed are unused.
pub type ProjectionInput = MonteCarloInput;

// ---------------------------------------------------------------------------
// Month plan shared by the deterministic and stochastic projectors
// ---------------------------------------------------------------------------

/// Everything known about month `index` before any sampling.
#[derive(Debug, Clone)]
pub(crate) struct MonthPlan {
    pub index: u32,
    pub month: MonthKey,
    pub seasonal_multiplier: f64,
    pub income_mean: f64,
    pub income_std: f64,
    pub expense_mean: f64,
    pub expense_std: f64,
    pub income_multiplier: f64,
    pub expense_multiplier: f64,
    pub one_off: f64,
    /// Discretionary spend withdrawn while a scenario cuts income.
    pub correlated_cut: f64,
    pub events: Vec<LifeEvent>,
    pub loan_payments: f64,
    pub stress_active: bool,
}

/// Validated, calibrated inputs plus the per-month plan.
#[derive(Debug, Clone)]
pub(crate) struct Prepared {
    pub calibration: Calibration,
    pub income_model: SamplingModel,
    pub expense_model: SamplingModel,
    pub plans: Vec<MonthPlan>,
    pub starting_balance: f64,
    pub monthly_savings: f64,
    pub discretionary_mean: f64,
    pub warnings: Vec<String>,
}

fn validate_events(user_id: &str, events: &[LifeEvent]) -> FinTwinResult<()> {
    for e in events {
        e.validate_for(user_id)?;
    }
    Ok(())
}

pub(crate) fn prepare(input: &MonteCarloInput) -> FinTwinResult<Prepared> {
    let cfg = &input.config;
    input.profile.validate()?;
    if cfg.horizon_months == 0 || cfg.horizon_months > MAX_HORIZON_MONTHS {
        return Err(FinTwinError::invalid(
            "horizon_months",
            format!("Must be between 1 and {MAX_HORIZON_MONTHS}"),
        ));
    }
    if !cfg.correlated_expense_reduction.is_finite()
        || !(0.0..=1.0).contains(&cfg.correlated_expense_reduction)
    {
        return Err(FinTwinError::invalid(
            "correlated_expense_reduction",
            "Must be between 0 and 1",
        ));
    }
    if let Some(s) = &cfg.stress_scenario {
        s.validate()?;
    }
    validate_events(&input.profile.user_id, &input.events)?;
    validate_events(&input.profile.user_id, &cfg.custom_events)?;

    let history = TransactionHistory::for_user(&input.profile.user_id, &input.transactions)?;
    let calibration = Calibration::from_history(&history);
    let income_model = calibration.income_model(&input.profile);
    let expense_model = calibration.expense_model(&input.profile);
    let discretionary_mean = calibration.discretionary_mean(&input.profile, &cfg.discretionary_categories);

    let events: Vec<LifeEvent> = input.events.iter().chain(cfg.custom_events.iter()).cloned().collect();
    let start = MonthKey::from_date(cfg.start_date);
    let plans = plan_months(
        &PlanContext {
            income_model: &income_model,
            expense_model: &expense_model,
            events: &events,
            loans: &input.loans,
            scenario: cfg.stress_scenario.as_ref(),
            correlated_expense_reduction: cfg.correlated_expense_reduction,
            discretionary_mean,
        },
        start,
        cfg.horizon_months,
    );

    Ok(Prepared {
        warnings: calibration.fallback_warnings(),
        calibration,
        income_model,
        expense_model,
        plans,
        starting_balance: money_to_f64(input.profile.balance),
        monthly_savings: money_to_f64(cfg.monthly_savings),
        discretionary_mean,
    })
}

pub(crate) struct PlanContext<'a> {
    pub income_model: &'a SamplingModel,
    pub expense_model: &'a SamplingModel,
    pub events: &'a [LifeEvent],
    pub loans: &'a [Loan],
    pub scenario: Option<&'a StressScenario>,
    pub correlated_expense_reduction: f64,
    pub discretionary_mean: f64,
}

pub(crate) fn plan_months(ctx: &PlanContext<'_>, start: MonthKey, horizon: u32) -> Vec<MonthPlan> {
    (0..horizon)
        .map(|k| {
            let month = start.plus(k);
            let idx = month.index();
            let active = ctx.scenario.filter(|s| s.is_active(k));
            let (income_multiplier, expense_multiplier, one_off, correlated_cut) = match active {
                Some(s) => {
                    let factor = s
                        .correlated_expense_reduction
                        .unwrap_or(ctx.correlated_expense_reduction);
                    let cut = if s.reduces_income() {
                        factor * ctx.discretionary_mean
                    } else {
                        0.0
                    };
                    let one_off = if s.is_first_month(k) { s.one_off() } else { 0.0 };
                    (s.income_multiplier, s.expense_multiplier, one_off, cut)
                }
                None => (1.0, 1.0, 0.0, 0.0),
            };
            MonthPlan {
                index: k,
                month,
                seasonal_multiplier: ctx.expense_model.seasonality[idx],
                income_mean: ctx.income_model.seasonal_mean(idx).max(0.0),
                income_std: ctx.income_model.sampling_std(),
                expense_mean: ctx.expense_model.seasonal_mean(idx).max(0.0),
                expense_std: ctx.expense_model.sampling_std(),
                income_multiplier,
                expense_multiplier,
                one_off,
                correlated_cut,
                events: ctx.events.iter().filter(|e| e.overlaps(month)).cloned().collect(),
                loan_payments: ctx.loans.iter().map(|l| money_to_f64(l.payment_in(month))).sum(),
                stress_active: active.is_some(),
            }
        })
        .collect()
}

impl MonthPlan {
    /// Expense after the floor, the scenario multiplier and the behavioural cut.
    pub fn stressed_expense(&self, drawn: f64) -> f64 {
        let floored = drawn.max(self.expense_mean * EXPENSE_FLOOR_SHARE);
        (floored * self.expense_multiplier - self.correlated_cut).max(0.0)
    }

    pub fn stressed_income(&self, drawn: f64) -> f64 {
        drawn.max(0.0) * self.income_multiplier
    }

    pub fn expected_event_cost(&self) -> f64 {
        self.events.iter().map(|e| e.mean_cost()).sum::<f64>().max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Deterministic projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyProjection {
    pub month_index: u32,
    pub month: MonthKey,
    pub income: f64,
    pub fixed_outflows: f64,
    pub variable_spend: f64,
    pub event_costs: f64,
    pub events: Vec<String>,
    pub loan_payments: f64,
    pub one_off_cost: f64,
    pub savings: f64,
    pub net_flow: f64,
    pub balance: f64,
    pub seasonal_multiplier: f64,
    pub seasonal_event: Option<String>,
    pub stress_active: bool,
}

pub(crate) fn expected_path(prepared: &Prepared, fixed_outflows: f64) -> Vec<MonthlyProjection> {
    let mut balance = prepared.starting_balance;
    prepared
        .plans
        .iter()
        .map(|p| {
            let income = p.stressed_income(p.income_mean);
            let expense = p.stressed_expense(p.expense_mean);
            let fixed = (fixed_outflows * p.expense_multiplier).min(expense);
            let events = p.expected_event_cost();
            let net = income - expense - events - p.loan_payments - p.one_off + prepared.monthly_savings;
            balance += net;
            MonthlyProjection {
                month_index: p.index,
                month: p.month,
                income,
                fixed_outflows: fixed,
                variable_spend: expense - fixed,
                event_costs: events,
                events: p.events.iter().map(|e| e.name.clone()).collect(),
                loan_payments: p.loan_payments,
                one_off_cost: p.one_off,
                savings: prepared.monthly_savings,
                net_flow: net,
                balance,
                seasonal_multiplier: p.seasonal_multiplier,
                seasonal_event: seasonal_event(p.month.index()).map(str::to_string),
                stress_active: p.stress_active,
            }
        })
        .collect()
}

/// Expected-value month-by-month projection (no sampling).
pub fn project(input: &ProjectionInput) -> FinTwinResult<ComputationOutput<Vec<MonthlyProjection>>> {
    let start = Instant::now();
    let prepared = prepare(input)?;
    let path = expected_path(&prepared, money_to_f64(input.profile.fixed_outflows));
    tracing::debug!(
        user_id = %input.profile.user_id,
        horizon = input.config.horizon_months,
        "projected expected path"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Deterministic expected-value cash-flow projection",
        &serde_json::json!({
            "horizon_months": input.config.horizon_months,
            "start_date": input.config.start_date,
            "income_source": prepared.income_model.source,
            "expense_source": prepared.expense_model.source,
            "discretionary_mean": prepared.discretionary_mean,
        }),
        prepared.warnings,
        elapsed,
        path,
    ))
}
