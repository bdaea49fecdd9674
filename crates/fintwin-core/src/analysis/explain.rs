use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calibration::ModelSource;
use crate::error::FinTwinError;
use crate::events::LifeEvent;
use crate::lending::loan::Loan;
use crate::scoring::readiness::{assess_readiness, EventExposure, ReadinessInput, ReadinessLevel, ScoreDriver};
use crate::simulation::monte_carlo::MonteCarloInput;
use crate::simulation::projection::{expected_path, prepare, MAX_HORIZON_MONTHS};
use crate::types::{money_to_f64, with_metadata_f64, ComputationOutput, MonthKey, Transaction, UserProfile};
use crate::FinTwinResult;

const HIGH_CONFIDENCE_CV: f64 = 0.25;
const MEDIUM_CONFIDENCE_CV: f64 = 0.5;

// ---------------------------------------------------------------------------
// Month explanation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// `None` (zero net flow) is always low confidence.
    pub fn from_cv(cv: Option<f64>) -> Self {
        match cv {
            Some(v) if v <= HIGH_CONFIDENCE_CV => Confidence::High,
            Some(v) if v <= MEDIUM_CONFIDENCE_CV => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

/// A signed contribution to the month's net flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDriver {
    pub name: String,
    pub amount: f64,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainMonthInput {
    pub base: MonteCarloInput,
    /// Zero-based month from the start of the projection.
    pub month_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthExplanation {
    pub month_index: u32,
    pub month: MonthKey,
    pub drivers: Vec<FlowDriver>,
    pub net_flow: f64,
    pub expected_balance: f64,
    pub estimated_std: f64,
    /// Estimated std over |net flow|; absent when net flow is zero.
    pub cv: Option<f64>,
    pub confidence: Confidence,
    pub summary: String,
}

fn driver(name: &str, amount: f64, detail: String) -> FlowDriver {
    FlowDriver {
        name: name.to_string(),
        amount,
        detail,
    }
}

/// Break one projected month into signed drivers with a confidence label.
pub fn explain_month(input: &ExplainMonthInput) -> FinTwinResult<ComputationOutput<MonthExplanation>> {
    let start = Instant::now();
    if input.month_index >= MAX_HORIZON_MONTHS {
        return Err(FinTwinError::invalid(
            "month_index",
            format!("Must be below {MAX_HORIZON_MONTHS}"),
        ));
    }
    let mut base = input.base.clone();
    base.config.horizon_months = base.config.horizon_months.max(input.month_index + 1);
    let prepared = prepare(&base)?;
    let path = expected_path(&prepared, money_to_f64(base.profile.fixed_outflows));

    let k = input.month_index as usize;
    let (plan, month) = match (prepared.plans.get(k), path.get(k)) {
        (Some(p), Some(m)) => (p, m),
        _ => {
            return Err(FinTwinError::InsufficientData(format!(
                "no projection for month {}",
                input.month_index
            )))
        }
    };

    let mut drivers = vec![driver(
        "Income",
        month.income,
        if plan.stress_active && plan.income_multiplier < 1.0 {
            format!("Reduced to {:.0}% by stress scenario", plan.income_multiplier * 100.0)
        } else {
            format!("Expected salary ({:?} model)", prepared.income_model.source)
        },
    )];
    drivers.push(driver("Fixed outflows", -month.fixed_outflows, "Rent, bills and subscriptions".into()));
    let seasonal = match &month.seasonal_event {
        Some(label) => format!("Seasonal x{:.2} ({label})", month.seasonal_multiplier),
        None if (month.seasonal_multiplier - 1.0).abs() > f64::EPSILON => {
            format!("Seasonal x{:.2}", month.seasonal_multiplier)
        }
        None => "Typical month".to_string(),
    };
    drivers.push(driver("Discretionary spend", -month.variable_spend, seasonal));
    for e in &plan.events {
        let (lo, hi) = e.cost_range();
        drivers.push(driver(&e.name, -e.mean_cost(), format!("Likely between {lo:.0} and {hi:.0}")));
    }
    if month.loan_payments > 0.0 {
        drivers.push(driver("Loan payments", -month.loan_payments, "Scheduled repayments".into()));
    }
    if month.one_off_cost > 0.0 {
        drivers.push(driver("One-off shock", -month.one_off_cost, "Stress scenario cost".into()));
    }
    if month.savings != 0.0 {
        drivers.push(driver("Savings plan", month.savings, "Committed monthly cut".into()));
    }

    let variance = (plan.income_std * plan.income_multiplier).powi(2)
        + (plan.expense_std * plan.expense_multiplier).powi(2)
        + plan.events.iter().map(LifeEvent::cost_variance).sum::<f64>();
    let estimated_std = variance.sqrt();
    let cv = if month.net_flow.abs() > f64::EPSILON {
        Some(estimated_std / month.net_flow.abs())
    } else {
        None
    };
    let confidence = Confidence::from_cv(cv);

    let biggest = drivers
        .iter()
        .filter(|d| d.amount < 0.0)
        .min_by(|a, b| a.amount.total_cmp(&b.amount))
        .map(|d| d.name.clone())
        .unwrap_or_else(|| "none".to_string());
    let summary = format!(
        "{}: net {:+.0} (largest outflow: {}), {:?} confidence",
        month.month, month.net_flow, biggest, confidence
    );

    let result = MonthExplanation {
        month_index: input.month_index,
        month: month.month,
        drivers,
        net_flow: month.net_flow,
        expected_balance: month.balance,
        estimated_std,
        cv,
        confidence,
        summary,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Expected-value driver attribution for one projected month",
        &serde_json::json!({
            "month_index": input.month_index,
            "months_observed": prepared.calibration.months_observed,
            "high_confidence_cv": HIGH_CONFIDENCE_CV,
            "medium_confidence_cv": MEDIUM_CONFIDENCE_CV,
        }),
        prepared.warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Event explanation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainEventInput {
    pub profile: UserProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub event: LifeEvent,
    #[serde(default)]
    pub active_loans: Option<Vec<Loan>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventExplanation {
    pub event_id: String,
    pub name: String,
    pub months_spanned: u32,
    /// Mean cost over every month the event spans.
    pub expected_cost: f64,
    /// 10th/90th percentile of one month's cost.
    pub cost_p10: f64,
    pub cost_p90: f64,
    pub months_of_income: Option<f64>,
    pub readiness_without: u32,
    pub readiness_with: u32,
    pub score_delta: i64,
    pub level_with: ReadinessLevel,
    pub drivers: Vec<ScoreDriver>,
    pub summary: String,
}

/// Readiness with and without one event, plus its cost profile.
pub fn explain_event(input: &ExplainEventInput) -> FinTwinResult<ComputationOutput<EventExplanation>> {
    let start = Instant::now();
    let event = &input.event;
    event.validate_for(&input.profile.user_id)?;

    let span = event.start_month().months_until(&event.end_month()) + 1;
    let months_spanned = u32::try_from(span).map_err(|_| FinTwinError::invalid("event", "end before start"))?;
    let total_cost = event.cost_mean * Decimal::from(months_spanned);

    let base = ReadinessInput {
        profile: input.profile.clone(),
        transactions: input.transactions.clone(),
        event: None,
        active_loans: input.active_loans.clone(),
    };
    let without = assess_readiness(&base)?;
    let with = assess_readiness(&ReadinessInput {
        event: Some(EventExposure {
            name: Some(event.name.clone()),
            cost: total_cost,
        }),
        ..base
    })?;

    let expected_cost = money_to_f64(total_cost);
    let income = with.metrics.avg_monthly_income;
    let months_of_income = if income > 0.0 { Some(expected_cost / income) } else { None };
    let (cost_p10, cost_p90) = event.cost_range();
    let score_delta = with.score as i64 - without.score as i64;

    let summary = match months_of_income {
        Some(m) => format!(
            "{} costs about {expected_cost:.0} ({m:.1} months of income) and moves readiness from {} to {}",
            event.name, without.score, with.score
        ),
        None => format!(
            "{} costs about {expected_cost:.0} with no income to cover it; readiness {} to {}",
            event.name, without.score, with.score
        ),
    };
    tracing::debug!(event_id = %event.id, score_delta, "explained event");

    let warnings = if with.metrics.income_source == ModelSource::ProfileFallback {
        vec!["Income estimated from profile; less than six months of history".to_string()]
    } else {
        Vec::new()
    };

    let result = EventExplanation {
        event_id: event.id.clone(),
        name: event.name.clone(),
        months_spanned,
        expected_cost,
        cost_p10,
        cost_p90,
        months_of_income,
        readiness_without: without.score,
        readiness_with: with.score,
        score_delta,
        level_with: with.level,
        drivers: with.drivers,
        summary,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Readiness with and without a single life event",
        &serde_json::json!({
            "event_id": event.id,
            "distribution": event.distribution,
            "recurrence": event.recurrence,
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CostDistribution, EventOrigin, Recurrence};
    use crate::simulation::monte_carlo::SimulationConfig;
    use crate::simulation::stress::StressScenario;
    use crate::types::SalaryFrequency;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn profile() -> UserProfile {
        UserProfile {
            user_id: "u1".into(),
            balance: dec!(3000),
            monthly_income: dec!(2000),
            salary_day: 1,
            salary_frequency: SalaryFrequency::Monthly,
            fixed_outflows: dec!(600),
            avg_variable_outflows: dec!(400),
            variability_pct: 0.15,
        }
    }

    fn month_input(month_index: u32) -> ExplainMonthInput {
        ExplainMonthInput {
            base: MonteCarloInput {
                profile: profile(),
                transactions: vec![],
                events: vec![],
                loans: vec![],
                config: SimulationConfig::starting(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
            },
            month_index,
        }
    }

    fn wedding() -> LifeEvent {
        LifeEvent {
            id: "wedding".into(),
            name: "Wedding".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
            cost_mean: dec!(2000),
            cost_std: dec!(300),
            distribution: CostDistribution::Normal,
            category: None,
            recurrence: Recurrence::None,
            origin: EventOrigin::Custom { owner: "u1".into() },
        }
    }

    #[test]
    fn test_drivers_sum_to_net_flow() {
        let out = explain_month(&month_input(3)).unwrap().result;
        let sum: f64 = out.drivers.iter().map(|d| d.amount).sum();
        assert!((sum - out.net_flow).abs() < 1e-9);
        // April: 2000 - 1000 * 1.6.
        assert!((out.net_flow - 400.0).abs() < 1e-9);
        assert!(out.drivers[2].detail.contains("Eid al-Fitr"));
        assert_eq!(out.month, MonthKey::new(2025, 4).unwrap());
    }

    #[test]
    fn test_confidence_thresholds() {
        assert_eq!(Confidence::from_cv(Some(0.1)), Confidence::High);
        assert_eq!(Confidence::from_cv(Some(0.25)), Confidence::High);
        assert_eq!(Confidence::from_cv(Some(0.4)), Confidence::Medium);
        assert_eq!(Confidence::from_cv(Some(0.9)), Confidence::Low);
        assert_eq!(Confidence::from_cv(None), Confidence::Low);
    }

    #[test]
    fn test_month_confidence_from_variance() {
        // January: net 1000, std sqrt(300^2 + 150^2) ~ 335.
        let jan = explain_month(&month_input(0)).unwrap().result;
        assert!((jan.estimated_std - (300f64.powi(2) + 150f64.powi(2)).sqrt()).abs() < 1e-6);
        assert_eq!(jan.confidence, Confidence::Medium);

        let mut stressed = month_input(0);
        stressed.base.config.stress_scenario = Some(StressScenario::job_loss(2));
        let out = explain_month(&stressed).unwrap().result;
        assert!(out.drivers[0].detail.contains("stress"));
        assert!(out.net_flow < 0.0);
    }

    #[test]
    fn test_month_beyond_horizon_extends_projection() {
        let out = explain_month(&month_input(9)).unwrap().result;
        assert_eq!(out.month, MonthKey::new(2025, 10).unwrap());
        assert!(explain_month(&month_input(MAX_HORIZON_MONTHS)).is_err());
    }

    #[test]
    fn test_event_lowers_readiness() {
        let out = explain_event(&ExplainEventInput {
            profile: profile(),
            transactions: vec![],
            event: wedding(),
            active_loans: None,
        })
        .unwrap()
        .result;
        assert_eq!(out.readiness_without, 83);
        assert_eq!(out.readiness_with, 78);
        assert_eq!(out.score_delta, -5);
        assert_eq!(out.months_spanned, 1);
        assert_eq!(out.months_of_income, Some(1.0));
        assert!(out.cost_p10 < 2000.0 && out.cost_p90 > 2000.0);
    }

    #[test]
    fn test_event_owned_by_someone_else_is_rejected() {
        let mut e = wedding();
        e.origin = EventOrigin::Custom { owner: "u2".into() };
        let res = explain_event(&ExplainEventInput {
            profile: profile(),
            transactions: vec![],
            event: e,
            active_loans: None,
        });
        assert!(matches!(res, Err(FinTwinError::InvalidInput { .. })));
    }
}
