use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::calibration::{Calibration, ModelSource};
use crate::ledger::history::TransactionHistory;
use crate::lending::loan::Loan;
use crate::types::{money_to_f64, with_metadata_f64, ComputationOutput, Money, Transaction, UserProfile};
use crate::FinTwinResult;

const W_LIQUIDITY: f64 = 0.30;
const W_SAVINGS: f64 = 0.20;
const W_INCOME_STABILITY: f64 = 0.15;
const W_EXPENSE_VOLATILITY: f64 = 0.10;
const W_EVENT_EXPOSURE: f64 = 0.15;
const W_DEBT_LOAD: f64 = 0.10;

/// Debt-load sub-score used when no loan information is supplied.
pub const DEBT_LOAD_NOT_ASSESSED: f64 = 80.0;

const TARGET_BUFFER_MONTHS: f64 = 6.0;
const TARGET_SAVINGS_RATE: f64 = 0.20;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An upcoming expense the user wants to be ready for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventExposure {
    #[serde(default)]
    pub name: Option<String>,
    pub cost: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessInput {
    pub profile: UserProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub event: Option<EventExposure>,
    /// `None` means debt was not assessed; `Some(vec![])` means no debt.
    #[serde(default)]
    pub active_loans: Option<Vec<Loan>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessLevel {
    Low,
    Medium,
    High,
}

impl ReadinessLevel {
    pub fn from_score(score: u32) -> Self {
        if score >= 70 {
            ReadinessLevel::High
        } else if score >= 40 {
            ReadinessLevel::Medium
        } else {
            ReadinessLevel::Low
        }
    }
}

/// One weighted component of a score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDriver {
    pub name: String,
    pub score: f64,
    pub weight: f64,
    /// Weighted distance from a neutral 50; positive helps.
    pub impact: f64,
    pub detail: String,
}

impl ScoreDriver {
    fn new(name: &str, score: f64, weight: f64, detail: String) -> Self {
        ScoreDriver {
            name: name.to_string(),
            score,
            weight,
            impact: weight * (score - 50.0),
            detail,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessMetrics {
    pub avg_monthly_income: f64,
    pub avg_monthly_expense: f64,
    pub months_of_buffer: f64,
    pub savings_rate: f64,
    pub income_cv: f64,
    pub expense_cv: f64,
    pub event_cost: f64,
    pub event_exposure_ratio: f64,
    pub monthly_debt_service: Option<f64>,
    pub months_observed: usize,
    pub income_source: ModelSource,
    pub expense_source: ModelSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessScore {
    /// 0-100, higher is more resilient.
    pub score: u32,
    pub level: ReadinessLevel,
    pub liquidity: f64,
    pub savings: f64,
    pub income_stability: f64,
    pub expense_volatility: f64,
    pub event_exposure: f64,
    pub debt_load: f64,
    pub drivers: Vec<ScoreDriver>,
    pub explanation: String,
    pub metrics: ReadinessMetrics,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Compute the readiness score without the output envelope.
pub fn assess_readiness(input: &ReadinessInput) -> FinTwinResult<ReadinessScore> {
    input.profile.validate()?;
    let history = TransactionHistory::for_user(&input.profile.user_id, &input.transactions)?;
    let calibration = Calibration::from_history(&history);
    let income_model = calibration.income_model(&input.profile);
    let expense_model = calibration.expense_model(&input.profile);

    let avg_income = income_model.mean;
    let avg_expense = expense_model.mean;
    let balance = money_to_f64(input.profile.balance);

    let months_of_buffer = balance / avg_expense.max(1.0);
    let liquidity = (months_of_buffer / TARGET_BUFFER_MONTHS * 100.0).clamp(0.0, 100.0);

    let savings_rate = (avg_income - avg_expense) / avg_income.max(1.0);
    let savings = (savings_rate / TARGET_SAVINGS_RATE * 100.0).clamp(0.0, 100.0);

    let income_cv = income_model.cv;
    let income_stability = (100.0 - income_cv * 200.0).clamp(0.0, 100.0);

    let expense_cv = expense_model.cv;
    let expense_volatility = (100.0 - expense_cv * 150.0).clamp(0.0, 100.0);

    let event_cost = input.event.as_ref().map_or(0.0, |e| money_to_f64(e.cost).max(0.0));
    let exposure_ratio = event_cost / avg_income.max(1.0);
    let event_exposure = match &input.event {
        Some(_) => (100.0 - exposure_ratio * 33.0).clamp(0.0, 100.0),
        None => 100.0,
    };

    let debt_service = input
        .active_loans
        .as_ref()
        .map(|loans| loans.iter().map(|l| money_to_f64(l.debt_service())).sum::<f64>());
    let debt_load = match debt_service {
        Some(service) => (100.0 - service / avg_income.max(1.0) * 250.0).clamp(0.0, 100.0),
        None => DEBT_LOAD_NOT_ASSESSED,
    };

    let weighted = liquidity * W_LIQUIDITY
        + savings * W_SAVINGS
        + income_stability * W_INCOME_STABILITY
        + expense_volatility * W_EXPENSE_VOLATILITY
        + event_exposure * W_EVENT_EXPOSURE
        + debt_load * W_DEBT_LOAD;
    let score = weighted.round().clamp(0.0, 100.0) as u32;

    let stability_detail = |label: &str, cv: f64, source: ModelSource| match source {
        ModelSource::Calibrated => format!("{label}: {:.1}% month-to-month variation", cv * 100.0),
        ModelSource::ProfileFallback => {
            format!("{label}: not enough history, stated figures assumed steady")
        }
    };

    let drivers = vec![
        ScoreDriver::new(
            "Liquidity",
            liquidity,
            W_LIQUIDITY,
            format!("Liquidity: {months_of_buffer:.1} months of expenses saved (target 6)"),
        ),
        ScoreDriver::new(
            "Savings",
            savings,
            W_SAVINGS,
            format!(
                "Savings: {:.1}% of income left after expenses (target 20%)",
                savings_rate * 100.0
            ),
        ),
        ScoreDriver::new(
            "Income Stability",
            income_stability,
            W_INCOME_STABILITY,
            stability_detail("Income stability", income_cv, income_model.source),
        ),
        ScoreDriver::new(
            "Expense Control",
            expense_volatility,
            W_EXPENSE_VOLATILITY,
            stability_detail("Expense control", expense_cv, expense_model.source),
        ),
        ScoreDriver::new(
            "Event Exposure",
            event_exposure,
            W_EVENT_EXPOSURE,
            match &input.event {
                Some(e) => format!(
                    "Event exposure: {} costs {exposure_ratio:.1}x monthly income",
                    e.name.as_deref().unwrap_or("upcoming event")
                ),
                None => "Event exposure: no upcoming event".to_string(),
            },
        ),
        ScoreDriver::new(
            "Debt Load",
            debt_load,
            W_DEBT_LOAD,
            match debt_service {
                Some(s) => format!(
                    "Debt load: {s:.2} monthly repayments ({:.1}% of income)",
                    s / avg_income.max(1.0) * 100.0
                ),
                None => "Debt load: not assessed, no loan information supplied".to_string(),
            },
        ),
    ];

    let explanation = explain(score, &drivers);

    Ok(ReadinessScore {
        score,
        level: ReadinessLevel::from_score(score),
        liquidity,
        savings,
        income_stability,
        expense_volatility,
        event_exposure,
        debt_load,
        drivers,
        explanation,
        metrics: ReadinessMetrics {
            avg_monthly_income: avg_income,
            avg_monthly_expense: avg_expense,
            months_of_buffer,
            savings_rate,
            income_cv,
            expense_cv,
            event_cost,
            event_exposure_ratio: exposure_ratio,
            monthly_debt_service: debt_service,
            months_observed: calibration.months_observed,
            income_source: income_model.source,
            expense_source: expense_model.source,
        },
    })
}

fn explain(score: u32, drivers: &[ScoreDriver]) -> String {
    let worst = drivers.iter().min_by(|a, b| a.score.total_cmp(&b.score));
    let best = drivers.iter().max_by(|a, b| a.score.total_cmp(&b.score));
    match (worst, best) {
        (Some(w), Some(b)) => format!(
            "Readiness is {score}/100. Main drag is {} ({}). Strongest point is {}.",
            w.name, w.detail, b.name
        ),
        _ => format!("Readiness is {score}/100."),
    }
}

/// Six-factor readiness / resilience score.
pub fn score_readiness(input: &ReadinessInput) -> FinTwinResult<ComputationOutput<ReadinessScore>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let result = assess_readiness(input)?;
    if result.metrics.income_source == ModelSource::ProfileFallback {
        warnings.push("Income averages fall back to stated monthly income".into());
    }
    if result.metrics.expense_source == ModelSource::ProfileFallback {
        warnings.push("Expense averages fall back to stated outflows".into());
    }
    if input.active_loans.is_none() {
        warnings.push(format!(
            "Debt load not assessed; neutral sub-score {DEBT_LOAD_NOT_ASSESSED} used"
        ));
    }
    tracing::debug!(user_id = %input.profile.user_id, score = result.score, "scored readiness");

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Weighted six-factor readiness score",
        &serde_json::json!({
            "weights": {
                "liquidity": W_LIQUIDITY,
                "savings": W_SAVINGS,
                "income_stability": W_INCOME_STABILITY,
                "expense_volatility": W_EXPENSE_VOLATILITY,
                "event_exposure": W_EVENT_EXPOSURE,
                "debt_load": W_DEBT_LOAD,
            },
            "target_buffer_months": TARGET_BUFFER_MONTHS,
            "target_savings_rate": TARGET_SAVINGS_RATE,
        }),
        warnings,
        elapsed,
        result,
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

    fn profile(balance: Money, income: Money, fixed: Money, variable: Money) -> UserProfile {
        UserProfile {
            user_id: "u1".into(),
            balance,
            monthly_income: income,
            salary_day: 1,
            salary_frequency: SalaryFrequency::Monthly,
            fixed_outflows: fixed,
            avg_variable_outflows: variable,
            variability_pct: 0.1,
        }
    }

    fn input(p: UserProfile) -> ReadinessInput {
        ReadinessInput {
            profile: p,
            transactions: vec![],
            event: None,
            active_loans: None,
        }
    }

    #[test]
    fn test_fallback_profile_score() {
        // 1000 income, 800 expense, 2400 balance: 3 months buffer, 20% savings.
        let r = assess_readiness(&input(profile(dec!(2400), dec!(1000), dec!(500), dec!(300)))).unwrap();
        assert!((r.liquidity - 50.0).abs() < 1e-9);
        assert!((r.savings - 100.0).abs() < 1e-9);
        assert_eq!(r.income_stability, 100.0);
        assert_eq!(r.debt_load, DEBT_LOAD_NOT_ASSESSED);
        // 15 + 20 + 15 + 10 + 15 + 8
        assert_eq!(r.score, 83);
        assert_eq!(r.level, ReadinessLevel::High);
        assert!(r.explanation.starts_with("Readiness is 83/100. Main drag is Liquidity"));
    }

    #[test]
    fn test_event_and_debt_lower_the_score() {
        let base = input(profile(dec!(2400), dec!(1000), dec!(500), dec!(300)));
        let mut with_event = base.clone();
        with_event.event = Some(EventExposure {
            name: Some("Wedding".into()),
            cost: dec!(2000),
        });
        let r = assess_readiness(&with_event).unwrap();
        assert!((r.event_exposure - 34.0).abs() < 1e-9);

        let loan = {
            let mut l = Loan::pending(
                "L1",
                "u1",
                dec!(1200),
                12,
                Decimal::ZERO,
                "",
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            )
            .unwrap();
            l.status = crate::lending::loan::LoanStatus::Active;
            l
        };
        let mut with_debt = base.clone();
        with_debt.active_loans = Some(vec![loan]);
        let r = assess_readiness(&with_debt).unwrap();
        // 100/1000 * 250 = 25 points off.
        assert!((r.debt_load - 75.0).abs() < 1e-9);

        let mut no_debt = base;
        no_debt.active_loans = Some(vec![]);
        assert_eq!(assess_readiness(&no_debt).unwrap().debt_load, 100.0);
    }

    #[test]
    fn test_driver_impacts_are_signed() {
        let r = assess_readiness(&input(profile(Decimal::ZERO, dec!(500), dec!(400), dec!(300)))).unwrap();
        let liquidity = &r.drivers[0];
        assert_eq!(liquidity.score, 0.0);
        assert!(liquidity.impact < 0.0);
        assert!(r.drivers[2].impact > 0.0);
        // 0 + 0 + 15 + 10 + 15 + 8
        assert_eq!(r.score, 48);
        assert_eq!(r.level, ReadinessLevel::Medium);
    }

    proptest! {
        #[test]
        fn prop_score_within_bounds(
            balance in -10_000i64..100_000,
            income in 0i64..20_000,
            fixed in 0i64..10_000,
            variable in 0i64..10_000,
            event in proptest::option::of(0i64..50_000),
        ) {
            let mut inp = input(profile(
                Decimal::from(balance),
                Decimal::from(income),
                Decimal::from(fixed),
                Decimal::from(variable),
            ));
            inp.event = event.map(|c| EventExposure { name: None, cost: Decimal::from(c) });
            let r = assess_readiness(&inp).unwrap();
            prop_assert!(r.score <= 100);
            for d in &r.drivers {
                prop_assert!((0.0..=100.0).contains(&d.score));
            }
        }
    }
}
