use chrono::NaiveDate;
use fintwin_core::calibration::{calibrate, CalibrationInput};
use fintwin_core::events::catalog_for_user;
use fintwin_core::simulation::{
    run_monte_carlo, run_stress_test, MonteCarloInput, SimulationConfig, StressScenario, StressTestInput,
};
use fintwin_core::types::{SalaryFrequency, Transaction, UserProfile};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const SEED: u64 = 42;

fn modest_profile() -> UserProfile {
    UserProfile {
        user_id: "u1".into(),
        balance: dec!(850),
        monthly_income: dec!(400),
        salary_day: 1,
        salary_frequency: SalaryFrequency::Monthly,
        fixed_outflows: dec!(150),
        avg_variable_outflows: dec!(180),
        variability_pct: 0.15,
    }
}

fn base_input() -> MonteCarloInput {
    let mut config = SimulationConfig::starting(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    config.seed = Some(SEED);
    MonteCarloInput {
        profile: modest_profile(),
        transactions: vec![],
        events: vec![],
        loans: vec![],
        config,
    }
}

fn history(months: u32) -> Vec<Transaction> {
    let mut txs = Vec::new();
    for m in 1..=months {
        let date = NaiveDate::from_ymd_opt(2024, m, 5).unwrap();
        txs.push(Transaction {
            user_id: "u1".into(),
            amount: dec!(400) + Decimal::from(m),
            category: "salary".into(),
            date,
            event_tag: None,
        });
        txs.push(Transaction {
            user_id: "u1".into(),
            amount: dec!(-300),
            category: "food".into(),
            date,
            event_tag: None,
        });
        if m <= 3 {
            txs.push(Transaction {
                user_id: "u1".into(),
                amount: dec!(-50),
                category: "travel".into(),
                date,
                event_tag: None,
            });
        }
    }
    txs
}

// ===========================================================================
// Calibration
// ===========================================================================

#[test]
fn test_reliability_follows_month_count() {
    let short = calibrate(&CalibrationInput {
        profile: modest_profile(),
        transactions: history(5),
    })
    .unwrap();
    assert!(!short.result.income.is_reliable);
    assert!(short.warnings.iter().any(|w| w.starts_with("Income history covers 5")));
    assert!(short.warnings.iter().any(|w| w.starts_with("Expense history covers 5")));

    let long = calibrate(&CalibrationInput {
        profile: modest_profile(),
        transactions: history(8),
    })
    .unwrap();
    assert!(long.result.income.is_reliable);
    assert!(long.result.expense.is_reliable);
    assert!(long.result.by_category["food"].is_reliable);
    // Three months of travel stays unreliable next to reliable categories.
    assert!(!long.result.by_category["travel"].is_reliable);
}

// ===========================================================================
// Monte Carlo
// ===========================================================================

#[test]
fn test_job_loss_is_riskier_than_baseline() {
    let baseline = run_monte_carlo(&base_input()).unwrap().result;
    let mut stressed = base_input();
    stressed.config.stress_scenario = Some(StressScenario::job_loss(3));
    let stressed = run_monte_carlo(&stressed).unwrap().result;

    assert!(stressed.probability_negative > baseline.probability_negative);
    for m in baseline.months.iter().chain(&stressed.months) {
        assert!(m.p10 <= m.p50 && m.p50 <= m.p90);
    }
}

#[test]
fn test_seeded_runs_repeat_exactly() {
    let mut input = base_input();
    input.events = catalog_for_user(&[]).unwrap();
    let a = run_monte_carlo(&input).unwrap().result;
    let b = run_monte_carlo(&input).unwrap().result;
    assert_eq!(a.p10(), b.p10());
    assert_eq!(a.p50(), b.p50());
    assert_eq!(a.p90(), b.p90());
}

#[test]
fn test_stress_comparison_shares_random_numbers() {
    let out = run_stress_test(&StressTestInput {
        base: base_input(),
        scenario: StressScenario::job_loss(3),
    })
    .unwrap()
    .result;
    let plain = run_monte_carlo(&base_input()).unwrap().result;
    assert_eq!(out.baseline.months, plain.months);
    assert!(out.delta_probability_negative > 0.0);
    assert!(out.delta_resilience < 0);
}
