use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::projection::MAX_HORIZON_MONTHS;
use crate::calibration::seasonality::seasonal_event;
use crate::calibration::Calibration;
use crate::error::FinTwinError;
use crate::ledger::history::TransactionHistory;
use crate::lending::amortization::monthly_payment;
use crate::types::{money_to_f64, with_metadata_f64, ComputationOutput, Money, MonthKey, Transaction, UserProfile};
use crate::FinTwinResult;

const STRESS_INCOME_FACTOR: f64 = 0.8;
const STRESS_EXPENSE_FACTOR: f64 = 1.15;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Adjustments applied to the calibrated baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatIfScenario {
    /// Income change as a share (-0.2 = 20% less).
    #[serde(default)]
    pub income_change_pct: f64,
    #[serde(default)]
    pub expense_change_pct: f64,
    /// Principal of a new loan; zero for none.
    #[serde(default)]
    pub new_loan_amount: Money,
    #[serde(default = "default_rate")]
    pub loan_annual_rate_pct: Decimal,
    #[serde(default = "default_loan_term")]
    pub loan_term_months: u32,
    #[serde(default = "default_horizon")]
    pub horizon_months: u32,
}

fn default_rate() -> Decimal {
    dec!(10)
}

fn default_loan_term() -> u32 {
    24
}

fn default_horizon() -> u32 {
    12
}

impl Default for WhatIfScenario {
    fn default() -> Self {
        WhatIfScenario {
            income_change_pct: 0.0,
            expense_change_pct: 0.0,
            new_loan_amount: Decimal::ZERO,
            loan_annual_rate_pct: default_rate(),
            loan_term_months: default_loan_term(),
            horizon_months: default_horizon(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatIfInput {
    pub profile: UserProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub scenario: WhatIfScenario,
    /// Month of this date is timeline month 1.
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatIfMonth {
    /// 1-based.
    pub month_number: u32,
    pub month: MonthKey,
    pub income: f64,
    pub expenses: f64,
    pub loan_payment: f64,
    pub savings: f64,
    pub cumulative: f64,
    pub seasonal_event: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatIfStress {
    pub monthly_surplus: f64,
    pub sustainable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatIfResult {
    pub baseline_surplus: f64,
    pub new_surplus: f64,
    pub surplus_change: f64,
    pub loan_payment: f64,
    pub timeline: Vec<WhatIfMonth>,
    pub total_savings: f64,
    pub avg_monthly_savings: f64,
    /// First month whose cumulative savings are non-negative.
    pub months_to_break_even: Option<u32>,
    /// Income down 20% and spending up 15% on the adjusted month.
    pub stress: WhatIfStress,
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

fn validate(s: &WhatIfScenario) -> FinTwinResult<()> {
    for (field, v) in [
        ("income_change_pct", s.income_change_pct),
        ("expense_change_pct", s.expense_change_pct),
    ] {
        if !v.is_finite() || !(-1.0..=1.0).contains(&v) {
            return Err(FinTwinError::invalid(field, "Must be between -1 and 1"));
        }
    }
    if s.new_loan_amount < Decimal::ZERO {
        return Err(FinTwinError::invalid("new_loan_amount", "Must be non-negative"));
    }
    if s.horizon_months == 0 || s.horizon_months > MAX_HORIZON_MONTHS {
        return Err(FinTwinError::invalid(
            "horizon_months",
            format!("Must be between 1 and {MAX_HORIZON_MONTHS}"),
        ));
    }
    Ok(())
}

/// Baseline month adjusted for income, spending and a new loan's payment.
///
/// Spending follows the calibrated seasonality; the loan payment is level.
pub fn simulate_what_if(input: &WhatIfInput) -> FinTwinResult<ComputationOutput<WhatIfResult>> {
    let start = Instant::now();
    let s = &input.scenario;
    input.profile.validate()?;
    validate(s)?;

    let history = TransactionHistory::for_user(&input.profile.user_id, &input.transactions)?;
    let calibration = Calibration::from_history(&history);
    let income_model = calibration.income_model(&input.profile);
    let expense_model = calibration.expense_model(&input.profile);

    let loan_payment = if s.new_loan_amount > Decimal::ZERO {
        money_to_f64(monthly_payment(s.new_loan_amount, s.loan_annual_rate_pct, s.loan_term_months)?)
    } else {
        0.0
    };

    let income = income_model.mean * (1.0 + s.income_change_pct);
    let expense = expense_model.mean * (1.0 + s.expense_change_pct);
    let baseline_surplus = income_model.mean - expense_model.mean;
    let new_surplus = income - expense - loan_payment;

    let first = MonthKey::from_date(input.start_date);
    let mut cumulative = 0.0;
    let mut months_to_break_even = None;
    let mut timeline = Vec::with_capacity(s.horizon_months as usize);
    for k in 0..s.horizon_months {
        let month = first.plus(k);
        let idx = month.index();
        let month_income = income_model.seasonal_mean(idx) * (1.0 + s.income_change_pct);
        let month_expenses = expense_model.seasonal_mean(idx) * (1.0 + s.expense_change_pct);
        let savings = month_income - month_expenses - loan_payment;
        cumulative += savings;
        if months_to_break_even.is_none() && cumulative >= 0.0 {
            months_to_break_even = Some(k + 1);
        }
        timeline.push(WhatIfMonth {
            month_number: k + 1,
            month,
            income: month_income,
            expenses: month_expenses,
            loan_payment,
            savings,
            cumulative,
            seasonal_event: seasonal_event(idx).map(str::to_string),
        });
    }

    let stressed = income * STRESS_INCOME_FACTOR - expense * STRESS_EXPENSE_FACTOR - loan_payment;
    tracing::debug!(
        user_id = %input.profile.user_id,
        loan_payment,
        new_surplus,
        break_even = ?months_to_break_even,
        "what-if scenario"
    );

    let result = WhatIfResult {
        baseline_surplus,
        new_surplus,
        surplus_change: new_surplus - baseline_surplus,
        loan_payment,
        total_savings: cumulative,
        avg_monthly_savings: cumulative / s.horizon_months as f64,
        timeline,
        months_to_break_even,
        stress: WhatIfStress {
            monthly_surplus: stressed,
            sustainable: stressed > 0.0,
        },
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "What-if cash flow with a new level-payment loan",
        &serde_json::json!({
            "income_change_pct": s.income_change_pct,
            "expense_change_pct": s.expense_change_pct,
            "new_loan_amount": s.new_loan_amount.to_string(),
            "loan_annual_rate_pct": s.loan_annual_rate_pct.to_string(),
            "loan_term_months": s.loan_term_months,
            "horizon_months": s.horizon_months,
            "stress": "income -20%, spending +15%",
        }),
        calibration.fallback_warnings(),
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SalaryFrequency;

    fn input(start: NaiveDate, scenario: WhatIfScenario) -> WhatIfInput {
        WhatIfInput {
            profile: UserProfile {
                user_id: "u1".into(),
                balance: dec!(500),
                monthly_income: dec!(1000),
                salary_day: 1,
                salary_frequency: SalaryFrequency::Monthly,
                fixed_outflows: dec!(500),
                avg_variable_outflows: dec!(300),
                variability_pct: 0.1,
            },
            transactions: vec![],
            scenario,
            start_date: start,
        }
    }

    fn sep() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    #[test]
    fn test_break_even_after_back_to_school() {
        // Sep 1.6x spending: -280; Oct +200 (-80); Nov +200 (+120).
        let out = simulate_what_if(&input(sep(), WhatIfScenario::default())).unwrap().result;
        assert!((out.timeline[0].savings + 280.0).abs() < 1e-6);
        assert!((out.timeline[1].cumulative + 80.0).abs() < 1e-6);
        assert_eq!(out.months_to_break_even, Some(3));
        assert_eq!(out.loan_payment, 0.0);
        assert_eq!(out.timeline.len(), 12);
    }

    #[test]
    fn test_loan_payment_reduces_surplus() {
        let scenario = WhatIfScenario {
            new_loan_amount: dec!(1200),
            loan_annual_rate_pct: Decimal::ZERO,
            loan_term_months: 12,
            ..WhatIfScenario::default()
        };
        let out = simulate_what_if(&input(sep(), scenario)).unwrap().result;
        assert_eq!(out.loan_payment, 100.0);
        assert!((out.new_surplus - 100.0).abs() < 1e-6);
        assert!((out.surplus_change + 100.0).abs() < 1e-6);
        // Seasonal months keep the running total under zero all year.
        assert!((out.timeline[5].cumulative + 40.0).abs() < 1e-6);
        assert_eq!(out.months_to_break_even, None);
        assert!(out.timeline.iter().all(|m| m.loan_payment == 100.0));
    }

    #[test]
    fn test_stress_check_uses_adjusted_month() {
        let out = simulate_what_if(&input(sep(), WhatIfScenario::default())).unwrap().result;
        // 1000*0.8 - 800*1.15 = -120.
        assert!((out.stress.monthly_surplus + 120.0).abs() < 1e-6);
        assert!(!out.stress.sustainable);
    }

    #[test]
    fn test_invalid_scenarios_rejected() {
        let bad = |s: WhatIfScenario| simulate_what_if(&input(sep(), s)).is_err();
        assert!(bad(WhatIfScenario {
            income_change_pct: -1.5,
            ..WhatIfScenario::default()
        }));
        assert!(bad(WhatIfScenario {
            new_loan_amount: dec!(-1),
            ..WhatIfScenario::default()
        }));
        assert!(bad(WhatIfScenario {
            horizon_months: 0,
            ..WhatIfScenario::default()
        }));
        assert!(bad(WhatIfScenario {
            new_loan_amount: dec!(100),
            loan_term_months: 0,
            ..WhatIfScenario::default()
        }));
    }
}
