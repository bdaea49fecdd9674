use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::amortization::monthly_payment;
use crate::calibration::seasonality::{high_expense_months, is_high_expense_month, seasonal_event};
use crate::calibration::Calibration;
use crate::error::FinTwinError;
use crate::ledger::history::TransactionHistory;
use crate::types::{money_to_f64, with_metadata, ComputationOutput, Money, MonthKey, Transaction, UserProfile};
use crate::FinTwinResult;

/// Share of the monthly surplus a repayment may consume.
const MAX_SURPLUS_SHARE: f64 = 0.4;

fn default_terms() -> Vec<u32> {
    vec![12, 24, 36]
}

fn default_rate() -> Decimal {
    dec!(10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanOptionsInput {
    pub profile: UserProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub amount: Money,
    #[serde(default = "default_rate")]
    pub annual_rate_pct: Decimal,
    #[serde(default = "default_terms")]
    pub terms: Vec<u32>,
    /// Reference date for timing advice.
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanOption {
    pub term_months: u32,
    pub monthly_payment: Money,
    pub total_repayment: Money,
    pub total_interest: Money,
    pub affordable: bool,
    /// Payment as a share of surplus; `None` without a surplus.
    pub payment_to_surplus: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvoidMonth {
    pub month: MonthKey,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingAdvice {
    /// Next high-expense months (at most three) in the coming year.
    pub avoid_months: Vec<AvoidMonth>,
    /// Calendar months (1-12) without a seasonal spending spike.
    pub best_months: Vec<u32>,
    pub advice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanOptions {
    pub eligible: bool,
    pub monthly_surplus: f64,
    pub max_affordable_payment: f64,
    pub options: Vec<LoanOption>,
    pub recommended: Option<LoanOption>,
    pub timing: TimingAdvice,
}

fn timing_advice(from: NaiveDate) -> TimingAdvice {
    let start = MonthKey::from_date(from);
    let avoid_months: Vec<AvoidMonth> = (0..12)
        .map(|k| start.plus(k))
        .filter(|m| is_high_expense_month(m.index()))
        .take(3)
        .map(|m| AvoidMonth {
            month: m,
            reason: seasonal_event(m.index()).unwrap_or("High expense period").to_string(),
        })
        .collect();
    let high = high_expense_months();
    let best_months: Vec<u32> = (1..=12).filter(|m| !high.contains(m)).collect();
    let advice = match avoid_months.first() {
        Some(first) => format!(
            "Avoid starting repayments around {} ({}); spending peaks then",
            first.month, first.reason
        ),
        None => "No seasonal spending peaks in the coming year".to_string(),
    };
    TimingAdvice {
        avoid_months,
        best_months,
        advice,
    }
}

/// Compare repayment terms against the user's monthly surplus.
pub fn compare_loan_options(input: &LoanOptionsInput) -> FinTwinResult<ComputationOutput<LoanOptions>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.profile.validate()?;
    if input.amount <= Decimal::ZERO {
        return Err(FinTwinError::invalid("amount", "Must be positive"));
    }
    if input.terms.is_empty() {
        return Err(FinTwinError::invalid("terms", "At least one term is required"));
    }

    let history = TransactionHistory::for_user(&input.profile.user_id, &input.transactions)?;
    let calibration = Calibration::from_history(&history);
    warnings.extend(calibration.fallback_warnings());
    let surplus = calibration.income_model(&input.profile).mean - calibration.expense_model(&input.profile).mean;
    let max_payment = (surplus * MAX_SURPLUS_SHARE).max(0.0);

    let mut options = Vec::with_capacity(input.terms.len());
    for &term in &input.terms {
        let payment = monthly_payment(input.amount, input.annual_rate_pct, term)?;
        let total = payment * Decimal::from(term);
        let p = money_to_f64(payment);
        options.push(LoanOption {
            term_months: term,
            monthly_payment: payment,
            total_repayment: total,
            total_interest: total - input.amount,
            affordable: surplus > 0.0 && p <= max_payment,
            payment_to_surplus: (surplus > 0.0).then(|| p / surplus),
        });
    }

    let recommended = options
        .iter()
        .filter(|o| o.affordable)
        .min_by_key(|o| o.total_interest)
        .cloned();
    if surplus <= 0.0 {
        warnings.push("No monthly surplus; focus on reducing expenses before borrowing".into());
    } else if recommended.is_none() {
        warnings.push("No term keeps the payment within 40% of the monthly surplus".into());
    }

    let result = LoanOptions {
        eligible: recommended.is_some(),
        monthly_surplus: surplus,
        max_affordable_payment: max_payment,
        options,
        recommended,
        timing: timing_advice(input.start_date),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Term comparison against 40% of monthly surplus",
        &serde_json::json!({
            "annual_rate_pct": input.annual_rate_pct.to_string(),
            "terms": input.terms,
            "max_surplus_share": MAX_SURPLUS_SHARE,
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

    fn input(income: Money, expense: Money, amount: Money) -> LoanOptionsInput {
        LoanOptionsInput {
            profile: UserProfile {
                user_id: "u1".into(),
                balance: dec!(1000),
                monthly_income: income,
                salary_day: 1,
                salary_frequency: SalaryFrequency::Monthly,
                fixed_outflows: expense,
                avg_variable_outflows: Decimal::ZERO,
                variability_pct: 0.1,
            },
            transactions: vec![],
            amount,
            annual_rate_pct: dec!(10),
            terms: default_terms(),
            start_date: NaiveDate::from_ymd_opt(2025, 2, 10).unwrap(),
        }
    }

    #[test]
    fn test_recommends_cheapest_affordable_term() {
        // Surplus 500 -> max payment 200; 12m ~263.83 unaffordable, 24m ~138.43 affordable.
        let out = compare_loan_options(&input(dec!(2000), dec!(1500), dec!(3000))).unwrap();
        let r = out.result;
        assert!(r.eligible);
        assert!(!r.options[0].affordable);
        assert!(r.options[1].affordable && r.options[2].affordable);
        assert_eq!(r.recommended.unwrap().term_months, 24);
        assert!((r.max_affordable_payment - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_surplus_is_ineligible() {
        let out = compare_loan_options(&input(dec!(1000), dec!(1200), dec!(500))).unwrap();
        assert!(!out.result.eligible);
        assert!(out.result.options.iter().all(|o| !o.affordable));
        assert!(out.result.options[0].payment_to_surplus.is_none());
    }

    #[test]
    fn test_timing_advice_lists_upcoming_peaks() {
        let out = compare_loan_options(&input(dec!(2000), dec!(1500), dec!(3000))).unwrap();
        let t = out.result.timing;
        let months: Vec<String> = t.avoid_months.iter().map(|a| a.month.to_string()).collect();
        assert_eq!(months, vec!["2025-03", "2025-04", "2025-06"]);
        assert_eq!(t.avoid_months[0].reason, "Ramadan");
        assert_eq!(t.best_months, vec![1, 2, 5, 10, 11, 12]);
    }
}
