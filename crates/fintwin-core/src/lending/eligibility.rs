use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::loan::Loan;
use crate::error::FinTwinError;
use crate::ledger::history::TransactionHistory;
use crate::types::{money_to_f64, with_metadata_f64, ComputationOutput, Money, Transaction, UserProfile};
use crate::FinTwinResult;

/// Requests at or below this amount may skip advisor review.
pub const AUTO_APPROVAL_THRESHOLD: Money = dec!(1000);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityInput {
    pub profile: UserProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub requested_amount: Money,
    /// Loans already on the user's books; only approved/active ones count.
    #[serde(default)]
    pub existing_loans: Vec<Loan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityMetrics {
    pub monthly_income: f64,
    pub monthly_expense: f64,
    pub months_of_savings: f64,
    /// `None` when income is zero.
    pub savings_rate: Option<f64>,
    /// `None` when income is zero.
    pub debt_to_income: Option<f64>,
    /// `None` when income is zero (treated as unbounded).
    pub total_debt_burden: Option<f64>,
    pub existing_debt_service: f64,
    pub active_loan_count: usize,
    pub expense_from_history: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityResult {
    /// 0-100, higher is better.
    pub score: u32,
    pub risk_flags: Vec<String>,
    pub can_auto_approve: bool,
    pub metrics: EligibilityMetrics,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Income, spending and reserve ratios shared by the lending scorers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CashPosition {
    pub income: f64,
    pub monthly_expense: f64,
    pub expense_from_history: bool,
    pub months_of_savings: f64,
    /// `None` when income is zero.
    pub savings_rate: Option<f64>,
}

/// Stated income against the historical average monthly outflow, or the
/// profile's estimated expense when there is no history.
pub(crate) fn cash_position(profile: &UserProfile, transactions: &[Transaction]) -> FinTwinResult<CashPosition> {
    let history = TransactionHistory::for_user(&profile.user_id, transactions)?;
    let (monthly_expense, expense_from_history) = match history.average_monthly_expense() {
        Some(e) => (e, true),
        None => (money_to_f64(profile.estimated_expense()), false),
    };
    let income = money_to_f64(profile.monthly_income);
    let balance = money_to_f64(profile.balance);
    Ok(CashPosition {
        income,
        monthly_expense,
        expense_from_history,
        months_of_savings: balance / monthly_expense.max(1.0),
        savings_rate: (income > 0.0).then(|| (income - monthly_expense) / income),
    })
}

/// Score a loan request without the output envelope.
pub fn assess_eligibility(input: &EligibilityInput) -> FinTwinResult<EligibilityResult> {
    input.profile.validate()?;
    if input.requested_amount <= Decimal::ZERO {
        return Err(FinTwinError::invalid("requested_amount", "Must be positive"));
    }

    let CashPosition {
        income,
        monthly_expense,
        expense_from_history: from_history,
        months_of_savings,
        savings_rate,
    } = cash_position(&input.profile, &input.transactions)?;
    let amount = money_to_f64(input.requested_amount);

    let servicing: Vec<&Loan> = input
        .existing_loans
        .iter()
        .filter(|l| l.status.is_servicing())
        .collect();
    let existing_debt_service: f64 = servicing.iter().map(|l| money_to_f64(l.monthly_payment)).sum();

    let (debt_to_income, total_debt_burden) = if income > 0.0 {
        (
            Some(amount / (income * 12.0)),
            Some((existing_debt_service + amount / 6.0) / income),
        )
    } else {
        (None, None)
    };

    let mut score: i32 = 100;
    let mut flags = Vec::new();

    if months_of_savings < 0.5 {
        score -= 30;
        flags.push("Low emergency buffer".to_string());
    } else if months_of_savings < 1.0 {
        score -= 15;
        flags.push("Limited emergency buffer".to_string());
    }

    let negative_savings = savings_rate.map_or(true, |r| r < 0.0);
    if negative_savings {
        score -= 25;
        flags.push("Negative savings rate".to_string());
    } else if savings_rate.is_some_and(|r| r < 0.10) {
        score -= 10;
        flags.push("Low savings rate".to_string());
    }

    if debt_to_income.map_or(true, |d| d > 0.30) {
        score -= 20;
        flags.push("High debt-to-income ratio".to_string());
    }

    let burden = total_debt_burden.unwrap_or(f64::INFINITY);
    if burden > 0.40 {
        score -= 20;
        flags.push("High total debt burden".to_string());
    }

    if servicing.len() >= 2 {
        score -= 15;
        flags.push("Multiple active loans".to_string());
    }

    let severe = months_of_savings < 0.5 || negative_savings || burden > 0.50;
    let can_auto_approve = input.requested_amount <= AUTO_APPROVAL_THRESHOLD && !severe;

    Ok(EligibilityResult {
        score: score.clamp(0, 100) as u32,
        risk_flags: flags,
        can_auto_approve,
        metrics: EligibilityMetrics {
            monthly_income: income,
            monthly_expense,
            months_of_savings,
            savings_rate,
            debt_to_income,
            total_debt_burden,
            existing_debt_service,
            active_loan_count: servicing.len(),
            expense_from_history: from_history,
        },
    })
}

/// Rule-based eligibility score for a loan request.
pub fn score_loan_eligibility(input: &EligibilityInput) -> FinTwinResult<ComputationOutput<EligibilityResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let result = assess_eligibility(input)?;
    if !result.metrics.expense_from_history {
        warnings.push("No transaction history; monthly expense estimated from profile".into());
    }
    if result.metrics.monthly_income == 0.0 {
        warnings.push("Zero stated income; savings rate and debt ratios are undefined".into());
    }
    tracing::debug!(
        user_id = %input.profile.user_id,
        score = result.score,
        auto = result.can_auto_approve,
        "scored loan eligibility"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Deduction-based loan eligibility",
        &serde_json::json!({
            "requested_amount": input.requested_amount.to_string(),
            "auto_approval_threshold": AUTO_APPROVAL_THRESHOLD.to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lending::loan::LoanStatus;
    use crate::types::SalaryFrequency;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn profile(balance: Money, income: Money) -> UserProfile {
        UserProfile {
            user_id: "u1".into(),
            balance,
            monthly_income: income,
            salary_day: 1,
            salary_frequency: SalaryFrequency::Monthly,
            fixed_outflows: dec!(1000),
            avg_variable_outflows: dec!(500),
            variability_pct: 0.1,
        }
    }

    fn input(balance: Money, income: Money, amount: Money) -> EligibilityInput {
        EligibilityInput {
            profile: profile(balance, income),
            transactions: vec![],
            requested_amount: amount,
            existing_loans: vec![],
        }
    }

    fn servicing_loan(id: &str) -> Loan {
        let mut loan = Loan::pending(
            id,
            "u1",
            dec!(1200),
            12,
            dec!(0),
            "phone",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        )
        .unwrap();
        loan.status = LoanStatus::Active;
        loan
    }

    #[test]
    fn test_healthy_small_request_auto_approves() {
        let r = assess_eligibility(&input(dec!(9000), dec!(3000), dec!(800))).unwrap();
        assert_eq!(r.score, 100);
        assert!(r.risk_flags.is_empty());
        assert!(r.can_auto_approve);
        assert!((r.metrics.months_of_savings - 6.0).abs() < 1e-9);
        assert!((r.metrics.savings_rate.unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_deduction_tiers_are_exclusive() {
        // Buffer 0.6 months: only the limited-buffer tier applies.
        let r = assess_eligibility(&input(dec!(900), dec!(3000), dec!(500))).unwrap();
        assert_eq!(r.score, 85);
        assert_eq!(r.risk_flags, vec!["Limited emergency buffer".to_string()]);
        // Savings rate 5%: low, not negative.
        let r = assess_eligibility(&input(dec!(9000), dec!(1579), dec!(100))).unwrap();
        assert!(r.risk_flags.contains(&"Low savings rate".to_string()));
        assert!(!r.risk_flags.contains(&"Negative savings rate".to_string()));
    }

    #[test]
    fn test_zero_income_is_severe() {
        let r = assess_eligibility(&input(dec!(100), Decimal::ZERO, dec!(200))).unwrap();
        assert!(!r.can_auto_approve);
        assert!(r.risk_flags.contains(&"Negative savings rate".to_string()));
        assert!(r.risk_flags.contains(&"High total debt burden".to_string()));
        assert_eq!(r.score, 100 - 30 - 25 - 20 - 20);
        assert!(r.metrics.total_debt_burden.is_none());
    }

    #[test]
    fn test_multiple_active_loans_flagged() {
        let mut inp = input(dec!(9000), dec!(3000), dec!(500));
        inp.existing_loans = vec![servicing_loan("a"), servicing_loan("b")];
        let r = assess_eligibility(&inp).unwrap();
        assert_eq!(r.metrics.active_loan_count, 2);
        assert!(r.risk_flags.contains(&"Multiple active loans".to_string()));
        assert!((r.metrics.existing_debt_service - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        assert!(assess_eligibility(&input(dec!(1), dec!(1), Decimal::ZERO)).is_err());
        assert!(assess_eligibility(&input(dec!(1), dec!(1), dec!(-5))).is_err());
    }

    #[test]
    fn test_over_threshold_never_auto_approves() {
        let r = assess_eligibility(&input(dec!(90000), dec!(30000), dec!(1000.01))).unwrap();
        assert!(!r.can_auto_approve);
        let r = assess_eligibility(&input(dec!(90000), dec!(30000), dec!(1000))).unwrap();
        assert!(r.can_auto_approve);
    }

    proptest! {
        #[test]
        fn prop_auto_approval_monotonic_above_threshold(
            balance in 0i64..100_000,
            income in 0i64..20_000,
            extra in 1i64..1_000_000,
        ) {
            let amount = AUTO_APPROVAL_THRESHOLD + Decimal::new(extra, 2);
            let r = assess_eligibility(&input(Decimal::from(balance), Decimal::from(income), amount)).unwrap();
            prop_assert!(!r.can_auto_approve);
            prop_assert!(r.score <= 100);
        }
    }
}
