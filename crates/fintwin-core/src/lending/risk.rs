use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::eligibility::cash_position;
use super::loan::Loan;
use crate::error::FinTwinError;
use crate::scoring::readiness::{assess_readiness, ReadinessInput, ScoreDriver};
use crate::types::{money_to_f64, with_metadata_f64, ComputationOutput, Money, Transaction, UserProfile};
use crate::FinTwinResult;

const W_READINESS: f64 = 0.40;
const W_BURDEN: f64 = 0.30;
const W_LIQUIDITY: f64 = 0.15;
const W_SAVINGS: f64 = 0.15;

/// Term assumed for the repayment ratio when the request names none.
const DEFAULT_TERM_MONTHS: u32 = 12;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRiskInput {
    pub profile: UserProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub requested_amount: Money,
    #[serde(default)]
    pub term_months: Option<u32>,
    #[serde(default)]
    pub active_loans: Option<Vec<Loan>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            RiskLevel::Critical
        } else if score >= 60 {
            RiskLevel::High
        } else if score >= 40 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "Reject",
            RiskLevel::High => "Reject or Require Guarantor",
            RiskLevel::Medium => "Approve with Conditions",
            RiskLevel::Low => "Approve",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRiskMetrics {
    pub readiness_score: u32,
    pub loan_to_income: f64,
    pub months_of_savings: f64,
    /// `None` when income is zero.
    pub savings_rate: Option<f64>,
    /// Estimated monthly repayment over stated income.
    pub debt_to_income: f64,
    pub net_monthly_cashflow: f64,
    pub expense_volatility: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRiskScore {
    /// 0-100, higher is riskier.
    pub risk_score: u32,
    pub level: RiskLevel,
    pub recommendation: String,
    pub drivers: Vec<ScoreDriver>,
    pub warnings: Vec<String>,
    /// Conditions attached to a medium-risk approval.
    pub conditions: Vec<String>,
    pub metrics: LoanRiskMetrics,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn risk_driver(name: &str, risk: f64, weight: f64, detail: String) -> ScoreDriver {
    ScoreDriver {
        name: name.to_string(),
        score: risk,
        weight,
        impact: weight * risk,
        detail,
    }
}

pub fn assess_loan_risk(input: &LoanRiskInput) -> FinTwinResult<LoanRiskScore> {
    if input.requested_amount <= Decimal::ZERO {
        return Err(FinTwinError::invalid("requested_amount", "Must be positive"));
    }
    if input.term_months == Some(0) {
        return Err(FinTwinError::invalid("term_months", "Must be positive"));
    }
    let readiness = assess_readiness(&ReadinessInput {
        profile: input.profile.clone(),
        transactions: input.transactions.clone(),
        event: None,
        active_loans: input.active_loans.clone(),
    })?;
    let m = &readiness.metrics;
    let cash = cash_position(&input.profile, &input.transactions)?;

    let amount = money_to_f64(input.requested_amount);
    let income = money_to_f64(input.profile.monthly_income).max(1.0);
    let loan_to_income = amount / income;

    let readiness_risk = 100.0 - readiness.score as f64;
    let burden_risk = (loan_to_income / 3.0 * 100.0).min(100.0);
    let liquidity_risk = ((1.0 - cash.months_of_savings / 3.0) * 100.0).clamp(0.0, 100.0);
    let savings_risk = match cash.savings_rate {
        Some(rate) if rate >= 0.0 => ((0.20 - rate) * 200.0).clamp(0.0, 100.0),
        _ => 100.0,
    };

    let weighted = readiness_risk * W_READINESS
        + burden_risk * W_BURDEN
        + liquidity_risk * W_LIQUIDITY
        + savings_risk * W_SAVINGS;
    let risk_score = weighted.round().clamp(0.0, 100.0) as u32;
    let level = RiskLevel::from_score(risk_score);

    let term = input.term_months.unwrap_or(DEFAULT_TERM_MONTHS);
    let debt_to_income = amount / term as f64 / income;
    let net_monthly_cashflow = cash.income - cash.monthly_expense;

    let mut warnings = Vec::new();
    if debt_to_income > 0.5 {
        warnings.push(format!(
            "High debt-to-income ratio: {:.1}%. Recommended maximum is 40%.",
            debt_to_income * 100.0
        ));
    }
    if cash.months_of_savings < 2.0 {
        warnings.push(format!(
            "Low cash reserves: only {:.1} months of expenses. Recommend at least 3 months.",
            cash.months_of_savings
        ));
    }
    if net_monthly_cashflow < 0.0 {
        warnings.push(format!(
            "Negative monthly cashflow: {net_monthly_cashflow:.0}. Expenses exceed income."
        ));
    }
    if m.expense_cv > 0.3 {
        warnings.push("High expense volatility: monthly expenses vary significantly.".into());
    }

    let mut conditions = Vec::new();
    if level == RiskLevel::Medium {
        if cash.months_of_savings < 3.0 {
            conditions.push("Request additional collateral or guarantor".to_string());
        }
        if debt_to_income > 0.4 {
            conditions.push(
                "Consider reducing loan amount or extending duration to improve DTI ratio".to_string(),
            );
        }
        if term < 36 {
            conditions.push("Extend loan duration to reduce monthly payment".to_string());
        }
        conditions.push("Set up automatic payments from salary account".to_string());
    }

    let drivers = vec![
        risk_driver(
            "Readiness",
            readiness_risk,
            W_READINESS,
            format!("Readiness score {}/100", readiness.score),
        ),
        risk_driver(
            "Debt Burden",
            burden_risk,
            W_BURDEN,
            format!("Loan is {loan_to_income:.1}x monthly income"),
        ),
        risk_driver(
            "Liquidity",
            liquidity_risk,
            W_LIQUIDITY,
            format!("{:.1} months of expenses in reserve (target 3)", cash.months_of_savings),
        ),
        risk_driver(
            "Savings",
            savings_risk,
            W_SAVINGS,
            match cash.savings_rate {
                Some(rate) => format!("Savings rate {:.1}% (target 20%)", rate * 100.0),
                None => "No stated income".to_string(),
            },
        ),
    ];

    Ok(LoanRiskScore {
        risk_score,
        level,
        recommendation: level.recommendation().to_string(),
        drivers,
        warnings,
        conditions,
        metrics: LoanRiskMetrics {
            readiness_score: readiness.score,
            loan_to_income,
            months_of_savings: cash.months_of_savings,
            savings_rate: cash.savings_rate,
            debt_to_income,
            net_monthly_cashflow,
            expense_volatility: m.expense_cv,
        },
    })
}

/// Weighted loan risk score (higher is riskier) with recommendation.
pub fn score_loan_risk(input: &LoanRiskInput) -> FinTwinResult<ComputationOutput<LoanRiskScore>> {
    let start = Instant::now();
    let result = assess_loan_risk(input)?;
    tracing::debug!(
        user_id = %input.profile.user_id,
        risk = result.risk_score,
        level = ?result.level,
        "scored loan risk"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Weighted loan risk (readiness, burden, liquidity, savings)",
        &serde_json::json!({
            "weights": {
                "readiness": W_READINESS,
                "burden": W_BURDEN,
                "liquidity": W_LIQUIDITY,
                "savings": W_SAVINGS,
            },
            "requested_amount": input.requested_amount.to_string(),
            "term_months": input.term_months.unwrap_or(DEFAULT_TERM_MONTHS),
        }),
        Vec::new(),
        elapsed,
        result,
    ))
}
