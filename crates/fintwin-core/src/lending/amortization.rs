use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::prelude::*;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FinTwinError;
use crate::types::{add_months, with_metadata, ComputationOutput, Money};
use crate::FinTwinResult;

const MAX_TERM_MONTHS: u32 = 600;

fn round_cents(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationInput {
    pub principal: Money,
    /// Nominal annual rate in percent (12 = 12%).
    pub annual_rate_pct: Decimal,
    pub term_months: u32,
    /// Payments are dated one month apart starting one month after this date.
    pub start_date: NaiveDate,
}

/// One row of a repayment schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// 1-based payment number.
    pub month: u32,
    pub date: NaiveDate,
    pub principal: Money,
    pub interest: Money,
    pub payment: Money,
    pub remaining_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationOutput {
    pub monthly_payment: Money,
    /// `monthly_payment × term`; the final row may differ by cents.
    pub total_repayment: Money,
    pub total_interest: Money,
    pub schedule: Vec<ScheduleEntry>,
}

// ---------------------------------------------------------------------------
// Core calculations
// ---------------------------------------------------------------------------

fn validate_terms(principal: Money, annual_rate_pct: Decimal, term_months: u32) -> FinTwinResult<()> {
    if principal <= Decimal::ZERO {
        return Err(FinTwinError::invalid("principal", "Must be positive"));
    }
    if term_months == 0 || term_months > MAX_TERM_MONTHS {
        return Err(FinTwinError::invalid(
            "term_months",
            format!("Must be between 1 and {MAX_TERM_MONTHS}"),
        ));
    }
    if annual_rate_pct < Decimal::ZERO || annual_rate_pct > dec!(100) {
        return Err(FinTwinError::invalid(
            "annual_rate_pct",
            "Must be between 0 and 100",
        ));
    }
    Ok(())
}

/// Level monthly payment of a fully amortizing loan, rounded to cents.
pub fn monthly_payment(principal: Money, annual_rate_pct: Decimal, term_months: u32) -> FinTwinResult<Money> {
    validate_terms(principal, annual_rate_pct, term_months)?;
    let i = annual_rate_pct / dec!(100) / dec!(12);
    let n = Decimal::from(term_months);
    if i.is_zero() {
        return Ok(round_cents(principal / n));
    }
    let factor = (Decimal::ONE + i)
        .checked_powu(term_months as u64)
        .ok_or_else(|| overflow("annuity factor"))?;
    let denom = factor - Decimal::ONE;
    if denom.is_zero() {
        return Err(FinTwinError::DivisionByZero {
            context: "annuity factor".into(),
        });
    }
    let payment = principal
        .checked_mul(i)
        .and_then(|v| v.checked_mul(factor))
        .and_then(|v| v.checked_div(denom))
        .ok_or_else(|| overflow("monthly payment"))?;
    Ok(round_cents(payment))
}

fn overflow(what: &str) -> FinTwinError {
    FinTwinError::invalid("principal", format!("{what} exceeds decimal range"))
}

/// Month-by-month split of each payment into interest and principal.
///
/// The last row absorbs rounding residue so the balance ends at exactly zero.
pub fn build_schedule(
    principal: Money,
    annual_rate_pct: Decimal,
    term_months: u32,
    start_date: NaiveDate,
) -> FinTwinResult<Vec<ScheduleEntry>> {
    let payment = monthly_payment(principal, annual_rate_pct, term_months)?;
    let i = annual_rate_pct / dec!(100) / dec!(12);
    let mut balance = principal;
    let mut rows = Vec::with_capacity(term_months as usize);

    for k in 1..=term_months {
        let interest = round_cents(balance * i);
        let mut principal_part = round_cents(payment - interest);
        let mut this_payment = payment;
        if k == term_months || principal_part > balance {
            principal_part = balance;
            this_payment = principal_part + interest;
        }
        balance -= principal_part;
        rows.push(ScheduleEntry {
            month: k,
            date: add_months(start_date, k)?,
            principal: principal_part,
            interest,
            payment: this_payment,
            remaining_balance: balance.max(Decimal::ZERO),
        });
        if balance.is_zero() && k < term_months {
            // Paid off early through rounding; remaining rows carry nothing.
            for j in (k + 1)..=term_months {
                rows.push(ScheduleEntry {
                    month: j,
                    date: add_months(start_date, j)?,
                    principal: Decimal::ZERO,
                    interest: Decimal::ZERO,
                    payment: Decimal::ZERO,
                    remaining_balance: Decimal::ZERO,
                });
            }
            break;
        }
    }
    Ok(rows)
}

/// Amortize a loan: level payment, totals and the dated schedule.
pub fn amortize(input: &AmortizationInput) -> FinTwinResult<ComputationOutput<AmortizationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let payment = monthly_payment(input.principal, input.annual_rate_pct, input.term_months)?;
    let schedule = build_schedule(
        input.principal,
        input.annual_rate_pct,
        input.term_months,
        input.start_date,
    )?;
    let total_repayment = payment
        .checked_mul(Decimal::from(input.term_months))
        .ok_or_else(|| overflow("total repayment"))?;
    let scheduled: Money = schedule.iter().map(|r| r.payment).sum();
    if scheduled != total_repayment {
        warnings.push(format!(
            "Final payment adjusted by {} to clear the balance",
            scheduled - total_repayment
        ));
    }

    let output = AmortizationOutput {
        monthly_payment: payment,
        total_repayment,
        total_interest: total_repayment - input.principal,
        schedule,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-payment amortization (monthly compounding)",
        &serde_json::json!({
            "principal": input.principal.to_string(),
            "annual_rate_pct": input.annual_rate_pct.to_string(),
            "term_months": input.term_months,
            "rounding": "2dp, half away from zero",
        }),
        warnings,
        elapsed,
        output,
    ))
}
