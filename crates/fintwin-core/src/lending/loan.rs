use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amortization::{build_schedule, monthly_payment, ScheduleEntry};
use super::eligibility::{assess_eligibility, EligibilityInput, AUTO_APPROVAL_THRESHOLD};
use crate::error::FinTwinError;
use crate::types::{with_metadata, ComputationOutput, Money, MonthKey, Transaction, UserProfile};
use crate::FinTwinResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle of a loan.
///
/// `PendingAdvisor -> {ApprovedByAdvisor, RejectedByAdvisor}`, `ApprovedAuto`
/// on the automatic path, then approved states `-> Active -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    PendingAdvisor,
    ApprovedAuto,
    ApprovedByAdvisor,
    RejectedByAdvisor,
    Active,
    Completed,
}

impl LoanStatus {
    pub fn is_approved(&self) -> bool {
        matches!(self, LoanStatus::ApprovedAuto | LoanStatus::ApprovedByAdvisor)
    }

    /// Approved or active: the schedule produces real payments.
    pub fn is_servicing(&self) -> bool {
        self.is_approved() || *self == LoanStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub user_id: String,
    pub principal: Money,
    pub term_months: u32,
    pub annual_rate_pct: Decimal,
    pub monthly_payment: Money,
    pub total_repayment: Money,
    #[serde(default)]
    pub purpose: String,
    pub status: LoanStatus,
    /// Empty until the loan is approved.
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
    #[serde(default)]
    pub eligibility_score: Option<u32>,
    #[serde(default)]
    pub risk_flags: Vec<String>,
    pub requested_on: NaiveDate,
    #[serde(default)]
    pub approved_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisor_note: Option<String>,
}

/// Result of an advisor action on a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvisoryOutcome {
    Applied { status: LoanStatus },
    /// The loan was not awaiting review; nothing changed.
    NotApplicable { status: LoanStatus },
}

impl Loan {
    /// A new request awaiting review. Payment terms are priced, the schedule is not.
    pub fn pending(
        id: &str,
        user_id: &str,
        principal: Money,
        term_months: u32,
        annual_rate_pct: Decimal,
        purpose: &str,
        requested_on: NaiveDate,
    ) -> FinTwinResult<Self> {
        let payment = monthly_payment(principal, annual_rate_pct, term_months)?;
        Ok(Loan {
            id: id.to_string(),
            user_id: user_id.to_string(),
            principal,
            term_months,
            annual_rate_pct,
            monthly_payment: payment,
            total_repayment: payment * Decimal::from(term_months),
            purpose: purpose.to_string(),
            status: LoanStatus::PendingAdvisor,
            schedule: Vec::new(),
            eligibility_score: None,
            risk_flags: Vec::new(),
            requested_on,
            approved_on: None,
            advisor_note: None,
        })
    }

    fn approve(&mut self, status: LoanStatus, on: NaiveDate) -> FinTwinResult<()> {
        self.schedule = build_schedule(self.principal, self.annual_rate_pct, self.term_months, on)?;
        self.status = status;
        self.approved_on = Some(on);
        Ok(())
    }

    /// Scheduled payments falling in `month`, zero unless the loan is servicing.
    pub fn payment_in(&self, month: MonthKey) -> Money {
        if !self.status.is_servicing() {
            return Decimal::ZERO;
        }
        self.schedule
            .iter()
            .filter(|r| MonthKey::from_date(r.date) == month)
            .map(|r| r.payment)
            .sum()
    }

    /// Level monthly payment while servicing.
    pub fn debt_service(&self) -> Money {
        if self.status.is_servicing() {
            self.monthly_payment
        } else {
            Decimal::ZERO
        }
    }

    /// Approved -> Active.
    pub fn activate(&mut self) -> FinTwinResult<()> {
        if !self.status.is_approved() {
            return Err(FinTwinError::invalid(
                "status",
                format!("cannot activate loan {} from {:?}", self.id, self.status),
            ));
        }
        self.status = LoanStatus::Active;
        Ok(())
    }

    /// Active -> Completed.
    pub fn complete(&mut self) -> FinTwinResult<()> {
        if self.status != LoanStatus::Active {
            return Err(FinTwinError::invalid(
                "status",
                format!("cannot complete loan {} from {:?}", self.id, self.status),
            ));
        }
        self.status = LoanStatus::Completed;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Origination & advisor actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRequest {
    pub id: String,
    pub principal: Money,
    pub term_months: u32,
    pub annual_rate_pct: Decimal,
    #[serde(default)]
    pub purpose: String,
    pub requested_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginationInput {
    pub profile: UserProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub existing_loans: Vec<Loan>,
    pub request: LoanRequest,
}

/// Turn a request into a loan: score it, auto-approve when allowed,
/// otherwise leave it pending advisor review.
pub fn originate_loan(input: &OriginationInput) -> FinTwinResult<ComputationOutput<Loan>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let req = &input.request;

    let mut loan = Loan::pending(
        &req.id,
        &input.profile.user_id,
        req.principal,
        req.term_months,
        req.annual_rate_pct,
        &req.purpose,
        req.requested_on,
    )?;

    let eligibility = assess_eligibility(&EligibilityInput {
        profile: input.profile.clone(),
        transactions: input.transactions.clone(),
        requested_amount: req.principal,
        existing_loans: input.existing_loans.clone(),
    })?;
    loan.eligibility_score = Some(eligibility.score);
    loan.risk_flags = eligibility.risk_flags.clone();

    if eligibility.can_auto_approve {
        loan.approve(LoanStatus::ApprovedAuto, req.requested_on)?;
        tracing::info!(loan_id = %loan.id, score = eligibility.score, "loan auto-approved");
    } else {
        if req.principal > AUTO_APPROVAL_THRESHOLD {
            warnings.push(format!(
                "Amount above auto-approval threshold of {AUTO_APPROVAL_THRESHOLD}; advisor review required"
            ));
        } else {
            warnings.push("Severe risk condition present; advisor review required".into());
        }
        tracing::info!(loan_id = %loan.id, score = eligibility.score, "loan pending advisor review");
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan origination with eligibility gate",
        &serde_json::json!({
            "auto_approval_threshold": AUTO_APPROVAL_THRESHOLD.to_string(),
            "eligibility": eligibility,
        }),
        warnings,
        elapsed,
        loan,
    ))
}

/// Approve a pending loan; the schedule starts from `on`.
pub fn advisor_approve(loan: &mut Loan, on: NaiveDate, note: Option<String>) -> FinTwinResult<AdvisoryOutcome> {
    if loan.status != LoanStatus::PendingAdvisor {
        tracing::warn!(loan_id = %loan.id, status = ?loan.status, "approve ignored: loan not pending");
        return Ok(AdvisoryOutcome::NotApplicable {
            status: loan.status,
        });
    }
    loan.approve(LoanStatus::ApprovedByAdvisor, on)?;
    loan.advisor_note = note;
    Ok(AdvisoryOutcome::Applied {
        status: loan.status,
    })
}

pub fn advisor_reject(loan: &mut Loan, note: Option<String>) -> AdvisoryOutcome {
    if loan.status != LoanStatus::PendingAdvisor {
        tracing::warn!(loan_id = %loan.id, status = ?loan.status, "reject ignored: loan not pending");
        return AdvisoryOutcome::NotApplicable {
            status: loan.status,
        };
    }
    loan.status = LoanStatus::RejectedByAdvisor;
    loan.advisor_note = note;
    AdvisoryOutcome::Applied {
        status: loan.status,
    }
}
