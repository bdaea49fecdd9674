use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use fintwin_core::lending::{
    amortize, compare_loan_options, score_loan_eligibility, score_loan_risk, AmortizationInput,
    EligibilityInput, LoanOptionsInput, LoanRiskInput,
};

use crate::input;

/// Arguments for loan eligibility
#[derive(Args)]
pub struct EligibilityArgs {
    /// Path to input file: `{profile, transactions, requested_amount, existing_loans?}`
    #[arg(long)]
    pub input: Option<String>,

    /// Requested amount (overrides the file)
    #[arg(long)]
    pub amount: Option<Decimal>,
}

/// Arguments for the advisor risk score
#[derive(Args)]
pub struct LoanRiskArgs {
    /// Path to input file: `{profile, transactions, requested_amount, term_months?, active_loans?}`
    #[arg(long)]
    pub input: Option<String>,

    /// Requested amount (overrides the file)
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Term in months (overrides the file)
    #[arg(long)]
    pub term: Option<u32>,
}

/// Arguments for an amortization schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Principal borrowed
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual rate in percent (12 = 12%)
    #[arg(long, default_value = "0")]
    pub rate: Decimal,

    /// Term in months
    #[arg(long)]
    pub term: Option<u32>,

    /// Approval date; the first payment is one month later (default: --as-of)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,
}

/// Arguments for comparing loan terms
#[derive(Args)]
pub struct LoanOptionsArgs {
    /// Path to input file: `{profile, transactions, amount, annual_rate_pct?, terms?, start_date?}`
    #[arg(long)]
    pub input: Option<String>,

    /// Amount to borrow (overrides the file)
    #[arg(long)]
    pub amount: Option<Decimal>,
}

pub fn run_eligibility(args: EligibilityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut elig_input: EligibilityInput = input::read(args.input.as_deref(), "eligibility")?;
    if let Some(amount) = args.amount {
        elig_input.requested_amount = amount;
    }
    let result = score_loan_eligibility(&elig_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_loan_risk(args: LoanRiskArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut risk_input: LoanRiskInput = input::read(args.input.as_deref(), "loan risk")?;
    if let Some(amount) = args.amount {
        risk_input.requested_amount = amount;
    }
    if args.term.is_some() {
        risk_input.term_months = args.term;
    }
    let result = score_loan_risk(&risk_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_amortize(args: AmortizeArgs, as_of: NaiveDate) -> Result<Value, Box<dyn std::error::Error>> {
    let amort_input: AmortizationInput = if let Some(ref path) = args.input {
        let mut value = input::file::read_value(path)?;
        input::default_date(&mut value, &[], "start_date", as_of);
        serde_json::from_value(value)?
    } else {
        AmortizationInput {
            principal: args
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            annual_rate_pct: args.rate,
            term_months: args.term.ok_or("--term is required (or provide --input)")?,
            start_date: args.start_date.unwrap_or(as_of),
        }
    };
    let result = amortize(&amort_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_loan_options(args: LoanOptionsArgs, as_of: NaiveDate) -> Result<Value, Box<dyn std::error::Error>> {
    let mut value = input::read_value(args.input.as_deref(), "loan options")?;
    input::default_date(&mut value, &[], "start_date", as_of);
    let mut opt_input: LoanOptionsInput = serde_json::from_value(value)?;
    if let Some(amount) = args.amount {
        opt_input.amount = amount;
    }
    let result = compare_loan_options(&opt_input)?;
    Ok(serde_json::to_value(result)?)
}
