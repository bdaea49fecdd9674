use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use serde_json::Value;

use fintwin_core::analysis::{
    explain_event, explain_month, run_sensitivity as sweep, ExplainEventInput, ExplainMonthInput,
    SensitivityInput, SensitivityVariable,
};
use fintwin_core::simulation::MonteCarloInput;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SweepVariable {
    MonthlySavings,
    IncomeDrop,
}

impl From<SweepVariable> for SensitivityVariable {
    fn from(v: SweepVariable) -> Self {
        match v {
            SweepVariable::MonthlySavings => SensitivityVariable::MonthlySavings,
            SweepVariable::IncomeDrop => SensitivityVariable::IncomeDrop,
        }
    }
}

/// Arguments for a one-variable sweep
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to a Monte Carlo input file (the sweep base)
    #[arg(long)]
    pub input: Option<String>,

    /// Variable to sweep
    #[arg(long, value_enum)]
    pub variable: SweepVariable,

    /// Comma-separated grid values (default grid per variable)
    #[arg(long, value_delimiter = ',')]
    pub grid: Option<Vec<f64>>,
}

/// Arguments for a month explanation
#[derive(Args)]
pub struct ExplainMonthArgs {
    /// Path to a Monte Carlo input file
    #[arg(long)]
    pub input: Option<String>,

    /// Zero-based month from the start of the projection
    #[arg(long)]
    pub month: u32,
}

/// Arguments for an event explanation
#[derive(Args)]
pub struct ExplainEventArgs {
    /// Path to input file: `{profile, transactions, event, active_loans?}`
    #[arg(long)]
    pub input: Option<String>,
}

fn read_base(path: Option<&str>, what: &str, as_of: NaiveDate) -> Result<MonteCarloInput, Box<dyn std::error::Error>> {
    let mut value = input::read_value(path, what)?;
    input::default_date(&mut value, &["config"], "start_date", as_of);
    Ok(serde_json::from_value(value)?)
}

pub fn run_sensitivity(args: SensitivityArgs, as_of: NaiveDate) -> Result<Value, Box<dyn std::error::Error>> {
    let base = read_base(args.input.as_deref(), "sensitivity", as_of)?;
    let result = sweep(&SensitivityInput {
        base,
        variable: args.variable.into(),
        grid: args.grid,
    })?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_explain_month(args: ExplainMonthArgs, as_of: NaiveDate) -> Result<Value, Box<dyn std::error::Error>> {
    let base = read_base(args.input.as_deref(), "month explanation", as_of)?;
    let result = explain_month(&ExplainMonthInput {
        base,
        month_index: args.month,
    })?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_explain_event(args: ExplainEventArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let event_input: ExplainEventInput = input::read(args.input.as_deref(), "event explanation")?;
    let result = explain_event(&event_input)?;
    Ok(serde_json::to_value(result)?)
}
