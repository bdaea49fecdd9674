use chrono::NaiveDate;
use clap::Args;
use serde_json::Value;

use fintwin_core::simulation::{
    self, MonteCarloInput, ProjectionInput, StressScenario, StressTestInput, WhatIfInput,
};
use rust_decimal::Decimal;

use crate::input;

/// Arguments for the expected-value projection
#[derive(Args)]
pub struct ProjectArgs {
    /// Path to input file: `{profile, transactions, events?, loans?, config}`
    #[arg(long)]
    pub input: Option<String>,

    /// Horizon in months (overrides the file)
    #[arg(long)]
    pub horizon: Option<u32>,
}

/// Arguments for a Monte Carlo run
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to input file: `{profile, transactions, events?, loans?, config}`
    #[arg(long)]
    pub input: Option<String>,

    /// Number of iterations (overrides the file)
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Horizon in months (overrides the file)
    #[arg(long)]
    pub horizon: Option<u32>,

    /// Base seed for reproducible runs (overrides the file)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Apply a named stress preset: job_loss_3m, inflation, medical_emergency
    #[arg(long)]
    pub preset: Option<String>,
}

/// Arguments for a baseline vs stressed comparison
#[derive(Args)]
pub struct StressTestArgs {
    /// Path to input file: `{base, scenario}`, or a Monte Carlo input with --preset
    #[arg(long)]
    pub input: Option<String>,

    /// Named stress preset: job_loss_3m, inflation, medical_emergency
    #[arg(long)]
    pub preset: Option<String>,

    /// Base seed for reproducible runs (overrides the file)
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for a what-if with an optional new loan
#[derive(Args)]
pub struct WhatIfArgs {
    /// Path to input file: `{profile, transactions?, scenario?, start_date?}`
    #[arg(long)]
    pub input: Option<String>,

    /// New loan principal (overrides the file)
    #[arg(long)]
    pub loan_amount: Option<Decimal>,

    /// New loan term in months (overrides the file)
    #[arg(long)]
    pub loan_term: Option<u32>,

    /// Horizon in months (overrides the file)
    #[arg(long)]
    pub horizon: Option<u32>,
}

fn read_simulation(path: Option<&str>, what: &str, as_of: NaiveDate) -> Result<MonteCarloInput, Box<dyn std::error::Error>> {
    let mut value = input::read_value(path, what)?;
    input::default_date(&mut value, &["config"], "start_date", as_of);
    Ok(serde_json::from_value(value)?)
}

pub fn run_project(args: ProjectArgs, as_of: NaiveDate) -> Result<Value, Box<dyn std::error::Error>> {
    let mut proj_input: ProjectionInput = read_simulation(args.input.as_deref(), "projection", as_of)?;
    if let Some(h) = args.horizon {
        proj_input.config.horizon_months = h;
    }
    let result = simulation::project(&proj_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_monte_carlo(args: MonteCarloArgs, as_of: NaiveDate) -> Result<Value, Box<dyn std::error::Error>> {
    let mut mc_input = read_simulation(args.input.as_deref(), "Monte Carlo simulation", as_of)?;
    if let Some(n) = args.iterations {
        mc_input.config.iterations = n;
    }
    if let Some(h) = args.horizon {
        mc_input.config.horizon_months = h;
    }
    if args.seed.is_some() {
        mc_input.config.seed = args.seed;
    }
    if let Some(ref name) = args.preset {
        mc_input.config.stress_scenario = Some(StressScenario::preset(name, mc_input.config.horizon_months)?);
    }
    let result = simulation::run_monte_carlo(&mc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_stress_test(args: StressTestArgs, as_of: NaiveDate) -> Result<Value, Box<dyn std::error::Error>> {
    let mut stress_input: StressTestInput = if let Some(ref name) = args.preset {
        let base = read_simulation(args.input.as_deref(), "stress test", as_of)?;
        let scenario = StressScenario::preset(name, base.config.horizon_months)?;
        StressTestInput { base, scenario }
    } else {
        let mut value = input::read_value(args.input.as_deref(), "stress test")?;
        input::default_date(&mut value, &["base", "config"], "start_date", as_of);
        serde_json::from_value(value)?
    };
    if args.seed.is_some() {
        stress_input.base.config.seed = args.seed;
    }
    let result = simulation::run_stress_test(&stress_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_what_if(args: WhatIfArgs, as_of: NaiveDate) -> Result<Value, Box<dyn std::error::Error>> {
    let mut value = input::read_value(args.input.as_deref(), "what-if")?;
    input::default_date(&mut value, &[], "start_date", as_of);
    if let Value::Object(map) = &mut value {
        map.entry("scenario").or_insert_with(|| Value::Object(Default::default()));
    }
    let mut wi_input: WhatIfInput = serde_json::from_value(value)?;
    if let Some(amount) = args.loan_amount {
        wi_input.scenario.new_loan_amount = amount;
    }
    if let Some(term) = args.loan_term {
        wi_input.scenario.loan_term_months = term;
    }
    if let Some(h) = args.horizon {
        wi_input.scenario.horizon_months = h;
    }
    let result = simulation::simulate_what_if(&wi_input)?;
    Ok(serde_json::to_value(result)?)
}
