mod commands;
mod input;
mod output;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::analysis::{ExplainEventArgs, ExplainMonthArgs, SensitivityArgs};
use commands::calibration::{CalibrateArgs, ClassifyArgs};
use commands::lending::{AmortizeArgs, EligibilityArgs, LoanOptionsArgs, LoanRiskArgs};
use commands::scoring::ReadinessArgs;
use commands::simulation::{MonteCarloArgs, ProjectArgs, StressTestArgs, WhatIfArgs};

/// Personal cash-flow simulation and risk scoring
#[derive(Parser)]
#[command(
    name = "fintwin",
    version,
    about = "Personal cash-flow simulation and risk scoring",
    long_about = "Calibrates income and spending from transaction history, projects balances \
                  with Monte Carlo under stress scenarios, and scores financial readiness, \
                  loan eligibility and loan risk. Inputs are JSON or YAML files, or piped stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log engine decisions to stderr (same as RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Reference date used when an input omits its start date (default: today)
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate income, expense and category distributions from history
    Calibrate(CalibrateArgs),
    /// Expected-value month-by-month balance projection
    Project(ProjectArgs),
    /// Monte Carlo balance percentiles and risk probabilities
    MonteCarlo(MonteCarloArgs),
    /// Compare a baseline run against a stress scenario
    StressTest(StressTestArgs),
    /// Cash flow under income, spending and new-loan changes
    WhatIf(WhatIfArgs),
    /// Six-factor financial readiness score
    Readiness(ReadinessArgs),
    /// Rule-based loan eligibility and auto-approval check
    Eligibility(EligibilityArgs),
    /// Weighted loan risk score for advisors
    LoanRisk(LoanRiskArgs),
    /// Fixed-payment amortization schedule
    Amortize(AmortizeArgs),
    /// Compare loan terms against the monthly surplus
    LoanOptions(LoanOptionsArgs),
    /// Sweep one variable and record resilience
    Sensitivity(SensitivityArgs),
    /// Break one projected month into drivers
    ExplainMonth(ExplainMonthArgs),
    /// Readiness with and without one life event
    ExplainEvent(ExplainEventArgs),
    /// Client category and health state
    Classify(ClassifyArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("fintwin_core=debug,fintwin_cli=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);
    let as_of = cli.as_of.unwrap_or_else(|| chrono::Local::now().date_naive());

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Calibrate(args) => commands::calibration::run_calibrate(args),
        Commands::Project(args) => commands::simulation::run_project(args, as_of),
        Commands::MonteCarlo(args) => commands::simulation::run_monte_carlo(args, as_of),
        Commands::StressTest(args) => commands::simulation::run_stress_test(args, as_of),
        Commands::WhatIf(args) => commands::simulation::run_what_if(args, as_of),
        Commands::Readiness(args) => commands::scoring::run_readiness(args),
        Commands::Eligibility(args) => commands::lending::run_eligibility(args),
        Commands::LoanRisk(args) => commands::lending::run_loan_risk(args),
        Commands::Amortize(args) => commands::lending::run_amortize(args, as_of),
        Commands::LoanOptions(args) => commands::lending::run_loan_options(args, as_of),
        Commands::Sensitivity(args) => commands::analysis::run_sensitivity(args, as_of),
        Commands::ExplainMonth(args) => commands::analysis::run_explain_month(args, as_of),
        Commands::ExplainEvent(args) => commands::analysis::run_explain_event(args),
        Commands::Classify(args) => commands::calibration::run_classify(args),
        Commands::Version => {
            println!("fintwin {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
