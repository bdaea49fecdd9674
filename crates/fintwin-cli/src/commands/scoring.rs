use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use fintwin_core::scoring::{score_readiness, EventExposure, ReadinessInput};

use crate::input;

/// Arguments for the readiness score
#[derive(Args)]
pub struct ReadinessArgs {
    /// Path to input file: `{profile, transactions, event?, active_loans?}`
    #[arg(long)]
    pub input: Option<String>,

    /// Cost of an upcoming event (overrides the file's `event`)
    #[arg(long)]
    pub event_cost: Option<Decimal>,

    /// Name for --event-cost
    #[arg(long, requires = "event_cost")]
    pub event_name: Option<String>,
}

pub fn run_readiness(args: ReadinessArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut ready_input: ReadinessInput = input::read(args.input.as_deref(), "readiness")?;
    if let Some(cost) = args.event_cost {
        ready_input.event = Some(EventExposure {
            name: args.event_name,
            cost,
        });
    }
    let result = score_readiness(&ready_input)?;
    Ok(serde_json::to_value(result)?)
}
