use clap::Args;
use serde_json::Value;

use fintwin_core::calibration::{self, CalibrationInput};
use fintwin_core::scoring::classification::ClassificationInput;
use fintwin_core::scoring::classify;

use crate::input;

/// Arguments for distribution calibration
#[derive(Args)]
pub struct CalibrateArgs {
    /// Path to input file: `{profile, transactions}`
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for client classification
#[derive(Args)]
pub struct ClassifyArgs {
    /// Path to input file: `{profile, transactions}`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_calibrate(args: CalibrateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let cal_input: CalibrationInput = input::read(args.input.as_deref(), "calibration")?;
    let result = calibration::calibrate(&cal_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_classify(args: ClassifyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let class_input: ClassificationInput = input::read(args.input.as_deref(), "classification")?;
    let result = classify(&class_input)?;
    Ok(serde_json::to_value(result)?)
}
