pub mod calibrator;
pub mod seasonality;
pub mod stats;

pub use calibrator::{
    calibrate, CalibratedDistribution, Calibration, CalibrationInput, ModelSource, SamplingModel,
    RELIABILITY_MIN_MONTHS,
};
