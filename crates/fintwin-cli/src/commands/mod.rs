pub mod analysis;
pub mod calibration;
pub mod lending;
pub mod scoring;
pub mod simulation;
