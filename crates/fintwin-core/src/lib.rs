pub mod error;
pub mod types;

pub mod calibration;
pub mod events;
pub mod ledger;
pub mod lending;
pub mod scoring;

#[cfg(feature = "simulation")]
pub mod simulation;

#[cfg(feature = "analysis")]
pub mod analysis;

#[cfg(feature = "simulation")]
pub mod engine;

pub use error::FinTwinError;
pub use types::*;

/// Standard result type for all engine operations
pub type FinTwinResult<T> = Result<T, FinTwinError>;
