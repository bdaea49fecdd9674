pub mod classification;
pub mod readiness;

pub use classification::{classify, classify_client, health_state, ClientCategory, HealthState};
pub use readiness::{score_readiness, EventExposure, ReadinessInput, ReadinessLevel, ReadinessScore};
