pub mod catalog;
pub mod life_event;

pub use catalog::{builtin_events, catalog_for_user, find_builtin, EventOverride};
pub use life_event::{CostDistribution, EventOrigin, LifeEvent, Recurrence};
