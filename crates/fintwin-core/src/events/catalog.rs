//! Built-in seasonal events shared by every user.
//!
//! Built-ins recur yearly and carry the same defaults for everyone. A user
//! may override cost or shape through an [`EventOverride`]; the shared
//! definition is never mutated.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::life_event::{CostDistribution, EventOrigin, LifeEvent, Recurrence};
use crate::error::FinTwinError;
use crate::types::Money;
use crate::FinTwinResult;

struct BuiltinSpec {
    id: &'static str,
    name: &'static str,
    start: (u32, u32),
    end: (u32, u32),
    cost_mean: Decimal,
    cost_std: Decimal,
    distribution: CostDistribution,
    category: &'static str,
}

/// Anchor year for built-in dates; the events repeat yearly from here.
const ANCHOR_YEAR: i32 = 2020;

const BUILTINS: [BuiltinSpec; 6] = [
    BuiltinSpec {
        id: "ramadan",
        name: "Ramadan",
        start: (3, 1),
        end: (3, 31),
        cost_mean: dec!(300),
        cost_std: dec!(60),
        distribution: CostDistribution::Normal,
        category: "food",
    },
    BuiltinSpec {
        id: "eid_al_fitr",
        name: "Eid al-Fitr",
        start: (4, 1),
        end: (4, 30),
        cost_mean: dec!(400),
        cost_std: dec!(80),
        distribution: CostDistribution::Normal,
        category: "gifts",
    },
    BuiltinSpec {
        id: "eid_al_adha",
        name: "Eid al-Adha",
        start: (6, 1),
        end: (6, 30),
        cost_mean: dec!(900),
        cost_std: dec!(200),
        distribution: CostDistribution::Normal,
        category: "gifts",
    },
    BuiltinSpec {
        id: "summer_holidays",
        name: "Summer Holidays",
        start: (7, 1),
        end: (8, 31),
        cost_mean: dec!(350),
        cost_std: dec!(120),
        distribution: CostDistribution::Uniform,
        category: "travel",
    },
    BuiltinSpec {
        id: "back_to_school",
        name: "Back to School",
        start: (9, 1),
        end: (9, 30),
        cost_mean: dec!(500),
        cost_std: dec!(100),
        distribution: CostDistribution::Normal,
        category: "education",
    },
    BuiltinSpec {
        id: "year_end",
        name: "Year End",
        start: (12, 1),
        end: (12, 31),
        cost_mean: dec!(250),
        cost_std: dec!(75),
        distribution: CostDistribution::Uniform,
        category: "gifts",
    },
];

/// Per-user adjustment of a built-in event. Unset fields keep the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventOverride {
    pub id: String,
    #[serde(default)]
    pub cost_mean: Option<Money>,
    #[serde(default)]
    pub cost_std: Option<Money>,
    #[serde(default)]
    pub distribution: Option<CostDistribution>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn date(month: u32, day: u32) -> FinTwinResult<NaiveDate> {
    NaiveDate::from_ymd_opt(ANCHOR_YEAR, month, day)
        .ok_or_else(|| FinTwinError::DateError(format!("invalid built-in date {month}/{day}")))
}

fn build(spec: &BuiltinSpec) -> FinTwinResult<LifeEvent> {
    Ok(LifeEvent {
        id: spec.id.to_string(),
        name: spec.name.to_string(),
        start_date: date(spec.start.0, spec.start.1)?,
        end_date: date(spec.end.0, spec.end.1)?,
        cost_mean: spec.cost_mean,
        cost_std: spec.cost_std,
        distribution: spec.distribution,
        category: Some(spec.category.to_string()),
        recurrence: Recurrence::Yearly,
        origin: EventOrigin::Builtin,
    })
}

/// Every built-in event with its shared defaults.
pub fn builtin_events() -> FinTwinResult<Vec<LifeEvent>> {
    BUILTINS.iter().map(build).collect()
}

pub fn find_builtin(id: &str) -> FinTwinResult<LifeEvent> {
    BUILTINS
        .iter()
        .find(|b| b.id == id)
        .ok_or_else(|| FinTwinError::NotFound {
            entity: "built-in event".into(),
            id: id.to_string(),
        })
        .and_then(build)
}

/// Apply an override to a copy of the matching built-in.
pub fn resolve_builtin(ov: &EventOverride) -> FinTwinResult<LifeEvent> {
    let mut event = find_builtin(&ov.id)?;
    if let Some(v) = ov.cost_mean {
        event.cost_mean = v;
    }
    if let Some(v) = ov.cost_std {
        event.cost_std = v;
    }
    if let Some(v) = ov.distribution {
        event.distribution = v;
    }
    if let Some(v) = ov.start_date {
        event.start_date = v;
    }
    if let Some(v) = ov.end_date {
        event.end_date = v;
    }
    event.validate()?;
    Ok(event)
}

/// The built-in catalogue as seen by one user, overrides applied.
pub fn catalog_for_user(overrides: &[EventOverride]) -> FinTwinResult<Vec<LifeEvent>> {
    for ov in overrides {
        find_builtin(&ov.id)?;
    }
    BUILTINS
        .iter()
        .map(|spec| match overrides.iter().find(|o| o.id == spec.id) {
            Some(ov) => resolve_builtin(ov),
            None => build(spec),
        })
        .collect()
}
