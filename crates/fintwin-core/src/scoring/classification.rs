use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::readiness::{assess_readiness, ReadinessInput};
use crate::types::{with_metadata_f64, ComputationOutput, Transaction, UserProfile};
use crate::FinTwinResult;

/// Behavioural segment used on the advisor dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCategory {
    SmartSaver,
    Balanced,
    HighSpender,
    PowerSpender,
    UltraSpender,
}

impl ClientCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ClientCategory::SmartSaver => "Smart Saver",
            ClientCategory::Balanced => "Balanced",
            ClientCategory::HighSpender => "High Spender",
            ClientCategory::PowerSpender => "Power Spender",
            ClientCategory::UltraSpender => "Ultra Spender",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ClientCategory::SmartSaver => "green",
            ClientCategory::Balanced => "blue",
            ClientCategory::HighSpender => "orange",
            ClientCategory::PowerSpender => "red",
            ClientCategory::UltraSpender => "darkred",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Thriving,
    Stable,
    Stressed,
    Crisis,
}

pub fn classify_client(months_of_buffer: f64, savings_rate: f64) -> ClientCategory {
    if months_of_buffer >= 6.0 && savings_rate >= 0.15 {
        ClientCategory::SmartSaver
    } else if months_of_buffer >= 3.0 && savings_rate >= 0.05 {
        ClientCategory::Balanced
    } else if months_of_buffer >= 1.0 {
        ClientCategory::HighSpender
    } else if months_of_buffer > 0.0 {
        ClientCategory::PowerSpender
    } else {
        ClientCategory::UltraSpender
    }
}

pub fn health_state(savings_rate: f64) -> HealthState {
    if savings_rate >= 0.20 {
        HealthState::Thriving
    } else if savings_rate >= 0.10 {
        HealthState::Stable
    } else if savings_rate >= 0.0 {
        HealthState::Stressed
    } else {
        HealthState::Crisis
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationInput {
    pub profile: UserProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientClassification {
    pub category: ClientCategory,
    pub label: String,
    pub color: String,
    pub health_state: HealthState,
    pub months_of_buffer: f64,
    pub savings_rate: f64,
}

/// Segment a client from the same averages the readiness score uses.
pub fn classify(input: &ClassificationInput) -> FinTwinResult<ComputationOutput<ClientClassification>> {
    let start = Instant::now();
    let readiness = assess_readiness(&ReadinessInput {
        profile: input.profile.clone(),
        transactions: input.transactions.clone(),
        event: None,
        active_loans: None,
    })?;
    let m = &readiness.metrics;
    let category = classify_client(m.months_of_buffer, m.savings_rate);

    let result = ClientClassification {
        category,
        label: category.label().to_string(),
        color: category.color().to_string(),
        health_state: health_state(m.savings_rate),
        months_of_buffer: m.months_of_buffer,
        savings_rate: m.savings_rate,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Rule-based behavioural classification",
        &serde_json::json!({
            "smart_saver": "buffer >= 6 and savings >= 15%",
            "balanced": "buffer >= 3 and savings >= 5%",
        }),
        Vec::new(),
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_boundaries() {
        assert_eq!(classify_client(6.0, 0.15), ClientCategory::SmartSaver);
        assert_eq!(classify_client(6.0, 0.14), ClientCategory::Balanced);
        assert_eq!(classify_client(3.0, 0.05), ClientCategory::Balanced);
        assert_eq!(classify_client(3.0, 0.01), ClientCategory::HighSpender);
        assert_eq!(classify_client(0.5, 0.30), ClientCategory::PowerSpender);
        assert_eq!(classify_client(0.0, 0.30), ClientCategory::UltraSpender);
        assert_eq!(classify_client(-2.0, -0.1), ClientCategory::UltraSpender);
    }

    #[test]
    fn test_health_state_boundaries() {
        assert_eq!(health_state(0.20), HealthState::Thriving);
        assert_eq!(health_state(0.10), HealthState::Stable);
        assert_eq!(health_state(0.0), HealthState::Stressed);
        assert_eq!(health_state(-0.01), HealthState::Crisis);
    }

    #[test]
    fn test_classify_uses_profile_fallbacks() {
        use rust_decimal_macros::dec;
        let input = ClassificationInput {
            profile: UserProfile {
                user_id: "u1".into(),
                balance: dec!(6000),
                monthly_income: dec!(1250),
                salary_day: 1,
                salary_frequency: Default::default(),
                fixed_outflows: dec!(700),
                avg_variable_outflows: dec!(300),
                variability_pct: 0.1,
            },
            transactions: vec![],
        };
        let out = classify(&input).unwrap().result;
        assert_eq!(out.category, ClientCategory::SmartSaver);
        assert_eq!(out.label, "Smart Saver");
        assert_eq!(out.health_state, HealthState::Thriving);
    }
}
