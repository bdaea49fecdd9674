use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use fintwin_core::lending::Loan;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Calibration & projection
// ---------------------------------------------------------------------------

#[napi]
pub fn calibrate(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::calibration::CalibrationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::calibration::calibrate(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn project(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::simulation::ProjectionInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::simulation::project(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn run_monte_carlo(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::simulation::MonteCarloInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::simulation::run_monte_carlo(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn run_stress_test(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::simulation::StressTestInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::simulation::run_stress_test(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn simulate_what_if(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::simulation::WhatIfInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::simulation::simulate_what_if(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Named stress preset (`job_loss_3m`, `inflation`, `medical_emergency`).
#[napi]
pub fn stress_preset(name: String, horizon_months: u32) -> NapiResult<String> {
    let scenario = fintwin_core::simulation::StressScenario::preset(&name, horizon_months)
        .map_err(to_napi_error)?;
    serde_json::to_string(&scenario).map_err(to_napi_error)
}

#[napi]
pub fn builtin_events() -> NapiResult<String> {
    let events = fintwin_core::events::builtin_events().map_err(to_napi_error)?;
    serde_json::to_string(&events).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[napi]
pub fn score_readiness(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::scoring::ReadinessInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::scoring::score_readiness(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn classify_client(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::scoring::classification::ClassificationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::scoring::classify(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Lending
// ---------------------------------------------------------------------------

#[napi]
pub fn score_loan_eligibility(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::lending::EligibilityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::lending::score_loan_eligibility(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn score_loan_risk(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::lending::LoanRiskInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::lending::score_loan_risk(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn amortize(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::lending::AmortizationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::lending::amortize(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compare_loan_options(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::lending::LoanOptionsInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::lending::compare_loan_options(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn originate_loan(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::lending::OriginationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::lending::originate_loan(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct AdvisoryRequest {
    loan: Loan,
    #[serde(default)]
    on: Option<NaiveDate>,
    #[serde(default)]
    note: Option<String>,
}

/// Approve a pending loan. Returns `{loan, outcome}`; non-pending loans come back unchanged.
#[napi]
pub fn advisor_approve(input_json: String) -> NapiResult<String> {
    let mut req: AdvisoryRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let on = req
        .on
        .ok_or_else(|| to_napi_error("`on` (approval date) is required"))?;
    let outcome = fintwin_core::lending::advisor_approve(&mut req.loan, on, req.note)
        .map_err(to_napi_error)?;
    serde_json::to_string(&serde_json::json!({ "loan": req.loan, "outcome": outcome }))
        .map_err(to_napi_error)
}

#[napi]
pub fn advisor_reject(input_json: String) -> NapiResult<String> {
    let mut req: AdvisoryRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let outcome = fintwin_core::lending::advisor_reject(&mut req.loan, req.note);
    serde_json::to_string(&serde_json::json!({ "loan": req.loan, "outcome": outcome }))
        .map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[napi]
pub fn run_sensitivity(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::analysis::SensitivityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::analysis::run_sensitivity(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn explain_month(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::analysis::ExplainMonthInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::analysis::explain_month(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn explain_event(input_json: String) -> NapiResult<String> {
    let input: fintwin_core::analysis::ExplainEventInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fintwin_core::analysis::explain_event(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
