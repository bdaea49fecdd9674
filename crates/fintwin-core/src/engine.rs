//! User-scoped facade over the pure operations.
//!
//! Every method loads the user's profile, history, events and loans from a
//! [`FinancialDataSource`] and forwards to the matching free function. An
//! unknown user is a [`FinTwinError::NotFound`], never an empty profile.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::calibration::{calibrate, Calibration, CalibrationInput};
use crate::error::FinTwinError;
use crate::ledger::FinancialDataSource;
use crate::lending::{
    compare_loan_options, originate_loan, score_loan_eligibility, score_loan_risk, EligibilityInput,
    EligibilityResult, Loan, LoanOptions, LoanOptionsInput, LoanRequest, LoanRiskInput, LoanRiskScore,
    OriginationInput,
};
use crate::scoring::classification::{ClassificationInput, ClientClassification};
use crate::scoring::{classify, score_readiness, EventExposure, ReadinessInput, ReadinessScore};
use crate::simulation::{
    project, run_monte_carlo, run_stress_test, simulate_what_if, MonteCarloInput, MonteCarloResult,
    MonthlyProjection, SimulationConfig, StressScenario, StressTestInput, StressTestResult, WhatIfInput,
    WhatIfResult, WhatIfScenario,
};
use crate::types::{ComputationOutput, Money, Transaction, UserProfile};
use crate::FinTwinResult;

#[cfg(feature = "analysis")]
use crate::analysis::{
    explain_event, explain_month, run_sensitivity, EventExplanation, ExplainEventInput, ExplainMonthInput,
    MonthExplanation, SensitivityInput, SensitivityResult, SensitivityVariable,
};

pub struct Engine<S: FinancialDataSource> {
    source: S,
}

struct UserData {
    profile: UserProfile,
    transactions: Vec<Transaction>,
}

impl<S: FinancialDataSource> Engine<S> {
    pub fn new(source: S) -> Self {
        Engine { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    fn load(&self, user_id: &str) -> FinTwinResult<UserData> {
        let profile = self.source.user_profile(user_id).ok_or_else(|| FinTwinError::NotFound {
            entity: "user".into(),
            id: user_id.to_string(),
        })?;
        Ok(UserData {
            profile,
            transactions: self.source.transaction_history(user_id),
        })
    }

    fn simulation_input(&self, user_id: &str, config: SimulationConfig) -> FinTwinResult<MonteCarloInput> {
        let data = self.load(user_id)?;
        Ok(MonteCarloInput {
            profile: data.profile,
            transactions: data.transactions,
            events: self.source.active_events(user_id),
            loans: self.source.active_loans(user_id),
            config,
        })
    }

    pub fn calibrate(&self, user_id: &str) -> FinTwinResult<ComputationOutput<Calibration>> {
        let data = self.load(user_id)?;
        calibrate(&CalibrationInput {
            profile: data.profile,
            transactions: data.transactions,
        })
    }

    pub fn project(
        &self,
        user_id: &str,
        config: SimulationConfig,
    ) -> FinTwinResult<ComputationOutput<Vec<MonthlyProjection>>> {
        project(&self.simulation_input(user_id, config)?)
    }

    pub fn run_monte_carlo(
        &self,
        user_id: &str,
        config: SimulationConfig,
    ) -> FinTwinResult<ComputationOutput<MonteCarloResult>> {
        run_monte_carlo(&self.simulation_input(user_id, config)?)
    }

    pub fn stress_test(
        &self,
        user_id: &str,
        config: SimulationConfig,
        scenario: StressScenario,
    ) -> FinTwinResult<ComputationOutput<StressTestResult>> {
        run_stress_test(&StressTestInput {
            base: self.simulation_input(user_id, config)?,
            scenario,
        })
    }

    pub fn simulate_what_if(
        &self,
        user_id: &str,
        scenario: WhatIfScenario,
        start_date: NaiveDate,
    ) -> FinTwinResult<ComputationOutput<WhatIfResult>> {
        let data = self.load(user_id)?;
        simulate_what_if(&WhatIfInput {
            profile: data.profile,
            transactions: data.transactions,
            scenario,
            start_date,
        })
    }

    /// Readiness including the user's servicing loans as debt load.
    pub fn score_readiness(
        &self,
        user_id: &str,
        event: Option<EventExposure>,
    ) -> FinTwinResult<ComputationOutput<ReadinessScore>> {
        let data = self.load(user_id)?;
        score_readiness(&ReadinessInput {
            profile: data.profile,
            transactions: data.transactions,
            event,
            active_loans: Some(self.source.active_loans(user_id)),
        })
    }

    pub fn score_loan_eligibility(
        &self,
        user_id: &str,
        requested_amount: Money,
    ) -> FinTwinResult<ComputationOutput<EligibilityResult>> {
        let data = self.load(user_id)?;
        score_loan_eligibility(&EligibilityInput {
            profile: data.profile,
            transactions: data.transactions,
            requested_amount,
            existing_loans: self.source.active_loans(user_id),
        })
    }

    pub fn score_loan_risk(
        &self,
        user_id: &str,
        requested_amount: Money,
        term_months: Option<u32>,
    ) -> FinTwinResult<ComputationOutput<LoanRiskScore>> {
        let data = self.load(user_id)?;
        score_loan_risk(&LoanRiskInput {
            profile: data.profile,
            transactions: data.transactions,
            requested_amount,
            term_months,
            active_loans: Some(self.source.active_loans(user_id)),
        })
    }

    pub fn compare_loan_options(
        &self,
        user_id: &str,
        amount: Money,
        annual_rate_pct: Decimal,
        start_date: NaiveDate,
    ) -> FinTwinResult<ComputationOutput<LoanOptions>> {
        let data = self.load(user_id)?;
        compare_loan_options(&LoanOptionsInput {
            profile: data.profile,
            transactions: data.transactions,
            amount,
            annual_rate_pct,
            terms: vec![12, 24, 36],
            start_date,
        })
    }

    /// Price and score a request; the caller persists the returned loan.
    pub fn originate_loan(&self, user_id: &str, request: LoanRequest) -> FinTwinResult<ComputationOutput<Loan>> {
        let data = self.load(user_id)?;
        originate_loan(&OriginationInput {
            profile: data.profile,
            transactions: data.transactions,
            existing_loans: self.source.active_loans(user_id),
            request,
        })
    }

    pub fn classify(&self, user_id: &str) -> FinTwinResult<ComputationOutput<ClientClassification>> {
        let data = self.load(user_id)?;
        classify(&ClassificationInput {
            profile: data.profile,
            transactions: data.transactions,
        })
    }

    #[cfg(feature = "analysis")]
    pub fn run_sensitivity(
        &self,
        user_id: &str,
        config: SimulationConfig,
        variable: SensitivityVariable,
        grid: Option<Vec<f64>>,
    ) -> FinTwinResult<ComputationOutput<SensitivityResult>> {
        run_sensitivity(&SensitivityInput {
            base: self.simulation_input(user_id, config)?,
            variable,
            grid,
        })
    }

    #[cfg(feature = "analysis")]
    pub fn explain_month(
        &self,
        user_id: &str,
        config: SimulationConfig,
        month_index: u32,
    ) -> FinTwinResult<ComputationOutput<MonthExplanation>> {
        explain_month(&ExplainMonthInput {
            base: self.simulation_input(user_id, config)?,
            month_index,
        })
    }

    /// Explain one of the user's active events by id.
    #[cfg(feature = "analysis")]
    pub fn explain_event(&self, user_id: &str, event_id: &str) -> FinTwinResult<ComputationOutput<EventExplanation>> {
        let data = self.load(user_id)?;
        let event = self
            .source
            .active_events(user_id)
            .into_iter()
            .find(|e| e.id == event_id)
            .ok_or_else(|| FinTwinError::NotFound {
                entity: "event".into(),
                id: event_id.to_string(),
            })?;
        explain_event(&ExplainEventInput {
            profile: data.profile,
            transactions: data.transactions,
            event,
            active_loans: Some(self.source.active_loans(user_id)),
        })
    }
}
