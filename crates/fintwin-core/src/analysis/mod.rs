pub mod explain;
pub mod sensitivity;

pub use explain::{
    explain_event, explain_month, Confidence, EventExplanation, ExplainEventInput, ExplainMonthInput,
    FlowDriver, MonthExplanation,
};
pub use sensitivity::{run_sensitivity, SensitivityInput, SensitivityResult, SensitivityVariable};
