pub mod amortization;
pub mod eligibility;
pub mod loan;
pub mod options;
pub mod risk;

pub use amortization::{amortize, monthly_payment, AmortizationInput, AmortizationOutput, ScheduleEntry};
pub use eligibility::{score_loan_eligibility, EligibilityInput, EligibilityResult, AUTO_APPROVAL_THRESHOLD};
pub use loan::{
    advisor_approve, advisor_reject, originate_loan, AdvisoryOutcome, Loan, LoanRequest, LoanStatus,
    OriginationInput,
};
pub use options::{compare_loan_options, LoanOptions, LoanOptionsInput};
pub use risk::{score_loan_risk, LoanRiskInput, LoanRiskScore, RiskLevel};
