use chrono::NaiveDate;
use fintwin_core::ledger::{FinancialDataSource, InMemoryStore};
use fintwin_core::lending::{
    advisor_approve, advisor_reject, amortize, monthly_payment, originate_loan, AdvisoryOutcome, AmortizationInput,
    LoanRequest, LoanStatus, OriginationInput,
};
use fintwin_core::types::{MonthKey, SalaryFrequency, UserProfile};
use fintwin_core::FinTwinError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Amortization
// ===========================================================================

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_amortize_twelve_percent_one_year() {
    let out = amortize(&AmortizationInput {
        principal: dec!(1500),
        annual_rate_pct: dec!(12),
        term_months: 12,
        start_date: day(2025, 1, 15),
    })
    .unwrap();
    let a = &out.result;

    assert_eq!(a.monthly_payment, dec!(133.27));
    assert_eq!(a.total_repayment, dec!(1599.24));
    assert_eq!(a.schedule.len(), 12);

    let principal: Decimal = a.schedule.iter().map(|r| r.principal).sum();
    assert!((principal - dec!(1500)).abs() <= dec!(0.01));
    assert_eq!(a.schedule.last().unwrap().remaining_balance, Decimal::ZERO);
    assert_eq!(a.schedule[0].date, day(2025, 2, 15));
}

#[test]
fn test_amortize_zero_rate_is_straight_line() {
    let out = amortize(&AmortizationInput {
        principal: dec!(1200),
        annual_rate_pct: Decimal::ZERO,
        term_months: 12,
        start_date: day(2025, 1, 1),
    })
    .unwrap();
    assert_eq!(out.result.monthly_payment, dec!(100));
    assert_eq!(out.result.total_interest, Decimal::ZERO);
}

#[test]
fn test_amortize_rejects_non_positive_terms() {
    let bad = |principal: Decimal, term: u32| {
        amortize(&AmortizationInput {
            principal,
            annual_rate_pct: dec!(10),
            term_months: term,
            start_date: day(2025, 1, 1),
        })
    };
    assert!(matches!(bad(Decimal::ZERO, 12), Err(FinTwinError::InvalidInput { .. })));
    assert!(matches!(bad(dec!(-5), 12), Err(FinTwinError::InvalidInput { .. })));
    assert!(matches!(bad(dec!(500), 0), Err(FinTwinError::InvalidInput { .. })));
}

#[test]
fn test_amortize_unrepresentable_payment_is_an_error() {
    let huge = amortize(&AmortizationInput {
        principal: dec!(5_000_000_000),
        annual_rate_pct: dec!(100),
        term_months: 600,
        start_date: day(2025, 1, 1),
    });
    assert!(matches!(huge, Err(FinTwinError::InvalidInput { .. })));

    let large = monthly_payment(dec!(100_000_000), dec!(60), 600).unwrap();
    assert_eq!(large, dec!(5000000.00));
}

// ===========================================================================
// Loan lifecycle
// ===========================================================================

fn profile() -> UserProfile {
    UserProfile {
        user_id: "u1".into(),
        balance: dec!(3000),
        monthly_income: dec!(2000),
        salary_day: 1,
        salary_frequency: SalaryFrequency::Monthly,
        fixed_outflows: dec!(600),
        avg_variable_outflows: dec!(400),
        variability_pct: 0.15,
    }
}

fn request(id: &str, principal: Decimal) -> OriginationInput {
    OriginationInput {
        profile: profile(),
        transactions: vec![],
        existing_loans: vec![],
        request: LoanRequest {
            id: id.into(),
            principal,
            term_months: 6,
            annual_rate_pct: dec!(10),
            purpose: "school fees".into(),
            requested_on: day(2025, 8, 20),
        },
    }
}

#[test]
fn test_small_healthy_request_is_auto_approved_with_schedule() {
    let loan = originate_loan(&request("L1", dec!(800))).unwrap().result;
    assert_eq!(loan.status, LoanStatus::ApprovedAuto);
    assert_eq!(loan.schedule.len(), 6);
    assert_eq!(loan.approved_on, Some(day(2025, 8, 20)));
    assert!(loan.payment_in(MonthKey::new(2025, 9).unwrap()) > Decimal::ZERO);
    assert_eq!(loan.payment_in(MonthKey::new(2025, 8).unwrap()), Decimal::ZERO);
}

#[test]
fn test_large_request_waits_for_advisor_then_approval_is_idempotent() {
    let out = originate_loan(&request("L2", dec!(5000))).unwrap();
    let mut loan = out.result;
    assert_eq!(loan.status, LoanStatus::PendingAdvisor);
    assert!(loan.schedule.is_empty());
    assert!(!out.warnings.is_empty());

    let first = advisor_approve(&mut loan, day(2025, 9, 1), Some("ok".into())).unwrap();
    assert_eq!(
        first,
        AdvisoryOutcome::Applied {
            status: LoanStatus::ApprovedByAdvisor
        }
    );
    assert_eq!(loan.schedule[0].date, day(2025, 10, 1));

    let again = advisor_approve(&mut loan, day(2025, 12, 1), None).unwrap();
    assert!(matches!(again, AdvisoryOutcome::NotApplicable { .. }));
    assert_eq!(loan.schedule[0].date, day(2025, 10, 1));
    assert!(matches!(advisor_reject(&mut loan, None), AdvisoryOutcome::NotApplicable { .. }));
    assert_eq!(loan.status, LoanStatus::ApprovedByAdvisor);
}

#[test]
fn test_store_only_reports_servicing_loans() {
    let mut store = InMemoryStore::new();
    store.upsert_profile(profile());
    let approved = originate_loan(&request("L1", dec!(800))).unwrap().result;
    let mut rejected = originate_loan(&request("L2", dec!(5000))).unwrap().result;
    advisor_reject(&mut rejected, Some("too large".into()));
    store.upsert_loan(approved);
    store.upsert_loan(rejected);

    let active = store.active_loans("u1");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "L1");
    assert_eq!(store.all_loans("u1").len(), 2);
}
