//! End-to-end checks of the diagnosis pipeline on CSV ledgers.

use lens_health::{
    diagnose, runway, score, stress_test, ApprovalGate, ApprovalOutcome, Denomination,
    ExamineOptions, FixedRate, FundingPolicy, HealthDoctor, Ledger, LedgerError, LiquidityBridge,
    RandomRate, RateRange, RunwayUnit, StrategyKind,
};
use proptest::prelude::*;
use test_case::test_case;

const QUARTER: &str = "\
month,revenue,expenses,cash,receivables,payables
2024-01,120,50,8,40,10
2024-02,130,55,6,45,12
2024-03,125,60,5,50,11
2024-04,140,65,4,55,
";

#[test]
fn test_quarter_is_a_paper_profit_trap() {
    let ledger = Ledger::from_csv(QUARTER).unwrap();
    let diagnosis = diagnose(&ledger).unwrap();

    assert_eq!(diagnosis.periods, 4);
    assert_eq!(diagnosis.net_profit, 285.0);
    assert!(diagnosis.liquidity_ratio < 0.5);
    assert!(diagnosis.paper_profit_trap);
    assert!((diagnosis.monthly_expenses - 57.5).abs() < 1e-9);
}

#[test_case(100.0, 40.0, 10.0, true ; "profit with ratio one quarter")]
#[test_case(40.0, 100.0, 5.0, false ; "loss with low ratio")]
#[test_case(40.0, 100.0, 500.0, false ; "loss with high ratio")]
#[test_case(100.0, 100.0, 0.0, false ; "zero profit")]
#[test_case(100.0, 40.0, 40.0, false ; "profit with ratio one")]
fn test_trap_boundaries(revenue: f64, expenses: f64, cash: f64, trapped: bool) {
    let csv = format!("revenue,expenses,cash\n{},{},{}\n", revenue, expenses, cash);
    let diagnosis = diagnose(&Ledger::from_csv(&csv).unwrap()).unwrap();
    assert_eq!(diagnosis.paper_profit_trap, trapped);
}

#[test]
fn test_reliability_of_full_and_partial_ledgers() {
    let full = "revenue,expenses,cash,receivables,payables\n\
                1,1,1,1,1\n1,1,1,1,1\n1,1,1,1,1\n1,1,1,1,1\n";
    let ledger = Ledger::from_csv(full).unwrap();
    assert_eq!(score(&ledger, StrategyKind::Completeness).value, 100.0);

    let partial = "revenue,expenses,cash,receivables,payables\n\
                   ,,,,\n1,1,1,1,1\n1,1,1,1,1\n1,1,1,1,1\n";
    let ledger = Ledger::from_csv(partial).unwrap();
    let reliability = score(&ledger, StrategyKind::Completeness);
    assert_eq!(reliability.missing_cells, 5);
    assert_eq!(reliability.total_cells, 20);
    assert_eq!(reliability.value, 75.0);
}

#[test]
fn test_red_flag_strategy_penalizes_burn_and_thin_cash() {
    let ledger = Ledger::from_csv("revenue,expenses,cash\n50,100,10\n50,100,10\n").unwrap();
    let reliability = score(&ledger, StrategyKind::RedFlags);
    assert_eq!(reliability.red_flags.len(), 2);
    assert_eq!(reliability.value, 50.0);
}

#[test]
fn test_zero_burn_ledger_has_unbounded_runway() {
    let ledger = Ledger::from_csv("revenue,expenses,cash\n100,0,50\n100,,50\n").unwrap();
    let diagnosis = diagnose(&ledger).unwrap();
    assert_eq!(diagnosis.monthly_expenses, 0.0);
    assert!(runway(diagnosis.total_cash, diagnosis.monthly_expenses, RunwayUnit::Months)
        .is_unbounded());
    assert!(runway(diagnosis.total_cash, diagnosis.monthly_expenses, RunwayUnit::Days)
        .is_unbounded());
}

#[test]
fn test_null_shock_reproduces_diagnosed_cash() {
    let ledger = Ledger::from_csv(QUARTER).unwrap();
    let diagnosis = diagnose(&ledger).unwrap();
    assert_eq!(stress_test(diagnosis.total_cash, 0.0).unwrap(), diagnosis.total_cash);
}

#[test]
fn test_asset_ledger_valued_at_explicit_price() {
    let csv = "revenue_btc,expenses_btc,cash_btc\n0.8,0.3,0.05\n0.9,0.35,0.05\n";
    let ledger = Ledger::from_csv(csv).unwrap();
    let options = ExamineOptions {
        drop_percent: 30.0,
        price: Some(60_000.0),
        ..ExamineOptions::default()
    };
    let report = HealthDoctor::new().examine(&ledger, &options).unwrap();

    assert_eq!(report.diagnosis.denomination, Denomination::Asset("btc".into()));
    assert!((report.stress.shocked_value - 0.07).abs() < 1e-9);
    assert!((report.stress.native_value.unwrap() - 4_200.0).abs() < 1e-6);
}

#[test]
fn test_quoted_export_diagnosed_like_plain_numbers() {
    let csv = "month,revenue,expenses,cash\n\"Jan, 2024\",\"1,000\",400,100\n";
    let ledger = Ledger::from_csv(csv).unwrap();
    let diagnosis = diagnose(&ledger).unwrap();

    assert_eq!(diagnosis.total_revenue, 1_000.0);
    assert_eq!(diagnosis.net_profit, 600.0);
    assert!((diagnosis.liquidity_ratio - 0.25).abs() < 1e-6);
    assert!(diagnosis.paper_profit_trap);
    assert_eq!(score(&ledger, StrategyKind::Completeness).missing_cells, 0);
}

#[test]
fn test_derived_columns_do_not_block_native_ledger() {
    let csv = "revenue,expenses,cash,cash_flow,revenue_growth\n100,40,10,60,0.1\n";
    let ledger = Ledger::from_csv(csv).unwrap();
    assert_eq!(ledger.denomination(), &Denomination::Native);
    assert!(diagnose(&ledger).unwrap().paper_profit_trap);
}

#[test]
fn test_input_errors() {
    assert_eq!(Ledger::from_csv("").unwrap_err(), LedgerError::EmptyLedger);
    assert!(matches!(
        Ledger::from_csv("revenue,expenses_btc,cash\n1,2,3\n"),
        Err(LedgerError::MixedUnits { .. })
    ));
    assert!(matches!(
        diagnose(&Ledger::from_csv("revenue,cash\n1,2\n").unwrap()),
        Err(LedgerError::MissingColumn { column }) if column == "expenses"
    ));
}

#[test]
fn test_trapped_ledger_through_the_bridge() {
    let ledger = Ledger::from_csv(QUARTER).unwrap();
    let diagnosis = diagnose(&ledger).unwrap();

    let amount = diagnosis.funding_need(FundingPolicy::ReceivablesFraction { fraction: 0.5 });
    assert_eq!(amount, 95.0);

    let mut bridge = LiquidityBridge::new(RateRange::default(), FixedRate(0.02));
    let offer = bridge.offer_for(&diagnosis, amount).unwrap();
    assert_eq!(offer.repayment, 96.9);

    let gate = ApprovalGate::new("APPROVE-BRIDGE");
    assert_eq!(gate.evaluate("APPROVE-BRIDGE"), ApprovalOutcome::Executed);
    assert_eq!(gate.evaluate("approve-bridge "), ApprovalOutcome::PendingAuthorization);
}

proptest! {
    #[test]
    fn prop_stress_bounds(v in 0.0f64..1e9, p in 0.0f64..=100.0) {
        let shocked = stress_test(v, p).unwrap();
        prop_assert!(shocked <= v);
        prop_assert!(shocked >= 0.0);
        prop_assert_eq!(stress_test(v, 0.0).unwrap(), v);
        prop_assert_eq!(stress_test(v, 100.0).unwrap(), 0.0);
    }

    #[test]
    fn prop_trap_never_flags_losses(
        revenue in 0.0f64..1e6,
        extra in 0.0f64..1e6,
        cash in 0.0f64..1e6,
    ) {
        let csv = format!("revenue,expenses,cash\n{},{},{}\n", revenue, revenue + extra, cash);
        let diagnosis = diagnose(&Ledger::from_csv(&csv).unwrap()).unwrap();
        prop_assert!(!diagnosis.paper_profit_trap);
    }

    #[test]
    fn prop_seeded_repayment_matches_rate(seed in any::<u64>()) {
        let mut bridge = LiquidityBridge::new(RateRange::default(), RandomRate::seeded(seed));
        let offer = bridge.offer_loan(10.0).unwrap();
        let expected = (10.0 * (1.0 + offer.interest_rate) * 1e4).round() / 1e4;
        prop_assert_eq!(offer.repayment, expected);
        prop_assert!(offer.repayment > 10.0);
    }
}
