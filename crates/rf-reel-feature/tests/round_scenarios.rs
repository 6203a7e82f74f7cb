//! Whole-round scenarios driven through the dispatcher

use rf_reel_feature::{
    Credits, EngineConfig, EngineError, EngineResult, FeatureEngine, FeatureId, FeatureModule,
    PayTable, PayoutAccumulator, PhaseContext, PhaseView, RoundContext, SharedTrace, Symbol,
    decode_json,
};
use rf_stage::{DiagnosticKind, FeatureKind, SpinPhase, Stage};

const CONFIG: &str = r#"{
    "game_key": "buffalo",
    "reel_count": 3,
    "collector_symbols": ["SC"],
    "collect_trigger": "CL",
    "sticky": {"trigger_symbol": "MY", "reveal_pool": ["H1", "H2", "SC"], "reveal_seed": 11}
}"#;

const PAYTABLE: &str = r#"
main:
  - symbol_match_count: 3
    credits: 50
  - symbol_match_count: 4
    credits: 200
  - symbol_match_count: 5
    credits: 1000
"#;

// Three respins landing 3, 4 and 5 SC counting the locked trigger cell
const STICKY_OUTCOME: &str = r#"{
    "reels": [["SC","A","B"],["A","MY","B"],["B","A","SC"]],
    "multiplier": 2,
    "wager_multiplier": 3,
    "modifier_exports": [{"type": "symbol_credit_values",
        "symbol_payouts": [{"symbol_name": "SC", "value": 10}]}],
    "reevaluations": [
        {"type": "symbol_replace_multi", "replacement_symbols": {"MY": "SC"}},
        {"type": "symbol_payout_on_payline", "reels": [["SC","A","B"],["A","A","B"],["B","A","SC"]]},
        {"type": "symbol_payout_on_payline", "reels": [["A","SC","B"],["A","A","B"],["B","A","A"]]},
        {"type": "symbol_payout_on_payline", "reels": [["A","A","B"],["A","A","MY"],["B","A","A"]]}
    ]
}"#;

const UPGRADE_OUTCOME: &str = r#"{
    "reels": [["SC","A","B"],["A","MY","B"],["B","A","SC"]],
    "modifier_exports": [{"type": "symbol_credit_values", "key_name": "buffalo_base_payout",
        "symbol_payouts": [{"symbol_name": "SC", "value": 10},
                           {"symbol_name": "SC_MINI", "value": 10}]}],
    "reevaluations": [
        {"type": "symbol_replace_multi", "replacement_symbols": {"MY": "SC"}},
        {"type": "symbol_payout_on_payline", "reels": [["SC","A","B"],["A","A","B"],["B","A","SC"]],
         "symbol_value_upgrade": [{"reel": 0, "pos": 0, "symbol": "SC", "before": 10, "after": 25}]},
        {"type": "symbol_payout_on_payline", "reels": [["A","SC","B"],["A","A","B"],["B","A","A"]]}
    ]
}"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn engine(trace: &SharedTrace) -> FeatureEngine {
    init_logging();
    let config = EngineConfig::from_json(CONFIG).unwrap();
    let paytable = PayTable::from_yaml(PAYTABLE).unwrap();
    FeatureEngine::new(config, paytable)
        .unwrap()
        .with_builtin_modules()
        .unwrap()
        .with_observer(trace.clone())
}

fn base_round(engine: &mut FeatureEngine) {
    engine
        .begin_round(RoundContext::base("round-1", "buffalo", 1))
        .unwrap();
}

#[test]
fn test_sticky_scenario_pays_match_counts() {
    let trace = SharedTrace::new("t-1", "buffalo");
    let mut engine = engine(&trace);
    base_round(&mut engine);

    let report = engine.run_spin(decode_json(STICKY_OUTCOME).unwrap()).unwrap();
    let trace = trace.snapshot();

    // m = outcome 2 x wager 3
    assert_eq!(trace.running_payouts(), vec![300, 1200, 6000]);
    assert_eq!(report.spin_win, Credits(6000));
    assert_eq!(engine.payout().round_total(), Credits(6000));
    assert_eq!(engine.payout().last_feature_win(), Some(Credits(6000)));
    assert!(report.features.contains(&FeatureKind::StickyRespin));
    assert!(report.diagnostics.is_empty());

    let remaining: Vec<Option<u32>> = trace
        .events
        .iter()
        .filter_map(|e| match e.stage {
            Stage::FeatureStep {
                steps_remaining, ..
            } => Some(steps_remaining),
            _ => None,
        })
        .collect();
    assert_eq!(remaining, vec![Some(2), Some(1), Some(0)]);

    let respins = report
        .phases
        .iter()
        .filter(|p| matches!(p, SpinPhase::ReevaluationStopped { .. }))
        .count();
    assert_eq!(respins, 3);
    assert_eq!(trace.phases(), report.phases);
    assert!(engine.is_next_spin_allowed());
}

#[test]
fn test_restore_returns_ledger_and_unlocks_everything() {
    let trace = SharedTrace::new("t-2", "buffalo");
    let mut engine = engine(&trace);
    base_round(&mut engine);

    engine.begin_spin(decode_json(UPGRADE_OUTCOME).unwrap()).unwrap();
    let mut before = None;
    while let Some(phase) = engine.advance().unwrap() {
        if phase == SpinPhase::ReelsStopped {
            before = Some(engine.ledger().snapshot());
        }
    }

    assert_eq!(Some(engine.ledger().snapshot()), before);
    assert!(!engine.ledger().is_held());

    let trace = trace.snapshot();
    let locks = trace
        .events
        .iter()
        .filter(|e| matches!(&e.stage, Stage::StickyChanged { symbol: Some(_), .. }))
        .count();
    let unlocks = trace
        .events
        .iter()
        .filter(|e| matches!(&e.stage, Stage::StickyChanged { symbol: None, .. }))
        .count();
    assert!(locks > 0);
    assert_eq!(locks, unlocks);

    // collectors of the restored grid show pre-feature values again
    let labels = trace.cell_labels();
    for cell in [(0, 0), (2, 2)] {
        assert_eq!(labels.get(&cell), Some(&("SC".to_string(), 10)));
    }
}

#[test]
fn test_mid_feature_upgrade_reaches_ledger_and_labels() {
    let trace = SharedTrace::new("t-3", "buffalo");
    let mut engine = engine(&trace);
    base_round(&mut engine);

    engine.begin_spin(decode_json(UPGRADE_OUTCOME).unwrap()).unwrap();
    let mut checked = false;
    while let Some(phase) = engine.advance().unwrap() {
        if phase != (SpinPhase::ReevaluationStopped { index: 0 }) {
            continue;
        }
        let ledger = engine.ledger();
        assert_eq!(ledger.raw_value(&Symbol::from("SC")), Some(Credits(25)));
        assert_eq!(ledger.raw_value(&Symbol::from("SC_MINI")), Some(Credits(25)));

        let labels = trace.snapshot().cell_labels();
        assert!(labels.len() >= 3);
        for (symbol, value) in labels.values() {
            assert_eq!(symbol, "SC");
            assert_eq!(*value, 25);
        }
        checked = true;
    }
    assert!(checked);
    assert_eq!(engine.ledger().raw_value(&Symbol::from("SC")), Some(Credits(10)));
}

#[test]
fn test_sub_game_inherits_collected_value() {
    let trace = SharedTrace::new("t-4", "buffalo");
    let mut engine = engine(&trace);
    base_round(&mut engine);

    let base = decode_json(
        r#"{"reels": [["SC","CL"],["A","B"],["C","D"]],
            "reevaluations": [
                {"type": "symbol_landing_award_credits",
                 "symbol_payouts": [{"symbol_name": "SC", "value": 75}]},
                {"type": "symbol_landing_award_free_spins", "free_spins": 5}
            ]}"#,
    )
    .unwrap();
    engine.run_spin(base).unwrap();
    let summary = engine.end_round().unwrap();
    assert_eq!(summary.collected_value, Credits(75));
    assert_eq!(summary.free_spins_awarded, 5);
    assert!(summary.features_consumed.contains(&FeatureKind::SymbolCollection));

    engine
        .begin_round(RoundContext::sub_game("round-1/fs-1", &summary))
        .unwrap();
    engine
        .begin_spin(decode_json(r#"{"reels": [["SC","A"],["B","C"],["D","E"]]}"#).unwrap())
        .unwrap();
    assert_eq!(engine.advance().unwrap(), Some(SpinPhase::PreSpin));
    assert_eq!(
        engine.ledger().value_of(&Symbol::from("SC")).unwrap(),
        Credits(75)
    );
}

#[test]
fn test_sub_game_keeps_round_total() {
    let trace = SharedTrace::new("t-4b", "buffalo");
    let mut engine = engine(&trace);
    base_round(&mut engine);

    let base = decode_json(
        r#"{"reels": [["SC","CL"],["A","B"],["C","D"]],
            "reevaluations": [
                {"type": "symbol_landing_award_credits",
                 "symbol_payouts": [{"symbol_name": "SC", "value": 75}]},
                {"type": "symbol_landing_award_free_spins", "free_spins": 5}
            ]}"#,
    )
    .unwrap();
    engine.run_spin(base).unwrap();
    let summary = engine.end_round().unwrap();
    assert_eq!(summary.round_total, Credits(75));

    // the free spins banner does not block its phase but the spin ends after it
    let recorded = trace.snapshot();
    let at = |wanted: &Stage| {
        recorded
            .events
            .iter()
            .find(|e| &e.stage == wanted)
            .map(|e| e.timestamp_ms)
            .unwrap()
    };
    let banner = at(&Stage::FreeSpinsAwarded { count: 5 });
    let cleanup = at(&Stage::PhaseEnter { phase: SpinPhase::Cleanup });
    let idle = at(&Stage::PhaseEnter { phase: SpinPhase::Idle });
    assert!(cleanup < banner + 1800.0);
    assert_eq!(idle, banner + 1800.0);

    engine
        .begin_round(RoundContext::sub_game("round-1/fs-1", &summary))
        .unwrap();
    assert_eq!(engine.payout().round_total(), summary.round_total);
    assert_eq!(engine.payout().displayed_total(), Credits(75));

    let report = engine
        .run_spin(decode_json(r#"{"reels": [["A","B"],["C","D"],["E","F"]], "base_credits": 20}"#).unwrap())
        .unwrap();
    assert_eq!(report.spin_win, Credits(20));
    assert_eq!(report.round_total, Credits(95));

    // a new base round starts from zero again
    engine.end_round().unwrap();
    base_round(&mut engine);
    assert_eq!(engine.payout().round_total(), Credits::ZERO);
}

#[test]
fn test_finalize_is_idempotent() {
    let mut payout = PayoutAccumulator::new();
    payout.add_settled(Credits(20));
    payout.begin_feature();
    payout.report_match_count_total(Credits(300)).unwrap();

    assert_eq!(payout.finalize(), Credits(320));
    assert_eq!(payout.finalize(), Credits(320));
    assert_eq!(payout.displayed_total(), Credits(320));
}

#[test]
fn test_running_total_is_monotonic() {
    let mut payout = PayoutAccumulator::new();
    payout.begin_feature();
    payout.report_running_total(Credits(100)).unwrap();

    let err = payout.report_running_total(Credits(40)).unwrap_err();
    assert!(matches!(err, EngineError::StateViolation(_)));
    assert_eq!(payout.feature_total(), Credits(100));

    payout.report_running_total(Credits(150)).unwrap();
    assert_eq!(payout.displayed_total(), Credits(150));

    // a match-count payout replaces the figure
    payout.report_match_count_total(Credits(60)).unwrap();
    assert_eq!(payout.feature_total(), Credits(60));
}

#[test]
fn test_skip_changes_timestamps_only() {
    let paced = SharedTrace::new("paced", "buffalo");
    let skipped = SharedTrace::new("skipped", "buffalo");

    for (trace, skip) in [(&paced, false), (&skipped, true)] {
        let mut engine = engine(trace);
        base_round(&mut engine);
        engine.begin_spin(decode_json(STICKY_OUTCOME).unwrap()).unwrap();
        if skip {
            engine.skip();
        }
        while engine.advance().unwrap().is_some() {}
    }

    let paced = paced.snapshot();
    let skipped = skipped.snapshot();
    assert_eq!(paced.stage_sequence(), skipped.stage_sequence());
    assert!(paced.duration_ms() > 0.0);
    assert!(skipped.events.iter().all(|e| e.timestamp_ms == 0.0));
}

struct Faulty;

impl FeatureModule for Faulty {
    fn id(&self) -> FeatureId {
        FeatureId::new("faulty")
    }
    fn name(&self) -> &str {
        "Faulty"
    }
    fn category(&self) -> FeatureKind {
        FeatureKind::RewardSymbol
    }
    fn wants(&self, phase: SpinPhase, _view: &PhaseView<'_>) -> bool {
        phase == SpinPhase::AfterPaylines
    }
    fn run(&mut self, _phase: SpinPhase, _cx: &mut PhaseContext<'_>) -> EngineResult<()> {
        Err(EngineError::configuration("reward table missing"))
    }
}

#[derive(Default)]
struct Stuck {
    holding: bool,
}

impl FeatureModule for Stuck {
    fn id(&self) -> FeatureId {
        FeatureId::new("stuck")
    }
    fn name(&self) -> &str {
        "Stuck"
    }
    fn category(&self) -> FeatureKind {
        FeatureKind::ValueUpgrade
    }
    fn wants(&self, phase: SpinPhase, _view: &PhaseView<'_>) -> bool {
        phase == SpinPhase::ReelsStopped
    }
    fn run(&mut self, _phase: SpinPhase, _cx: &mut PhaseContext<'_>) -> EngineResult<()> {
        self.holding = true;
        Ok(())
    }
    fn holds_next_spin(&self) -> bool {
        self.holding
    }
    fn abort(&mut self, _cx: &mut PhaseContext<'_>) {
        self.holding = false;
    }
}

#[test]
fn test_failing_module_blocks_nothing() {
    init_logging();
    let trace = SharedTrace::new("t-5", "buffalo");
    let config = EngineConfig::from_json(CONFIG).unwrap();
    let paytable = PayTable::from_yaml(PAYTABLE).unwrap();
    let mut engine = FeatureEngine::new(config, paytable).unwrap();
    engine.register(Box::new(Faulty)).unwrap();
    engine.register(Box::new(Stuck::default())).unwrap();
    let mut engine = engine
        .with_builtin_modules()
        .unwrap()
        .with_observer(trace.clone());
    base_round(&mut engine);

    let report = engine.run_spin(decode_json(STICKY_OUTCOME).unwrap()).unwrap();

    // the sticky feature still paid in full
    assert_eq!(report.spin_win, Credits(6000));
    assert!(engine.is_next_spin_allowed());

    let trace = trace.snapshot();
    let kinds: Vec<DiagnosticKind> = trace.diagnostics().iter().map(|(k, _)| *k).collect();
    assert!(kinds.contains(&DiagnosticKind::Configuration));
    assert!(
        trace
            .diagnostics()
            .iter()
            .any(|(k, m)| *k == DiagnosticKind::StateViolation && m.contains("stuck"))
    );
    assert!(trace.events.iter().any(|e| e.source.as_deref() == Some("faulty")));

    // the next spin is accepted
    engine
        .begin_spin(decode_json(r#"{"reels": [["A"],["B"],["C"]]}"#).unwrap())
        .unwrap();
}

#[test]
fn test_out_of_order_dispatch_is_state_violation() {
    let trace = SharedTrace::new("t-6", "buffalo");
    let mut engine = engine(&trace);
    base_round(&mut engine);

    engine
        .begin_spin(decode_json(r#"{"reels": [["A"],["B"],["C"]]}"#).unwrap())
        .unwrap();
    let err = engine.dispatch(SpinPhase::Cleanup).unwrap_err();
    assert!(matches!(err, EngineError::StateViolation(_)));
    assert_eq!(engine.next_phase(), Some(SpinPhase::PreSpin));
    assert_eq!(
        trace.snapshot().diagnostics()[0].0,
        DiagnosticKind::StateViolation
    );

    engine.dispatch(SpinPhase::PreSpin).unwrap();
    assert_eq!(
        engine.next_phase(),
        Some(SpinPhase::ReelStopping { reel_index: 0 })
    );
}

#[test]
fn test_spin_refused_while_gate_held() {
    let trace = SharedTrace::new("t-7", "buffalo");
    let mut engine = engine(&trace);
    base_round(&mut engine);

    engine.begin_spin(decode_json(STICKY_OUTCOME).unwrap()).unwrap();
    while let Some(phase) = engine.advance().unwrap() {
        if phase == SpinPhase::AfterPaylines {
            break;
        }
    }
    assert!(!engine.is_next_spin_allowed());
    assert!(engine.registry().any_holding());
    assert!(matches!(
        engine.begin_spin(decode_json(STICKY_OUTCOME).unwrap()),
        Err(EngineError::StateViolation(_))
    ));
    assert!(engine.end_round().is_err());
}
