//! StageObserver — host callbacks
//!
//! The presentation layer implements this trait to follow the engine.
//! `on_event` receives every stage event and routes it to the typed
//! callbacks; override it to record raw events instead.

use crate::event::StageEvent;
use crate::stage::{SpinPhase, Stage};
use crate::taxonomy::{DiagnosticKind, FeatureKind};

pub trait StageObserver {
    /// A lifecycle phase was entered
    fn on_phase_enter(&mut self, _phase: SpinPhase) {}

    /// A collector symbol's displayed value changed
    fn on_symbol_value_changed(&mut self, _symbol: &str, _value: u64) {}

    /// A cell locked (`Some`) or unlocked (`None`)
    fn on_sticky_changed(&mut self, _reel: u8, _row: u8, _symbol: Option<&str>) {}

    /// The displayed round payout changed
    fn on_running_payout_changed(&mut self, _credits: u64) {}

    /// A feature reached its terminal state
    fn on_feature_terminal(&mut self, _feature: FeatureKind, _total_win: u64) {}

    /// An error was raised (recovered or not)
    fn on_diagnostic(&mut self, _kind: DiagnosticKind, _message: &str) {}

    /// Receive a raw event. The default routes to the typed callbacks.
    fn on_event(&mut self, event: &StageEvent) {
        match &event.stage {
            Stage::PhaseEnter { phase } => self.on_phase_enter(*phase),
            Stage::SymbolValueChanged { symbol, value, .. } => {
                self.on_symbol_value_changed(symbol, *value)
            }
            Stage::StickyChanged { reel, row, symbol } => {
                self.on_sticky_changed(*reel, *row, symbol.as_deref())
            }
            Stage::RunningPayoutChanged { credits } => self.on_running_payout_changed(*credits),
            Stage::FeatureTerminal { feature, total_win } => {
                self.on_feature_terminal(*feature, *total_win)
            }
            Stage::Diagnostic { kind, message } => self.on_diagnostic(*kind, message),
            Stage::CycleReveal { .. }
            | Stage::FreeSpinsAwarded { .. }
            | Stage::FeatureEnter { .. }
            | Stage::FeatureStep { .. } => {}
        }
    }
}

/// Observer that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl StageObserver for NullObserver {}

impl StageObserver for Vec<StageEvent> {
    fn on_event(&mut self, event: &StageEvent) {
        self.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        phases: Vec<SpinPhase>,
        payouts: Vec<u64>,
        unlocked: usize,
    }

    impl StageObserver for Counting {
        fn on_phase_enter(&mut self, phase: SpinPhase) {
            self.phases.push(phase);
        }
        fn on_running_payout_changed(&mut self, credits: u64) {
            self.payouts.push(credits);
        }
        fn on_sticky_changed(&mut self, _reel: u8, _row: u8, symbol: Option<&str>) {
            if symbol.is_none() {
                self.unlocked += 1;
            }
        }
    }

    #[test]
    fn test_default_routing() {
        let mut obs = Counting::default();
        obs.on_event(&StageEvent::new(
            Stage::PhaseEnter {
                phase: SpinPhase::Cleanup,
            },
            0.0,
        ));
        obs.on_event(&StageEvent::new(Stage::RunningPayoutChanged { credits: 9 }, 1.0));
        obs.on_event(&StageEvent::new(
            Stage::StickyChanged {
                reel: 1,
                row: 2,
                symbol: None,
            },
            2.0,
        ));

        assert_eq!(obs.phases, vec![SpinPhase::Cleanup]);
        assert_eq!(obs.payouts, vec![9]);
        assert_eq!(obs.unlocked, 1);
    }
}
