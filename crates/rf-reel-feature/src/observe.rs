//! Shared trace — a recording observer the host keeps a handle to
//!
//! The engine owns its observer as a boxed trait object, so a host that
//! wants to read the trace while the engine runs gives it a clone of a
//! [`SharedTrace`] and keeps another.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rf_stage::{StageEvent, StageObserver, StageTrace};

#[derive(Debug, Clone)]
pub struct SharedTrace(Arc<Mutex<StageTrace>>);

impl SharedTrace {
    pub fn new(trace_id: impl Into<String>, game_id: impl Into<String>) -> Self {
        Self(Arc::new(Mutex::new(StageTrace::new(trace_id, game_id))))
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> StageTrace {
        self.0.lock().clone()
    }

    pub fn lock(&self) -> MutexGuard<'_, StageTrace> {
        self.0.lock()
    }

    /// Drop recorded events, keeping ids and metadata
    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

impl StageObserver for SharedTrace {
    fn on_event(&mut self, event: &StageEvent) {
        self.0.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use rf_stage::Stage;

    use super::*;

    #[test]
    fn test_clones_share_events() {
        let trace = SharedTrace::new("t-1", "g");
        let mut handle = trace.clone();
        handle.on_event(&StageEvent::new(Stage::RunningPayoutChanged { credits: 40 }, 0.0));

        assert_eq!(trace.len(), 1);
        assert_eq!(trace.snapshot().final_payout(), 40);

        trace.clear();
        assert!(handle.is_empty());
    }
}
