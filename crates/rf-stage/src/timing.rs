//! Timing — Cooperative pacing for stage emission
//!
//! The engine never sleeps. Presentation waits are modelled on a synthetic
//! millisecond timeline: blocking waits advance the cursor, independent
//! sub-effects run on an [`EffectBarrier`] that must be joined before a
//! phase reports completion, and fire-and-forget effects never move the
//! cursor. Skipping collapses every wait to zero without changing which
//! stages are emitted.

use serde::{Deserialize, Serialize};

/// Timing profile identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimingProfile {
    /// Normal gameplay speed
    #[default]
    Normal,
    /// Fast/Turbo mode
    Turbo,
    /// Instant (no delays, for testing)
    Instant,
}

impl TimingProfile {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Turbo => "Turbo",
            Self::Instant => "Instant",
        }
    }
}

/// Durations for every presentation wait the engine models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Profile identifier
    pub profile: TimingProfile,

    /// Time before first reel stops (ms)
    pub reel_stop_base_ms: f64,

    /// Time between reel stops (ms)
    pub reel_stop_interval_ms: f64,

    /// Value label pop on a collector symbol (ms)
    pub symbol_label_ms: f64,

    /// Value upgrade effect (ms)
    pub upgrade_ms: f64,

    /// One provisional symbol during a cycle reveal (ms)
    pub reveal_step_ms: f64,

    /// Sticky lock effect (ms)
    pub lock_ms: f64,

    /// Reevaluation sub-spin (ms)
    pub respin_ms: f64,

    /// Payout rollup (ms)
    pub rollup_ms: f64,

    /// Award banner; plays over the following phases (ms)
    #[serde(default)]
    pub banner_ms: f64,

    /// Feature enter transition (ms)
    pub feature_enter_ms: f64,

    /// Feature exit / restore transition (ms)
    pub feature_exit_ms: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::normal()
    }
}

impl TimingConfig {
    /// Normal gameplay timing
    pub fn normal() -> Self {
        Self {
            profile: TimingProfile::Normal,
            reel_stop_base_ms: 800.0,
            reel_stop_interval_ms: 300.0,
            symbol_label_ms: 250.0,
            upgrade_ms: 600.0,
            reveal_step_ms: 120.0,
            lock_ms: 400.0,
            respin_ms: 1200.0,
            rollup_ms: 900.0,
            banner_ms: 1800.0,
            feature_enter_ms: 2000.0,
            feature_exit_ms: 1500.0,
        }
    }

    /// Turbo mode
    pub fn turbo() -> Self {
        Self {
            profile: TimingProfile::Turbo,
            ..Self::normal().scaled(0.5)
        }
    }

    /// Instant mode
    pub fn instant() -> Self {
        Self {
            profile: TimingProfile::Instant,
            ..Self::normal().scaled(0.0)
        }
    }

    /// Get config for profile
    pub fn from_profile(profile: TimingProfile) -> Self {
        match profile {
            TimingProfile::Normal => Self::normal(),
            TimingProfile::Turbo => Self::turbo(),
            TimingProfile::Instant => Self::instant(),
        }
    }

    /// Scale timing by factor (< 1.0 = faster)
    pub fn scaled(&self, factor: f64) -> Self {
        let factor = factor.max(0.0);
        Self {
            profile: self.profile,
            reel_stop_base_ms: self.reel_stop_base_ms * factor,
            reel_stop_interval_ms: self.reel_stop_interval_ms * factor,
            symbol_label_ms: self.symbol_label_ms * factor,
            upgrade_ms: self.upgrade_ms * factor,
            reveal_step_ms: self.reveal_step_ms * factor,
            lock_ms: self.lock_ms * factor,
            respin_ms: self.respin_ms * factor,
            rollup_ms: self.rollup_ms * factor,
            banner_ms: self.banner_ms * factor,
            feature_enter_ms: self.feature_enter_ms * factor,
            feature_exit_ms: self.feature_exit_ms * factor,
        }
    }
}

/// Synthetic timeline for one round
#[derive(Debug, Clone)]
pub struct Timeline {
    current_ms: f64,
    skipping: bool,
    detached_until_ms: f64,
    config: TimingConfig,
}

impl Timeline {
    /// Create new timeline at zero
    pub fn new(config: TimingConfig) -> Self {
        Self {
            current_ms: 0.0,
            skipping: false,
            detached_until_ms: 0.0,
            config,
        }
    }

    /// Reset to zero and clear the skip flag
    pub fn reset(&mut self) {
        self.current_ms = 0.0;
        self.detached_until_ms = 0.0;
        self.skipping = false;
    }

    /// Collapse every subsequent wait to zero
    pub fn skip(&mut self) {
        self.skipping = true;
    }

    pub fn is_skipping(&self) -> bool {
        self.skipping
    }

    /// Get current timestamp
    pub fn current(&self) -> f64 {
        self.current_ms
    }

    /// Effective duration of a wait, honouring skip
    pub fn effective(&self, duration_ms: f64) -> f64 {
        if self.skipping { 0.0 } else { duration_ms.max(0.0) }
    }

    /// Blocking wait: advance by duration and return new timestamp
    pub fn advance(&mut self, duration_ms: f64) -> f64 {
        self.current_ms += self.effective(duration_ms);
        self.current_ms
    }

    /// Start an effect that the phase does not wait for
    pub fn fire_and_forget(&mut self, duration_ms: f64) -> f64 {
        let end = self.current_ms + self.effective(duration_ms);
        self.detached_until_ms = self.detached_until_ms.max(end);
        end
    }

    /// Latest end time of any fire-and-forget effect
    pub fn detached_until(&self) -> f64 {
        self.detached_until_ms
    }

    /// Wait out every fire-and-forget effect still playing
    pub fn settle_detached(&mut self) -> f64 {
        if self.detached_until_ms > self.current_ms {
            self.current_ms = self.detached_until_ms;
        }
        self.current_ms
    }

    /// Open a barrier for effects that must all finish before the phase completes
    pub fn barrier(&self) -> EffectBarrier {
        EffectBarrier {
            start_ms: self.current_ms,
            ends: Vec::new(),
        }
    }

    /// Advance for reel stop
    pub fn reel_stop(&mut self, reel_index: u8) -> f64 {
        if reel_index == 0 {
            self.advance(self.config.reel_stop_base_ms)
        } else {
            self.advance(self.config.reel_stop_interval_ms)
        }
    }

    /// Advance for a reevaluation sub-spin
    pub fn respin(&mut self) -> f64 {
        self.advance(self.config.respin_ms)
    }

    /// Advance through a cycle reveal of `steps` provisional symbols
    pub fn cycle_reveal(&mut self, steps: usize) -> f64 {
        self.advance(self.config.reveal_step_ms * steps as f64)
    }

    /// Advance for feature enter
    pub fn feature_enter(&mut self) -> f64 {
        self.advance(self.config.feature_enter_ms)
    }

    /// Advance for feature exit
    pub fn feature_exit(&mut self) -> f64 {
        self.advance(self.config.feature_exit_ms)
    }

    /// Get timing config reference
    pub fn config(&self) -> &TimingConfig {
        &self.config
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(TimingConfig::default())
    }
}

/// Join point for independent sub-effects started by one handler
///
/// Every effect fired on the barrier starts at the barrier's opening time.
/// `join` moves the timeline cursor to the latest end, so partial
/// completion is never visible to the next phase.
#[derive(Debug, Clone)]
#[must_use = "a barrier must be joined before the phase completes"]
pub struct EffectBarrier {
    start_ms: f64,
    ends: Vec<f64>,
}

impl EffectBarrier {
    /// Start an effect; returns its end time
    pub fn fire(&mut self, timeline: &Timeline, duration_ms: f64) -> f64 {
        let end = self.start_ms + timeline.effective(duration_ms);
        self.ends.push(end);
        end
    }

    /// Number of effects in flight
    pub fn pending(&self) -> usize {
        self.ends.len()
    }

    /// Wait for every effect; returns the new cursor position
    pub fn join(self, timeline: &mut Timeline) -> f64 {
        let latest = self.ends.iter().copied().fold(self.start_ms, f64::max);
        if latest > timeline.current_ms {
            timeline.current_ms = latest;
        }
        timeline.current_ms
    }
}
