use std::time::{Duration, Instant};

/// Rates closer than this to the applied one are treated as already applied.
pub const SETTLED_EPSILON: f32 = 0.005;

/// Decides when a requested playback rate is pushed to the decoder.
///
/// Speed is re-requested on every tick while it ramps. Decoders that change
/// rate through a seek cannot take that many, so changes are spaced at least
/// `min_interval` apart. The latest request always wins, so once the ramp
/// settles the final rate is applied on the next call after the interval.
#[derive(Debug, Clone)]
pub struct RateGovernor {
    min_interval: Duration,
    applied: f32,
    last_change: Option<Instant>,
}

impl RateGovernor {
    pub fn new(initial: f32, min_interval: Duration) -> Self {
        Self {
            min_interval,
            applied: initial,
            last_change: None,
        }
    }

    pub fn applied(&self) -> f32 {
        self.applied
    }

    pub fn set_min_interval(&mut self, min_interval: Duration) {
        self.min_interval = min_interval;
    }

    /// Whether `requested` should be sent to the decoder at `now`.
    pub fn should_apply(&self, requested: f32, now: Instant) -> bool {
        if (requested - self.applied).abs() < SETTLED_EPSILON {
            return false;
        }
        match self.last_change {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.min_interval,
        }
    }

    /// Record that the decoder accepted `rate` at `now`.
    pub fn mark_applied(&mut self, rate: f32, now: Instant) {
        self.applied = rate;
        self.last_change = Some(now);
    }
}
