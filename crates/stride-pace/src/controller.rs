use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stride_common::Clock;
use stride_config::PaceConfig;
use tracing::{debug, trace};

/// Below this cadence the user counts as standing still.
pub const IDLE_STEPS_PER_MINUTE: f32 = 10.0;
/// At or above this cadence playback runs at `max_speed`.
pub const FULL_STEPS_PER_MINUTE: f32 = 120.0;

/// Maps step cadence to a smoothed playback speed.
///
/// Steps arrive from the pedometer context and speed is read from a UI tick;
/// one lock guards the whole state for the duration of each call.
pub struct StepSpeedController {
    state: Mutex<ControllerState>,
    clock: Arc<dyn Clock>,
}

struct ControllerState {
    config: PaceConfig,
    steps: VecDeque<Instant>,
    last_step: Option<Instant>,
    target_speed: f32,
    smoothed_speed: f32,
}

impl ControllerState {
    fn window(&self) -> Duration {
        Duration::from_millis(self.config.step_window_ms)
    }

    fn prune(&mut self, now: Instant) {
        let window = self.window();
        while let Some(&oldest) = self.steps.front() {
            if now.saturating_duration_since(oldest) > window {
                self.steps.pop_front();
            } else {
                break;
            }
        }
    }

    fn steps_per_minute(&self) -> f32 {
        let minutes = self.config.step_window_ms as f32 / 60_000.0;
        self.steps.len() as f32 / minutes
    }

    /// Target with the post-movement fade applied.
    fn effective_target(&self, now: Instant) -> f32 {
        let Some(last) = self.last_step else {
            return self.config.min_speed;
        };
        let since = now.saturating_duration_since(last).as_millis() as u64;
        if since <= self.config.decay_start_ms {
            return self.target_speed;
        }
        let fade = ((since - self.config.decay_start_ms) as f32
            / self.config.decay_duration_ms.max(1) as f32)
            .min(1.0);
        self.target_speed + (self.config.min_speed - self.target_speed) * fade
    }
}

/// Target speed for a cadence, before smoothing and decay.
pub fn target_for_cadence(steps_per_minute: f32, config: &PaceConfig) -> f32 {
    if steps_per_minute < IDLE_STEPS_PER_MINUTE {
        return config.min_speed;
    }
    if steps_per_minute >= FULL_STEPS_PER_MINUTE {
        return config.max_speed;
    }
    let progress = (steps_per_minute - IDLE_STEPS_PER_MINUTE)
        / (FULL_STEPS_PER_MINUTE - IDLE_STEPS_PER_MINUTE);
    let shaped = acceleration_curve(progress, config.acceleration_curve);
    config.min_speed_moving + shaped * (config.max_speed - config.min_speed_moving)
}

/// Power curve centered on 0.5: flat around the middle, steep at the ends.
/// An exponent of 1.0 (or less) leaves the progress linear.
pub fn acceleration_curve(progress: f32, exponent: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    if exponent <= 1.0 {
        return p;
    }
    let d = 2.0 * (p - 0.5);
    0.5 + 0.5 * d.signum() * d.abs().powf(exponent)
}

impl StepSpeedController {
    pub fn new(config: PaceConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(ControllerState {
                target_speed: config.min_speed,
                smoothed_speed: config.min_speed,
                config,
                steps: VecDeque::new(),
                last_step: None,
            }),
            clock,
        }
    }

    /// Record one step taken now.
    pub fn add_step(&self) {
        let now = self.clock.now();
        let mut st = self.state.lock();
        st.steps.push_back(now);
        st.last_step = Some(now);
        st.prune(now);
        let spm = st.steps_per_minute();
        st.target_speed = target_for_cadence(spm, &st.config);
        trace!(spm, target = st.target_speed, "Step recorded");
    }

    /// Advance smoothing by one tick and return the speed to apply.
    pub fn current_speed(&self) -> f32 {
        let now = self.clock.now();
        let mut st = self.state.lock();
        let effective = st.effective_target(now);
        let factor = st.config.speed_smoothing_factor;
        st.smoothed_speed += (effective - st.smoothed_speed) * factor;
        st.smoothed_speed
    }

    /// Cadence over the trailing window, as of now.
    pub fn steps_per_minute(&self) -> f32 {
        let now = self.clock.now();
        let mut st = self.state.lock();
        st.prune(now);
        st.steps_per_minute()
    }

    /// Target before decay, as computed at the last step.
    pub fn target_speed(&self) -> f32 {
        self.state.lock().target_speed
    }

    /// Target after the post-movement fade, without advancing smoothing.
    pub fn effective_target(&self) -> f32 {
        let now = self.clock.now();
        self.state.lock().effective_target(now)
    }

    pub fn smoothed_speed(&self) -> f32 {
        self.state.lock().smoothed_speed
    }

    /// Kilometers covered by `total_steps`.
    pub fn estimated_distance_km(&self, total_steps: u64) -> f32 {
        let stride = self.state.lock().config.average_stride_length;
        total_steps as f32 * stride / 1000.0
    }

    /// Rough kcal estimate, linear in distance.
    pub fn estimated_calories(&self, total_steps: u64) -> u32 {
        let per_km = self.state.lock().config.calories_per_km;
        (self.estimated_distance_km(total_steps) * per_km) as u32
    }

    /// Forget all steps and drop both speeds to `min_speed`.
    pub fn reset(&self) {
        let mut st = self.state.lock();
        st.steps.clear();
        st.last_step = None;
        st.target_speed = st.config.min_speed;
        st.smoothed_speed = st.config.min_speed;
        debug!("Step controller reset");
    }

    /// Take new tuning values. Step history and smoothed speed are kept.
    pub fn apply_config(&self, config: &PaceConfig) {
        let mut st = self.state.lock();
        if st.config == *config {
            return;
        }
        st.config = *config;
        let now = self.clock.now();
        st.prune(now);
        if st.last_step.is_some() {
            let spm = st.steps_per_minute();
            st.target_speed = target_for_cadence(spm, &st.config);
        } else {
            st.target_speed = st.config.min_speed;
        }
        debug!(
            min = config.min_speed,
            min_moving = config.min_speed_moving,
            max = config.max_speed,
            "Pace config applied"
        );
    }

    pub fn config(&self) -> PaceConfig {
        self.state.lock().config
    }
}
