use crate::controller::StepSpeedController;
use std::time::Duration;

/// Totals for one workout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub total_steps: u64,
    pub distance_km: f32,
    pub calories: u32,
    /// Time since playback first started; `None` while warming up.
    pub elapsed: Option<Duration>,
}

/// Step totals and the warm-up gate that holds playback back.
///
/// Playback (and with it the session timer) starts only once
/// `steps_before_start` steps have been counted.
#[derive(Debug, Clone)]
pub struct WorkoutSession {
    total_steps: u64,
    steps_before_start: u32,
}

impl WorkoutSession {
    pub fn new(steps_before_start: u32) -> Self {
        Self {
            total_steps: 0,
            steps_before_start,
        }
    }

    /// Count `steps` and return the new total.
    pub fn record_steps(&mut self, steps: u32) -> u64 {
        self.total_steps += steps as u64;
        self.total_steps
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn set_steps_before_start(&mut self, steps: u32) {
        self.steps_before_start = steps;
    }

    /// Steps still needed before playback may start.
    pub fn warmup_remaining(&self) -> u64 {
        (self.steps_before_start as u64).saturating_sub(self.total_steps)
    }

    pub fn warmup_complete(&self) -> bool {
        self.warmup_remaining() == 0
    }

    pub fn summary(
        &self,
        controller: &StepSpeedController,
        elapsed: Option<Duration>,
    ) -> SessionSummary {
        SessionSummary {
            total_steps: self.total_steps,
            distance_km: controller.estimated_distance_km(self.total_steps),
            calories: controller.estimated_calories(self.total_steps),
            elapsed,
        }
    }

    pub fn reset(&mut self) {
        self.total_steps = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_common::TestClock;
    use stride_config::PaceConfig;

    #[test]
    fn warmup_gate_opens_after_required_steps() {
        let mut session = WorkoutSession::new(5);
        assert!(!session.warmup_complete());
        session.record_steps(3);
        assert_eq!(session.warmup_remaining(), 2);
        session.record_steps(2);
        assert!(session.warmup_complete());
    }

    #[test]
    fn zero_warmup_is_open_immediately() {
        assert!(WorkoutSession::new(0).warmup_complete());
    }

    #[test]
    fn summary_uses_controller_estimates() {
        let controller = StepSpeedController::new(PaceConfig::default(), TestClock::shared());
        let mut session = WorkoutSession::new(0);
        session.record_steps(4_000);
        let summary = session.summary(&controller, Some(Duration::from_secs(600)));
        assert_eq!(summary.total_steps, 4_000);
        assert!((summary.distance_km - 3.0).abs() < 1e-5);
        assert_eq!(summary.calories, 180);
        assert_eq!(summary.elapsed, Some(Duration::from_secs(600)));
    }
}
