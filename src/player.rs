use std::sync::Arc;
use stride_config::{SettingsStore, TimecodeSchedule};
use stride_pace::{PedometerFilter, SessionSummary, StepSpeedController, WorkoutSession};
use stride_video::{PlayerEvent, VideoTextureStream};
use tracing::{debug, info};

/// Glue between steps, settings and the video stream.
///
/// Steps arrive from the pedometer (or the keyboard); [`tick`](Self::tick)
/// runs on a fixed period and pushes the resulting speed into playback.
pub struct PlaybackCoordinator {
    settings: SettingsStore,
    controller: Arc<StepSpeedController>,
    stream: Arc<VideoTextureStream>,
    session: WorkoutSession,
    pedometer: PedometerFilter,
    schedule: TimecodeSchedule,
    active_entry: Option<usize>,
    started: bool,
    user_paused: bool,
}

impl PlaybackCoordinator {
    pub fn new(
        settings: SettingsStore,
        controller: Arc<StepSpeedController>,
        stream: Arc<VideoTextureStream>,
        schedule: TimecodeSchedule,
    ) -> Self {
        let session = WorkoutSession::new(settings.pace().steps_before_start);
        Self {
            settings,
            controller,
            stream,
            session,
            pedometer: PedometerFilter::new(),
            schedule,
            active_entry: None,
            started: false,
            user_paused: false,
        }
    }

    /// One detected step.
    pub fn on_step(&mut self) {
        self.record(1);
    }

    /// Cumulative hardware step-counter reading.
    pub fn on_pedometer_reading(&mut self, cumulative: u64) {
        let steps = self.pedometer.ingest(cumulative);
        if steps > 0 {
            self.record(steps);
        }
    }

    fn record(&mut self, steps: u32) {
        for _ in 0..steps {
            self.controller.add_step();
        }
        let total = self.session.record_steps(steps);
        if !self.started && !self.session.warmup_complete() {
            debug!(total, remaining = self.session.warmup_remaining(), "Warming up");
        }
    }

    /// Periodic update: settings, warm-up gate, speed, volume and timecodes.
    pub fn tick(&mut self) {
        let pace = self.settings.pace();
        self.controller.apply_config(&pace);
        self.session.set_steps_before_start(pace.steps_before_start);

        self.stream.poll_events();

        if !self.started && !self.user_paused && self.session.warmup_complete() {
            if self.stream.start() {
                self.started = true;
                info!(steps = self.session.total_steps(), "Warm-up complete, playback started");
            }
        }

        let speed = self.controller.current_speed();
        if self.started {
            self.stream.set_speed(speed);
            self.stream.set_volume(self.settings.video_volume());
            self.apply_timecodes(self.stream.position_ms());
        }
    }

    fn apply_timecodes(&mut self, position_ms: u64) {
        let Some((index, entry)) = self.schedule.active_at(position_ms) else {
            return;
        };
        if self.active_entry == Some(index) {
            return;
        }
        self.active_entry = Some(index);
        debug!(index, at_ms = entry.at_ms, position_ms, "Timecode entry active");

        if !entry.overrides.is_empty() {
            self.settings.apply_overrides(&entry.overrides);
        }
        if let Some(overlay) = &entry.overlay {
            self.settings.set_overlay(Some(overlay.clone()));
            let sent = self
                .stream
                .event_sender()
                .send(PlayerEvent::OverlayChanged(overlay.clone()));
            if sent.is_err() {
                debug!("Overlay event dropped; no receiver");
            }
        }
    }

    /// Pause or resume on user request. Ignored before playback first starts.
    pub fn toggle_pause(&mut self) {
        if !self.started {
            return;
        }
        if self.user_paused {
            if self.stream.resume() {
                self.user_paused = false;
                info!("Playback resumed");
            }
        } else {
            self.stream.pause();
            self.user_paused = true;
            info!("Playback paused");
        }
    }

    /// Relative seek, clamped at the start of the video.
    pub fn seek_by(&self, delta_ms: i64) {
        let position = self.stream.position_ms() as i64;
        let mut target = (position + delta_ms).max(0) as u64;
        if let Some(duration) = self.stream.duration_ms() {
            target = target.min(duration);
        }
        self.stream.seek_to(target);
    }

    /// Fresh workout on the same video. Steps, speed and the warm-up gate are
    /// reset, and rebinding the source resets the session timer.
    pub fn restart(&mut self) {
        self.controller.reset();
        self.session.reset();
        self.pedometer.reset();
        self.started = false;
        self.user_paused = false;
        self.active_entry = None;
        if let Some(source) = self.stream.source() {
            self.stream.bind(source);
        }
        info!("Workout restarted");
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_user_paused(&self) -> bool {
        self.user_paused
    }

    pub fn summary(&self) -> SessionSummary {
        self.session
            .summary(&self.controller, self.stream.session_elapsed())
    }
}
