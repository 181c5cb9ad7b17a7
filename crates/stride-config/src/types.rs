use serde::{Deserialize, Serialize};

/// Playback multipliers the decoder accepts.
pub const MIN_PLAYBACK_SPEED: f32 = 0.1;
pub const MAX_PLAYBACK_SPEED: f32 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interpupillary distance in meters (typically 0.05-0.08).
    pub ipd: f32,
    /// Source video is side-by-side stereo (true) or a single mono frame (false).
    pub stereo_mode: bool,
    /// Pitch correction for the capture camera's mounting angle, in degrees.
    pub video_rotation: f32,
    /// Decoder output volume, 0.0-1.0.
    pub video_volume: f32,
    /// Step-driven playback speed.
    pub pace: PaceConfig,
    /// Projection sphere and camera.
    pub render: RenderConfig,
    /// Orientation sensor handling.
    pub sensor: SensorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ipd: 0.064,
            stereo_mode: false,
            video_rotation: 0.0,
            video_volume: 1.0,
            pace: PaceConfig::default(),
            render: RenderConfig::default(),
            sensor: SensorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Clamp values loaded from disk into ranges the player can use.
    pub fn sanitize(&mut self) {
        self.ipd = self.ipd.clamp(0.0, 0.2);
        self.video_volume = self.video_volume.clamp(0.0, 1.0);
        if !self.video_rotation.is_finite() {
            self.video_rotation = 0.0;
        }
        self.pace.sanitize();
        self.render.sanitize();
    }

    /// The subset the renderer reads once per frame.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            ipd: self.ipd,
            stereo_mode: self.stereo_mode,
            video_rotation: self.video_rotation,
        }
    }
}

/// Per-frame snapshot of the settings that shape the stereo views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub ipd: f32,
    pub stereo_mode: bool,
    pub video_rotation: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        AppConfig::default().render_settings()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaceConfig {
    /// Idle floor, used below 10 steps/min and as the decay target.
    pub min_speed: f32,
    /// Speed at the bottom of the moving range (10 steps/min).
    pub min_speed_moving: f32,
    /// Ceiling, reached at 120 steps/min.
    pub max_speed: f32,
    /// Fraction of the remaining gap closed per tick (0-1).
    pub speed_smoothing_factor: f32,
    /// Exponent reshaping interpolation progress around its midpoint. 1.0 = linear.
    pub acceleration_curve: f32,
    /// Sliding window for step-frequency estimation.
    pub step_window_ms: u64,
    /// Time after the last step before the target starts fading.
    pub decay_start_ms: u64,
    /// Length of the fade from target speed down to `min_speed`.
    pub decay_duration_ms: u64,
    /// Meters per step.
    pub average_stride_length: f32,
    pub calories_per_km: f32,
    /// Steps required before playback starts.
    pub steps_before_start: u32,
    /// UI tick period for pushing speed into playback.
    pub tick_interval_ms: u64,
}

impl Default for PaceConfig {
    fn default() -> Self {
        Self {
            min_speed: 0.1,
            min_speed_moving: 0.5,
            max_speed: 2.0,
            speed_smoothing_factor: 0.1,
            acceleration_curve: 1.0,
            step_window_ms: 10_000,
            decay_start_ms: 3_000,
            decay_duration_ms: 5_000,
            average_stride_length: 0.75,
            calories_per_km: 60.0,
            steps_before_start: 0,
            tick_interval_ms: 100,
        }
    }
}

impl PaceConfig {
    pub fn sanitize(&mut self) {
        let clamp_speed = |v: f32| v.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED);
        self.min_speed = clamp_speed(self.min_speed);
        self.min_speed_moving = clamp_speed(self.min_speed_moving);
        self.max_speed = clamp_speed(self.max_speed).max(self.min_speed_moving);
        self.speed_smoothing_factor = self.speed_smoothing_factor.clamp(0.0, 1.0);
        self.acceleration_curve = self.acceleration_curve.max(1.0);
        self.step_window_ms = self.step_window_ms.max(1_000);
        self.decay_duration_ms = self.decay_duration_ms.max(1);
        self.average_stride_length = self.average_stride_length.max(0.0);
        self.calories_per_km = self.calories_per_km.max(0.0);
        self.tick_interval_ms = self.tick_interval_ms.max(10);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Projection sphere radius. Must sit between the near and far planes.
    pub sphere_radius: f32,
    pub sphere_stacks: u32,
    pub sphere_sectors: u32,
    /// Vertical field of view per eye, in degrees.
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sphere_radius: 10.0,
            sphere_stacks: 64,
            sphere_sectors: 128,
            fov_y_degrees: 90.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl RenderConfig {
    pub fn sanitize(&mut self) {
        self.sphere_stacks = self.sphere_stacks.max(2);
        self.sphere_sectors = self.sphere_sectors.max(3);
        let defaults = Self::default();
        self.fov_y_degrees = if self.fov_y_degrees.is_finite() {
            self.fov_y_degrees.clamp(10.0, 170.0)
        } else {
            defaults.fov_y_degrees
        };
        if !self.near.is_finite() || self.near <= 0.0 {
            self.near = defaults.near;
        }
        // Room for a sphere between 2x near and half of far.
        if !self.far.is_finite() || self.far < self.near * 4.0 {
            self.far = self.near * 1000.0;
        }
        if !self.sphere_radius.is_finite() {
            self.sphere_radius = defaults.sphere_radius;
        }
        self.sphere_radius = self
            .sphere_radius
            .clamp(self.near * 2.0, self.far * 0.5);
    }
}

/// How the sensor frame is rotated relative to the headset's display frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisRemap {
    /// Sensor frame already matches the display.
    None,
    /// Device rotated 90° counter-clockwise (landscape, top edge to the left).
    LandscapeLeft,
    /// Device rotated 90° clockwise.
    LandscapeRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub axis_remap: AxisRemap,
    /// Madgwick filter beta parameter. Higher = more responsive, less smooth.
    pub madgwick_beta: f32,
    /// Number of stationary samples for gyro bias calibration.
    pub gyro_calibration_samples: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            axis_remap: AxisRemap::LandscapeLeft,
            madgwick_beta: 0.1,
            gyro_calibration_samples: 500,
        }
    }
}
