use crate::overrides::{OverlayConfig, ParameterOverrides};
use crate::types::{AppConfig, PaceConfig, RenderSettings, MAX_PLAYBACK_SPEED, MIN_PLAYBACK_SPEED};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Thread-safe settings shared by the render loop, the speed tick and the UI.
///
/// Readers take a snapshot at a defined point (frame start, tick start) and
/// use it for the whole operation.
#[derive(Clone, Default)]
pub struct SettingsStore {
    inner: Arc<RwLock<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    config: AppConfig,
    overlay: Option<OverlayConfig>,
}

impl SettingsStore {
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreState {
                config,
                overlay: None,
            })),
        }
    }

    pub fn snapshot(&self) -> AppConfig {
        self.inner.read().config.clone()
    }

    pub fn render_settings(&self) -> RenderSettings {
        self.inner.read().config.render_settings()
    }

    pub fn pace(&self) -> PaceConfig {
        self.inner.read().config.pace
    }

    pub fn video_volume(&self) -> f32 {
        self.inner.read().config.video_volume
    }

    pub fn update(&self, f: impl FnOnce(&mut AppConfig)) {
        let mut state = self.inner.write();
        f(&mut state.config);
    }

    pub fn set_ipd(&self, ipd: f32) {
        self.inner.write().config.ipd = ipd.clamp(0.0, 0.2);
    }

    pub fn set_stereo_mode(&self, stereo: bool) {
        self.inner.write().config.stereo_mode = stereo;
    }

    pub fn set_video_rotation(&self, degrees: f32) {
        if degrees.is_finite() {
            self.inner.write().config.video_rotation = degrees;
        }
    }

    pub fn set_video_volume(&self, volume: f32) {
        self.inner.write().config.video_volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_min_speed(&self, speed: f32) {
        self.inner.write().config.pace.min_speed = clamp_speed(speed);
    }

    pub fn set_min_speed_moving(&self, speed: f32) {
        self.inner.write().config.pace.min_speed_moving = clamp_speed(speed);
    }

    pub fn set_max_speed(&self, speed: f32) {
        let mut state = self.inner.write();
        let speed = clamp_speed(speed);
        if speed < state.config.pace.min_speed_moving {
            warn!(
                max_speed = speed,
                min_speed_moving = state.config.pace.min_speed_moving,
                "max_speed below min_speed_moving"
            );
        }
        state.config.pace.max_speed = speed;
    }

    /// Apply every present override in one write.
    pub fn apply_overrides(&self, overrides: &ParameterOverrides) {
        if overrides.is_empty() {
            return;
        }
        let mut state = self.inner.write();
        let config = &mut state.config;
        if let Some(ipd) = overrides.ipd {
            config.ipd = ipd.clamp(0.0, 0.2);
        }
        if let Some(v) = overrides.min_speed {
            config.pace.min_speed = clamp_speed(v);
        }
        if let Some(v) = overrides.min_speed_moving {
            config.pace.min_speed_moving = clamp_speed(v);
        }
        if let Some(v) = overrides.max_speed {
            config.pace.max_speed = clamp_speed(v);
        }
        if let Some(v) = overrides.video_rotation.filter(|v| v.is_finite()) {
            config.video_rotation = v;
        }
        if let Some(v) = overrides.video_volume {
            config.video_volume = v.clamp(0.0, 1.0);
        }
        debug!(?overrides, "Parameter overrides applied");
    }

    pub fn set_overlay(&self, overlay: Option<OverlayConfig>) {
        self.inner.write().overlay = overlay;
    }

    pub fn current_overlay(&self) -> Option<OverlayConfig> {
        self.inner.read().overlay.clone()
    }
}

fn clamp_speed(speed: f32) -> f32 {
    speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_clamp() {
        let store = SettingsStore::new(AppConfig::default());
        store.set_video_volume(1.5);
        store.set_max_speed(9.0);
        store.set_min_speed(0.0);
        store.set_ipd(-1.0);

        let config = store.snapshot();
        assert_eq!(config.video_volume, 1.0);
        assert_eq!(config.pace.max_speed, MAX_PLAYBACK_SPEED);
        assert_eq!(config.pace.min_speed, MIN_PLAYBACK_SPEED);
        assert_eq!(config.ipd, 0.0);
    }

    #[test]
    fn overrides_only_touch_present_fields() {
        let store = SettingsStore::new(AppConfig::default());
        let before = store.snapshot();

        store.apply_overrides(&ParameterOverrides {
            max_speed: Some(1.2),
            video_rotation: Some(-12.0),
            ..Default::default()
        });

        let after = store.snapshot();
        assert!((after.pace.max_speed - 1.2).abs() < 1e-6);
        assert!((after.video_rotation + 12.0).abs() < 1e-6);
        assert_eq!(after.ipd, before.ipd);
        assert_eq!(after.pace.min_speed, before.pace.min_speed);
        assert_eq!(after.video_volume, before.video_volume);
    }

    #[test]
    fn clones_share_state() {
        let store = SettingsStore::new(AppConfig::default());
        let reader = store.clone();
        store.set_stereo_mode(true);
        assert!(reader.render_settings().stereo_mode);
    }

    #[test]
    fn overlay_passes_through() {
        let store = SettingsStore::default();
        assert!(store.current_overlay().is_none());
        store.set_overlay(Some(OverlayConfig {
            text: "Halfway".into(),
            ..Default::default()
        }));
        assert_eq!(store.current_overlay().unwrap().text, "Halfway");
    }
}
