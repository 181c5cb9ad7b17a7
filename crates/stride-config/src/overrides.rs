use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Parameter values pushed in from outside the player (e.g. a timecode file).
///
/// `None` leaves the current setting untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterOverrides {
    pub ipd: Option<f32>,
    pub min_speed: Option<f32>,
    pub min_speed_moving: Option<f32>,
    pub max_speed: Option<f32>,
    pub video_rotation: Option<f32>,
    pub video_volume: Option<f32>,
}

impl ParameterOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Text overlay passed through to the UI layer. The player never draws it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub text: String,
    /// Normalized screen position (0-1, origin top-left).
    pub position: [f32; 2],
    /// Text height as a fraction of the eye viewport height.
    pub size: f32,
    /// RGBA, 0-1.
    pub text_color: [f32; 4],
    pub background_color: [f32; 4],
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            position: [0.5, 0.8],
            size: 0.05,
            text_color: [1.0, 1.0, 1.0, 1.0],
            background_color: [0.0, 0.0, 0.0, 0.5],
        }
    }
}

/// One scheduled change, active from `at_ms` until the next entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimecodeEntry {
    pub at_ms: u64,
    #[serde(default)]
    pub overrides: ParameterOverrides,
    #[serde(default)]
    pub overlay: Option<OverlayConfig>,
}

/// Playback-position keyed parameter changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimecodeSchedule {
    entries: Vec<TimecodeEntry>,
}

impl TimecodeSchedule {
    pub fn new(mut entries: Vec<TimecodeEntry>) -> Self {
        entries.sort_by_key(|e| e.at_ms);
        Self { entries }
    }

    /// Load a JSON schedule: `{ "entries": [ { "at_ms": 0, "overrides": {...}, "overlay": {...} } ] }`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let schedule = Self::from_json(&contents)?;
        info!(?path, entries = schedule.len(), "Loaded timecode schedule");
        Ok(schedule)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: TimecodeSchedule = serde_json::from_str(json)?;
        Ok(Self::new(parsed.entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index and entry in effect at `position_ms`, if any has started yet.
    pub fn active_at(&self, position_ms: u64) -> Option<(usize, &TimecodeEntry)> {
        let idx = self.entries.partition_point(|e| e.at_ms <= position_ms);
        idx.checked_sub(1).map(|i| (i, &self.entries[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: &str = r#"{
        "entries": [
            { "at_ms": 30000, "overrides": { "max_speed": 1.5 } },
            { "at_ms": 0, "overrides": { "video_volume": 0.8 },
              "overlay": { "text": "Warm up" } },
            { "at_ms": 60000, "overlay": { "text": "Hill ahead", "size": 0.08 } }
        ]
    }"#;

    #[test]
    fn entries_sorted_by_timecode() {
        let schedule = TimecodeSchedule::from_json(SCHEDULE).unwrap();
        assert_eq!(schedule.len(), 3);

        let (idx, entry) = schedule.active_at(0).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(entry.overrides.video_volume, Some(0.8));
        assert_eq!(entry.overlay.as_ref().unwrap().text, "Warm up");
    }

    #[test]
    fn active_entry_is_latest_started() {
        let schedule = TimecodeSchedule::from_json(SCHEDULE).unwrap();
        assert_eq!(schedule.active_at(29_999).unwrap().0, 0);
        assert_eq!(schedule.active_at(30_000).unwrap().0, 1);
        let (idx, entry) = schedule.active_at(90_000).unwrap();
        assert_eq!(idx, 2);
        assert!(entry.overrides.is_empty());
        assert!((entry.overlay.as_ref().unwrap().size - 0.08).abs() < 1e-6);
    }

    #[test]
    fn nothing_active_before_first_entry() {
        let schedule = TimecodeSchedule::new(vec![TimecodeEntry {
            at_ms: 5_000,
            overrides: ParameterOverrides::default(),
            overlay: None,
        }]);
        assert!(schedule.active_at(4_999).is_none());
        assert!(TimecodeSchedule::default().active_at(0).is_none());
    }
}
