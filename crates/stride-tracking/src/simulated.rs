use crate::tracker::to_rows;
use glam::{EulerRot, Mat3};

const PITCH_LIMIT_DEG: f32 = 89.0;

/// Mouse-driven stand-in for a head sensor.
///
/// Accumulates yaw/pitch from pointer deltas and produces the same row-major
/// rotation a real sensor would.
#[derive(Debug, Clone)]
pub struct SimulatedHead {
    yaw_deg: f32,
    pitch_deg: f32,
    /// Degrees per pixel of pointer motion.
    sensitivity: f32,
}

impl SimulatedHead {
    pub fn new(sensitivity: f32) -> Self {
        Self {
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            sensitivity,
        }
    }

    /// Apply a pointer delta. Moving right turns right, moving down looks down.
    pub fn apply_delta(&mut self, dx: f64, dy: f64) {
        self.yaw_deg = (self.yaw_deg - dx as f32 * self.sensitivity).rem_euclid(360.0);
        self.pitch_deg = (self.pitch_deg - dy as f32 * self.sensitivity)
            .clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
    }

    pub fn yaw_deg(&self) -> f32 {
        self.yaw_deg
    }

    pub fn pitch_deg(&self) -> f32 {
        self.pitch_deg
    }

    pub fn rotation_rows(&self) -> [f32; 9] {
        to_rows(Mat3::from_euler(
            EulerRot::YXZ,
            self.yaw_deg.to_radians(),
            self.pitch_deg.to_radians(),
            0.0,
        ))
    }
}

impl Default for SimulatedHead {
    fn default() -> Self {
        Self::new(0.15)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_clamped() {
        let mut head = SimulatedHead::new(1.0);
        head.apply_delta(0.0, -500.0);
        assert_eq!(head.pitch_deg(), PITCH_LIMIT_DEG);
        head.apply_delta(0.0, 1000.0);
        assert_eq!(head.pitch_deg(), -PITCH_LIMIT_DEG);
    }

    #[test]
    fn yaw_wraps() {
        let mut head = SimulatedHead::new(1.0);
        head.apply_delta(90.0, 0.0);
        assert!((head.yaw_deg() - 270.0).abs() < 1e-4);
    }

    #[test]
    fn rows_describe_a_rotation() {
        let mut head = SimulatedHead::default();
        head.apply_delta(123.0, -45.0);
        let m = Mat3::from_cols_array(&head.rotation_rows()).transpose();
        assert!((m * m.transpose()).abs_diff_eq(Mat3::IDENTITY, 1e-5));
    }
}
