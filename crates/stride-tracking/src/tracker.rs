use glam::{Mat3, Mat4};
use tracing::{debug, info};

/// Head orientation with "set forward" calibration.
///
/// Sensor matrices arrive row-major (head-to-world). They are embedded
/// column-major as-is, so `raw` holds the transpose: the world-to-head
/// rotation the view transform needs.
///
/// `applied = calibration * raw` when calibrated, otherwise `applied = raw`.
/// The calibration offset is always taken from `raw`, so recalibrating
/// replaces the offset instead of composing onto it.
#[derive(Debug, Clone)]
pub struct OrientationTracker {
    raw: Mat4,
    applied: Mat4,
    calibration: Option<Mat4>,
    has_reading: bool,
}

impl OrientationTracker {
    pub fn new() -> Self {
        Self {
            raw: Mat4::IDENTITY,
            applied: Mat4::IDENTITY,
            calibration: None,
            has_reading: false,
        }
    }

    /// Store a new sensor rotation (row-major 3x3). Allocation-free.
    pub fn update_rotation(&mut self, rows: &[f32; 9]) {
        self.raw = Mat4::from_mat3(Mat3::from_cols_array(rows));
        self.has_reading = true;
        self.recompute();
    }

    /// Make the current head orientation the forward direction.
    ///
    /// Returns `false` (and changes nothing) if no rotation has been received yet.
    pub fn calibrate(&mut self) -> bool {
        if !self.has_reading {
            debug!("Calibration requested before any sensor reading; ignored");
            return false;
        }
        // Transpose is the inverse for a pure rotation.
        self.calibration = Some(self.raw.transpose());
        self.recompute();
        info!("Orientation calibrated");
        true
    }

    pub fn clear_calibration(&mut self) {
        self.calibration = None;
        self.recompute();
    }

    pub fn applied_rotation(&self) -> Mat4 {
        self.applied
    }

    pub fn raw_rotation(&self) -> Mat4 {
        self.raw
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn has_reading(&self) -> bool {
        self.has_reading
    }

    fn recompute(&mut self) {
        self.applied = match self.calibration {
            Some(offset) => offset * self.raw,
            None => self.raw,
        };
    }
}

impl Default for OrientationTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Row-major layout of a rotation, as a sensor would deliver it.
pub fn to_rows(m: Mat3) -> [f32; 9] {
    m.transpose().to_cols_array()
}

/// Orthonormal with determinant +1, within `eps`.
pub fn is_rotation(m: Mat4, eps: f32) -> bool {
    let r = Mat3::from_mat4(m);
    (r * r.transpose()).abs_diff_eq(Mat3::IDENTITY, eps) && (r.determinant() - 1.0).abs() < eps
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::EulerRot;

    fn head(yaw_deg: f32, pitch_deg: f32, roll_deg: f32) -> [f32; 9] {
        to_rows(Mat3::from_euler(
            EulerRot::YXZ,
            yaw_deg.to_radians(),
            pitch_deg.to_radians(),
            roll_deg.to_radians(),
        ))
    }

    #[test]
    fn embeds_into_homogeneous_matrix() {
        let mut tracker = OrientationTracker::new();
        tracker.update_rotation(&head(30.0, 10.0, -5.0));
        let raw = tracker.raw_rotation();

        assert_eq!(raw.w_axis, glam::Vec4::W);
        assert_eq!(raw.x_axis.w, 0.0);
        assert_eq!(raw.y_axis.w, 0.0);
        assert_eq!(raw.z_axis.w, 0.0);
        assert!(is_rotation(raw, 1e-5));
        // Uncalibrated: applied is the raw rotation.
        assert_eq!(tracker.applied_rotation(), raw);
    }

    #[test]
    fn calibrate_without_reading_is_noop() {
        let mut tracker = OrientationTracker::new();
        assert!(!tracker.calibrate());
        assert!(!tracker.is_calibrated());
        assert_eq!(tracker.applied_rotation(), Mat4::IDENTITY);
    }

    #[test]
    fn calibration_makes_current_view_forward() {
        let mut tracker = OrientationTracker::new();
        tracker.update_rotation(&head(75.0, -20.0, 8.0));
        assert!(tracker.calibrate());
        assert!(tracker
            .applied_rotation()
            .abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn repeated_calibration_does_not_stack() {
        let rows = head(-40.0, 15.0, 3.0);

        let mut once = OrientationTracker::new();
        once.update_rotation(&rows);
        once.calibrate();

        let mut twice = OrientationTracker::new();
        twice.update_rotation(&rows);
        twice.calibrate();
        twice.calibrate();

        assert!(twice
            .applied_rotation()
            .abs_diff_eq(once.applied_rotation(), 1e-6));
        assert!(twice
            .applied_rotation()
            .abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn calibration_idempotent_after_prior_calibrations() {
        let mut tracker = OrientationTracker::new();
        for (yaw, pitch) in [(10.0, 0.0), (200.0, 45.0), (-90.0, -30.0)] {
            tracker.update_rotation(&head(yaw, pitch, 0.0));
            tracker.calibrate();
        }

        let rows = head(123.0, -7.0, 21.0);
        tracker.update_rotation(&rows);
        tracker.calibrate();
        assert!(tracker
            .applied_rotation()
            .abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn turning_after_calibration_is_relative() {
        let mut tracker = OrientationTracker::new();
        tracker.update_rotation(&head(90.0, 0.0, 0.0));
        tracker.calibrate();

        tracker.update_rotation(&head(120.0, 0.0, 0.0));
        let expected = Mat4::from_rotation_y((-30.0_f32).to_radians());
        assert!(tracker.applied_rotation().abs_diff_eq(expected, 1e-5));
        assert!(is_rotation(tracker.applied_rotation(), 1e-5));
    }

    #[test]
    fn clearing_calibration_restores_raw() {
        let mut tracker = OrientationTracker::new();
        tracker.update_rotation(&head(50.0, 5.0, 0.0));
        tracker.calibrate();
        tracker.clear_calibration();
        assert_eq!(tracker.applied_rotation(), tracker.raw_rotation());
    }
}
