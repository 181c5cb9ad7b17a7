use glam::{Mat4, Vec3};

/// Which half of the output a view belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    /// Eye position along the head's x axis (right is +x).
    ///
    /// The left eye sits at `-ipd / 2`, so its view matrix translates the
    /// world by `+ipd / 2`.
    pub fn position_x(self, ipd: f32) -> f32 {
        match self {
            Eye::Left => -ipd / 2.0,
            Eye::Right => ipd / 2.0,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

/// Per-frame matrices shared by both draws, plus one view per eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeViews {
    pub model: Mat4,
    pub left: Mat4,
    pub right: Mat4,
}

impl EyeViews {
    pub fn view(&self, eye: Eye) -> Mat4 {
        match eye {
            Eye::Left => self.left,
            Eye::Right => self.right,
        }
    }
}

/// Builds stereo view matrices from a head rotation.
pub struct StereoViewBuilder;

impl StereoViewBuilder {
    /// Pitch correction for footage shot with the camera tilted off the horizon.
    pub fn model_correction(degrees: f32) -> Mat4 {
        Mat4::from_rotation_x(degrees.to_radians())
    }

    /// `translate(-eye_x) * rotation`: the eye offset is applied in head space,
    /// after the rotation, so it turns with the head.
    pub fn eye_view(applied_rotation: Mat4, ipd: f32, eye: Eye) -> Mat4 {
        let offset = Vec3::new(-eye.position_x(ipd), 0.0, 0.0);
        Mat4::from_translation(offset) * applied_rotation
    }

    pub fn build_eye_views(applied_rotation: Mat4, ipd: f32, model_correction_deg: f32) -> EyeViews {
        EyeViews {
            model: Self::model_correction(model_correction_deg),
            left: Self::eye_view(applied_rotation, ipd, Eye::Left),
            right: Self::eye_view(applied_rotation, ipd, Eye::Right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{EulerRot, Mat3};

    const IPD: f32 = 0.064;

    fn head(yaw: f32, pitch: f32) -> Mat4 {
        // World-to-head rotation, as the tracker stores it.
        Mat4::from_mat3(Mat3::from_euler(EulerRot::YXZ, yaw, pitch, 0.0).transpose())
    }

    fn eye_position(view: Mat4) -> Vec3 {
        view.inverse().transform_point3(Vec3::ZERO)
    }

    #[test]
    fn eye_separation_is_constant_through_a_full_turn() {
        for step in 0..36 {
            let yaw = (step as f32 * 10.0).to_radians();
            let views = StereoViewBuilder::build_eye_views(head(yaw, 0.3), IPD, 0.0);

            let left = eye_position(views.left);
            let right = eye_position(views.right);
            assert!((left.distance(right) - IPD).abs() < 1e-5);

            // Seen from the right eye, the left eye is always straight to its left.
            let left_in_right = views.right.transform_point3(left);
            assert!(left_in_right.abs_diff_eq(Vec3::new(-IPD, 0.0, 0.0), 1e-5));
        }
    }

    #[test]
    fn eyes_straddle_the_head_center() {
        let views = StereoViewBuilder::build_eye_views(Mat4::IDENTITY, IPD, 0.0);
        assert!(eye_position(views.left).abs_diff_eq(Vec3::new(-IPD / 2.0, 0.0, 0.0), 1e-6));
        assert!(eye_position(views.right).abs_diff_eq(Vec3::new(IPD / 2.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn zero_ipd_gives_identical_views() {
        let rotation = head(1.2, -0.4);
        let views = StereoViewBuilder::build_eye_views(rotation, 0.0, 0.0);
        assert_eq!(views.left, rotation);
        assert_eq!(views.right, rotation);
    }

    #[test]
    fn model_correction_pitches_the_horizon() {
        let model = StereoViewBuilder::model_correction(90.0);
        let forward = model.transform_vector3(Vec3::NEG_Z);
        assert!(forward.abs_diff_eq(Vec3::Y, 1e-6));
        assert_eq!(StereoViewBuilder::model_correction(0.0), Mat4::IDENTITY);
    }
}
