use glam::Mat4;
use stride_config::RenderConfig;

/// Per-eye perspective. The camera sits at the sphere's center; only its
/// orientation changes, and that lives in the view matrix.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
}

impl Camera {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            fov_y_degrees: config.fov_y_degrees,
            near: config.near,
            far: config.far,
        }
    }

    /// Perspective projection for one eye viewport of the given aspect (width / height).
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            aspect_ratio.max(f32::EPSILON),
            self.near,
            self.far,
        )
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn sphere_surface_is_inside_the_frustum_depth_range() {
        let config = RenderConfig::default();
        let projection = Camera::from_config(&config).projection_matrix(1.0);
        let ndc = projection.project_point3(Vec3::new(0.0, 0.0, -config.sphere_radius));
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
