use glam::Vec3;

/// Raw inertial reading.
#[derive(Debug, Clone, Copy)]
pub struct RawImuSample {
    /// Gyroscope angular velocity (rad/s).
    pub gyro: Vec3,
    /// Accelerometer linear acceleration (m/s^2).
    pub accel: Vec3,
}

/// One reading delivered to the head tracker.
///
/// Matrices are row-major 3x3 head-to-world rotations.
#[derive(Debug, Clone, Copy)]
pub enum SensorSample {
    /// Fused rotation in the sensor's native (portrait) frame; remapped before use.
    DeviceRotation([f32; 9]),
    /// Rotation already expressed in the display frame.
    Rotation([f32; 9]),
    /// Raw gyro + accelerometer, fused in-process and then remapped.
    Imu(RawImuSample),
}
