use crate::types::RawImuSample;
use ahrs::{Ahrs, Madgwick};
use glam::{Mat3, Quat, Vec3};
use nalgebra::Vector3;

/// Sensor fusion using the Madgwick AHRS filter.
///
/// Turns raw gyro + accelerometer readings into a row-major head-to-world
/// rotation matrix, for sources that don't deliver a fused rotation.
pub struct SensorFusion {
    filter: Madgwick<f64>,
    /// Gyroscope bias (average of calibration samples).
    gyro_bias: Vec3,
    calibration: BiasState,
}

enum BiasState {
    Collecting { samples: Vec<Vec3>, target: usize },
    Calibrated,
}

impl SensorFusion {
    pub fn new(beta: f32, calibration_samples: u32, sample_rate_hz: f32) -> Self {
        let sample_period = 1.0 / sample_rate_hz.max(1.0) as f64;
        Self {
            filter: Madgwick::new(sample_period, beta as f64),
            gyro_bias: Vec3::ZERO,
            calibration: Self::collecting(calibration_samples),
        }
    }

    fn collecting(samples: u32) -> BiasState {
        if samples == 0 {
            BiasState::Calibrated
        } else {
            BiasState::Collecting {
                samples: Vec::with_capacity(samples as usize),
                target: samples as usize,
            }
        }
    }

    /// Process one reading; `None` while the gyro bias is still being measured.
    pub fn update(&mut self, sample: &RawImuSample) -> Option<[f32; 9]> {
        match &mut self.calibration {
            BiasState::Collecting { samples, target } => {
                samples.push(sample.gyro);
                if samples.len() >= *target {
                    let sum: Vec3 = samples.iter().copied().sum();
                    self.gyro_bias = sum / samples.len() as f32;
                    self.calibration = BiasState::Calibrated;
                    tracing::info!(
                        bias_x = self.gyro_bias.x,
                        bias_y = self.gyro_bias.y,
                        bias_z = self.gyro_bias.z,
                        "Gyro bias calibration complete"
                    );
                }
                None
            }
            BiasState::Calibrated => {
                let gyro = sample.gyro - self.gyro_bias;
                let gyro = Vector3::new(gyro.x as f64, gyro.y as f64, gyro.z as f64);
                let accel = Vector3::new(
                    sample.accel.x as f64,
                    sample.accel.y as f64,
                    sample.accel.z as f64,
                );

                let q = match self.filter.update_imu(&gyro, &accel) {
                    Ok(q) => *q,
                    Err(_) => return None,
                };
                let orientation = Quat::from_xyzw(
                    q.coords[0] as f32,
                    q.coords[1] as f32,
                    q.coords[2] as f32,
                    q.coords[3] as f32,
                )
                .normalize();

                Some(Mat3::from_quat(orientation).transpose().to_cols_array())
            }
        }
    }

    /// Restart gyro bias calibration.
    pub fn recalibrate(&mut self, samples: u32) {
        self.calibration = Self::collecting(samples);
        self.gyro_bias = Vec3::ZERO;
        tracing::info!(samples, "Gyro recalibration started");
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self.calibration, BiasState::Calibrated)
    }

    pub fn gyro_bias(&self) -> Vec3 {
        self.gyro_bias
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still(bias: Vec3) -> RawImuSample {
        RawImuSample {
            gyro: bias,
            accel: Vec3::new(0.0, 0.0, 9.81),
        }
    }

    #[test]
    fn collects_bias_before_output() {
        let bias = Vec3::new(0.01, -0.02, 0.005);
        let mut fusion = SensorFusion::new(0.1, 10, 100.0);
        for _ in 0..9 {
            assert!(fusion.update(&still(bias)).is_none());
        }
        assert!(!fusion.is_calibrated());
        assert!(fusion.update(&still(bias)).is_none());
        assert!(fusion.is_calibrated());
        assert!(fusion.gyro_bias().abs_diff_eq(bias, 1e-6));
    }

    #[test]
    fn stationary_device_yields_proper_rotation() {
        let mut fusion = SensorFusion::new(0.1, 0, 100.0);
        let mut last = None;
        for _ in 0..200 {
            last = fusion.update(&still(Vec3::ZERO)).or(last);
        }
        let m = Mat3::from_cols_array(&last.unwrap()).transpose();
        assert!((m * m.transpose()).abs_diff_eq(Mat3::IDENTITY, 1e-4));
        assert!((m.determinant() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn recalibrate_resets_bias() {
        let mut fusion = SensorFusion::new(0.1, 2, 100.0);
        fusion.update(&still(Vec3::splat(0.1)));
        fusion.update(&still(Vec3::splat(0.1)));
        assert!(fusion.is_calibrated());

        fusion.recalibrate(3);
        assert!(!fusion.is_calibrated());
        assert_eq!(fusion.gyro_bias(), Vec3::ZERO);
    }
}
