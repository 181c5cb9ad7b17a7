pub mod fusion;
pub mod remap;
pub mod shared;
pub mod simulated;
pub mod tracker;
pub mod types;

use fusion::SensorFusion;
use glam::Mat4;
pub use shared::SharedOrientation;
pub use simulated::SimulatedHead;
use stride_config::{AxisRemap, SensorConfig};
use tokio::sync::mpsc;
pub use tracker::OrientationTracker;
pub use types::{RawImuSample, SensorSample};

/// Commands sent to the sensor processing task.
enum TrackerCommand {
    RecalibrateGyro(u32),
}

/// Head tracking service.
///
/// Consumes sensor samples on a background task, fuses raw IMU readings when
/// needed, remaps axes to the display frame and publishes the latest rotation
/// into a [`SharedOrientation`] the render thread reads once per frame.
pub struct HeadTracker {
    orientation: SharedOrientation,
    command_tx: mpsc::UnboundedSender<TrackerCommand>,
    _task: tokio::task::JoinHandle<()>,
}

impl HeadTracker {
    /// Start processing samples. Must be called from within a tokio runtime.
    pub fn spawn(
        samples: mpsc::Receiver<SensorSample>,
        config: &SensorConfig,
        sample_rate_hz: f32,
    ) -> Self {
        let orientation = SharedOrientation::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let fusion = SensorFusion::new(
            config.madgwick_beta,
            config.gyro_calibration_samples,
            sample_rate_hz,
        );

        tracing::info!(axis_remap = ?config.axis_remap, sample_rate_hz, "Head tracker started");
        let task = tokio::spawn(sensor_loop(
            samples,
            command_rx,
            orientation.clone(),
            fusion,
            config.axis_remap,
        ));

        Self {
            orientation,
            command_tx,
            _task: task,
        }
    }

    /// Shared handle to the tracked orientation.
    pub fn orientation(&self) -> SharedOrientation {
        self.orientation.clone()
    }

    /// Latest applied rotation (non-blocking).
    pub fn snapshot(&self) -> Mat4 {
        self.orientation.snapshot()
    }

    /// Make the current head orientation the forward direction.
    pub fn calibrate(&self) -> bool {
        self.orientation.calibrate()
    }

    /// Restart gyro bias calibration for raw IMU input.
    pub fn recalibrate_gyro(&self, samples: u32) {
        if self
            .command_tx
            .send(TrackerCommand::RecalibrateGyro(samples))
            .is_err()
        {
            tracing::debug!(samples, "Gyro recalibration dropped; sensor task has stopped");
        }
    }
}

/// Background task: receive samples, fuse and remap, publish orientation.
async fn sensor_loop(
    mut samples: mpsc::Receiver<SensorSample>,
    mut command_rx: mpsc::UnboundedReceiver<TrackerCommand>,
    orientation: SharedOrientation,
    mut fusion: SensorFusion,
    axis: AxisRemap,
) {
    let mut sample_count: u64 = 0;

    loop {
        tokio::select! {
            sample = samples.recv() => {
                let Some(sample) = sample else {
                    tracing::info!("Sensor source closed");
                    break;
                };
                let rows = match sample {
                    SensorSample::Rotation(rows) => Some(rows),
                    SensorSample::DeviceRotation(rows) => Some(remap::remap(axis, &rows)),
                    SensorSample::Imu(raw) => fusion.update(&raw).map(|rows| remap::remap(axis, &rows)),
                };
                if let Some(rows) = rows {
                    orientation.update_rotation(&rows);
                }
                sample_count += 1;
                if sample_count % 1000 == 0 {
                    tracing::debug!(sample_count, "Sensor samples processed");
                }
            }
            Some(cmd) = command_rx.recv() => {
                match cmd {
                    TrackerCommand::RecalibrateGyro(n) => fusion.recalibrate(n),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat3;
    use std::time::Duration;
    use tracker::to_rows;

    async fn wait_for_reading(tracker: &HeadTracker) {
        for _ in 0..200 {
            if tracker.orientation().has_reading() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no reading published");
    }

    #[tokio::test]
    async fn publishes_display_frame_rotation() {
        let (tx, rx) = mpsc::channel(16);
        let config = SensorConfig {
            axis_remap: AxisRemap::LandscapeLeft,
            ..SensorConfig::default()
        };
        let tracker = HeadTracker::spawn(rx, &config, 100.0);

        let rows = to_rows(Mat3::from_rotation_y(0.5));
        tx.send(SensorSample::Rotation(rows)).await.unwrap();
        wait_for_reading(&tracker).await;

        let expected = Mat4::from_mat3(Mat3::from_rotation_y(0.5).transpose());
        assert!(tracker.snapshot().abs_diff_eq(expected, 1e-6));
        assert!(tracker.calibrate());
        assert!(tracker.snapshot().abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[tokio::test]
    async fn device_rotation_is_remapped() {
        let (tx, rx) = mpsc::channel(16);
        let config = SensorConfig {
            axis_remap: AxisRemap::LandscapeLeft,
            ..SensorConfig::default()
        };
        let tracker = HeadTracker::spawn(rx, &config, 100.0);

        let rows = to_rows(Mat3::IDENTITY);
        tx.send(SensorSample::DeviceRotation(rows)).await.unwrap();
        wait_for_reading(&tracker).await;

        let expected = Mat4::from_mat3(Mat3::from_cols_array(&remap::remap(
            AxisRemap::LandscapeLeft,
            &rows,
        )));
        assert_eq!(tracker.snapshot(), expected);
        assert_ne!(tracker.snapshot(), Mat4::IDENTITY);
    }

    #[tokio::test]
    async fn raw_imu_waits_for_gyro_bias() {
        let (tx, rx) = mpsc::channel(64);
        let config = SensorConfig {
            axis_remap: AxisRemap::None,
            gyro_calibration_samples: 5,
            ..SensorConfig::default()
        };
        let tracker = HeadTracker::spawn(rx, &config, 100.0);
        let still = RawImuSample {
            gyro: glam::Vec3::ZERO,
            accel: glam::Vec3::new(0.0, 0.0, 9.81),
        };

        for _ in 0..5 {
            tx.send(SensorSample::Imu(still)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!tracker.orientation().has_reading());

        tx.send(SensorSample::Imu(still)).await.unwrap();
        wait_for_reading(&tracker).await;
    }

    #[tokio::test]
    async fn recalibration_after_source_closed_is_harmless() {
        let (tx, rx) = mpsc::channel(4);
        let tracker = HeadTracker::spawn(rx, &SensorConfig::default(), 100.0);
        drop(tx);
        for _ in 0..200 {
            if tracker._task.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(tracker._task.is_finished());
        tracker.recalibrate_gyro(10);
        assert!(!tracker.orientation().has_reading());
    }
}
