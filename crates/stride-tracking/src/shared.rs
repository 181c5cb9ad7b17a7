use crate::tracker::OrientationTracker;
use glam::Mat4;
use parking_lot::Mutex;
use std::sync::Arc;

/// Tracker shared between the sensor task (writer) and the render thread (reader).
///
/// Every access holds the lock for one whole-matrix update or copy, so a
/// reader never sees a half-written rotation.
#[derive(Clone, Default)]
pub struct SharedOrientation {
    inner: Arc<Mutex<OrientationTracker>>,
}

impl SharedOrientation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_rotation(&self, rows: &[f32; 9]) {
        self.inner.lock().update_rotation(rows);
    }

    pub fn calibrate(&self) -> bool {
        self.inner.lock().calibrate()
    }

    pub fn clear_calibration(&self) {
        self.inner.lock().clear_calibration();
    }

    /// Copy of the applied rotation. Take once per frame and reuse it for both eyes.
    pub fn snapshot(&self) -> Mat4 {
        self.inner.lock().applied_rotation()
    }

    pub fn is_calibrated(&self) -> bool {
        self.inner.lock().is_calibrated()
    }

    pub fn has_reading(&self) -> bool {
        self.inner.lock().has_reading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{is_rotation, to_rows};
    use glam::Mat3;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn concurrent_reads_never_tear() {
        let shared = SharedOrientation::new();
        let a = Mat3::from_rotation_y(1.1);
        let b = Mat3::from_rotation_x(-0.7) * Mat3::from_rotation_z(2.3);
        let rows_a = to_rows(a);
        let rows_b = to_rows(b);
        let expect_a = Mat4::from_mat3(a.transpose());
        let expect_b = Mat4::from_mat3(b.transpose());
        shared.update_rotation(&rows_a);

        let done = AtomicBool::new(false);
        std::thread::scope(|s| {
            let writer = shared.clone();
            let done_ref = &done;
            s.spawn(move || {
                for i in 0..20_000 {
                    writer.update_rotation(if i % 2 == 0 { &rows_b } else { &rows_a });
                }
                done_ref.store(true, Ordering::Release);
            });

            let mut reads = 0u32;
            while !done.load(Ordering::Acquire) || reads < 1_000 {
                let m = shared.snapshot();
                assert!(is_rotation(m, 1e-5));
                assert!(m == expect_a || m == expect_b, "torn read: {m:?}");
                reads += 1;
            }
        });
    }

    #[test]
    fn calibrate_through_handle() {
        let shared = SharedOrientation::new();
        assert!(!shared.calibrate());

        shared.update_rotation(&to_rows(Mat3::from_rotation_y(0.4)));
        let reader = shared.clone();
        assert!(reader.calibrate());
        assert!(shared.is_calibrated());
        assert!(shared.snapshot().abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }
}
