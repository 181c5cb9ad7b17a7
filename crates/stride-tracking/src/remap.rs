//! Sensor-to-display axis remapping for a phone mounted landscape in a headset.

use glam::{Mat3, Vec3};
use stride_config::AxisRemap;

/// Express a row-major head-to-world rotation in the display's axes.
///
/// The result is `R * P`, where the columns of `P` are the display's x/y/z
/// axes written in sensor coordinates.
pub fn remap(axis: AxisRemap, rows: &[f32; 9]) -> [f32; 9] {
    let p = match axis {
        AxisRemap::None => return *rows,
        // Display x = sensor y, display y = -sensor x.
        AxisRemap::LandscapeLeft => Mat3::from_cols(Vec3::Y, Vec3::NEG_X, Vec3::Z),
        // Display x = -sensor y, display y = sensor x.
        AxisRemap::LandscapeRight => Mat3::from_cols(Vec3::NEG_Y, Vec3::X, Vec3::Z),
    };
    let r = Mat3::from_cols_array(rows).transpose();
    (r * p).transpose().to_cols_array()
}
