//! Step-driven playback pace: cadence to speed, pedometer filtering and
//! workout totals.

pub mod controller;
pub mod pedometer;
pub mod session;

pub use controller::{acceleration_curve, target_for_cadence, StepSpeedController};
pub use pedometer::PedometerFilter;
pub use session::{SessionSummary, WorkoutSession};
