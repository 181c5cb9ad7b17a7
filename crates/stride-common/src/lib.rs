//! Shared infrastructure for the stridevr crates.

pub mod clock;

pub use clock::{Clock, SystemClock, TestClock};
