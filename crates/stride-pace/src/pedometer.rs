use tracing::{debug, warn};

/// Largest plausible step delta between two pedometer readings.
pub const MAX_STEP_JUMP: u64 = 100;

/// Turns cumulative step-counter readings into plausible step deltas.
///
/// Hardware counters report a running total since boot. The first reading
/// only sets the baseline; zero deltas, counter resets and jumps above
/// [`MAX_STEP_JUMP`] are dropped.
#[derive(Debug, Default)]
pub struct PedometerFilter {
    last: Option<u64>,
}

impl PedometerFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps taken since the previous accepted reading.
    pub fn ingest(&mut self, cumulative: u64) -> u32 {
        let Some(last) = self.last.replace(cumulative) else {
            debug!(cumulative, "Pedometer baseline set");
            return 0;
        };
        if cumulative < last {
            debug!(last, cumulative, "Pedometer counter reset");
            return 0;
        }
        let delta = cumulative - last;
        if delta > MAX_STEP_JUMP {
            warn!(delta, "Implausible pedometer jump dropped");
            return 0;
        }
        delta as u32
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reading_is_baseline() {
        let mut f = PedometerFilter::new();
        assert_eq!(f.ingest(12_345), 0);
        assert_eq!(f.ingest(12_346), 1);
        assert_eq!(f.ingest(12_349), 3);
    }

    #[test]
    fn drops_zero_deltas_and_resets() {
        let mut f = PedometerFilter::new();
        f.ingest(500);
        assert_eq!(f.ingest(500), 0);
        assert_eq!(f.ingest(3), 0);
        assert_eq!(f.ingest(5), 2);
    }

    #[test]
    fn drops_implausible_jumps() {
        let mut f = PedometerFilter::new();
        f.ingest(0);
        assert_eq!(f.ingest(101), 0);
        assert_eq!(f.ingest(201), 100);
    }
}
