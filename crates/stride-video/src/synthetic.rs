use crate::backend::{BackendEvent, MediaBackend};
use crate::error::MediaError;
use crate::frame::VideoFrame;
use std::sync::Arc;
use std::time::Instant;
use stride_common::Clock;
use tracing::{debug, info};

const WIDTH: u32 = 512;
const HEIGHT: u32 = 256;
const FRAME_INTERVAL_MS: f64 = 1000.0 / 30.0;

/// Clock-driven equirectangular test pattern.
///
/// Behaves like a real decoder for the stream's purposes: position advances
/// with the playback rate, seeks land on the next poll, and the end of the
/// source is reported once per playthrough.
pub struct SyntheticBackend {
    clock: Arc<dyn Clock>,
    duration_ms: u64,
    position_ms: f64,
    rate: f32,
    /// Set while playing; position advances from here.
    running_since: Option<Instant>,
    pending_seek: Option<u64>,
    at_end: bool,
    end_reported: bool,
    last_frame_index: Option<u64>,
    sequence: u64,
    released: bool,
}

impl SyntheticBackend {
    pub fn new(clock: Arc<dyn Clock>, duration_ms: u64) -> Self {
        info!(duration_ms, "Synthetic video source prepared");
        Self {
            clock,
            duration_ms,
            position_ms: 0.0,
            rate: 1.0,
            running_since: None,
            pending_seek: None,
            at_end: false,
            end_reported: false,
            last_frame_index: None,
            sequence: 0,
            released: false,
        }
    }

    fn current_position(&self) -> f64 {
        let mut pos = self.position_ms;
        if let Some(since) = self.running_since {
            let elapsed = self.clock.now().saturating_duration_since(since);
            pos += elapsed.as_secs_f64() * 1000.0 * self.rate as f64;
        }
        pos.min(self.duration_ms as f64)
    }

    /// Fold elapsed time into `position_ms` and detect the end of the source.
    fn advance(&mut self) {
        self.position_ms = self.current_position();
        if self.running_since.is_some() {
            self.running_since = Some(self.clock.now());
        }
        if self.position_ms >= self.duration_ms as f64 && !self.at_end {
            self.at_end = true;
            self.running_since = None;
            debug!(duration_ms = self.duration_ms, "Synthetic source reached end");
        }
    }

    fn render(&self, position_ms: f64) -> Vec<u8> {
        let progress = (position_ms / self.duration_ms.max(1) as f64) as f32;
        let marker_x = (progress * WIDTH as f32) as u32;
        let mut data = Vec::with_capacity(VideoFrame::expected_len(WIDTH, HEIGHT));
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let u = x as f32 / WIDTH as f32;
                let v = y as f32 / HEIGHT as f32;
                // Meridians every 30 degrees, parallels every 30 degrees, horizon in white.
                let grid = x % (WIDTH / 12) == 0 || y % (HEIGHT / 6) == 0;
                let horizon = y == HEIGHT / 2;
                let marker = x.abs_diff(marker_x) < 3 && v > 0.45 && v < 0.55;
                let px = if horizon || marker {
                    [255, 255, 255, 255]
                } else if grid {
                    [20, 20, 20, 255]
                } else {
                    [(u * 255.0) as u8, (v * 255.0) as u8, ((1.0 - u) * 200.0) as u8, 255]
                };
                data.extend_from_slice(&px);
            }
        }
        data
    }
}

impl MediaBackend for SyntheticBackend {
    fn start(&mut self) -> Result<(), MediaError> {
        if self.released {
            return Err(MediaError::unknown("synthetic source already released"));
        }
        self.advance();
        if !self.at_end && self.running_since.is_none() {
            self.running_since = Some(self.clock.now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.advance();
        self.running_since = None;
    }

    fn set_rate(&mut self, rate: f32) {
        self.advance();
        self.rate = rate;
    }

    /// The test pattern is silent.
    fn set_volume(&mut self, _volume: f32) {}

    fn seek(&mut self, position_ms: u64) {
        self.pending_seek = Some(position_ms.min(self.duration_ms));
    }

    fn position_ms(&self) -> u64 {
        self.current_position() as u64
    }

    fn duration_ms(&self) -> Option<u64> {
        Some(self.duration_ms)
    }

    fn try_pull_frame(&mut self) -> Option<VideoFrame> {
        if self.released {
            return None;
        }
        self.advance();
        let index = (self.position_ms / FRAME_INTERVAL_MS) as u64;
        if self.last_frame_index == Some(index) {
            return None;
        }
        self.last_frame_index = Some(index);
        self.sequence += 1;
        Some(VideoFrame {
            width: WIDTH,
            height: HEIGHT,
            pts_ms: self.position_ms as u64,
            sequence: self.sequence,
            data: self.render(self.position_ms).into(),
        })
    }

    fn poll_event(&mut self) -> Option<BackendEvent> {
        if self.released {
            return None;
        }
        if let Some(target) = self.pending_seek.take() {
            let playing = self.running_since.is_some();
            self.position_ms = target as f64;
            self.at_end = false;
            self.end_reported = false;
            self.last_frame_index = None;
            self.running_since = playing.then(|| self.clock.now());
        }
        self.advance();
        if self.at_end && !self.end_reported {
            self.end_reported = true;
            return Some(BackendEvent::EndOfStream);
        }
        None
    }

    fn release(&mut self) {
        self.released = true;
        self.running_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_common::TestClock;

    fn backend(duration_ms: u64) -> (Arc<TestClock>, SyntheticBackend) {
        let clock = TestClock::shared();
        let backend = SyntheticBackend::new(clock.clone(), duration_ms);
        (clock, backend)
    }

    #[test]
    fn position_follows_rate() {
        let (clock, mut b) = backend(10_000);
        b.start().unwrap();
        clock.advance_ms(1_000);
        assert_eq!(b.position_ms(), 1_000);

        b.set_rate(2.0);
        clock.advance_ms(1_000);
        assert_eq!(b.position_ms(), 3_000);

        b.pause();
        clock.advance_ms(5_000);
        assert_eq!(b.position_ms(), 3_000);
    }

    #[test]
    fn seek_lands_on_next_poll() {
        let (_clock, mut b) = backend(10_000);
        b.seek(4_000);
        assert_eq!(b.position_ms(), 0);
        assert_eq!(b.poll_event(), None);
        assert_eq!(b.position_ms(), 4_000);
    }

    #[test]
    fn end_of_stream_reported_once() {
        let (clock, mut b) = backend(500);
        b.start().unwrap();
        clock.advance_ms(600);
        assert_eq!(b.poll_event(), Some(BackendEvent::EndOfStream));
        assert_eq!(b.poll_event(), None);
        assert_eq!(b.position_ms(), 500);

        // Seeking back re-arms the end notification.
        b.seek(0);
        b.poll_event();
        b.start().unwrap();
        clock.advance_ms(600);
        assert_eq!(b.poll_event(), Some(BackendEvent::EndOfStream));
    }

    #[test]
    fn frames_only_when_position_moves() {
        let (clock, mut b) = backend(10_000);
        let first = b.try_pull_frame().unwrap();
        assert_eq!(first.data.len(), VideoFrame::expected_len(WIDTH, HEIGHT));
        assert!(b.try_pull_frame().is_none());

        b.start().unwrap();
        clock.advance_ms(100);
        let next = b.try_pull_frame().unwrap();
        assert!(next.sequence > first.sequence);
        assert!(b.try_pull_frame().is_none());
    }

    #[test]
    fn released_backend_is_inert() {
        let (clock, mut b) = backend(1_000);
        b.release();
        b.release();
        clock.advance_ms(2_000);
        assert!(b.try_pull_frame().is_none());
        assert!(b.poll_event().is_none());
        assert!(b.start().is_err());
    }
}
