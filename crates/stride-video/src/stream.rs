use crate::backend::{BackendEvent, BackendFactory, MediaBackend};
use crate::error::{MediaError, UploadError};
use crate::frame::{FrameTarget, VideoFrame};
use crate::source::VideoSource;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stride_common::Clock;
use stride_config::{OverlayConfig, MAX_PLAYBACK_SPEED, MIN_PLAYBACK_SPEED};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Events posted for the UI thread to drain.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The source played to its end. Fired once per playthrough.
    Ended,
    Error(MediaError),
    OverlayChanged(OverlayConfig),
}

/// Binds a decoder to a GPU texture and exposes transport controls.
///
/// All decoder access goes through one lock, so controls may be called from
/// any thread. [`pull_latest_frame`](Self::pull_latest_frame) must only be
/// called from the thread that owns the GPU context.
pub struct VideoTextureStream {
    state: Mutex<StreamState>,
    factory: Arc<dyn BackendFactory>,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

struct StreamState {
    backend: Option<Box<dyn MediaBackend>>,
    source: Option<VideoSource>,
    playing: bool,
    /// Requested multiplier, applied on the next start while not playing.
    speed: f32,
    volume: f32,
    released: bool,
    ended_reported: bool,
    session_started_at: Option<Instant>,
    last_frame: Option<VideoFrame>,
    /// (target id, frame sequence) last written to a texture.
    uploaded: Option<(u64, u64)>,
}

impl VideoTextureStream {
    pub fn new(
        factory: Arc<dyn BackendFactory>,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let stream = Self {
            state: Mutex::new(StreamState {
                backend: None,
                source: None,
                playing: false,
                speed: 1.0,
                volume: 1.0,
                released: false,
                ended_reported: false,
                session_started_at: None,
                last_frame: None,
                uploaded: None,
            }),
            factory,
            clock,
            events,
        };
        (stream, events_rx)
    }

    /// Sender for posting other UI events onto the same queue.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<PlayerEvent> {
        self.events.clone()
    }

    /// Prepare a decoder for `source`, releasing any previous one first.
    ///
    /// Failures are posted as [`PlayerEvent::Error`]; returns whether a
    /// decoder is now bound.
    pub fn bind(&self, source: VideoSource) -> bool {
        let mut st = self.state.lock();
        if st.released {
            debug!(%source, "bind on released stream ignored");
            return false;
        }
        if let Some(mut old) = st.backend.take() {
            old.release();
            info!("Released previous decoder");
        }
        st.playing = false;
        st.ended_reported = false;
        st.session_started_at = None;
        st.last_frame = None;
        st.uploaded = None;
        st.source = Some(source.clone());

        match self.factory.open(&source) {
            Ok(mut backend) => {
                backend.set_volume(st.volume);
                st.backend = Some(backend);
                info!(%source, "Video bound");
                true
            }
            Err(e) => {
                warn!(%source, error = %e, "Failed to open video");
                self.emit(PlayerEvent::Error(e));
                false
            }
        }
    }

    /// Start playback. The first successful start begins the session timer.
    pub fn start(&self) -> bool {
        let mut st = self.state.lock();
        self.play(&mut st)
    }

    /// Continue a paused session. No-op before the first [`start`](Self::start).
    pub fn resume(&self) -> bool {
        let mut st = self.state.lock();
        if st.session_started_at.is_none() {
            debug!("resume before start ignored");
            return false;
        }
        self.play(&mut st)
    }

    pub fn pause(&self) {
        let mut st = self.state.lock();
        if st.released {
            debug!("pause on released stream ignored");
            return;
        }
        if let Some(backend) = st.backend.as_mut() {
            backend.pause();
        }
        st.playing = false;
    }

    /// Clamp to the supported range; applied now if playing, otherwise on next start.
    pub fn set_speed(&self, multiplier: f32) {
        if !multiplier.is_finite() {
            return;
        }
        let speed = multiplier.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED);
        let mut guard = self.state.lock();
        let st = &mut *guard;
        st.speed = speed;
        if st.playing {
            if let Some(backend) = st.backend.as_mut() {
                backend.set_rate(speed);
            }
        }
    }

    pub fn set_volume(&self, level: f32) {
        let volume = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
        let mut guard = self.state.lock();
        let st = &mut *guard;
        st.volume = volume;
        if let Some(backend) = st.backend.as_mut() {
            backend.set_volume(volume);
        }
    }

    /// Request a seek. The reported position may lag until the decoder completes it.
    pub fn seek_to(&self, position_ms: u64) {
        let mut st = self.state.lock();
        if st.released {
            return;
        }
        if let Some(backend) = st.backend.as_mut() {
            backend.seek(position_ms);
            st.ended_reported = false;
            debug!(position_ms, "Seek requested");
        }
    }

    pub fn position_ms(&self) -> u64 {
        self.state
            .lock()
            .backend
            .as_ref()
            .map_or(0, |b| b.position_ms())
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.state.lock().backend.as_ref().and_then(|b| b.duration_ms())
    }

    pub fn speed(&self) -> f32 {
        self.state.lock().speed
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().backend.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    pub fn source(&self) -> Option<VideoSource> {
        self.state.lock().source.clone()
    }

    /// Time since playback first started for the bound source.
    pub fn session_elapsed(&self) -> Option<Duration> {
        self.state
            .lock()
            .session_started_at
            .map(|t| self.clock.now().saturating_duration_since(t))
    }

    /// Push the newest decoded frame into `target`.
    ///
    /// Never blocks. Safe to call when nothing new has been decoded; the last
    /// frame is uploaded again only when `target` is a different texture.
    /// Returns whether the texture was written.
    pub fn pull_latest_frame(&self, target: &mut dyn FrameTarget) -> Result<bool, UploadError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if st.released {
            return Ok(false);
        }
        self.drain_backend_events(st);

        if let Some(frame) = st.backend.as_mut().and_then(|b| b.try_pull_frame()) {
            trace!(pts_ms = frame.pts_ms, sequence = frame.sequence, "New video frame");
            st.last_frame = Some(frame);
        }
        let Some(frame) = st.last_frame.as_ref() else {
            return Ok(false);
        };
        let key = (target.target_id(), frame.sequence);
        if st.uploaded == Some(key) {
            return Ok(false);
        }
        frame.validate()?;
        target.upload(frame)?;
        st.uploaded = Some(key);
        Ok(true)
    }

    /// Forward decoder notifications to the event queue without touching the GPU.
    pub fn poll_events(&self) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if !st.released {
            self.drain_backend_events(st);
        }
    }

    /// Free the decoder. Every later call is a no-op.
    pub fn release(&self) {
        let mut st = self.state.lock();
        if st.released {
            debug!("Stream already released");
            return;
        }
        st.released = true;
        st.playing = false;
        st.last_frame = None;
        st.uploaded = None;
        if let Some(mut backend) = st.backend.take() {
            backend.release();
        }
        info!("Video stream released");
    }

    fn play(&self, st: &mut StreamState) -> bool {
        if st.released {
            debug!("start on released stream ignored");
            return false;
        }
        let Some(backend) = st.backend.as_mut() else {
            debug!("start with no video bound ignored");
            return false;
        };
        if st.playing {
            return true;
        }
        backend.set_rate(st.speed);
        backend.set_volume(st.volume);
        match backend.start() {
            Ok(()) => {
                st.playing = true;
                if st.session_started_at.is_none() {
                    st.session_started_at = Some(self.clock.now());
                    info!(speed = st.speed, "Playback session started");
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "Decoder failed to start");
                self.emit(PlayerEvent::Error(e));
                false
            }
        }
    }

    fn drain_backend_events(&self, st: &mut StreamState) {
        let Some(backend) = st.backend.as_mut() else {
            return;
        };
        while let Some(event) = backend.poll_event() {
            match event {
                BackendEvent::EndOfStream => {
                    st.playing = false;
                    if !st.ended_reported {
                        st.ended_reported = true;
                        info!("Video ended");
                        self.emit(PlayerEvent::Ended);
                    }
                }
                BackendEvent::Error(e) => {
                    warn!(error = %e, "Playback error");
                    st.playing = false;
                    self.emit(PlayerEvent::Error(e));
                }
            }
        }
    }

    fn emit(&self, event: PlayerEvent) {
        if self.events.send(event).is_err() {
            debug!("Player event dropped; no receiver");
        }
    }
}

impl Drop for VideoTextureStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackendFactory;
    use crate::error::MediaErrorKind;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use stride_common::TestClock;

    struct MockTarget {
        id: u64,
        uploads: Vec<u64>,
        fail_next: bool,
    }

    impl MockTarget {
        fn new(id: u64) -> Self {
            Self {
                id,
                uploads: Vec::new(),
                fail_next: false,
            }
        }
    }

    impl FrameTarget for MockTarget {
        fn target_id(&self) -> u64 {
            self.id
        }

        fn upload(&mut self, frame: &VideoFrame) -> Result<(), UploadError> {
            if std::mem::take(&mut self.fail_next) {
                return Err(UploadError::TargetLost);
            }
            self.uploads.push(frame.sequence);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Log {
        rates: Vec<f32>,
        volumes: Vec<f32>,
        starts: u32,
        releases: u32,
        events: VecDeque<BackendEvent>,
    }

    struct RecordingBackend {
        log: Arc<Mutex<Log>>,
    }

    impl MediaBackend for RecordingBackend {
        fn start(&mut self) -> Result<(), MediaError> {
            self.log.lock().starts += 1;
            Ok(())
        }
        fn pause(&mut self) {}
        fn set_rate(&mut self, rate: f32) {
            self.log.lock().rates.push(rate);
        }
        fn set_volume(&mut self, volume: f32) {
            self.log.lock().volumes.push(volume);
        }
        fn seek(&mut self, _position_ms: u64) {}
        fn position_ms(&self) -> u64 {
            0
        }
        fn duration_ms(&self) -> Option<u64> {
            None
        }
        fn try_pull_frame(&mut self) -> Option<VideoFrame> {
            None
        }
        fn poll_event(&mut self) -> Option<BackendEvent> {
            self.log.lock().events.pop_front()
        }
        fn release(&mut self) {
            self.log.lock().releases += 1;
        }
    }

    struct RecordingFactory {
        log: Arc<Mutex<Log>>,
    }

    impl BackendFactory for RecordingFactory {
        fn open(&self, _source: &VideoSource) -> Result<Box<dyn MediaBackend>, MediaError> {
            Ok(Box::new(RecordingBackend {
                log: self.log.clone(),
            }))
        }
    }

    fn recording() -> (VideoTextureStream, mpsc::UnboundedReceiver<PlayerEvent>, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let factory = Arc::new(RecordingFactory { log: log.clone() });
        let (stream, rx) = VideoTextureStream::new(factory, TestClock::shared());
        stream.bind(VideoSource::Synthetic { duration_ms: 1 });
        (stream, rx, log)
    }

    fn synthetic(
        duration_ms: u64,
    ) -> (VideoTextureStream, mpsc::UnboundedReceiver<PlayerEvent>, Arc<TestClock>) {
        let clock = TestClock::shared();
        let factory = Arc::new(DefaultBackendFactory::new(clock.clone()));
        let (stream, rx) = VideoTextureStream::new(factory, clock.clone());
        assert!(stream.bind(VideoSource::Synthetic { duration_ms }));
        (stream, rx, clock)
    }

    #[test]
    fn video_end_fires_once_within_one_frame() {
        const FRAME_MS: u64 = 16;
        let (stream, mut rx, clock) = synthetic(1_000);
        let mut target = MockTarget::new(1);
        assert!(stream.start());

        let mut ended_at = Vec::new();
        for frame in 1..=200u64 {
            clock.advance_ms(FRAME_MS);
            stream.pull_latest_frame(&mut target).unwrap();
            while let Ok(event) = rx.try_recv() {
                assert_eq!(event, PlayerEvent::Ended);
                ended_at.push(frame * FRAME_MS);
            }
        }

        assert_eq!(ended_at.len(), 1, "ended fired {} times", ended_at.len());
        assert!(ended_at[0] >= 1_000 && ended_at[0] < 1_000 + FRAME_MS);
        assert!(!stream.is_playing());
    }

    #[test]
    fn pull_is_idempotent_without_new_frames() {
        let (stream, _rx, _clock) = synthetic(10_000);
        let mut target = MockTarget::new(1);
        assert!(stream.pull_latest_frame(&mut target).unwrap());
        assert!(!stream.pull_latest_frame(&mut target).unwrap());
        assert!(!stream.pull_latest_frame(&mut target).unwrap());
        assert_eq!(target.uploads.len(), 1);
    }

    #[test]
    fn fresh_target_gets_last_frame_after_context_loss() {
        let (stream, _rx, _clock) = synthetic(10_000);
        let mut old = MockTarget::new(1);
        stream.pull_latest_frame(&mut old).unwrap();

        let mut recreated = MockTarget::new(2);
        assert!(stream.pull_latest_frame(&mut recreated).unwrap());
        assert_eq!(recreated.uploads, old.uploads);
        assert!(stream.is_bound());
    }

    #[test]
    fn failed_upload_is_retried() {
        let (stream, _rx, _clock) = synthetic(10_000);
        let mut target = MockTarget::new(1);
        target.fail_next = true;
        assert_eq!(
            stream.pull_latest_frame(&mut target),
            Err(UploadError::TargetLost)
        );
        assert!(stream.pull_latest_frame(&mut target).unwrap());
    }

    #[test]
    fn speed_is_clamped_and_remembered_until_start() {
        let (stream, _rx, log) = recording();
        stream.set_speed(5.0);
        assert_eq!(stream.speed(), MAX_PLAYBACK_SPEED);
        assert!(log.lock().rates.is_empty());

        assert!(stream.start());
        assert_eq!(log.lock().rates, vec![MAX_PLAYBACK_SPEED]);

        stream.set_speed(0.01);
        assert_eq!(log.lock().rates.last(), Some(&MIN_PLAYBACK_SPEED));

        stream.pause();
        stream.set_speed(1.5);
        assert_eq!(log.lock().rates.len(), 2);
        assert!(stream.resume());
        assert_eq!(log.lock().rates.last(), Some(&1.5));
    }

    #[test]
    fn volume_applies_immediately_when_bound() {
        let (stream, _rx, log) = recording();
        stream.set_volume(0.25);
        assert_eq!(log.lock().volumes.last(), Some(&0.25));
        stream.set_volume(7.0);
        assert_eq!(stream.volume(), 1.0);
    }

    #[test]
    fn rebinding_releases_previous_decoder() {
        let (stream, _rx, log) = recording();
        stream.bind(VideoSource::Synthetic { duration_ms: 2 });
        assert_eq!(log.lock().releases, 1);
        stream.release();
        assert_eq!(log.lock().releases, 2);
    }

    #[test]
    fn controls_are_noops_when_unbound_or_released() {
        let clock = TestClock::shared();
        let factory = Arc::new(DefaultBackendFactory::new(clock.clone()));
        let (stream, _rx) = VideoTextureStream::new(factory, clock);
        stream.pause();
        assert!(!stream.resume());
        assert!(!stream.start());
        stream.seek_to(1_000);
        stream.set_speed(2.0);
        assert_eq!(stream.position_ms(), 0);

        stream.release();
        stream.release();
        stream.pause();
        stream.seek_to(10);
        assert!(!stream.bind(VideoSource::Synthetic { duration_ms: 10 }));
        let mut target = MockTarget::new(1);
        assert!(!stream.pull_latest_frame(&mut target).unwrap());
    }

    #[test]
    fn bind_failure_reports_reason() {
        let clock = TestClock::shared();
        let factory = Arc::new(DefaultBackendFactory::new(clock.clone()));
        let (stream, mut rx) = VideoTextureStream::new(factory, clock);
        assert!(!stream.bind(VideoSource::File(PathBuf::from("/no/such/video.mp4"))));
        match rx.try_recv() {
            Ok(PlayerEvent::Error(e)) => assert_eq!(e.kind, MediaErrorKind::SourceNotFound),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn backend_error_is_forwarded() {
        let (stream, mut rx, log) = recording();
        stream.start();
        log.lock()
            .events
            .push_back(BackendEvent::Error(MediaError::unreadable("bad codec")));
        stream.poll_events();
        assert!(matches!(rx.try_recv(), Ok(PlayerEvent::Error(e)) if e.kind == MediaErrorKind::SourceUnreadable));
        assert!(!stream.is_playing());
    }

    #[test]
    fn session_timer_starts_with_first_start() {
        let (stream, _rx, clock) = synthetic(60_000);
        clock.advance_ms(5_000);
        assert_eq!(stream.session_elapsed(), None);

        assert!(stream.start());
        clock.advance_ms(2_000);
        stream.pause();
        stream.resume();
        assert_eq!(stream.session_elapsed(), Some(Duration::from_millis(2_000)));
    }

    #[test]
    fn seek_rearms_end_event() {
        let (stream, mut rx, clock) = synthetic(500);
        stream.start();
        clock.advance_ms(600);
        stream.poll_events();
        assert_eq!(rx.try_recv(), Ok(PlayerEvent::Ended));

        stream.seek_to(0);
        stream.poll_events();
        assert!(stream.start());
        clock.advance_ms(600);
        stream.poll_events();
        assert_eq!(rx.try_recv(), Ok(PlayerEvent::Ended));
        assert!(rx.try_recv().is_err());
    }
}
