use crate::backend::{BackendEvent, MediaBackend};
use crate::error::{MediaError, MediaErrorKind};
use crate::frame::VideoFrame;
use crate::rate::RateGovernor;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stride_common::Clock;
use tracing::{debug, info, warn};

/// Spacing of instant (non-flushing) rate changes.
const INSTANT_RATE_INTERVAL: Duration = Duration::from_millis(250);
/// Spacing of flushing rate seeks, used when instant rate changes are refused.
const FLUSHING_RATE_INTERVAL: Duration = Duration::from_secs(1);

/// File playback through `playbin`, with decoded RGBA frames pulled from an appsink.
pub struct GstBackend {
    playbin: gst::Element,
    appsink: gst_app::AppSink,
    bus: gst::Bus,
    clock: Arc<dyn Clock>,
    rate: RateGovernor,
    requested_rate: f32,
    instant_rate: bool,
    sequence: u64,
    released: bool,
}

impl GstBackend {
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> Result<Self, MediaError> {
        gst::init().map_err(|e| {
            MediaError::new(MediaErrorKind::BackendUnavailable, format!("gstreamer init: {e}"))
        })?;

        let absolute = std::fs::canonicalize(path)
            .map_err(|e| MediaError::unreadable(format!("{}: {e}", path.display())))?;
        let uri = gst::glib::filename_to_uri(&absolute, None)
            .map_err(|e| MediaError::unreadable(format!("{}: {e}", path.display())))?;

        let video_sink = gst::parse::bin_from_description(
            "videoconvert ! video/x-raw,format=RGBA ! appsink name=sink max-buffers=1 drop=true",
            true,
        )
        .map_err(|e| MediaError::unknown(format!("gst sink bin: {e}")))?;
        let appsink = video_sink
            .by_name("sink")
            .ok_or_else(|| MediaError::unknown("gst appsink missing"))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| MediaError::unknown("gst appsink type mismatch"))?;

        let playbin = gst::ElementFactory::make("playbin")
            .property("uri", uri.as_str())
            .property("video-sink", &video_sink)
            .build()
            .map_err(|e| {
                MediaError::new(MediaErrorKind::BackendUnavailable, format!("playbin: {e}"))
            })?;
        let bus = playbin
            .bus()
            .ok_or_else(|| MediaError::unknown("playbin has no bus"))?;

        playbin
            .set_state(gst::State::Paused)
            .map_err(|e| MediaError::unreadable(format!("gst preroll: {e:?}")))?;

        info!(%uri, "GStreamer playbin prepared");
        Ok(Self {
            playbin,
            appsink,
            bus,
            clock,
            rate: RateGovernor::new(1.0, INSTANT_RATE_INTERVAL),
            requested_rate: 1.0,
            instant_rate: true,
            sequence: 0,
            released: false,
        })
    }

    fn position(&self) -> Option<gst::ClockTime> {
        self.playbin.query_position::<gst::ClockTime>()
    }

    /// Flushing seek that keeps `rate`. Fails until the pipeline has prerolled.
    fn seek_with_rate(&self, position: gst::ClockTime, rate: f64) -> bool {
        self.playbin
            .seek(
                rate,
                gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
                gst::SeekType::Set,
                position,
                gst::SeekType::None,
                gst::ClockTime::NONE,
            )
            .is_ok()
    }

    /// Rate change without flushing or moving the position (GStreamer 1.18+).
    fn instant_rate_change(&self, rate: f64) -> bool {
        self.playbin
            .seek(
                rate,
                gst::SeekFlags::INSTANT_RATE_CHANGE,
                gst::SeekType::None,
                gst::ClockTime::NONE,
                gst::SeekType::None,
                gst::ClockTime::NONE,
            )
            .is_ok()
    }

    /// Push the requested rate if the governor allows it. Called on every
    /// `set_rate` and bus poll, so a settled rate is applied once its turn comes.
    fn apply_rate(&mut self) {
        let now = self.clock.now();
        let requested = self.requested_rate;
        if !self.rate.should_apply(requested, now) {
            return;
        }
        // No position means the pipeline has not prerolled; no seek can land yet.
        let Some(position) = self.position() else {
            return;
        };
        if self.instant_rate {
            if self.instant_rate_change(requested as f64) {
                debug!(rate = requested, "Playback rate applied");
                self.rate.mark_applied(requested, now);
                return;
            }
            warn!("Instant rate change refused; falling back to throttled flushing seeks");
            self.instant_rate = false;
            self.rate.set_min_interval(FLUSHING_RATE_INTERVAL);
        }
        if self.seek_with_rate(position, requested as f64) {
            debug!(rate = requested, "Playback rate applied with flushing seek");
            self.rate.mark_applied(requested, now);
        }
    }
}

fn classify(err: &gst::glib::Error) -> MediaErrorKind {
    if err.matches(gst::ResourceError::NotFound) {
        MediaErrorKind::SourceNotFound
    } else if err.matches(gst::ResourceError::OpenRead)
        || err.matches(gst::ResourceError::Read)
        || err.matches(gst::StreamError::Decode)
        || err.matches(gst::StreamError::CodecNotFound)
        || err.matches(gst::StreamError::TypeNotFound)
        || err.matches(gst::StreamError::WrongType)
        || err.matches(gst::StreamError::Format)
        || err.matches(gst::StreamError::Demux)
    {
        MediaErrorKind::SourceUnreadable
    } else {
        MediaErrorKind::Unknown
    }
}

impl MediaBackend for GstBackend {
    fn start(&mut self) -> Result<(), MediaError> {
        if self.released {
            return Err(MediaError::unknown("decoder already released"));
        }
        self.playbin
            .set_state(gst::State::Playing)
            .map_err(|e| MediaError::unknown(format!("gst play: {e:?}")))?;
        Ok(())
    }

    fn pause(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.playbin.set_state(gst::State::Paused) {
            warn!(?e, "gst pause failed");
        }
    }

    fn set_rate(&mut self, rate: f32) {
        self.requested_rate = rate;
        if !self.released {
            self.apply_rate();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if !self.released {
            self.playbin.set_property("volume", volume as f64);
        }
    }

    fn seek(&mut self, position_ms: u64) {
        if self.released {
            return;
        }
        let target = gst::ClockTime::from_mseconds(position_ms);
        if self.seek_with_rate(target, self.rate.applied() as f64) {
            debug!(position_ms, "gst seek issued");
        } else {
            warn!(position_ms, "gst seek rejected");
        }
    }

    fn position_ms(&self) -> u64 {
        self.position().map_or(0, |t| t.mseconds())
    }

    fn duration_ms(&self) -> Option<u64> {
        self.playbin
            .query_duration::<gst::ClockTime>()
            .map(|t| t.mseconds())
    }

    fn try_pull_frame(&mut self) -> Option<VideoFrame> {
        if self.released {
            return None;
        }
        let sample = self.appsink.try_pull_sample(gst::ClockTime::ZERO)?;
        let caps = sample.caps()?;
        let info = gst_video::VideoInfo::from_caps(caps).ok()?;
        let buffer = sample.buffer()?;
        let map = buffer.map_readable().ok()?;

        let width = info.width();
        let height = info.height();
        let row = width as usize * 4;
        let stride = info.stride()[0] as usize;
        let src = map.as_slice();
        let data: Vec<u8> = if stride == row {
            src.get(..row * height as usize)?.to_vec()
        } else {
            let mut packed = Vec::with_capacity(row * height as usize);
            for y in 0..height as usize {
                packed.extend_from_slice(src.get(y * stride..y * stride + row)?);
            }
            packed
        };

        self.sequence += 1;
        Some(VideoFrame {
            width,
            height,
            pts_ms: buffer.pts().map_or(0, |t| t.mseconds()),
            sequence: self.sequence,
            data: data.into(),
        })
    }

    fn poll_event(&mut self) -> Option<BackendEvent> {
        if self.released {
            return None;
        }
        while let Some(msg) = self.bus.pop() {
            match msg.view() {
                gst::MessageView::Eos(..) => return Some(BackendEvent::EndOfStream),
                gst::MessageView::Error(err) => {
                    let kind = classify(&err.error());
                    let message = match err.debug() {
                        Some(debug) => format!("{} ({debug})", err.error()),
                        None => err.error().to_string(),
                    };
                    return Some(BackendEvent::Error(MediaError::new(kind, message)));
                }
                gst::MessageView::AsyncDone(..) => self.apply_rate(),
                _ => {}
            }
        }
        None
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.playbin.set_state(gst::State::Null) {
            warn!(?e, "gst teardown failed");
        }
    }
}

impl Drop for GstBackend {
    fn drop(&mut self) {
        self.release();
    }
}
