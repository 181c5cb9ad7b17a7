use crate::error::MediaError;
use crate::frame::VideoFrame;
use crate::source::VideoSource;
use crate::synthetic::SyntheticBackend;
use std::sync::Arc;
use stride_common::Clock;

/// Asynchronous notifications from a decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    EndOfStream,
    Error(MediaError),
}

/// A prepared decoder for one source.
///
/// Every call must return promptly; decoding happens on the backend's own
/// threads. Calls are serialized by the owning stream.
pub trait MediaBackend: Send {
    fn start(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn set_rate(&mut self, rate: f32);
    fn set_volume(&mut self, volume: f32);
    /// Request a seek. Completion is asynchronous.
    fn seek(&mut self, position_ms: u64);
    fn position_ms(&self) -> u64;
    fn duration_ms(&self) -> Option<u64>;
    /// Newest decoded frame since the last call, without blocking.
    fn try_pull_frame(&mut self) -> Option<VideoFrame>;
    fn poll_event(&mut self) -> Option<BackendEvent>;
    /// Free decoder resources. Safe to call more than once.
    fn release(&mut self);
}

/// Creates decoders for sources; used by `VideoTextureStream::bind`.
pub trait BackendFactory: Send + Sync {
    fn open(&self, source: &VideoSource) -> Result<Box<dyn MediaBackend>, MediaError>;
}

/// Synthetic sources get the test pattern; files go to GStreamer when built with it.
pub struct DefaultBackendFactory {
    clock: Arc<dyn Clock>,
}

impl DefaultBackendFactory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl BackendFactory for DefaultBackendFactory {
    fn open(&self, source: &VideoSource) -> Result<Box<dyn MediaBackend>, MediaError> {
        match source {
            VideoSource::Synthetic { duration_ms } => Ok(Box::new(SyntheticBackend::new(
                self.clock.clone(),
                *duration_ms,
            ))),
            VideoSource::File(path) => {
                let meta = std::fs::metadata(path).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        MediaError::not_found(path.display().to_string())
                    } else {
                        MediaError::unreadable(format!("{}: {e}", path.display()))
                    }
                })?;
                if !meta.is_file() {
                    return Err(MediaError::unreadable(format!(
                        "{} is not a file",
                        path.display()
                    )));
                }
                open_file(path, &self.clock)
            }
        }
    }
}

#[cfg(feature = "gstreamer")]
fn open_file(
    path: &std::path::Path,
    clock: &Arc<dyn Clock>,
) -> Result<Box<dyn MediaBackend>, MediaError> {
    Ok(Box::new(crate::gst_backend::GstBackend::open(path, clock.clone())?))
}

#[cfg(not(feature = "gstreamer"))]
fn open_file(
    path: &std::path::Path,
    _clock: &Arc<dyn Clock>,
) -> Result<Box<dyn MediaBackend>, MediaError> {
    Err(MediaError::new(
        crate::error::MediaErrorKind::BackendUnavailable,
        format!(
            "{}: built without the gstreamer feature, only synthetic sources play",
            path.display()
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaErrorKind;
    use std::path::PathBuf;
    use stride_common::TestClock;

    fn factory() -> DefaultBackendFactory {
        DefaultBackendFactory::new(TestClock::shared())
    }

    #[test]
    fn missing_file_is_not_found() {
        let source = VideoSource::File(PathBuf::from("/definitely/not/here/run.mp4"));
        let err = factory().open(&source).err().unwrap();
        assert_eq!(err.kind, MediaErrorKind::SourceNotFound);
    }

    #[test]
    fn directory_is_unreadable() {
        let source = VideoSource::File(std::env::temp_dir());
        let err = factory().open(&source).err().unwrap();
        assert_eq!(err.kind, MediaErrorKind::SourceUnreadable);
    }

    #[test]
    fn synthetic_always_opens() {
        let backend = factory()
            .open(&VideoSource::Synthetic { duration_ms: 500 })
            .unwrap();
        assert_eq!(backend.duration_ms(), Some(500));
    }
}
