use std::fmt;

/// Reason a source could not be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorKind {
    /// The path or URI does not point at anything.
    SourceNotFound,
    /// The source exists but could not be read or decoded (corrupt, unsupported codec).
    SourceUnreadable,
    /// No decoder backend is available for this kind of source.
    BackendUnavailable,
    /// Anything else, including transient decoder failures.
    Unknown,
}

impl MediaErrorKind {
    /// Stable short code for logs and UI prompts.
    pub fn code(self) -> &'static str {
        match self {
            MediaErrorKind::SourceNotFound => "source_not_found",
            MediaErrorKind::SourceUnreadable => "source_unreadable",
            MediaErrorKind::BackendUnavailable => "backend_unavailable",
            MediaErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Decoder creation or playback failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl MediaError {
    pub fn new(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::SourceNotFound, message)
    }

    pub fn unreadable(message: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::SourceUnreadable, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::Unknown, message)
    }
}

/// Failure pushing a decoded frame into a texture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("texture target is no longer valid")]
    TargetLost,
    #[error("frame data is {actual} bytes, expected {expected}")]
    InvalidData { expected: usize, actual: usize },
    #[error("frame {width}x{height} exceeds the texture limit of {limit}")]
    TooLarge { width: u32, height: u32, limit: u32 },
}
