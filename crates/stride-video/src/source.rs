use crate::error::MediaError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default length of the built-in test pattern.
pub const DEFAULT_SYNTHETIC_DURATION_MS: u64 = 60_000;

/// Playable source handle, resolved by whoever picked the video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    File(PathBuf),
    /// Generated test pattern of a fixed length.
    Synthetic { duration_ms: u64 },
}

impl FromStr for VideoSource {
    type Err = MediaError;

    /// Accepts a path, a `file://` URI, or `synthetic[:duration_ms]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("synthetic") {
            let duration = rest.strip_prefix(':').unwrap_or(rest);
            if duration.is_empty() {
                return Ok(VideoSource::Synthetic {
                    duration_ms: DEFAULT_SYNTHETIC_DURATION_MS,
                });
            }
            return match duration.parse::<u64>() {
                Ok(ms) if ms > 0 && rest.starts_with(':') => {
                    Ok(VideoSource::Synthetic { duration_ms: ms })
                }
                _ => Err(MediaError::unreadable(format!(
                    "invalid synthetic duration: {rest:?}"
                ))),
            };
        }
        let path = s.strip_prefix("file://").unwrap_or(s);
        if path.is_empty() {
            return Err(MediaError::not_found("empty video path"));
        }
        Ok(VideoSource::File(PathBuf::from(path)))
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::File(path) => write!(f, "{}", path.display()),
            VideoSource::Synthetic { duration_ms } => write!(f, "synthetic:{duration_ms}"),
        }
    }
}
