//! Decoder side of the player: binds a video source to a texture target and
//! exposes transport controls.

pub mod backend;
pub mod error;
pub mod frame;
#[cfg(feature = "gstreamer")]
pub mod gst_backend;
pub mod rate;
pub mod source;
pub mod stream;
pub mod synthetic;

pub use backend::{BackendEvent, BackendFactory, DefaultBackendFactory, MediaBackend};
pub use error::{MediaError, MediaErrorKind, UploadError};
pub use frame::{FrameTarget, VideoFrame};
pub use rate::RateGovernor;
pub use source::VideoSource;
pub use stream::{PlayerEvent, VideoTextureStream};
pub use synthetic::SyntheticBackend;
