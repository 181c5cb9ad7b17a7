use crate::error::UploadError;
use std::sync::Arc;

/// One decoded RGBA8 frame, tightly packed (`width * 4` bytes per row).
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Presentation time within the source.
    pub pts_ms: u64,
    /// Increases with every frame a backend produces.
    pub sequence: u64,
    pub data: Arc<[u8]>,
}

impl VideoFrame {
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        let expected = Self::expected_len(self.width, self.height);
        if self.data.len() != expected {
            return Err(UploadError::InvalidData {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Texture side of the stream, owned by the thread that owns the GPU context.
pub trait FrameTarget {
    /// Identity of the underlying texture. A recreated context yields a new id.
    fn target_id(&self) -> u64;

    /// Replace the texture contents with `frame`.
    fn upload(&mut self, frame: &VideoFrame) -> Result<(), UploadError>;
}
