use crate::pipeline::SpherePipeline;
use std::sync::atomic::{AtomicU64, Ordering};
use stride_video::{FrameTarget, UploadError, VideoFrame};
use tracing::debug;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

const VIDEO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// GPU texture the sphere samples from. Starts as a 1x1 black placeholder and
/// is resized to the first decoded frame.
pub struct VideoTexture {
    id: u64,
    texture: wgpu::Texture,
    pub bind_group: wgpu::BindGroup,
    size: (u32, u32),
}

impl VideoTexture {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, pipeline: &SpherePipeline) -> Self {
        let (texture, bind_group) = create_texture(device, pipeline, 1, 1);
        write_pixels(queue, &texture, &[0, 0, 0, 255], 1, 1);
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            texture,
            bind_group,
            size: (1, 1),
        }
    }

    /// Borrow as a [`FrameTarget`] for one upload.
    pub fn target<'a>(
        &'a mut self,
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        pipeline: &'a SpherePipeline,
    ) -> VideoTextureTarget<'a> {
        VideoTextureTarget {
            texture: self,
            device,
            queue,
            pipeline,
        }
    }
}

pub struct VideoTextureTarget<'a> {
    texture: &'a mut VideoTexture,
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    pipeline: &'a SpherePipeline,
}

impl FrameTarget for VideoTextureTarget<'_> {
    fn target_id(&self) -> u64 {
        self.texture.id
    }

    fn upload(&mut self, frame: &VideoFrame) -> Result<(), UploadError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(UploadError::InvalidData {
                expected: VideoFrame::expected_len(1, 1),
                actual: frame.data.len(),
            });
        }
        let limit = self.device.limits().max_texture_dimension_2d;
        if frame.width > limit || frame.height > limit {
            return Err(UploadError::TooLarge {
                width: frame.width,
                height: frame.height,
                limit,
            });
        }
        if self.texture.size != (frame.width, frame.height) {
            debug!(width = frame.width, height = frame.height, "Resizing video texture");
            let (texture, bind_group) =
                create_texture(self.device, self.pipeline, frame.width, frame.height);
            self.texture.texture = texture;
            self.texture.bind_group = bind_group;
            self.texture.size = (frame.width, frame.height);
        }
        write_pixels(
            self.queue,
            &self.texture.texture,
            &frame.data,
            frame.width,
            frame.height,
        );
        Ok(())
    }
}

fn create_texture(
    device: &wgpu::Device,
    pipeline: &SpherePipeline,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::BindGroup) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("video_texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: VIDEO_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = pipeline.create_texture_bind_group(device, &view);
    (texture, bind_group)
}

fn write_pixels(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &[u8], width: u32, height: u32) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}
