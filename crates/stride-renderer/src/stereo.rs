use crate::camera::Camera;
use crate::eye_view::{Eye, StereoViewBuilder};
use crate::pipeline::{create_depth_texture, EyeBinding, EyeUniforms, SpherePipeline};
use crate::sphere::SphereMesh;
use crate::video_texture::VideoTexture;
use glam::{Mat4, Vec2, Vec4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stride_config::{RenderConfig, RenderSettings};
use stride_video::VideoTextureStream;
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

/// Texture-coordinate remap for one eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexTransform {
    pub scale: Vec2,
    pub offset: Vec2,
}

impl TexTransform {
    /// Whole frame, used for mono sources.
    pub const FULL: Self = Self {
        scale: Vec2::ONE,
        offset: Vec2::ZERO,
    };

    /// Side-by-side stereo gives each eye half the frame width.
    pub fn for_eye(eye: Eye, stereo: bool) -> Self {
        if !stereo {
            return Self::FULL;
        }
        let offset_x = match eye {
            Eye::Left => 0.0,
            Eye::Right => 0.5,
        };
        Self {
            scale: Vec2::new(0.5, 1.0),
            offset: Vec2::new(offset_x, 0.0),
        }
    }

    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.scale.x, self.scale.y, self.offset.x, self.offset.y)
    }
}

/// Pixel rectangle on the output surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// Left or right half of a `width` x `height` surface.
    pub fn half(eye: Eye, width: u32, height: u32) -> Self {
        let left_width = width / 2;
        let (x, w) = match eye {
            Eye::Left => (0, left_width),
            Eye::Right => (left_width, width - left_width),
        };
        Self {
            x: x as f32,
            y: 0.0,
            width: w.max(1) as f32,
            height: height.max(1) as f32,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyePlan {
    pub eye: Eye,
    pub viewport: Viewport,
    pub tex_transform: TexTransform,
    pub uniforms: EyeUniforms,
}

/// Everything one frame draws, computed from a single rotation snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub eyes: [EyePlan; 2],
}

/// Compute both eyes' viewports and uniforms. Pure; no GPU access.
pub fn plan_frame(
    applied_rotation: Mat4,
    settings: &RenderSettings,
    camera: &Camera,
    width: u32,
    height: u32,
) -> FramePlan {
    let views = StereoViewBuilder::build_eye_views(
        applied_rotation,
        settings.ipd,
        settings.video_rotation,
    );
    let plan_eye = |eye: Eye| {
        let viewport = Viewport::half(eye, width, height);
        let tex_transform = TexTransform::for_eye(eye, settings.stereo_mode);
        let projection = camera.projection_matrix(viewport.aspect_ratio());
        EyePlan {
            eye,
            viewport,
            tex_transform,
            uniforms: EyeUniforms::new(
                views.model,
                views.view(eye),
                projection,
                tex_transform.to_vec4(),
            ),
        }
    };
    FramePlan {
        eyes: [plan_eye(Eye::Left), plan_eye(Eye::Right)],
    }
}

/// Flag that turns a renderer inert. Cloneable and callable from any thread.
#[derive(Debug, Clone, Default)]
pub struct ReleaseHandle(Arc<AtomicBool>);

impl ReleaseHandle {
    pub fn release(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_released(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Draws the video sphere once per eye into the two halves of the surface.
pub struct StereoRenderer {
    pipeline: SpherePipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    video: VideoTexture,
    eyes: [EyeBinding; 2],
    depth_view: wgpu::TextureView,
    camera: Camera,
    size: (u32, u32),
    released: ReleaseHandle,
    frame_count: u64,
    skipped_frames: u64,
}

impl StereoRenderer {
    /// Build pipeline, sphere and texture for a fresh GPU context.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: &RenderConfig,
    ) -> Self {
        let pipeline = SpherePipeline::new(device, color_format);
        let mesh = SphereMesh::generate(
            config.sphere_radius,
            config.sphere_stacks,
            config.sphere_sectors,
        );

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere_vertex_buffer"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere_index_buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let video = VideoTexture::new(device, queue, &pipeline);
        let eyes = [
            pipeline.create_eye_binding(device, "left_eye_uniforms"),
            pipeline.create_eye_binding(device, "right_eye_uniforms"),
        ];

        info!(
            vertices = mesh.vertices.len(),
            triangles = mesh.indices.len() / 3,
            radius = mesh.radius,
            "Sphere mesh generated"
        );

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
            video,
            eyes,
            depth_view: create_depth_texture(device, width, height),
            camera: Camera::from_config(config),
            size: (width, height),
            released: ReleaseHandle::default(),
            frame_count: 0,
            skipped_frames: 0,
        }
    }

    pub fn release(&self) {
        self.released.release();
    }

    pub fn is_released(&self) -> bool {
        self.released.is_released()
    }

    /// Recreate size-dependent targets (call on resize).
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.size = (width, height);
        self.depth_view = create_depth_texture(device, width, height);
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Render one frame into `output`.
    ///
    /// `applied_rotation` is the head rotation snapshot for this frame; both
    /// eyes use it. Returns `None` when released or when the video texture
    /// could not be updated, in which case the frame is skipped.
    pub fn render_frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        output: &wgpu::TextureView,
        stream: &VideoTextureStream,
        applied_rotation: Mat4,
        settings: &RenderSettings,
    ) -> Option<wgpu::CommandBuffer> {
        if self.released.is_released() {
            return None;
        }

        let mut target = self.video.target(device, queue, &self.pipeline);
        if let Err(e) = stream.pull_latest_frame(&mut target) {
            self.skipped_frames += 1;
            if self.skipped_frames == 1 || self.skipped_frames % 60 == 0 {
                warn!(?e, skipped = self.skipped_frames, "Video texture update failed; frame skipped");
            }
            return None;
        }

        let plan = plan_frame(applied_rotation, settings, &self.camera, self.size.0, self.size.1);
        for eye in &plan.eyes {
            queue.write_buffer(
                &self.eyes[eye.eye.index()].buffer,
                0,
                bytemuck::cast_slice(&[eye.uniforms]),
            );
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("stereo_render"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("stereo_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: output,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline.pipeline);
            pass.set_bind_group(1, &self.video.bind_group, &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

            for eye in &plan.eyes {
                let vp = eye.viewport;
                pass.set_viewport(vp.x, vp.y, vp.width, vp.height, 0.0, 1.0);
                pass.set_bind_group(0, &self.eyes[eye.eye.index()].bind_group, &[]);
                pass.draw_indexed(0..self.index_count, 0, 0..1);
            }
        }

        self.frame_count += 1;
        if self.frame_count % 600 == 0 {
            debug!(frames = self.frame_count, skipped = self.skipped_frames, "Render heartbeat");
        }
        Some(encoder.finish())
    }
}
