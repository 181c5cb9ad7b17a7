//! GPU side of the player: sphere geometry, stereo views and the per-frame
//! draw of both eyes.

pub mod camera;
pub mod eye_view;
pub mod pipeline;
pub mod sphere;
pub mod stereo;
pub mod video_texture;

pub use camera::Camera;
pub use eye_view::{Eye, EyeViews, StereoViewBuilder};
pub use sphere::{SphereMesh, SphereVertex};
pub use stereo::{plan_frame, FramePlan, StereoRenderer, TexTransform, Viewport};
pub use video_texture::VideoTexture;
