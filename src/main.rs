mod player;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use player::PlaybackCoordinator;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stride_common::{Clock, SystemClock};
use stride_config::{AppConfig, SettingsStore, TimecodeSchedule};
use stride_pace::StepSpeedController;
use stride_renderer::StereoRenderer;
use stride_tracking::{HeadTracker, SensorSample, SimulatedHead};
use stride_video::{DefaultBackendFactory, PlayerEvent, VideoSource, VideoTextureStream};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const SEEK_STEP_MS: i64 = 10_000;
const SIMULATED_SENSOR_RATE_HZ: f32 = 100.0;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video to play: a file path, file:// URI or synthetic[:duration_ms]
    #[arg(long, default_value = "synthetic:60000")]
    video: VideoSource,

    /// Force side-by-side stereo output
    #[arg(long, default_value_t = false)]
    stereo: bool,

    /// JSON timecode schedule of parameter overrides and overlays
    #[arg(long)]
    timecodes: Option<PathBuf>,

    /// Simulate a pedometer walking at this many steps per minute
    #[arg(long)]
    cadence: Option<f32>,

    /// Open a single-display 1920x1080 window instead of 3840x1080
    #[arg(long, default_value_t = false)]
    mono_window: bool,
}

/// Application state.
struct App {
    settings: SettingsStore,
    head: HeadTracker,
    sensor_tx: mpsc::Sender<SensorSample>,
    simulated_head: SimulatedHead,
    stream: Arc<VideoTextureStream>,
    coordinator: Arc<Mutex<PlaybackCoordinator>>,
    player_events: mpsc::UnboundedReceiver<PlayerEvent>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    mono_window: bool,
    /// Mouse look is active while the left button is held.
    mouse_look: bool,
}

struct GpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    renderer: StereoRenderer,
}

impl App {
    fn drain_player_events(&mut self) {
        while let Ok(event) = self.player_events.try_recv() {
            match event {
                PlayerEvent::Ended => {
                    let summary = self.coordinator.lock().summary();
                    info!(
                        steps = summary.total_steps,
                        distance_km = summary.distance_km,
                        calories = summary.calories,
                        elapsed = ?summary.elapsed,
                        "Video finished"
                    );
                }
                PlayerEvent::Error(e) => {
                    error!(kind = %e.kind, code = e.kind.code(), message = %e.message, "Playback error");
                }
                PlayerEvent::OverlayChanged(overlay) => {
                    info!(text = %overlay.text, "Overlay changed");
                }
            }
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(gpu) = self.gpu.take() {
            gpu.renderer.release();
        }
        self.stream.release();

        let summary = self.coordinator.lock().summary();
        info!(
            steps = summary.total_steps,
            distance_km = summary.distance_km,
            calories = summary.calories,
            "Session summary"
        );

        // Save config on exit.
        if let Err(e) = stride_config::save_config(&self.settings.snapshot()) {
            error!(?e, "Failed to save config");
        }
        event_loop.exit();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: KeyCode) {
        match key {
            KeyCode::F5 => {
                if !self.head.calibrate() {
                    warn!("No head rotation yet; calibration skipped");
                }
            }
            KeyCode::F6 => {
                let samples = self.settings.snapshot().sensor.gyro_calibration_samples;
                self.head.recalibrate_gyro(samples);
            }
            KeyCode::F9 => {
                let stereo = !self.settings.render_settings().stereo_mode;
                self.settings.set_stereo_mode(stereo);
                info!(stereo, "Stereo mode toggled");
            }
            KeyCode::Space => self.coordinator.lock().on_step(),
            KeyCode::KeyP => self.coordinator.lock().toggle_pause(),
            KeyCode::KeyR => self.coordinator.lock().restart(),
            KeyCode::BracketLeft => self.coordinator.lock().seek_by(-SEEK_STEP_MS),
            KeyCode::BracketRight => self.coordinator.lock().seek_by(SEEK_STEP_MS),
            KeyCode::Escape => self.shutdown(event_loop),
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }

        let window = match &self.window {
            Some(window) => window.clone(),
            None => {
                // Side-by-side output spans both displays of the headset.
                let size = if self.mono_window {
                    PhysicalSize::new(1920, 1080)
                } else {
                    PhysicalSize::new(3840, 1080)
                };
                let attrs = Window::default_attributes()
                    .with_title("StrideVR")
                    .with_inner_size(size);
                let window =
                    Arc::new(event_loop.create_window(attrs).expect("Failed to create window"));
                self.window = Some(window.clone());
                window
            }
        };

        // Initialize wgpu.
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("Failed to create surface");

        let (device, queue, adapter) = pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: Some(&surface),
                    force_fallback_adapter: false,
                })
                .await
                .expect("No suitable GPU adapter found");

            info!(name = adapter.get_info().name, "Using GPU");

            let (device, queue) = adapter
                .request_device(
                    &wgpu::DeviceDescriptor {
                        label: Some("stride_device"),
                        required_features: wgpu::Features::empty(),
                        required_limits: wgpu::Limits::default(),
                        memory_hints: Default::default(),
                    },
                    None,
                )
                .await
                .expect("Failed to create device");

            (device, queue, adapter)
        });

        let win_size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: win_size.width.max(1),
            height: win_size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let render_config = self.settings.snapshot().render;
        let renderer = StereoRenderer::new(
            &device,
            &queue,
            format,
            surface_config.width,
            surface_config.height,
            &render_config,
        );

        self.gpu = Some(GpuState {
            device,
            queue,
            surface,
            surface_config,
            renderer,
        });

        info!(
            width = win_size.width,
            height = win_size.height,
            "Rendering context created"
        );
        window.request_redraw();
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        // The GPU context goes away; the decoder keeps its state for the next one.
        if let Some(gpu) = self.gpu.take() {
            gpu.renderer.release();
            info!(frames = gpu.renderer.frame_count(), "Rendering context released");
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if !self.mouse_look {
                return;
            }
            self.simulated_head.apply_delta(dx, dy);
            let rows = self.simulated_head.rotation_rows();
            if self.sensor_tx.try_send(SensorSample::Rotation(rows)).is_err() {
                tracing::trace!("Sensor queue full; mouse sample dropped");
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    if let Some(gpu) = &mut self.gpu {
                        gpu.surface_config.width = size.width;
                        gpu.surface_config.height = size.height;
                        gpu.surface.configure(&gpu.device, &gpu.surface_config);
                        gpu.renderer.resize(&gpu.device, size.width, size.height);
                    }
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        self.handle_key(event_loop, key);
                    }
                }
            }

            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.mouse_look = state == ElementState::Pressed;
            }

            WindowEvent::RedrawRequested => {
                self.drain_player_events();

                if let Some(gpu) = &mut self.gpu {
                    // One rotation snapshot per frame, shared by both eyes.
                    let rotation = self.head.snapshot();
                    let settings = self.settings.render_settings();

                    let output = match gpu.surface.get_current_texture() {
                        Ok(output) => output,
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            gpu.surface.configure(&gpu.device, &gpu.surface_config);
                            return;
                        }
                        Err(e) => {
                            warn!(?e, "Failed to get surface texture");
                            return;
                        }
                    };
                    let view = output
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());

                    let drawn = gpu.renderer.render_frame(
                        &gpu.device,
                        &gpu.queue,
                        &view,
                        &self.stream,
                        rotation,
                        &settings,
                    );
                    let queue = &gpu.queue;
                    submit_and_present(
                        drawn,
                        |cmd| {
                            queue.submit(std::iter::once(cmd));
                        },
                        || output.present(),
                    );
                }

                // Request next frame.
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}

/// Present only frames that were drawn. A skipped frame's image is dropped
/// unpresented, so the previous frame stays on screen.
fn submit_and_present<C>(drawn: Option<C>, submit: impl FnOnce(C), present: impl FnOnce()) -> bool {
    match drawn {
        Some(cmd) => {
            submit(cmd);
            present();
            true
        }
        None => false,
    }
}

/// Push speed into playback at the configured tick rate.
fn spawn_tick_loop(coordinator: Arc<Mutex<PlaybackCoordinator>>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            coordinator.lock().tick();
        }
    });
}

/// Stand-in pedometer: a cumulative counter advancing at a fixed cadence.
fn spawn_simulated_pedometer(coordinator: Arc<Mutex<PlaybackCoordinator>>, steps_per_minute: f32) {
    let period = Duration::from_secs_f32(60.0 / steps_per_minute.min(600.0));
    info!(steps_per_minute, "Simulated pedometer started");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let mut counter: u64 = 0;
        loop {
            interval.tick().await;
            coordinator.lock().on_pedometer_reading(counter);
            counter += 1;
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stridevr=info,stride_tracking=info,stride_renderer=info,stride_video=info,stride_pace=info"
                    .into()
            }),
        )
        .init();

    let args = Args::parse();
    info!("StrideVR starting");

    // Load config.
    let mut config = stride_config::load_config().unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if args.stereo {
        config.stereo_mode = true;
    }
    info!(ipd = config.ipd, stereo = config.stereo_mode, "Config loaded");

    let schedule = match &args.timecodes {
        Some(path) => TimecodeSchedule::load(path).unwrap_or_else(|e| {
            warn!(?e, ?path, "Failed to load timecodes, continuing without");
            TimecodeSchedule::default()
        }),
        None => TimecodeSchedule::default(),
    };

    let settings = SettingsStore::new(config.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Video: bind now, start once the warm-up gate opens.
    let factory = Arc::new(DefaultBackendFactory::new(clock.clone()));
    let (stream, player_events) = VideoTextureStream::new(factory, clock.clone());
    let stream = Arc::new(stream);
    stream.set_volume(config.video_volume);
    stream.bind(args.video.clone());

    let controller = Arc::new(StepSpeedController::new(config.pace, clock));
    let coordinator = Arc::new(Mutex::new(PlaybackCoordinator::new(
        settings.clone(),
        controller,
        stream.clone(),
        schedule,
    )));
    spawn_tick_loop(
        coordinator.clone(),
        Duration::from_millis(config.pace.tick_interval_ms),
    );
    match args.cadence {
        Some(cadence) if cadence.is_finite() && cadence > 0.0 => {
            spawn_simulated_pedometer(coordinator.clone(), cadence)
        }
        Some(cadence) => warn!(cadence, "Ignoring non-positive cadence"),
        None => info!("Press Space for each step"),
    }

    // Head tracking, fed by mouse look on the desktop.
    let (sensor_tx, sensor_rx) = mpsc::channel(256);
    let head = HeadTracker::spawn(sensor_rx, &config.sensor, SIMULATED_SENSOR_RATE_HZ);

    // Run the application.
    let event_loop = EventLoop::new()?;
    let mut app = App {
        settings,
        head,
        sensor_tx,
        simulated_head: SimulatedHead::default(),
        stream,
        coordinator,
        player_events,
        window: None,
        gpu: None,
        mono_window: args.mono_window,
        mouse_look: false,
    };
    event_loop.run_app(&mut app)?;

    Ok(())
}
