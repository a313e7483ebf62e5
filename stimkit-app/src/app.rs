use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use pixels::{Pixels, SurfaceTexture};
use stimkit_core::{InputEvent, PointerButton, Questionnaire, ResponseInput, SessionPhase};
use stimkit_experiment::{Session, SessionConfig, SessionError};
use stimkit_render::SoftwareGraphics;
use stimkit_resources::{FsFetcher, ResourceManager, SharedAudio};
use stimkit_timing::{HighPrecisionTimer, Timer};
use tokio::runtime::Runtime;
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::audio::{self, AudioSink};

#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub fullscreen: bool,
    pub width: u32,
    pub height: u32,
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    gpu: Option<SoftwareGraphics>,
    session: Session<HighPrecisionTimer>,
    runtime: Runtime,
    _audio: AudioSink,
    options: WindowOptions,
    output: Option<PathBuf>,
    current_size: Option<PhysicalSize<u32>>,
    scale_factor: f64,
    refresh_rate: Option<f64>,
    cursor: PhysicalPosition<f64>,
    saved: bool,
    should_exit: bool,
}

impl App {
    pub fn new(
        questionnaire: Questionnaire,
        config: SessionConfig,
        assets: PathBuf,
        options: WindowOptions,
        output: Option<PathBuf>,
    ) -> Result<Self> {
        let (mixer, sink) = audio::open_output()?;
        let audio: SharedAudio = mixer;
        let resources = ResourceManager::with_audio_output(FsFetcher::new(assets), audio);
        let session = Session::new(questionnaire, config, resources, HighPrecisionTimer::new())?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .thread_name("stimkit-loader")
            .build()
            .context("building the loader runtime")?;

        Ok(Self {
            window: None,
            pixels: None,
            gpu: None,
            session,
            runtime,
            _audio: sink,
            options,
            output,
            current_size: None,
            scale_factor: 1.0,
            refresh_rate: None,
            cursor: PhysicalPosition::new(0.0, 0.0),
            saved: false,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        tracing::info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "starting session, ESC aborts"
        );
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow::anyhow!("no monitor available"))?;

        self.refresh_rate = monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let mut attributes = Window::default_attributes()
            .with_title("stimkit")
            .with_resizable(false);
        attributes = if self.options.fullscreen {
            attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
        } else {
            attributes.with_inner_size(PhysicalSize::new(self.options.width, self.options.height))
        };

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        self.current_size = Some(size);
        self.scale_factor = window.scale_factor();
        tracing::info!(
            width = size.width,
            height = size.height,
            scale = self.scale_factor,
            refresh_hz = self.refresh_rate,
            "display configured"
        );

        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);
        self.gpu = Some(SoftwareGraphics::new(size.width, size.height)?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        if self.session.phase() == SessionPhase::Loading {
            // blocks the event loop; the last presented frame stays up
            let stats = self.runtime.block_on(self.session.load_page(|p| {
                tracing::debug!(loaded = p.loaded, total = p.total, resource = ?p.current_resource, "preload progress");
            }))?;
            tracing::debug!(?stats, "page resources ready");
        }

        let (Some(pixels), Some(gpu)) = (self.pixels.as_mut(), self.gpu.as_mut()) else {
            return Ok(());
        };
        match self.session.frame(gpu) {
            Ok(()) => {}
            Err(SessionError::Aborted(reason)) => tracing::error!(%reason, "session aborted"),
            Err(err) => return Err(err.into()),
        }
        gpu.copy_frame_into(pixels.frame_mut());
        pixels.render()?;
        Ok(())
    }

    fn stamp(&self) -> u64 {
        self.session.timer().now()
    }

    fn handle_key(&mut self, key: PhysicalKey, event_loop: &ActiveEventLoop) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        if code == KeyCode::Escape {
            tracing::warn!("session stopped by operator");
            self.cleanup_and_exit(event_loop);
            return;
        }
        // winit's key names follow the `KeyF` / `Space` / `ArrowLeft` scheme
        let event = InputEvent::new(ResponseInput::key(format!("{code:?}")), self.stamp());
        self.session.handle_input(event);
    }

    fn handle_pointer(&mut self, button: MouseButton) {
        let button = match button {
            MouseButton::Left => PointerButton::Primary,
            MouseButton::Right => PointerButton::Secondary,
            MouseButton::Middle => PointerButton::Middle,
            _ => return,
        };
        let input = ResponseInput::Pointer {
            button,
            x: self.cursor.x as f32,
            y: self.cursor.y as f32,
        };
        let event = InputEvent::new(input, self.stamp());
        self.session.handle_input(event);
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.current_size = Some(size);
        if let Some(pixels) = &mut self.pixels {
            if let Err(err) = pixels.resize_surface(size.width, size.height) {
                tracing::error!(%err, "failed to resize surface");
            }
            if let Err(err) = pixels.resize_buffer(size.width, size.height) {
                tracing::error!(%err, "failed to resize buffer");
            }
        }
        if let Some(gpu) = &mut self.gpu {
            if let Err(err) = gpu.resize(size.width, size.height) {
                tracing::error!(%err, "failed to resize canvas");
            }
        }
        tracing::info!(width = size.width, height = size.height, "display resized");
    }

    fn save_results(&mut self) -> Result<()> {
        if self.saved {
            return Ok(());
        }
        self.saved = true;
        let json = self.session.results().to_json()?;
        match &self.output {
            Some(path) => {
                std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
                tracing::info!(path = %path.display(), "results written");
            }
            None => println!("{json}"),
        }
        Ok(())
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.save_results() {
            tracing::error!(%err, "results could not be saved");
        }
        if let Some(gpu) = &mut self.gpu {
            self.session.dispose(gpu);
        }
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.create_window_and_surface(event_loop) {
                tracing::error!(%err, "failed to create window and surface");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.render() {
                    tracing::error!(%err, "frame failed");
                    self.cleanup_and_exit(event_loop);
                    return;
                }
                if self.session.phase().is_finished() {
                    self.cleanup_and_exit(event_loop);
                } else if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.handle_key(event.physical_key, event_loop);
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor = position,
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button,
                ..
            } => self.handle_pointer(button),
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = scale_factor;
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
