use anyhow::{Context, Result, anyhow};
use facesearch_core::{ParticipantInfo, Scene, SurfaceGeometry};
use facesearch_experiment::config::KeyConfig;
use facesearch_experiment::{
    CsvResultsWriter, ExperimentConfig, ExperimentEvent, ExperimentStateMachine,
};
use facesearch_render::{FontArc, SkiaRenderer};
use facesearch_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

type Session = ExperimentStateMachine<HighPrecisionTimer, ThreadRng, CsvResultsWriter>;

/// Everything the session needs once a window exists.
pub struct SessionSetup {
    pub config: ExperimentConfig,
    pub participant: ParticipantInfo,
    pub font: FontArc,
    pub data_root: PathBuf,
}

/// Translates a key press into a session input.
pub fn map_key(key: &Key, keys: &KeyConfig) -> Option<ExperimentEvent> {
    match key {
        Key::Named(NamedKey::Escape) => Some(ExperimentEvent::Abort),
        Key::Character(text) => {
            let mut chars = text.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            let same = |configured: char| ch.to_lowercase().eq(configured.to_lowercase());
            if same(keys.continue_key) {
                Some(ExperimentEvent::Continue)
            } else if same(keys.return_key) {
                Some(ExperimentEvent::Back)
            } else {
                match ch.to_digit(10) {
                    Some(d @ 1..=9) => Some(ExperimentEvent::Digit(d as u8)),
                    _ => None,
                }
            }
        }
        _ => None,
    }
}

pub struct App {
    setup: Option<SessionSetup>,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    session: Option<Session>,
    keys: KeyConfig,
    monitor_width_cm: f32,
    results_dir: PathBuf,

    scene: Scene,
    drawn_revision: Option<u64>,
    frame_clock: HighPrecisionTimer,
    last_present: Option<u64>,

    current_size: Option<PhysicalSize<u32>>,
    scale_factor: f64,
    refresh_rate: Option<f64>,

    error: Option<anyhow::Error>,
    should_exit: bool,
}

impl App {
    pub fn new(setup: SessionSetup) -> Self {
        Self {
            keys: setup.config.keys.clone(),
            monitor_width_cm: setup.config.display.monitor_width_cm,
            results_dir: setup.data_root.join("results"),
            scene: Scene::new(setup.config.appearance.background),
            setup: Some(setup),
            window: None,
            pixels: None,
            renderer: None,
            session: None,
            drawn_revision: None,
            frame_clock: HighPrecisionTimer::new(),
            last_present: None,
            current_size: None,
            scale_factor: 1.0,
            refresh_rate: None,
            error: None,
            should_exit: false,
        }
    }

    /// Runs the session to completion. Setup failures inside the event loop
    /// are returned here.
    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        println!("=== FACE SEARCH EXPERIMENT ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Architecture: {}", std::env::consts::ARCH);
        println!("Press ESC at any time to abort.\n");

        event_loop.run_app(&mut self)?;

        if let Some(err) = self.error.take() {
            return Err(err);
        }
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let setup = self
            .setup
            .take()
            .ok_or_else(|| anyhow!("session was already started"))?;

        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("Face Search")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        self.current_size = Some(physical_size);
        self.scale_factor = window.scale_factor();

        println!("Display Configuration:");
        println!(
            "  Physical size: {}×{}",
            physical_size.width, physical_size.height
        );
        println!("  Scale factor: {:.2}", self.scale_factor);
        if let Some(refresh_rate) = self.refresh_rate {
            println!("  Refresh rate: {:.1} Hz", refresh_rate);
        }

        let surface = SurfaceGeometry::from_pixels(
            physical_size.width,
            physical_size.height,
            self.monitor_width_cm,
        )?;
        info!(
            "Surface {:.1}x{:.1} cm at {:.2} px/cm",
            surface.width_cm, surface.height_cm, surface.pix_per_cm
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);
        self.renderer = Some(SkiaRenderer::for_surface(
            physical_size.width,
            physical_size.height,
            surface,
            Some(setup.font),
        )?);

        let sink = CsvResultsWriter::new(&setup.data_root);
        let session = Session::new(
            setup.config,
            setup.participant,
            surface,
            HighPrecisionTimer::new(),
            rand::rng(),
            sink,
        )
        .context("setting up the session")?;
        self.session = Some(session);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);

        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(session), Some(pixels), Some(renderer)) = (
            self.session.as_mut(),
            self.pixels.as_mut(),
            self.renderer.as_mut(),
        ) else {
            return Ok(());
        };

        session.update();

        let revision = session.revision();
        if self.drawn_revision != Some(revision) {
            session.compose(&mut self.scene);
            let stats = renderer.render_scene(&self.scene, pixels.frame_mut(), &mut self.frame_clock)?;
            debug!(
                "Frame rev {revision}: clear {:.3}ms, draw {:.3}ms, copy {:.3}ms, total {:.3}ms, {} commands",
                stats.clear.as_secs_f64() * 1e3,
                stats.draw.as_secs_f64() * 1e3,
                stats.copy.as_secs_f64() * 1e3,
                stats.total.as_secs_f64() * 1e3,
                stats.commands,
            );
            self.drawn_revision = Some(revision);
        }

        pixels.render()?;

        let now = self.frame_clock.now();
        if let Some(prev) = self.last_present.replace(now) {
            session.record_frame(std::time::Duration::from_nanos(now.saturating_sub(prev)));
        }
        session.handle_event(ExperimentEvent::FramePresented);

        if let Some(window) = &self.window {
            window.request_redraw();
        }
        Ok(())
    }

    fn handle_input(&mut self, event: &KeyEvent) {
        if event.repeat {
            return;
        }
        let Some(input) = map_key(&event.logical_key, &self.keys) else {
            return;
        };
        if let Some(session) = self.session.as_mut() {
            if input == ExperimentEvent::Abort {
                warn!("Session aborted by the participant");
            }
            session.handle_event(input);
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if self.current_size == Some(new_size) || new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.current_size = Some(new_size);
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!("Failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!("Failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            let pix_per_cm = new_size.width as f32 / self.monitor_width_cm;
            if let Err(e) = renderer.resize(new_size.width, new_size.height, pix_per_cm) {
                error!("Failed to resize renderer: {e}");
            }
        }
        self.drawn_revision = None;
        info!("Display resized to: {}x{}", new_size.width, new_size.height);
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        self.cleanup_and_exit(event_loop);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            return;
        }
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }

        if let Some(session) = &self.session {
            let stats = session.frame_stats();
            info!(
                "Frame timing: {} samples, avg {:.3}ms, jitter {:.3}ms, {:.1} fps",
                stats.samples,
                stats.average_frame_time_ns / 1e6,
                stats.jitter_ns / 1e6,
                stats.effective_fps,
            );
            if session.was_aborted() {
                println!("\nExperiment aborted.");
            } else if session.is_finished() {
                println!("\nExperiment completed.");
            }
            println!("Results saved in {}. Thank you!", self.results_dir.display());
        }

        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() && self.setup.is_some() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.fail(event_loop, e.context("Failed to create window and surface"));
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(session) = self.session.as_mut() {
                    session.handle_event(ExperimentEvent::Abort);
                }
                self.cleanup_and_exit(event_loop);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.fail(event_loop, e);
                    return;
                }
                if self.session.as_ref().is_some_and(|s| s.is_finished()) {
                    self.cleanup_and_exit(event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_input(&event);
                if self.session.as_ref().is_some_and(|s| s.is_finished()) {
                    self.cleanup_and_exit(event_loop);
                }
            }
            WindowEvent::Resized(sz) => self.handle_resize(sz),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> KeyConfig {
        ExperimentConfig::default().keys
    }

    fn key(s: &str) -> Key {
        Key::Character(s.into())
    }

    #[test]
    fn configured_keys_match_in_either_case() {
        let keys = keys();
        assert_eq!(map_key(&key("b"), &keys), Some(ExperimentEvent::Continue));
        assert_eq!(map_key(&key("B"), &keys), Some(ExperimentEvent::Continue));
        assert_eq!(map_key(&key("V"), &keys), Some(ExperimentEvent::Back));
    }

    #[test]
    fn digits_one_to_nine_are_forwarded() {
        let keys = keys();
        assert_eq!(map_key(&key("1"), &keys), Some(ExperimentEvent::Digit(1)));
        assert_eq!(map_key(&key("9"), &keys), Some(ExperimentEvent::Digit(9)));
        assert_eq!(map_key(&key("0"), &keys), None);
    }

    #[test]
    fn escape_aborts_and_other_keys_are_ignored() {
        let keys = keys();
        assert_eq!(
            map_key(&Key::Named(NamedKey::Escape), &keys),
            Some(ExperimentEvent::Abort)
        );
        assert_eq!(map_key(&Key::Named(NamedKey::Space), &keys), None);
        assert_eq!(map_key(&key("x"), &keys), None);
        assert_eq!(map_key(&key("bb"), &keys), None);
    }
}
