use anyhow::Result;
use rand::rngs::ThreadRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stimkit_core::{catalog, ParamValue, TimerPolicy};
use stimkit_render::{load_font, FontArc, SkiaRenderer};
use stimkit_session::{PresentationQueue, SessionConfig, SessionEvent};
use stimkit_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowId},
};

const DEFAULT_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn resolve_font(config: &SessionConfig) -> Option<FontArc> {
    let configured = config.font_path.iter().map(PathBuf::as_path);
    for path in configured.chain(DEFAULT_FONTS.iter().map(Path::new)) {
        if !path.exists() {
            continue;
        }
        match load_font(path) {
            Ok(font) => {
                println!("Loaded font {}", path.display());
                return Some(font);
            }
            Err(e) => eprintln!("Skipping font {}: {e}", path.display()),
        }
    }
    None
}

/// The standard block: open the player, instruct, then per trial a
/// progress message, a fill screen, and a switching test; a closing
/// message and the player close bracket the block.
fn enqueue_standard_session(
    queue: &mut PresentationQueue<HighPrecisionTimer, ThreadRng>,
    trials: usize,
) -> Result<()> {
    queue.enqueue(catalog::media_player_open()?)?;
    queue.enqueue(catalog::instruction()?)?;

    for trial in 0..trials {
        queue.enqueue_trial_start(catalog::trial_message()?)?;
        queue.enqueue(catalog::fill_screen()?)?;

        let mut switching = if trial % 2 == 0 {
            catalog::white_switching()?
        } else {
            catalog::black_switching()?
        };
        // Cap the display-test wait so an unattended session still ends.
        switching.params.define(
            "Timer",
            ParamValue::Timer(TimerPolicy::ResponseDeadline { ms: 4000 }),
        )?;
        queue.enqueue(switching)?;
    }

    let mut done = catalog::message()?;
    done.params
        .assign("Text", ParamValue::Text("Done. Thank you!".to_string()))?;
    queue.enqueue(done)?;

    let mut close = catalog::media_player()?;
    close.title = "Media Player Close".to_string();
    close.params
        .assign("Command", ParamValue::Text("close".to_string()))?;
    queue.enqueue(close)?;

    Ok(())
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    queue: PresentationQueue<HighPrecisionTimer, ThreadRng>,
    renderer: Option<SkiaRenderer>,
    render_timer: HighPrecisionTimer,
    font: Option<FontArc>,
    current_size: Option<PhysicalSize<u32>>,
    scale_factor: f64,
    refresh_rate: Option<f64>,
    results_path: PathBuf,
    results_saved: bool,
    should_exit: bool,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = SessionConfig::load_or_default(Path::new("stimkit.json"))?;
        let font = resolve_font(&config);
        let results_path = config.results_path.clone();

        let timer = HighPrecisionTimer::new();
        let rng = rand::rng();
        let trials = config.trials;
        let mut queue = PresentationQueue::new(config, timer, rng);
        enqueue_standard_session(&mut queue, trials)?;

        Ok(Self {
            window: None,
            pixels: None,
            queue,
            renderer: None,
            render_timer: HighPrecisionTimer::new(),
            font,
            current_size: None,
            scale_factor: 1.0,
            refresh_rate: None,
            results_path,
            results_saved: false,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        println!("=== STIMKIT PRESENTATION ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Architecture: {}", std::env::consts::ARCH);
        println!("Press SPACE to respond or ESC to exit.\n");

        event_loop.run_app(&mut self).map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow::anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("Stimkit")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        let scale_factor = window.scale_factor();

        self.current_size = Some(physical_size);
        self.scale_factor = scale_factor;

        println!("Display Configuration:");
        println!(
            "  Physical size: {}×{}",
            physical_size.width, physical_size.height
        );
        println!("  Scale factor: {:.2}", scale_factor);
        if let Some(refresh_rate) = self.refresh_rate {
            println!("  Refresh rate: {:.1} Hz", refresh_rate);
        }

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());

        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        self.renderer = Some(SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            self.font.clone(),
        ));
        self.queue
            .prepare((physical_size.width, physical_size.height))?;

        window.set_cursor_visible(false);
        window.request_redraw();

        self.window = Some(window);

        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let Some(pixels) = self.pixels.as_mut() else {
            return Ok(());
        };
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        let frame = pixels.frame_mut();
        let view = self.queue.frame_view();
        let (display, field_on) = match &view {
            Some(v) => (Some(v.display), v.field_on),
            None => (None, true),
        };
        let stats = renderer.render_frame(display, field_on, frame, &mut self.render_timer)?;
        drop(view);

        pixels.render()?;

        // Frames recorded on the queue's timer drive its calibration.
        self.queue.timer.record_frame(stats.total);

        if self.render_timer.frame_count() % 300 == 0 {
            let cal = self.render_timer.calibration_stats();
            println!(
                "frame {:.3} ms avg ({:.1} fps), clear {:.3} ms, draw {:.3} ms, copy {:.3} ms, dirty {}",
                cal.average_frame_time_ns / 1e6,
                cal.effective_fps,
                stats.clear.as_secs_f64() * 1e3,
                stats.draw.as_secs_f64() * 1e3,
                stats.copy.as_secs_f64() * 1e3,
                stats.dirty_count,
            );
        }

        Ok(())
    }

    fn update(&mut self, event_loop: &ActiveEventLoop) {
        for event in self.queue.update() {
            self.queue.handle_event(event);
        }
        if self.queue.is_finished() {
            self.cleanup_and_exit(event_loop);
        }
    }

    fn handle_input(&mut self, key: winit::keyboard::PhysicalKey, event_loop: &ActiveEventLoop) {
        use winit::keyboard::{KeyCode, PhysicalKey};
        if let PhysicalKey::Code(k) = key {
            match k {
                KeyCode::Space => {
                    self.queue.handle_event(SessionEvent::Response { code: 32 });
                }
                KeyCode::Enter => {
                    self.queue.handle_event(SessionEvent::Response { code: 13 });
                }
                KeyCode::Escape => self.cleanup_and_exit(event_loop),
                _ => {}
            }
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.current_size = Some(new_size);
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                eprintln!("Failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                eprintln!("Failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(new_size.width, new_size.height);
        }
        if let Err(e) = self.queue.prepare((new_size.width, new_size.height)) {
            eprintln!("Failed to rebuild displays: {e}");
        }
        println!("Display resized to: {}×{}", new_size.width, new_size.height);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }

        if !self.results_saved {
            match self.queue.save_records(&self.results_path) {
                Ok(()) => {
                    self.results_saved = true;
                    println!(
                        "\nSession over, {} records saved to {}",
                        self.queue.records().len(),
                        self.results_path.display()
                    );
                }
                Err(e) => eprintln!("Failed to save records: {e}"),
            }
        }

        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                eprintln!("Failed to create window and surface: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    eprintln!("Render failed: {e}");
                    self.cleanup_and_exit(event_loop);
                    return;
                }
                self.update(event_loop);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_input(event.physical_key, event_loop);
            }
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
