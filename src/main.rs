// =============================================================================
// HELLO TRIANGLE - Minimal Vulkan application
// =============================================================================
//
// Opens a window, brings up the full Vulkan object chain and draws a single
// triangle every frame until the window is closed.
//
// FRAME FLOW:
// 1. Wait for the previous frame's fence
// 2. Acquire swapchain image
// 3. Record the command buffer (clear + draw 3 vertices)
// 4. Submit to the graphics queue
// 5. Present rendered image to screen
//
// =============================================================================

mod backend;
mod config;
mod renderer;

use anyhow::{Context, Result};
use config::Config;
use renderer::Renderer;
use std::fs::File;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    // Initialize logging
    init_logging(&config)?;
    log::info!("Starting Hello Triangle");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.resizable { "resizable" } else { "fixed size" }
    );

    config.validate().context("Invalid configuration")?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // Errors raised inside event callbacks surface here for a non-zero exit
    match app.error.take() {
        Some(e) => Err(e),
        None => {
            log::info!("Exited cleanly");
            Ok(())
        }
    }
}

/// Initialize logging, optionally into a file instead of stderr
fn init_logging(config: &Config) -> Result<()> {
    use env_logger::{Builder, Target};

    let mut builder = Builder::new();
    builder.filter_level(config.log_level());
    // RUST_LOG still wins over the config file
    builder.parse_default_env();

    if !config.debug.log_file.is_empty() {
        let file = File::create(&config.debug.log_file)
            .with_context(|| format!("Failed to create log file {:?}", config.debug.log_file))?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: `renderer` is declared before `window` so the surface is
/// destroyed before the window it belongs to.
struct App {
    config: Config,
    renderer: Option<Renderer>,
    window: Option<Arc<Window>>,
    /// First fatal error; ends the event loop
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.shutdown(event_loop);
    }

    /// Wait for the GPU, tear down Vulkan, then stop the loop
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.take() {
            if let Err(e) = renderer.wait_idle() {
                log::warn!("Failed to wait for device idle: {:#}", e);
            }
            drop(renderer);
        }
        event_loop.exit();
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(self.config.window.resizable);

        let window = event_loop
            .create_window(window_attributes)
            .context("Failed to create window")?;

        Ok(Arc::new(window))
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match self.create_window(event_loop) {
            Ok(window) => window,
            Err(e) => return self.fail(event_loop, e),
        };

        match Renderer::new(&window, &self.config) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(e) => return self.fail(event_loop, e.context("Failed to initialize Vulkan")),
        }

        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                if let Err(e) = renderer.draw_frame() {
                    self.fail(event_loop, e.context("Failed to draw frame"));
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }

    /// Keep drawing continuously while the window is visible
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let minimized = self
            .renderer
            .as_ref()
            .map_or(true, |renderer| renderer.is_minimized());

        if let Some(window) = self.window.as_ref() {
            if !minimized {
                window.request_redraw();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Covers exits not routed through `shutdown`
        self.renderer = None;
    }
}
