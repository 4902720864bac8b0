// Window lifecycle and event loop
//
// The window owns the renderer; Vulkan setup happens on `resumed` once
// the window exists and its raw handles can be wrapped in a surface.
// Rendering is driven by continuous redraw requests.

mod backend;
mod config;
mod error;
mod mesh;
mod renderer;

use anyhow::Result;
use config::Config;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use renderer::Renderer;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowAttributes},
};

fn main() -> Result<()> {
    let config = Config::load();
    init_logging();

    log::info!(
        "starting {} at {}x{}{}",
        config.window.title,
        config.window.width,
        config.window.height,
        if config.window.fullscreen {
            " (fullscreen)"
        } else {
            ""
        }
    );
    log::info!("preferred present mode: {}", config.graphics.present_mode);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if let Some(err) = app.fatal_error.take() {
        return Err(err);
    }
    Ok(())
}

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

struct App {
    config: Config,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    is_fullscreen: bool,
    /// First render error; stops the loop and becomes the process exit
    fatal_error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;
        Self {
            config,
            window: None,
            renderer: None,
            is_fullscreen,
            fatal_error: None,
        }
    }

    fn init_renderer(&mut self, window: &Window) -> Result<()> {
        let display_handle = window.raw_display_handle();
        let window_handle = window.raw_window_handle();

        let enable_validation = cfg!(debug_assertions) && self.config.debug.validation_layers;
        let device = backend::DeviceContext::new(
            &self.config.window.title,
            display_handle,
            window_handle,
            enable_validation,
        )?;

        let size = window.inner_size();
        let renderer = Renderer::new(
            device,
            self.config.preferred_present_mode(),
            self.config.graphics.clear_color,
            (size.width, size.height),
        )?;

        self.renderer = Some(renderer);
        log::info!("renderer initialized");
        Ok(())
    }

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;
            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            } else {
                window.set_fullscreen(None);
            }
            log::info!(
                "fullscreen: {}",
                if self.is_fullscreen { "on" } else { "off" }
            );
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match renderer.render_frame() {
            Ok(report) => {
                if self.config.debug.show_fps {
                    if let (Some(sample), Some(window)) = (report.fps, self.window.as_ref()) {
                        let mode = if self.is_fullscreen {
                            "fullscreen"
                        } else {
                            "windowed"
                        };
                        window.set_title(&format!(
                            "{} - {:.0} FPS [{}]",
                            self.config.window.title, sample.fps, mode
                        ));
                    }
                }
            }
            Err(e) => {
                log::error!("render failed: {}", e);
                self.fatal_error = Some(e.into());
                event_loop.exit();
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        if self.config.window.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("failed to create window: {}", e);
                self.fatal_error = Some(e.into());
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_renderer(&window) {
            log::error!("failed to initialize renderer: {}", e);
            self.fatal_error = Some(e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::debug!("window resized to {}x{}", size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.note_resized(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};
                if event.state.is_pressed() {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        match key {
                            KeyCode::Escape => event_loop.exit(),
                            KeyCode::F11 => self.toggle_fullscreen(),
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
