// =============================================================================
// WINDOW - The platform collaborator the renderer consumes
// =============================================================================
//
// The core only needs five things from a window system: a close flag, event
// polling, the framebuffer size, the instance extensions for surfaces, and
// the surface itself. `WinitWindow` provides them on top of winit's
// pump-events API so the frame loop stays a plain `while` loop.

use crate::error::{GraphicsError, Result};
use ash::{vk, Entry};
use std::ffi::c_char;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    window::{Window, WindowAttributes, WindowId},
};

pub trait WindowSystem {
    fn should_close(&self) -> bool;

    /// Process pending events without blocking.
    fn poll_events(&mut self);

    /// Current drawable size in pixels.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Instance extensions needed to create a surface for this window.
    fn required_instance_extensions(&self) -> Result<Vec<*const c_char>>;

    fn create_surface(&self, entry: &Entry, instance: &ash::Instance) -> Result<vk::SurfaceKHR>;
}

/// winit-backed window. Events are pumped manually, never through `run_app`.
pub struct WinitWindow {
    event_loop: EventLoop<()>,
    state: WindowState,
}

struct WindowState {
    pending: Option<WindowAttributes>,
    window: Option<Window>,
    create_error: Option<winit::error::OsError>,
    close_requested: bool,
    size: PhysicalSize<u32>,
}

impl WinitWindow {
    /// Open a fixed-size window. Resizing is disabled because the swapchain
    /// is never recreated.
    pub fn create(width: u32, height: u32, title: &str) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new()?;

        let attributes = Window::default_attributes()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false);

        let mut window = Self {
            event_loop,
            state: WindowState {
                pending: Some(attributes),
                window: None,
                create_error: None,
                close_requested: false,
                size: PhysicalSize::new(width, height),
            },
        };

        // The window can only be created once the loop reports `resumed`.
        while window.state.window.is_none() {
            if let Some(err) = window.state.create_error.take() {
                return Err(anyhow::anyhow!("Failed to create window: {}", err));
            }
            if let PumpStatus::Exit(code) = window
                .event_loop
                .pump_app_events(Some(Duration::from_millis(10)), &mut window.state)
            {
                anyhow::bail!("Event loop exited with code {} before the window opened", code);
            }
        }

        let size = window.state.window.as_ref().map(Window::inner_size);
        if let Some(size) = size {
            window.state.size = size;
        }
        log::info!(
            "Window created: {}x{} ({})",
            window.state.size.width,
            window.state.size.height,
            title
        );

        Ok(window)
    }

    fn window(&self) -> Result<&Window> {
        self.state
            .window
            .as_ref()
            .ok_or(GraphicsError::WindowHandle(raw_window_handle::HandleError::Unavailable))
    }
}

impl WindowSystem for WinitWindow {
    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn poll_events(&mut self) {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            log::info!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        (self.state.size.width, self.state.size.height)
    }

    fn required_instance_extensions(&self) -> Result<Vec<*const c_char>> {
        let display = self.window()?.display_handle()?.as_raw();
        let extensions = ash_window::enumerate_required_extensions(display)
            .map_err(GraphicsError::SurfaceCreationFailed)?;
        Ok(extensions.to_vec())
    }

    fn create_surface(&self, entry: &Entry, instance: &ash::Instance) -> Result<vk::SurfaceKHR> {
        let window = self.window()?;
        let display = window.display_handle()?.as_raw();
        let handle = window.window_handle()?.as_raw();

        unsafe { ash_window::create_surface(entry, instance, display, handle, None) }
            .map_err(GraphicsError::SurfaceCreationFailed)
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(attributes) = self.pending.take() {
            match event_loop.create_window(attributes) {
                Ok(window) => self.window = Some(window),
                Err(err) => self.create_error = Some(err),
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.size = size;
            }
            _ => {}
        }
    }
}
