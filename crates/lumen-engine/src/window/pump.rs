use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    /// Initial inner width in logical pixels.
    pub width: u32,
    /// Initial inner height in logical pixels.
    pub height: u32,
    pub enable_msaa: bool,
    /// Requested MSAA samples when `enable_msaa` is set.
    pub aa_sample: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            width: 1280,
            height: 720,
            enable_msaa: false,
            aa_sample: 4,
            resizable: true,
        }
    }
}

impl WindowConfig {
    /// Sample count to request from the GPU layer.
    pub fn sample_count(&self) -> u32 {
        if self.enable_msaa { self.aa_sample.max(1) } else { 1 }
    }
}

/// A window whose events are pumped by the caller.
///
/// `tick()` must be called once per frame before `should_close()`, `width()`,
/// `height()` or `events()` are consulted for that frame.
pub struct Window {
    event_loop: EventLoop<()>,
    state: PumpState,
    window: Arc<winit::window::Window>,
}

struct PumpState {
    config: WindowConfig,
    window: Option<Arc<winit::window::Window>>,
    /// Events received during the last `tick()`.
    events: Vec<WindowEvent>,
    size: PhysicalSize<u32>,
    close_requested: bool,
    create_error: Option<anyhow::Error>,
}

/// Attempts to pump the loop until the platform delivers the window.
const CREATE_ATTEMPTS: u32 = 200;

impl Window {
    /// Opens the window and pumps the event loop until it exists.
    pub fn create(config: WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = PumpState {
            config,
            window: None,
            events: Vec::new(),
            size: PhysicalSize::new(0, 0),
            close_requested: false,
            create_error: None,
        };

        for _ in 0..CREATE_ATTEMPTS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut state)
            {
                anyhow::bail!("event loop exited with code {code} before the window was created");
            }
            if let Some(err) = state.create_error.take() {
                return Err(err);
            }
            if state.window.is_some() {
                break;
            }
        }
        let window = state
            .window
            .clone()
            .context("window was not created by the platform")?;

        log::info!(
            "window \"{}\" created ({}x{} physical)",
            state.config.title,
            state.size.width,
            state.size.height
        );

        Ok(Self {
            event_loop,
            state,
            window,
        })
    }

    /// Pumps pending platform events without blocking.
    pub fn tick(&mut self) {
        self.state.events.clear();
        if let PumpStatus::Exit(code) =
            self.event_loop.pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            log::debug!("event loop exited with code {code}");
            self.state.close_requested = true;
        }
    }

    pub fn should_close(&self) -> bool {
        self.state.close_requested
    }

    /// Requests the window to close at the next `should_close()` check.
    pub fn close(&mut self) {
        self.state.close_requested = true;
    }

    /// Drawable width in physical pixels.
    pub fn width(&self) -> u32 {
        self.state.size.width
    }

    /// Drawable height in physical pixels.
    pub fn height(&self) -> u32 {
        self.state.size.height
    }

    pub fn scale_factor(&self) -> f64 {
        self.window.scale_factor()
    }

    /// Events delivered during the last `tick()`.
    pub fn events(&self) -> &[WindowEvent] {
        &self.state.events
    }

    pub fn config(&self) -> &WindowConfig {
        &self.state.config
    }

    /// The underlying winit window.
    pub fn raw(&self) -> &Arc<winit::window::Window> {
        &self.window
    }
}

impl PumpState {
    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = winit::window::Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height))
            .with_resizable(self.config.resizable);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        self.size = window.inner_size();
        self.window = Some(Arc::new(window));
        Ok(())
    }
}

impl ApplicationHandler for PumpState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            log::error!("failed to create window: {e:#}");
            self.create_error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = &self.window else { return };
        if window.id() != window_id {
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.close_requested = true,
            WindowEvent::Resized(new_size) => self.size = *new_size,
            WindowEvent::ScaleFactorChanged { .. } => self.size = window.inner_size(),
            _ => {}
        }

        self.events.push(event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msaa_disabled_requests_one_sample() {
        let config = WindowConfig {
            enable_msaa: false,
            aa_sample: 8,
            ..Default::default()
        };
        assert_eq!(config.sample_count(), 1);
    }

    #[test]
    fn msaa_enabled_requests_configured_samples() {
        let config = WindowConfig {
            enable_msaa: true,
            aa_sample: 8,
            ..Default::default()
        };
        assert_eq!(config.sample_count(), 8);
    }
}
