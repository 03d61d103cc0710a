//! Immediate-mode UI overlay (egui) composited over the scene.
//!
//! ```ignore
//! let ctx = ui.begin(&window, &mut rc)?;
//! egui::Window::new("Controls").show(&ctx, |ui| {
//!     ui.add(egui::Slider::new(&mut fov, 1.0..=179.0));
//! });
//! ui.end(&window, &mut rc)?;
//! rc.present()?;
//! ```
//!
//! Widget values are written back to caller-owned variables during the pass
//! and take effect from the next frame's draws.

use crate::render::{Backend, OverlayFrame, RenderContext, RenderError};
use crate::window::Window;

/// egui context plus its winit input adapter.
pub struct UiOverlay {
    ctx: egui::Context,
    /// Created on the first windowed pass; needs the window's display handle.
    input: Option<egui_winit::State>,
    in_pass: bool,
}

impl Default for UiOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl UiOverlay {
    pub fn new() -> Self {
        Self {
            ctx: egui::Context::default(),
            input: None,
            in_pass: false,
        }
    }

    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }

    /// Whether the pointer is over UI; callers may skip camera input then.
    pub fn wants_pointer_input(&self) -> bool {
        self.ctx.wants_pointer_input()
    }

    /// Starts the UI pass with the events `window` collected in its last tick.
    pub fn begin<B: Backend>(
        &mut self,
        window: &Window,
        rc: &mut RenderContext<B>,
    ) -> Result<egui::Context, RenderError> {
        let raw_window = window.raw();
        let input = self.input.get_or_insert_with(|| {
            egui_winit::State::new(
                self.ctx.clone(),
                egui::ViewportId::ROOT,
                &**raw_window,
                Some(window.scale_factor() as f32),
                None,
                None,
            )
        });

        for event in window.events() {
            let _ = input.on_window_event(raw_window, event);
        }
        let raw_input = input.take_egui_input(raw_window);
        self.begin_with_input(rc, raw_input)
    }

    /// Starts the UI pass with explicit input, without a window.
    pub fn begin_with_input<B: Backend>(
        &mut self,
        rc: &mut RenderContext<B>,
        raw_input: egui::RawInput,
    ) -> Result<egui::Context, RenderError> {
        rc.begin_ui()?;
        self.ctx.begin_pass(raw_input);
        self.in_pass = true;
        Ok(self.ctx.clone())
    }

    /// Ends the UI pass, applies platform output (cursor, clipboard) to
    /// `window` and hands the tessellated overlay to the render context.
    pub fn end<B: Backend>(&mut self, window: &Window, rc: &mut RenderContext<B>) -> Result<(), RenderError> {
        let Some(output) = self.finish_pass() else {
            return rc.end_ui(OverlayFrame::default());
        };
        if let Some(input) = &mut self.input {
            input.handle_platform_output(window.raw(), output.platform_output.clone());
        }
        rc.end_ui(self.overlay_frame(output))
    }

    /// Ends the UI pass without applying platform output.
    pub fn end_without_window<B: Backend>(&mut self, rc: &mut RenderContext<B>) -> Result<(), RenderError> {
        match self.finish_pass() {
            Some(output) => rc.end_ui(self.overlay_frame(output)),
            None => rc.end_ui(OverlayFrame::default()),
        }
    }

    fn finish_pass(&mut self) -> Option<egui::FullOutput> {
        if !std::mem::take(&mut self.in_pass) {
            return None;
        }
        Some(self.ctx.end_pass())
    }

    fn overlay_frame(&self, output: egui::FullOutput) -> OverlayFrame {
        let pixels_per_point = output.pixels_per_point;
        OverlayFrame {
            primitives: self.ctx.tessellate(output.shapes, pixels_per_point),
            textures_delta: output.textures_delta,
            pixels_per_point,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::render::{Extent, FrameState, RecordedCommand, RecordingBackend, RenderConfig, RenderingInfo};

    fn input(width: f32, height: f32) -> egui::RawInput {
        egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(width, height))),
            ..Default::default()
        }
    }

    fn begin_frame(rc: &mut RenderContext<RecordingBackend>) {
        rc.begin_rendering(
            &RenderingInfo {
                extent: Extent::new(640, 480),
            },
            Vec4::ZERO,
            1.0,
        )
        .unwrap();
    }

    #[test]
    fn ui_pass_records_tessellated_overlay() {
        let mut rc = RenderContext::new(RecordingBackend::new(), RenderConfig::default());
        let mut ui = UiOverlay::new();
        let mut value = 0.5f32;

        begin_frame(&mut rc);
        let ctx = ui.begin_with_input(&mut rc, input(640.0, 480.0)).unwrap();
        assert_eq!(rc.frame_state(), FrameState::UiActive);
        egui::CentralPanel::default().show(&ctx, |ui| {
            ui.label("controls");
            ui.add(egui::Slider::new(&mut value, 0.0..=1.0).text("value"));
        });
        ui.end_without_window(&mut rc).unwrap();
        assert_eq!(rc.frame_state(), FrameState::UiDone);
        rc.present().unwrap();

        let overlay = rc
            .backend()
            .commands()
            .iter()
            .find_map(|c| match c {
                RecordedCommand::Overlay { primitives, .. } => Some(*primitives),
                _ => None,
            })
            .unwrap();
        assert!(overlay > 0);
    }

    #[test]
    fn ui_pass_requires_a_recording_frame() {
        let mut rc = RenderContext::new(RecordingBackend::new(), RenderConfig::default());
        let mut ui = UiOverlay::new();

        let err = ui.begin_with_input(&mut rc, input(640.0, 480.0)).unwrap_err();
        assert!(matches!(err, RenderError::FrameState { state: FrameState::Idle, .. }));
        assert!(ui.end_without_window(&mut rc).is_err());
    }

    #[test]
    fn empty_ui_pass_still_closes_the_overlay() {
        let mut rc = RenderContext::new(RecordingBackend::new(), RenderConfig::default());
        let mut ui = UiOverlay::new();

        begin_frame(&mut rc);
        ui.begin_with_input(&mut rc, input(640.0, 480.0)).unwrap();
        ui.end_without_window(&mut rc).unwrap();
        rc.present().unwrap();
        assert_eq!(rc.frame_state(), FrameState::Idle);
    }
}
