//! Viewer controls.

use glam::Vec3;

/// Camera and lighting parameters edited through the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub view_pos: Vec3,
    pub light_pos: Vec3,
    pub light_color: Vec3,
    pub object_color: Vec3,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            fov: 60.0,
            view_pos: Vec3::new(0.0, 0.0, 3.0),
            light_pos: Vec3::new(1.2, 1.0, 2.0),
            light_color: Vec3::ONE,
            object_color: Vec3::ONE,
        }
    }
}

pub const FOV_RANGE: std::ops::RangeInclusive<f32> = 1.0..=179.0;

pub fn show(ctx: &egui::Context, state: &mut ViewerState) {
    egui::Window::new("glTF Model").resizable(false).show(ctx, |ui| {
        ui.add(egui::Slider::new(&mut state.fov, FOV_RANGE).text("Camera FOV"));
        drag_vec3(ui, "Camera Position", &mut state.view_pos);
        drag_vec3(ui, "Light Position", &mut state.light_pos);
        color_edit(ui, "Light Color", &mut state.light_color);
        color_edit(ui, "Object Color", &mut state.object_color);
    });
}

fn drag_vec3(ui: &mut egui::Ui, label: &str, value: &mut Vec3) {
    ui.horizontal(|ui| {
        ui.add(egui::DragValue::new(&mut value.x).speed(0.05));
        ui.add(egui::DragValue::new(&mut value.y).speed(0.05));
        ui.add(egui::DragValue::new(&mut value.z).speed(0.05));
        ui.label(label);
    });
}

fn color_edit(ui: &mut egui::Ui, label: &str, value: &mut Vec3) {
    ui.horizontal(|ui| {
        let mut rgb = value.to_array();
        if ui.color_edit_button_rgb(&mut rgb).changed() {
            *value = Vec3::from_array(rgb);
        }
        ui.label(label);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_matches_startup_scene() {
        let state = ViewerState::default();
        assert_eq!(state.fov, 60.0);
        assert_eq!(state.view_pos, Vec3::new(0.0, 0.0, 3.0));
        assert!(FOV_RANGE.contains(&state.fov));
    }

    #[test]
    fn panel_runs_without_changing_untouched_state() {
        let ctx = egui::Context::default();
        let mut state = ViewerState::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| show(ctx, &mut state));
        assert_eq!(state, ViewerState::default());
    }
}
