//! lumen engine crate.
//!
//! A thin real-time rendering layer over wgpu: a pumped window, a render
//! context that owns GPU resources behind checked handles, a fluent
//! per-draw pipeline binder and an egui overlay.

pub mod device;
pub mod window;
pub mod time;

pub mod logging;
pub mod render;
pub mod ui;
