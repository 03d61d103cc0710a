//! Platform window with a pumped event loop.
//!
//! Owns the `winit` EventLoop and Window. The caller drives the loop by calling
//! [`Window::tick`] once per frame instead of handing control to winit.

mod pump;

pub use pump::{Window, WindowConfig};
