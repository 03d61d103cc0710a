//! Frame timing.
//!
//! Call [`FrameClock::tick`] once per loop iteration; the viewer animates from
//! [`FrameTime::elapsed`].

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
