use glam::Vec4;

/// Size of the render target in physical pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height; `1.0` for an empty extent.
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Per-frame rendering parameters passed to `begin_rendering`.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct RenderingInfo {
    pub extent: Extent,
}

/// Clear values applied by `begin_rendering`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearValues {
    pub color: Vec4,
    pub depth: f32,
}

/// Scissor rectangle in physical pixels (top-left origin).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub fn full(extent: Extent) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }

    /// Clamps the rectangle to `extent`. Returns `None` if nothing remains.
    pub fn clamped(&self, extent: Extent) -> Option<Self> {
        let x = self.x.min(extent.width);
        let y = self.y.min(extent.height);
        let x2 = self.x.saturating_add(self.width).min(extent.width);
        let y2 = self.y.saturating_add(self.height).min(extent.height);
        let (width, height) = (x2 - x, y2 - y);
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { x, y, width, height })
        }
    }
}

/// Position of the render context within the per-frame sequence.
///
/// ```text
/// Idle -> Recording -> [draws] -> UiActive -> UiDone -> Idle
///            \______________________________________/ (present without UI)
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    /// `begin_rendering` was called; pipelines may be bound and draws issued.
    Recording,
    /// The UI overlay pass is being built.
    UiActive,
    /// The UI overlay was submitted; only `present` remains.
    UiDone,
}

impl FrameState {
    pub fn in_frame(&self) -> bool {
        !matches!(self, FrameState::Idle)
    }
}

impl std::fmt::Display for FrameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FrameState::Idle => "idle",
            FrameState::Recording => "recording",
            FrameState::UiActive => "building the UI overlay",
            FrameState::UiDone => "waiting for present",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_of_empty_extent_is_one() {
        assert_eq!(Extent::new(0, 720).aspect_ratio(), 1.0);
        assert_eq!(Extent::new(1280, 640).aspect_ratio(), 2.0);
    }

    #[test]
    fn scissor_clamps_to_extent() {
        let r = ScissorRect { x: 100, y: 50, width: 400, height: 400 };
        let c = r.clamped(Extent::new(300, 200)).unwrap();
        assert_eq!(c, ScissorRect { x: 100, y: 50, width: 200, height: 150 });
    }

    #[test]
    fn scissor_outside_extent_is_none() {
        let r = ScissorRect { x: 500, y: 0, width: 10, height: 10 };
        assert!(r.clamped(Extent::new(300, 200)).is_none());
    }
}
