/// What the render loop should do after acquiring the surface texture failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Lost or outdated surface; it was reconfigured and the frame is dropped.
    Reconfigured,
    /// Timeout or a platform hiccup; drop this frame only.
    SkipFrame,
    /// Out of memory. Presenting cannot continue.
    Fatal,
}

impl SurfaceErrorAction {
    /// `true` unless the error ends rendering.
    pub fn can_continue(self) -> bool {
        !matches!(self, Self::Fatal)
    }
}
