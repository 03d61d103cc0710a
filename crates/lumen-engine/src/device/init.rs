/// Device and surface options passed to [`Gpu::new`](super::Gpu::new).
///
/// `render::init` fills `sample_count` from the window config.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    ///
    /// Lighting is computed in linear space; an sRGB surface encodes on write.
    pub prefer_srgb: bool,

    /// Swap behavior.
    ///
    /// FIFO is broadly supported and caps the viewer at the display rate.
    pub present_mode: wgpu::PresentMode,

    /// Surface alpha mode; ignored when the surface does not offer it.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Features the device must have; device creation fails otherwise.
    pub required_features: wgpu::Features,

    /// Features enabled only when the adapter supports them.
    ///
    /// Line and point polygon modes live here; pipelines fall back to fill without them.
    pub optional_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Frames the surface may queue ahead. A hint only.
    pub desired_maximum_frame_latency: u32,

    /// Requested MSAA sample count. `1` disables multisampling.
    ///
    /// Lowered to the largest count the surface format supports.
    pub sample_count: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            optional_features: wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::POLYGON_MODE_POINT,
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
            sample_count: 1,
        }
    }
}
