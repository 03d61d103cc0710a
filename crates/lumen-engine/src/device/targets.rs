//! Depth and multisample color targets sized to the surface.

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Attachments the scene pass renders into besides the surface texture.
///
/// Recreated whenever the surface size changes.
pub struct RenderTargets {
    depth_view: wgpu::TextureView,
    /// Present when `sample_count > 1`; resolves into the surface texture.
    msaa_view: Option<wgpu::TextureView>,
    width: u32,
    height: u32,
    sample_count: u32,
}

impl RenderTargets {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };

        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen depth target"),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let msaa_view = (sample_count > 1).then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("lumen msaa color target"),
                    size,
                    mip_level_count: 1,
                    sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format: color_format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        log::debug!("render targets: {width}x{height}, {sample_count}x msaa");

        Self {
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            msaa_view,
            width,
            height,
            sample_count,
        }
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    pub fn msaa_view(&self) -> Option<&wgpu::TextureView> {
        self.msaa_view.as_ref()
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}
