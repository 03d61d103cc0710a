/// Surface texture and encoder for the frame being presented.
///
/// Hand it back to [`Gpu::submit`](super::Gpu::submit) promptly; the next
/// texture cannot be acquired while this one is held.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    /// Single-sampled view of `surface_texture`. MSAA passes resolve into it.
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}
