//! Graphics API backends behind a [`RenderContext`](super::RenderContext).
//!
//! The context validates every call before it reaches a backend: handles are
//! live, counts are in range and the frame is in the right state. Backends only
//! translate already-valid commands to their API and may assume these checks.
//!
//! Backend resource tables are keyed by [`RawHandle`]; a key is unique within a
//! resource kind.

mod recording;
mod gpu;

pub use self::recording::{RecordedCommand, RecordingBackend};
pub use self::gpu::WgpuBackend;

use super::error::{RenderError, ResourceKind, ShaderError};
use super::frame::{ClearValues, RenderingInfo, ScissorRect};
use super::handle::RawHandle;
use super::pipeline::GraphicsPipeline;
use super::resources::{IndexType, TextureDesc};
use super::shader::ShaderReflection;
use super::vertex::VertexFormat;

/// A fully resolved draw, as validated by the render context.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub pipeline: GraphicsPipeline,
    pub vertex_buffer: RawHandle,
    /// `None` for non-indexed draws.
    pub index_buffer: Option<(RawHandle, IndexType)>,
    /// Indices drawn; `0` for non-indexed draws.
    pub index_count: u32,
    /// Vertices drawn by non-indexed draws; the addressable vertex range otherwise.
    pub vertex_count: u32,
    /// Snapshot of the program's uniform block at the time of the draw.
    pub uniforms: Vec<u8>,
    /// One texture per slot `0..slot_count`, fallbacks already substituted.
    pub textures: Vec<RawHandle>,
    /// Scissor rectangle, present when the pipeline enables the scissor test.
    pub scissor: Option<ScissorRect>,
}

impl DrawCall {
    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }
}

/// Tessellated UI overlay for the current frame.
#[derive(Debug, Clone, Default)]
pub struct OverlayFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

/// A graphics API implementation driven by the render context.
pub trait Backend {
    fn create_vertex_buffer(&mut self, id: RawHandle, data: &[u8]);

    fn create_index_buffer(&mut self, id: RawHandle, index_type: IndexType, data: &[u8]);

    /// `data` holds `desc.byte_len()` bytes of tightly packed RGBA8 pixels.
    fn create_texture(&mut self, id: RawHandle, desc: &TextureDesc, data: &[u8]);

    /// Compiles a program whose sources already passed naga validation.
    fn create_program(
        &mut self,
        id: RawHandle,
        vertex_src: &str,
        fragment_src: &str,
        reflection: &ShaderReflection,
    ) -> Result<(), ShaderError>;

    fn create_vertex_array(&mut self, id: RawHandle, format: &VertexFormat);

    fn destroy(&mut self, kind: ResourceKind, id: RawHandle);

    /// Starts a frame: clear values and the extent of the target.
    fn begin_rendering(&mut self, info: &RenderingInfo, clear: ClearValues) -> Result<(), RenderError>;

    fn bind_pipeline(&mut self, pipeline: &GraphicsPipeline);

    fn draw(&mut self, call: DrawCall);

    /// Composites the UI overlay over the draws of this frame.
    fn draw_overlay(&mut self, frame: OverlayFrame);

    /// Finishes the frame and shows it.
    fn present(&mut self) -> Result<(), RenderError>;
}
