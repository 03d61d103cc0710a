//! Render core.
//!
//! A [`RenderContext`] owns every GPU resource (buffers, textures, programs,
//! vertex arrays) behind generation-checked handles and records frames through
//! a [`Backend`]. Frames follow
//! `begin_rendering → bind_graphics_pipeline(..).draw(..)* → [UI] → present`.
//!
//! Convention:
//! - shaders are WGSL; see [`shader`] for the binding layout contract
//! - matrices are column-major (`glam`), clip space follows wgpu (depth 0..1)

pub mod backend;
mod binder;
mod context;
mod error;
mod frame;
mod handle;
mod pipeline;
mod resources;
pub mod shader;
mod uniform;
mod vertex;

pub use backend::{Backend, DrawCall, OverlayFrame, RecordedCommand, RecordingBackend, WgpuBackend};
pub use binder::PipelineBinder;
pub use context::{RenderConfig, RenderContext};
pub use error::{PipelineError, RenderError, ResourceKind, ShaderError, Stage};
pub use frame::{ClearValues, Extent, FrameState, RenderingInfo, ScissorRect};
pub use handle::{Handle, Pool, RawHandle};
pub use pipeline::{
    CompareOp, CullMode, DepthStencilState, FrontFace, GraphicsPipeline, GraphicsPipelineBuilder,
    PolygonMode, RasterizerState,
};
pub use resources::{
    AddressMode, FilterMode, IndexBuffer, IndexType, ShaderProgram, Texture, TextureDesc,
    TextureFormat, VertexArray, VertexBuffer,
};
pub use shader::{InputScalar, ShaderReflection, UniformBlock, UniformMember, VertexInput};
pub use uniform::{UniformKind, UniformPolicy, UniformValue};
pub use vertex::{AttributeFormat, DefaultVertex, VertexAttribute, VertexFormat, VertexFormatBuilder};

use anyhow::{Context, Result};

use crate::device::{Gpu, GpuInit};
use crate::window::Window;

/// Creates a wgpu-backed render context presenting to `window`.
///
/// The MSAA sample count comes from the window configuration.
pub fn init(window: &Window, config: RenderConfig, gpu_init: GpuInit) -> Result<RenderContext<WgpuBackend>> {
    let gpu_init = GpuInit {
        sample_count: window.config().sample_count(),
        ..gpu_init
    };
    let gpu = pollster::block_on(Gpu::new(window.raw().clone(), gpu_init))
        .context("failed to initialize the GPU")?;
    Ok(RenderContext::new(WgpuBackend::new(gpu), config))
}
