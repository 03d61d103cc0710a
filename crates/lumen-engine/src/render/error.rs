//! Error taxonomy of the render layer.
//!
//! - [`ShaderError`]: program creation (parse, validation, binding layout).
//! - [`PipelineError`]: pipeline construction and pipeline/program compatibility.
//! - [`RenderError`]: resource misuse and frame sequencing at runtime.
//!
//! Window/device initialization failures are reported through `anyhow` by the
//! `window` and `device` modules.

use thiserror::Error;

use super::frame::FrameState;
use super::shader::VertexInput;
use super::uniform::UniformKind;
use super::vertex::AttributeFormat;

/// Kinds of resources owned by a render context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    VertexBuffer,
    IndexBuffer,
    Texture,
    ShaderProgram,
    VertexArray,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::VertexBuffer => "vertex buffer",
            ResourceKind::IndexBuffer => "index buffer",
            ResourceKind::Texture => "texture",
            ResourceKind::ShaderProgram => "shader program",
            ResourceKind::VertexArray => "vertex array",
        };
        f.write_str(name)
    }
}

/// Shader stage a [`ShaderError`] refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to parse:\n{message}")]
    Parse { stage: Stage, message: String },

    #[error("{stage} shader failed validation:\n{message}")]
    Validation { stage: Stage, message: String },

    #[error("{stage} shader has no {stage} entry point")]
    MissingEntryPoint { stage: Stage },

    #[error("uniform block layout differs between vertex and fragment stages (member `{member}`)")]
    UniformLayoutMismatch { member: String },

    #[error("{stage} shader binding @group({group}) @binding({binding}) does not follow the binding convention: {reason}")]
    UnsupportedBinding {
        stage: Stage,
        group: u32,
        binding: u32,
        reason: &'static str,
    },

    #[error("backend rejected shader program: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("graphics pipeline requires a vertex array")]
    MissingVertexArray,

    #[error("graphics pipeline requires a shader program")]
    MissingShaderProgram,

    #[error("vertex shader input @location({location}) is not provided by the vertex array")]
    VertexInputMissing { location: u32 },

    #[error("vertex shader input @location({location}) is {shader} but the vertex array provides {provided:?}")]
    VertexInputMismatch {
        location: u32,
        shader: VertexInput,
        provided: AttributeFormat,
    },
}

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error("stale or destroyed {kind} handle")]
    StaleHandle { kind: ResourceKind },

    #[error("{kind} is referenced by the frame in flight and cannot be destroyed before present")]
    ResourceInFlight { kind: ResourceKind },

    #[error("{op} is not valid while the frame is {state}")]
    FrameState { op: &'static str, state: FrameState },

    #[error("{what} count {requested} exceeds buffer capacity {capacity}")]
    CountOutOfRange {
        what: &'static str,
        requested: u32,
        capacity: u32,
    },

    #[error("index buffer references vertex {max_index} but the vertex buffer holds {vertex_count} vertices")]
    IndexOutOfRange { max_index: u32, vertex_count: u32 },

    #[error("vertex buffer stride {buffer} does not match vertex array stride {layout}")]
    StrideMismatch { buffer: u32, layout: u32 },

    #[error("{what}: expected {expected} bytes of data, got {actual}")]
    DataSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("texture extent {width}x{height} is empty")]
    EmptyTexture { width: u32, height: u32 },

    #[error("uniform `{name}` is not declared by the bound shader program")]
    UnknownUniform { name: String },

    #[error("uniform location {location} is out of range ({count} members)")]
    UnknownUniformLocation { location: u32, count: u32 },

    #[error("uniform `{name}` is declared as {declared} but was set with {provided}")]
    UniformTypeMismatch {
        name: String,
        declared: UniformKind,
        provided: UniformKind,
    },

    #[error("texture slot {slot} exceeds the maximum of {max} slots")]
    TextureSlotOutOfRange { slot: u32, max: u32 },

    #[error("surface error: {0}")]
    Surface(String),
}
