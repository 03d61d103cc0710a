//! Mapping of render-core enums to wgpu.

use crate::render::pipeline::{CompareOp, CullMode, DepthStencilState, FrontFace, PolygonMode};
use crate::render::resources::{AddressMode, FilterMode, IndexType, TextureFormat};
use crate::render::vertex::{AttributeFormat, VertexFormat};

pub(super) fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32 => wgpu::VertexFormat::Float32,
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        AttributeFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        AttributeFormat::Uint32 => wgpu::VertexFormat::Uint32,
        AttributeFormat::Sint32 => wgpu::VertexFormat::Sint32,
        AttributeFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
    }
}

pub(super) fn vertex_attributes(format: &VertexFormat) -> Vec<wgpu::VertexAttribute> {
    format
        .attributes()
        .iter()
        .map(|a| wgpu::VertexAttribute {
            format: vertex_format(a.format),
            offset: a.offset as u64,
            shader_location: a.location,
        })
        .collect()
}

pub(super) fn index_format(index_type: IndexType) -> wgpu::IndexFormat {
    match index_type {
        IndexType::UInt16 => wgpu::IndexFormat::Uint16,
        IndexType::UInt32 => wgpu::IndexFormat::Uint32,
    }
}

pub(super) fn compare_function(op: CompareOp) -> wgpu::CompareFunction {
    match op {
        CompareOp::Never => wgpu::CompareFunction::Never,
        CompareOp::Less => wgpu::CompareFunction::Less,
        CompareOp::Equal => wgpu::CompareFunction::Equal,
        CompareOp::LessOrEqual => wgpu::CompareFunction::LessEqual,
        CompareOp::Greater => wgpu::CompareFunction::Greater,
        CompareOp::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareOp::GreaterOrEqual => wgpu::CompareFunction::GreaterEqual,
        CompareOp::Always => wgpu::CompareFunction::Always,
    }
}

/// `(depth_write_enabled, depth_compare)`. A disabled depth test always passes
/// and never writes.
pub(super) fn depth_state(state: &DepthStencilState) -> (bool, wgpu::CompareFunction) {
    if state.depth_test {
        (state.depth_write, compare_function(state.depth_compare_op))
    } else {
        (false, wgpu::CompareFunction::Always)
    }
}

/// `FrontAndBack` has no wgpu equivalent; such draws are skipped instead.
pub(super) fn cull_mode(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None | CullMode::FrontAndBack => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

pub(super) fn front_face(face: FrontFace) -> wgpu::FrontFace {
    match face {
        FrontFace::CounterClockwise => wgpu::FrontFace::Ccw,
        FrontFace::Clockwise => wgpu::FrontFace::Cw,
    }
}

/// Falls back to `Fill` when the device lacks the feature for `mode`.
pub(super) fn polygon_mode(mode: PolygonMode, features: wgpu::Features) -> wgpu::PolygonMode {
    match mode {
        PolygonMode::Fill => wgpu::PolygonMode::Fill,
        PolygonMode::Line if features.contains(wgpu::Features::POLYGON_MODE_LINE) => wgpu::PolygonMode::Line,
        PolygonMode::Point if features.contains(wgpu::Features::POLYGON_MODE_POINT) => wgpu::PolygonMode::Point,
        PolygonMode::Line | PolygonMode::Point => wgpu::PolygonMode::Fill,
    }
}

pub(super) fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
    }
}

pub(super) fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

pub(super) fn address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}
