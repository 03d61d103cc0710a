use bytemuck::{Pod, Zeroable};

use super::shader::{InputScalar, VertexInput};

/// Data format of a single vertex attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Sint32,
    Unorm8x4,
}

impl AttributeFormat {
    pub const fn components(&self) -> u32 {
        match self {
            AttributeFormat::Float32 | AttributeFormat::Uint32 | AttributeFormat::Sint32 => 1,
            AttributeFormat::Float32x2 => 2,
            AttributeFormat::Float32x3 => 3,
            AttributeFormat::Float32x4 | AttributeFormat::Unorm8x4 => 4,
        }
    }

    /// Scalar type and width the shader sees for this attribute.
    pub const fn shader_type(&self) -> (InputScalar, u32) {
        match self {
            AttributeFormat::Uint32 => (InputScalar::Uint, 1),
            AttributeFormat::Sint32 => (InputScalar::Sint, 1),
            // normalized to f32 on fetch
            AttributeFormat::Unorm8x4 => (InputScalar::Float, 4),
            float => (InputScalar::Float, float.components()),
        }
    }

    /// Whether a shader input can be fed from this attribute.
    pub fn feeds(&self, input: &VertexInput) -> bool {
        self.shader_type() == (input.scalar, input.components)
    }

    pub const fn size(&self) -> u32 {
        match self {
            AttributeFormat::Unorm8x4 => 4,
            other => other.components() * 4,
        }
    }
}

/// One attribute of a vertex layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location (`@location(n)`).
    pub location: u32,
    pub format: AttributeFormat,
    /// Byte offset from the start of the vertex.
    pub offset: u32,
}

/// Ordered, immutable vertex layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    attributes: Vec<VertexAttribute>,
    stride: u32,
}

impl VertexFormat {
    pub fn builder() -> VertexFormatBuilder {
        VertexFormatBuilder::default()
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }
}

/// Builds a [`VertexFormat`], packing attributes in insertion order.
#[derive(Debug, Default, Clone)]
pub struct VertexFormatBuilder {
    attributes: Vec<VertexAttribute>,
    offset: u32,
}

impl VertexFormatBuilder {
    /// Appends an attribute at the current end of the vertex.
    pub fn attribute(mut self, location: u32, format: AttributeFormat) -> Self {
        self.attributes.push(VertexAttribute {
            location,
            format,
            offset: self.offset,
        });
        self.offset += format.size();
        self
    }

    pub fn build(self) -> VertexFormat {
        VertexFormat {
            attributes: self.attributes,
            stride: self.offset,
        }
    }

    /// `position: vec3 @0`, `normal: vec3 @1`, `texcoord: vec2 @2`; stride 32.
    ///
    /// Matches [`DefaultVertex`].
    pub fn build_default(self) -> VertexFormat {
        self.attribute(DefaultVertex::POSITION, AttributeFormat::Float32x3)
            .attribute(DefaultVertex::NORMAL, AttributeFormat::Float32x3)
            .attribute(DefaultVertex::TEXCOORD, AttributeFormat::Float32x2)
            .build()
    }
}

/// Interleaved vertex matching [`VertexFormatBuilder::build_default`].
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct DefaultVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl DefaultVertex {
    pub const POSITION: u32 = 0;
    pub const NORMAL: u32 = 1;
    pub const TEXCOORD: u32 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_matches_default_vertex() {
        let format = VertexFormat::builder().build_default();
        assert_eq!(format.stride() as usize, std::mem::size_of::<DefaultVertex>());

        let offsets: Vec<u32> = format.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);

        let components: Vec<u32> = format.attributes().iter().map(|a| a.format.components()).collect();
        assert_eq!(components, vec![3, 3, 2]);
    }

    #[test]
    fn custom_format_packs_in_insertion_order() {
        let format = VertexFormat::builder()
            .attribute(3, AttributeFormat::Float32x2)
            .attribute(0, AttributeFormat::Unorm8x4)
            .attribute(1, AttributeFormat::Float32)
            .build();

        assert_eq!(format.stride(), 8 + 4 + 4);
        assert_eq!(format.attribute(0).map(|a| a.offset), Some(8));
        assert_eq!(format.attribute(1).map(|a| a.offset), Some(12));
        assert!(format.attribute(2).is_none());
    }

    #[test]
    fn empty_format_has_zero_stride() {
        let format = VertexFormat::builder().build();
        assert_eq!(format.stride(), 0);
        assert!(format.attributes().is_empty());
    }
}
