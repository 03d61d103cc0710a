//! CPU-side records of GPU resources owned by a render context.
//!
//! The GPU objects themselves live in the backend, keyed by the resource's
//! [`RawHandle`](super::RawHandle). These records keep what the context needs to
//! validate draws without asking the backend.

use super::shader::ShaderReflection;
use super::vertex::VertexFormat;

/// Width of the elements of an index buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IndexType {
    UInt16,
    UInt32,
}

impl IndexType {
    pub const fn size(&self) -> usize {
        match self {
            IndexType::UInt16 => 2,
            IndexType::UInt32 => 4,
        }
    }

    /// Largest index stored in `bytes` (native endian). `None` for an empty buffer.
    pub(crate) fn max_index(&self, bytes: &[u8]) -> Option<u32> {
        match self {
            IndexType::UInt16 => bytes
                .chunks_exact(2)
                .map(|c| u16::from_ne_bytes([c[0], c[1]]) as u32)
                .max(),
            IndexType::UInt32 => bytes
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .max(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBuffer {
    pub(crate) stride: u32,
    pub(crate) count: u32,
}

impl VertexBuffer {
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.stride as u64 * self.count as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuffer {
    pub(crate) index_type: IndexType,
    pub(crate) count: u32,
    pub(crate) max_index: Option<u32>,
}

impl IndexBuffer {
    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_index(&self) -> Option<u32> {
        self.max_index
    }
}

/// Pixel format of a sampled texture. Both are 8-bit RGBA.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// Colour data (base colour, albedo). Sampled values are linearised.
    #[default]
    Rgba8Srgb,
    /// Non-colour data (normal, metallic/roughness maps).
    Rgba8Unorm,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    ClampToEdge,
    #[default]
    Repeat,
    MirrorRepeat,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: FilterMode,
    pub address_mode: AddressMode,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            ..Default::default()
        }
    }

    /// Bytes of tightly packed pixel data for this texture.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub(crate) desc: TextureDesc,
}

impl Texture {
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }
}

/// A linked vertex + fragment program and its persistent uniform storage.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub(crate) reflection: ShaderReflection,
    /// Mirrors the uniform block byte-for-byte; persists across draws.
    pub(crate) uniform_data: Vec<u8>,
}

impl ShaderProgram {
    pub fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    pub fn uniform_data(&self) -> &[u8] {
        &self.uniform_data
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexArray {
    pub(crate) format: VertexFormat,
}

impl VertexArray {
    pub fn format(&self) -> &VertexFormat {
        &self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_index_u16() {
        let bytes: Vec<u8> = [3u16, 9, 1].iter().flat_map(|i| i.to_ne_bytes()).collect();
        assert_eq!(IndexType::UInt16.max_index(&bytes), Some(9));
    }

    #[test]
    fn max_index_u32_empty() {
        assert_eq!(IndexType::UInt32.max_index(&[]), None);
    }

    #[test]
    fn texture_byte_len_is_rgba8() {
        assert_eq!(TextureDesc::new(4, 2, TextureFormat::Rgba8Unorm).byte_len(), 32);
    }
}
