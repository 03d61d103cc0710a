use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Type of a uniform block member, as reflected from the shader.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    UInt,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    /// Arrays, nested structs and other types cannot be set from the CPU side.
    Unsupported,
}

impl UniformKind {
    /// Bytes written for a value of this kind (WGSL uniform layout).
    pub const fn size(&self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::UInt => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            // Three vec3 columns, each padded to 16 bytes.
            UniformKind::Mat3 => 48,
            UniformKind::Mat4 => 64,
            UniformKind::Unsupported => 0,
        }
    }
}

impl std::fmt::Display for UniformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UniformKind::Float => "f32",
            UniformKind::Int => "i32",
            UniformKind::UInt => "u32",
            UniformKind::Vec2 => "vec2<f32>",
            UniformKind::Vec3 => "vec3<f32>",
            UniformKind::Vec4 => "vec4<f32>",
            UniformKind::Mat3 => "mat3x3<f32>",
            UniformKind::Mat4 => "mat4x4<f32>",
            UniformKind::Unsupported => "an unsupported type",
        };
        f.write_str(s)
    }
}

/// A CPU-side uniform value.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::UInt(_) => UniformKind::UInt,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Writes the value at the start of `dst` using the WGSL uniform layout.
    ///
    /// `dst` must be at least `self.kind().size()` bytes long.
    pub(crate) fn write_into(&self, dst: &mut [u8]) {
        match self {
            UniformValue::Float(v) => dst[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Int(v) => dst[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::UInt(v) => dst[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => dst[..8].copy_from_slice(bytemuck::bytes_of(&v.to_array())),
            UniformValue::Vec3(v) => dst[..12].copy_from_slice(bytemuck::bytes_of(&v.to_array())),
            UniformValue::Vec4(v) => dst[..16].copy_from_slice(bytemuck::bytes_of(&v.to_array())),
            UniformValue::Mat3(m) => {
                for (i, col) in [m.x_axis, m.y_axis, m.z_axis].iter().enumerate() {
                    let at = i * 16;
                    dst[at..at + 12].copy_from_slice(bytemuck::bytes_of(&col.to_array()));
                    dst[at + 12..at + 16].fill(0);
                }
            }
            UniformValue::Mat4(m) => {
                dst[..64].copy_from_slice(bytemuck::bytes_of(&m.to_cols_array()))
            }
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::UInt(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat3> for UniformValue {
    fn from(v: Mat3) -> Self {
        UniformValue::Mat3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// What to do when a uniform name is not declared by the bound program.
///
/// GPU APIs usually ignore such writes; which behavior is wanted depends on the
/// application, so it is configurable per context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum UniformPolicy {
    /// Drop the write silently.
    Ignore,
    /// Drop the write and log a warning once per program and name.
    #[default]
    Warn,
    /// Fail the draw with `RenderError::UnknownUniform`.
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn mat4_is_column_major() {
        let m = Mat4::from_cols_array(&std::array::from_fn(|i| i as f32));
        let mut dst = vec![0u8; 64];
        UniformValue::Mat4(m).write_into(&mut dst);
        assert_eq!(floats(&dst), (0..16).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn mat3_columns_are_padded_to_16_bytes() {
        let m = Mat3::from_cols(Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0), Vec3::new(7.0, 8.0, 9.0));
        let mut dst = vec![0xffu8; 48];
        UniformValue::Mat3(m).write_into(&mut dst);
        assert_eq!(
            floats(&dst),
            vec![1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0]
        );
    }

    #[test]
    fn vec3_writes_twelve_bytes_only() {
        let mut dst = vec![0xaau8; 16];
        UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)).write_into(&mut dst);
        assert_eq!(floats(&dst[..12]), vec![1.0, 2.0, 3.0]);
        assert_eq!(&dst[12..], &[0xaa; 4]);
    }

    #[test]
    fn kind_sizes_match_written_bytes() {
        assert_eq!(UniformValue::from(1.0f32).kind().size(), 4);
        assert_eq!(UniformValue::from(Vec4::ONE).kind().size(), 16);
        assert_eq!(UniformValue::from(Mat4::IDENTITY).kind(), UniformKind::Mat4);
    }
}
