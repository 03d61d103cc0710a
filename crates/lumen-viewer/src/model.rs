//! glTF loading into CPU-side meshes, materials and RGBA8 images.

use std::path::Path;

use gltf::image::Format;
use lumen_engine::render::DefaultVertex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to import glTF: {0}")]
    Import(#[from] gltf::Error),

    #[error("glTF file contains no meshes")]
    NoMeshes,

    #[error("mesh {mesh} primitive {primitive} has no POSITION attribute")]
    MissingPositions { mesh: usize, primitive: usize },

    #[error("image {index}: {width}x{height} {format:?} expects {expected} bytes, got {actual}")]
    ImageSize {
        index: usize,
        width: u32,
        height: u32,
        format: Format,
        expected: usize,
        actual: usize,
    },
}

/// One drawable primitive.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<DefaultVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Material {
    /// Linear RGBA multiplier.
    pub base_color_factor: [f32; 4],
    /// Index into [`Model::images`].
    pub base_color_texture: Option<usize>,
    /// Index into [`Model::images`]; green is roughness, blue is metallic.
    pub metallic_roughness_texture: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_roughness_texture: None,
        }
    }
}

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub images: Vec<Image>,
}

impl Model {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let model = Self::from_import(gltf::import(path)?)?;
        log::info!(
            "loaded {}: {} meshes, {} materials, {} images",
            path.display(),
            model.meshes.len(),
            model.materials.len(),
            model.images.len()
        );
        Ok(model)
    }

    /// Loads a `.glb` or a `.gltf` whose buffers and images are embedded.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        Self::from_import(gltf::import_slice(bytes)?)
    }

    fn from_import(
        (document, buffers, images): (gltf::Document, Vec<gltf::buffer::Data>, Vec<gltf::image::Data>),
    ) -> Result<Self, ModelError> {
        let mut meshes = Vec::new();
        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                meshes.push(read_primitive(&buffers, mesh.index(), &primitive)?);
            }
        }
        if meshes.is_empty() {
            return Err(ModelError::NoMeshes);
        }

        let materials = document
            .materials()
            .map(|material| {
                let pbr = material.pbr_metallic_roughness();
                Material {
                    base_color_factor: pbr.base_color_factor(),
                    base_color_texture: pbr.base_color_texture().map(|t| t.texture().source().index()),
                    metallic_roughness_texture: pbr
                        .metallic_roughness_texture()
                        .map(|t| t.texture().source().index()),
                }
            })
            .collect();

        let images = images
            .iter()
            .enumerate()
            .map(|(index, data)| {
                let pixels = to_rgba8(data.format, data.width, data.height, &data.pixels).ok_or_else(|| {
                    ModelError::ImageSize {
                        index,
                        width: data.width,
                        height: data.height,
                        format: data.format,
                        expected: data.width as usize * data.height as usize * bytes_per_pixel(data.format),
                        actual: data.pixels.len(),
                    }
                })?;
                Ok(Image {
                    width: data.width,
                    height: data.height,
                    pixels,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(Self {
            meshes,
            materials,
            images,
        })
    }

    pub fn material(&self, mesh: &Mesh) -> Option<&Material> {
        mesh.material.and_then(|i| self.materials.get(i))
    }
}

fn read_primitive(
    buffers: &[gltf::buffer::Data],
    mesh: usize,
    primitive: &gltf::Primitive<'_>,
) -> Result<Mesh, ModelError> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or(ModelError::MissingPositions {
            mesh,
            primitive: primitive.index(),
        })?
        .collect();
    let mut normals = reader.read_normals().into_iter().flatten();
    let mut tex_coords = reader.read_tex_coords(0).map(|t| t.into_f32()).into_iter().flatten();

    let vertices: Vec<DefaultVertex> = positions
        .iter()
        .map(|&position| DefaultVertex {
            position,
            normal: normals.next().unwrap_or([0.0, 0.0, 1.0]),
            tex_coords: tex_coords.next().unwrap_or([0.0, 0.0]),
        })
        .collect();

    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    Ok(Mesh {
        vertices,
        indices,
        material: primitive.material().index(),
    })
}

fn bytes_per_pixel(format: Format) -> usize {
    match format {
        Format::R8 => 1,
        Format::R8G8 | Format::R16 => 2,
        Format::R8G8B8 => 3,
        Format::R8G8B8A8 | Format::R16G16 => 4,
        Format::R16G16B16 => 6,
        Format::R16G16B16A16 => 8,
        Format::R32G32B32FLOAT => 12,
        Format::R32G32B32A32FLOAT => 16,
    }
}

/// Converts decoded glTF pixels to RGBA8. `None` if `pixels` does not match
/// the extent.
pub fn to_rgba8(format: Format, width: u32, height: u32, pixels: &[u8]) -> Option<Vec<u8>> {
    use image::{DynamicImage, ImageBuffer};

    if pixels.len() != width as usize * height as usize * bytes_per_pixel(format) {
        return None;
    }

    let u16s = || -> Vec<u16> {
        pixels
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect()
    };
    let f32s = || -> Vec<f32> {
        pixels
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    };

    let image = match format {
        Format::R8 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(width, height, pixels.to_vec())?),
        Format::R8G8 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(width, height, pixels.to_vec())?),
        Format::R8G8B8 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(width, height, pixels.to_vec())?),
        Format::R8G8B8A8 => DynamicImage::ImageRgba8(ImageBuffer::from_raw(width, height, pixels.to_vec())?),
        Format::R16 => DynamicImage::ImageLuma16(ImageBuffer::from_raw(width, height, u16s())?),
        Format::R16G16 => DynamicImage::ImageLumaA16(ImageBuffer::from_raw(width, height, u16s())?),
        Format::R16G16B16 => DynamicImage::ImageRgb16(ImageBuffer::from_raw(width, height, u16s())?),
        Format::R16G16B16A16 => DynamicImage::ImageRgba16(ImageBuffer::from_raw(width, height, u16s())?),
        Format::R32G32B32FLOAT => DynamicImage::ImageRgb32F(ImageBuffer::from_raw(width, height, f32s())?),
        Format::R32G32B32A32FLOAT => DynamicImage::ImageRgba32F(ImageBuffer::from_raw(width, height, f32s())?),
    };
    Some(image.to_rgba8().into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One triangle with u16 indices, buffer embedded as a data URI.
    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "buffers": [{
            "byteLength": 44,
            "uri": "data:application/octet-stream;base64,AAAAvwAAAL8AAAAAAAAAPwAAAL8AAAAAAAAAAAAAAD8AAAAAAAABAAIAAAA="
        }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [-0.5, -0.5, 0.0], "max": [0.5, 0.5, 0.0]
            },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ],
        "meshes": [{
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }]
        }]
    }"#;

    // ── loading ──

    #[test]
    fn loads_embedded_triangle_with_widened_indices() {
        let model = Model::from_slice(TRIANGLE_GLTF.as_bytes()).unwrap();
        assert_eq!(model.meshes.len(), 1);

        let mesh = &model.meshes[0];
        assert_eq!(mesh.indices, vec![0u32, 1, 2]);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.vertices[2].position, [0.0, 0.5, 0.0]);
        // defaults for missing attributes
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.vertices[0].tex_coords, [0.0, 0.0]);
        assert!(model.material(mesh).is_none());
    }

    #[test]
    fn document_without_meshes_is_rejected() {
        let err = Model::from_slice(br#"{ "asset": { "version": "2.0" } }"#).unwrap_err();
        assert!(matches!(err, ModelError::NoMeshes));
    }

    #[test]
    fn malformed_document_is_an_import_error() {
        let err = Model::from_slice(b"not gltf").unwrap_err();
        assert!(matches!(err, ModelError::Import(_)));
    }

    #[test]
    fn material_factor_and_missing_textures_are_read() {
        let json = TRIANGLE_GLTF
            .replace(
                r#""indices": 1 }"#,
                r#""indices": 1, "material": 0 }"#,
            )
            .replace(
                r#""meshes""#,
                r#""materials": [{ "pbrMetallicRoughness": { "baseColorFactor": [0.5, 0.25, 1.0, 1.0] } }],
        "meshes""#,
            );
        let model = Model::from_slice(json.as_bytes()).unwrap();
        let material = model.material(&model.meshes[0]).unwrap();
        assert_eq!(material.base_color_factor, [0.5, 0.25, 1.0, 1.0]);
        assert!(material.base_color_texture.is_none());
        assert!(material.metallic_roughness_texture.is_none());
    }

    #[test]
    fn default_material_is_white() {
        assert_eq!(Material::default().base_color_factor, [1.0; 4]);
    }

    // ── pixel conversion ──

    #[test]
    fn rgb8_gains_opaque_alpha() {
        let rgba = to_rgba8(Format::R8G8B8, 2, 1, &[10, 20, 30, 40, 50, 60]).unwrap();
        assert_eq!(rgba, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn luma8_is_replicated() {
        let rgba = to_rgba8(Format::R8, 1, 1, &[77]).unwrap();
        assert_eq!(rgba, vec![77, 77, 77, 255]);
    }

    #[test]
    fn rgba16_keeps_high_bytes() {
        let px: Vec<u8> = [0xffffu16, 0x8000, 0x0000, 0xffff]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let rgba = to_rgba8(Format::R16G16B16A16, 1, 1, &px).unwrap();
        assert_eq!(rgba[0], 255);
        assert_eq!(rgba[2], 0);
        assert_eq!(rgba[3], 255);
        assert!((127..=129).contains(&rgba[1]));
    }

    #[test]
    fn mismatched_pixel_data_is_rejected() {
        assert!(to_rgba8(Format::R8G8B8A8, 2, 2, &[0; 15]).is_none());
        assert!(to_rgba8(Format::R8G8B8A8, 2, 2, &[0; 17]).is_none());
    }
}
