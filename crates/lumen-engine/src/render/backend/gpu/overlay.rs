//! UI overlay painter.
//!
//! Draws tessellated egui meshes over the resolved scene in a second pass
//! (load, no depth, single sample).

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::render::backend::OverlayFrame;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct OverlayVertex {
    pos: [f32; 2],
    uv: [f32; 2],
    color: [u8; 4],
}

impl OverlayVertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // pos (points)
        1 => Float32x2, // uv
        2 => Unorm8x4   // premultiplied sRGB color
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<OverlayVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

impl From<&egui::epaint::Vertex> for OverlayVertex {
    fn from(v: &egui::epaint::Vertex) -> Self {
        Self {
            pos: [v.pos.x, v.pos.y],
            uv: [v.uv.x, v.uv.y],
            color: v.color.to_array(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct OverlayLocals {
    screen_size: [f32; 2],
    _pad: [f32; 2], // 16-byte alignment
}

struct OverlayTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// A mesh of the current frame, as ranges into the shared buffers.
struct MeshRange {
    texture_id: egui::TextureId,
    scissor: (u32, u32, u32, u32),
    indices: std::ops::Range<u32>,
    base_vertex: i32,
}

pub(super) struct OverlayPainter {
    pipeline: wgpu::RenderPipeline,
    locals_buffer: wgpu::Buffer,
    locals_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    textures: HashMap<egui::TextureId, OverlayTexture>,
    vertex_buffer: Option<(wgpu::Buffer, u64)>,
    index_buffer: Option<(wgpu::Buffer, u64)>,
}

impl OverlayPainter {
    pub(super) fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen overlay shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("overlay.wgsl").into()),
        });

        let locals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen overlay locals bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(std::mem::size_of::<OverlayLocals>() as u64),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen overlay texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let locals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen overlay locals"),
            size: std::mem::size_of::<OverlayLocals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let locals_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen overlay locals bind group"),
            layout: &locals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: locals_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen overlay pipeline layout"),
            bind_group_layouts: &[&locals_layout, &texture_layout],
            immediate_size: 0,
        });

        let fragment_entry = if surface_format.is_srgb() {
            "fs_main_linear"
        } else {
            "fs_main_gamma"
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lumen overlay pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[OverlayVertex::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::OneMinusDstAlpha,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        Self {
            pipeline,
            locals_buffer,
            locals_group,
            texture_layout,
            textures: HashMap::new(),
            vertex_buffer: None,
            index_buffer: None,
        }
    }

    /// Applies texture updates without drawing, for frames that are skipped.
    pub(super) fn update_textures(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, delta: &egui::TexturesDelta) {
        for (id, image) in &delta.set {
            self.set_texture(device, queue, *id, image);
        }
        for id in &delta.free {
            self.textures.remove(id);
        }
    }

    /// Applies texture updates, then draws `frame` into `target` (physical `size`).
    pub(super) fn paint(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        size: (u32, u32),
        frame: OverlayFrame,
    ) {
        for (id, delta) in &frame.textures_delta.set {
            self.set_texture(device, queue, *id, delta);
        }

        let ppp = frame.pixels_per_point.max(f32::EPSILON);
        let mut vertices: Vec<OverlayVertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut meshes: Vec<MeshRange> = Vec::new();

        for egui::ClippedPrimitive { clip_rect, primitive } in &frame.primitives {
            let egui::epaint::Primitive::Mesh(mesh) = primitive else {
                log::warn!("overlay paint callbacks are not supported");
                continue;
            };
            if mesh.vertices.is_empty() || mesh.indices.is_empty() {
                continue;
            }
            let Some(scissor) = clip_to_scissor(*clip_rect, ppp, size) else { continue };

            let first_index = indices.len() as u32;
            meshes.push(MeshRange {
                texture_id: mesh.texture_id,
                scissor,
                indices: first_index..first_index + mesh.indices.len() as u32,
                base_vertex: vertices.len() as i32,
            });
            vertices.extend(mesh.vertices.iter().map(OverlayVertex::from));
            indices.extend_from_slice(&mesh.indices);
        }

        if !meshes.is_empty() {
            let locals = OverlayLocals {
                screen_size: [size.0 as f32 / ppp, size.1 as f32 / ppp],
                _pad: [0.0; 2],
            };
            queue.write_buffer(&self.locals_buffer, 0, bytemuck::bytes_of(&locals));

            let vbo = upload(
                device,
                queue,
                &mut self.vertex_buffer,
                bytemuck::cast_slice(&vertices),
                wgpu::BufferUsages::VERTEX,
                "lumen overlay vbo",
            );
            let ibo = upload(
                device,
                queue,
                &mut self.index_buffer,
                bytemuck::cast_slice(&indices),
                wgpu::BufferUsages::INDEX,
                "lumen overlay ibo",
            );

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen overlay pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.locals_group, &[]);
            rpass.set_vertex_buffer(0, vbo.slice(..));
            rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);

            for mesh in &meshes {
                let Some(texture) = self.textures.get(&mesh.texture_id) else {
                    log::warn!("overlay texture {:?} is missing", mesh.texture_id);
                    continue;
                };
                let (x, y, w, h) = mesh.scissor;
                rpass.set_scissor_rect(x, y, w, h);
                rpass.set_bind_group(1, &texture.bind_group, &[]);
                rpass.draw_indexed(mesh.indices.clone(), mesh.base_vertex, 0..1);
            }
        }

        for id in &frame.textures_delta.free {
            self.textures.remove(id);
        }
    }

    fn set_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: egui::TextureId,
        delta: &egui::epaint::ImageDelta,
    ) {
        let pixels: Vec<u8> = match &delta.image {
            egui::ImageData::Color(image) => image.pixels.iter().flat_map(|c| c.to_array()).collect(),
        };
        let [width, height] = delta.image.size().map(|s| s as u32);
        if width == 0 || height == 0 {
            return;
        }

        let origin = match delta.pos {
            Some([x, y]) => match self.textures.get(&id) {
                Some(_) => wgpu::Origin3d {
                    x: x as u32,
                    y: y as u32,
                    z: 0,
                },
                None => {
                    log::warn!("partial update of unknown overlay texture {id:?}");
                    return;
                }
            },
            None => {
                let entry = self.create_texture(device, width, height, &delta.options);
                self.textures.insert(id, entry);
                wgpu::Origin3d::ZERO
            }
        };

        let Some(entry) = self.textures.get(&id) else { return };
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_texture(
        &self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        options: &egui::TextureOptions,
    ) -> OverlayTexture {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen overlay texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let filter = |f: egui::TextureFilter| match f {
            egui::TextureFilter::Nearest => wgpu::FilterMode::Nearest,
            egui::TextureFilter::Linear => wgpu::FilterMode::Linear,
        };
        let address_mode = match options.wrap_mode {
            egui::TextureWrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            egui::TextureWrapMode::Repeat => wgpu::AddressMode::Repeat,
            egui::TextureWrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        };
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen overlay sampler"),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            mag_filter: filter(options.magnification),
            min_filter: filter(options.minification),
            ..Default::default()
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen overlay texture bind group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        OverlayTexture { texture, bind_group }
    }
}

/// Uploads `bytes` into `slot`, growing the buffer to the next power of two.
fn upload<'a>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    slot: &'a mut Option<(wgpu::Buffer, u64)>,
    bytes: &[u8],
    usage: wgpu::BufferUsages,
    label: &'static str,
) -> &'a wgpu::Buffer {
    let required = wgpu::util::align_to(bytes.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT).max(4);
    if slot.as_ref().is_some_and(|(_, cap)| *cap < required) {
        *slot = None;
    }
    let (buffer, _) = slot.get_or_insert_with(|| {
        let capacity = required.next_power_of_two();
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        (buffer, capacity)
    });
    queue.write_buffer(buffer, 0, bytes);
    buffer
}

/// Converts a clip rectangle in points to a scissor rectangle in physical
/// pixels, clamped to `size`. `None` when nothing remains.
fn clip_to_scissor(clip: egui::Rect, pixels_per_point: f32, size: (u32, u32)) -> Option<(u32, u32, u32, u32)> {
    let x0 = ((clip.min.x * pixels_per_point).round().max(0.0) as u32).min(size.0);
    let y0 = ((clip.min.y * pixels_per_point).round().max(0.0) as u32).min(size.1);
    let x1 = ((clip.max.x * pixels_per_point).round().max(0.0) as u32).min(size.0);
    let y1 = ((clip.max.y * pixels_per_point).round().max(0.0) as u32).min(size.1);
    let (w, h) = (x1.saturating_sub(x0), y1.saturating_sub(y0));
    if w == 0 || h == 0 { None } else { Some((x0, y0, w, h)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_rect_scales_to_pixels() {
        let clip = egui::Rect::from_min_max(egui::pos2(10.0, 20.0), egui::pos2(110.0, 70.0));
        assert_eq!(clip_to_scissor(clip, 2.0, (1000, 1000)), Some((20, 40, 200, 100)));
    }

    #[test]
    fn clip_rect_is_clamped_to_target() {
        let clip = egui::Rect::from_min_max(egui::pos2(-50.0, 0.0), egui::pos2(5000.0, 50.0));
        assert_eq!(clip_to_scissor(clip, 1.0, (800, 600)), Some((0, 0, 800, 50)));
    }

    #[test]
    fn clip_rect_outside_target_is_dropped() {
        let clip = egui::Rect::from_min_max(egui::pos2(900.0, 0.0), egui::pos2(950.0, 50.0));
        assert_eq!(clip_to_scissor(clip, 1.0, (800, 600)), None);
    }
}
