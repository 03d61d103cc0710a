//! wgpu backend.
//!
//! Draws are recorded between `begin_rendering` and `present`, then encoded
//! into two passes at present: the scene (depth tested, optionally
//! multisampled and resolved into the surface) and the UI overlay on top.

mod conversions;
mod overlay;
mod pipelines;
mod uniforms;

use std::collections::HashMap;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use self::overlay::OverlayPainter;
use self::pipelines::{ProgramEntry, TargetState};
use self::uniforms::UniformArena;
use super::{Backend, DrawCall, OverlayFrame};
use crate::device::Gpu;
use crate::render::error::{RenderError, ResourceKind, ShaderError};
use crate::render::frame::{ClearValues, Extent, RenderingInfo, ScissorRect};
use crate::render::handle::RawHandle;
use crate::render::pipeline::{CullMode, GraphicsPipeline};
use crate::render::resources::{IndexType, TextureDesc};
use crate::render::shader::ShaderReflection;
use crate::render::vertex::VertexFormat;

struct TextureEntry {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// Commands of the frame being recorded.
struct FrameRecording {
    info: RenderingInfo,
    clear: ClearValues,
    draws: Vec<DrawCall>,
    overlay: Option<OverlayFrame>,
}

/// Texture bind groups are keyed by program and the textures bound per slot.
type TextureGroupKey = (RawHandle, Vec<RawHandle>);

pub struct WgpuBackend {
    gpu: Gpu,

    vertex_buffers: HashMap<RawHandle, wgpu::Buffer>,
    index_buffers: HashMap<RawHandle, (wgpu::Buffer, IndexType)>,
    textures: HashMap<RawHandle, TextureEntry>,
    programs: HashMap<RawHandle, ProgramEntry>,
    vertex_formats: HashMap<RawHandle, VertexFormat>,

    pipelines: HashMap<GraphicsPipeline, wgpu::RenderPipeline>,
    /// Group 0 per program, with the arena generation it was built against.
    uniform_groups: HashMap<RawHandle, (u64, wgpu::BindGroup)>,
    texture_groups: HashMap<TextureGroupKey, wgpu::BindGroup>,

    arena: UniformArena,
    overlay: OverlayPainter,
    frame: Option<FrameRecording>,
}

impl WgpuBackend {
    pub fn new(gpu: Gpu) -> Self {
        let overlay = OverlayPainter::new(gpu.device(), gpu.surface_format());
        Self {
            gpu,
            vertex_buffers: HashMap::new(),
            index_buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            vertex_formats: HashMap::new(),
            pipelines: HashMap::new(),
            uniform_groups: HashMap::new(),
            texture_groups: HashMap::new(),
            arena: UniformArena::new(),
            overlay,
            frame: None,
        }
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut Gpu {
        &mut self.gpu
    }

    fn target_state(&self) -> TargetState {
        TargetState {
            color_format: self.gpu.surface_format(),
            sample_count: self.gpu.sample_count(),
            features: self.gpu.features(),
        }
    }

    /// Compiles `pipeline` unless it is cached. Returns `false` if its program
    /// or vertex array is unknown.
    fn ensure_pipeline(&mut self, pipeline: &GraphicsPipeline) -> bool {
        if self.pipelines.contains_key(pipeline) {
            return true;
        }
        let target = self.target_state();
        let (Some(program), Some(format)) = (
            self.programs.get(&pipeline.program().raw()),
            self.vertex_formats.get(&pipeline.vertex_array().raw()),
        ) else {
            return false;
        };

        let compiled = pipelines::create_render_pipeline(self.gpu.device(), pipeline, program, format, target);
        log::debug!("compiled render pipeline ({} cached)", self.pipelines.len() + 1);
        self.pipelines.insert(*pipeline, compiled);
        true
    }

    fn ensure_uniform_group(&mut self, program_id: RawHandle) {
        let Some(program) = self.programs.get(&program_id) else { return };
        let Some(block) = &program.reflection.uniforms else { return };
        let Some(buffer) = self.arena.buffer() else { return };

        let generation = self.arena.generation();
        if matches!(self.uniform_groups.get(&program_id), Some((g, _)) if *g == generation) {
            return;
        }

        let group = self.gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen uniform bind group"),
            layout: &program.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(block.size as u64),
                }),
            }],
        });
        self.uniform_groups.insert(program_id, (generation, group));
    }

    fn ensure_texture_group(&mut self, program_id: RawHandle, textures: &[RawHandle]) -> bool {
        let key = (program_id, textures.to_vec());
        if self.texture_groups.contains_key(&key) {
            return true;
        }
        let Some(layout) = self.programs.get(&program_id).and_then(|p| p.texture_layout.as_ref()) else {
            return false;
        };

        let mut entries = Vec::with_capacity(textures.len() * 2);
        for (slot, id) in textures.iter().enumerate() {
            let Some(texture) = self.textures.get(id) else {
                log::warn!("texture for slot {slot} is not resident; skipping draw");
                return false;
            };
            entries.push(wgpu::BindGroupEntry {
                binding: slot as u32 * 2,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: slot as u32 * 2 + 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            });
        }

        let group = self.gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen texture bind group"),
            layout,
            entries: &entries,
        });
        self.texture_groups.insert(key, group);
        true
    }

    /// Encodes and submits a recorded frame.
    fn render(&mut self, frame: FrameRecording) -> Result<(), RenderError> {
        let FrameRecording {
            info,
            clear,
            draws,
            overlay,
        } = frame;

        if info.extent.is_empty() {
            if let Some(overlay) = &overlay {
                self.overlay
                    .update_textures(self.gpu.device(), self.gpu.queue(), &overlay.textures_delta);
            }
            return Ok(());
        }

        let mut gpu_frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                let message = err.to_string();
                if let Some(overlay) = &overlay {
                    self.overlay
                        .update_textures(self.gpu.device(), self.gpu.queue(), &overlay.textures_delta);
                }
                let action = self.gpu.handle_surface_error(err);
                if !action.can_continue() {
                    return Err(RenderError::Surface(message));
                }
                log::debug!("frame dropped ({action:?}): {message}");
                return Ok(());
            }
        };

        // Uniform snapshots, one block per draw.
        let alignment = self.gpu.device().limits().min_uniform_buffer_offset_alignment as u64;
        let (bytes, offsets) = uniforms::pack_blocks(alignment, draws.iter().map(|d| d.uniforms.as_slice()));
        self.arena.upload(self.gpu.device(), self.gpu.queue(), &bytes);

        let mut drawable = vec![true; draws.len()];
        for (i, draw) in draws.iter().enumerate() {
            let program_id = draw.pipeline.program().raw();
            if !self.ensure_pipeline(&draw.pipeline) {
                drawable[i] = false;
                continue;
            }
            self.ensure_uniform_group(program_id);
            if !draw.textures.is_empty() && !self.ensure_texture_group(program_id, &draw.textures) {
                drawable[i] = false;
            }
        }

        let size = self.gpu.size();
        let surface_extent = Extent::new(size.width, size.height);

        {
            let targets = self.gpu.targets();
            let (color_view, resolve_target) = match targets.msaa_view() {
                Some(msaa) => (msaa, Some(&gpu_frame.view)),
                None => (&gpu_frame.view, None),
            };
            let store = if resolve_target.is_some() {
                wgpu::StoreOp::Discard
            } else {
                wgpu::StoreOp::Store
            };

            let mut rpass = gpu_frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.color.x as f64,
                            g: clear.color.y as f64,
                            b: clear.color.z as f64,
                            a: clear.color.w as f64,
                        }),
                        store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: targets.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.depth),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for ((draw, offset), ok) in draws.iter().zip(&offsets).zip(&drawable) {
                if !ok || draw.pipeline.rasterizer().cull_mode == CullMode::FrontAndBack {
                    continue;
                }
                let program_id = draw.pipeline.program().raw();
                let (Some(pipeline), Some(program), Some(vbo)) = (
                    self.pipelines.get(&draw.pipeline),
                    self.programs.get(&program_id),
                    self.vertex_buffers.get(&draw.vertex_buffer),
                ) else {
                    continue;
                };
                let scissor = draw
                    .scissor
                    .unwrap_or(ScissorRect::full(info.extent))
                    .clamped(surface_extent);
                let Some(scissor) = scissor else { continue };

                rpass.set_pipeline(pipeline);
                match (&program.empty_uniform_group, self.uniform_groups.get(&program_id)) {
                    (Some(empty), _) => rpass.set_bind_group(0, empty, &[]),
                    (None, Some((_, group))) => rpass.set_bind_group(0, group, &[*offset]),
                    (None, None) => continue,
                }
                if !draw.textures.is_empty() {
                    let key = (program_id, draw.textures.clone());
                    let Some(group) = self.texture_groups.get(&key) else { continue };
                    rpass.set_bind_group(1, group, &[]);
                }
                rpass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
                rpass.set_vertex_buffer(0, vbo.slice(..));

                match draw.index_buffer.and_then(|(id, _)| self.index_buffers.get(&id)) {
                    Some((ibo, index_type)) => {
                        rpass.set_index_buffer(ibo.slice(..), conversions::index_format(*index_type));
                        rpass.draw_indexed(0..draw.index_count, 0, 0..1);
                    }
                    None => rpass.draw(0..draw.vertex_count, 0..1),
                }
            }
        }

        if let Some(overlay) = overlay {
            self.overlay.paint(
                self.gpu.device(),
                self.gpu.queue(),
                &mut gpu_frame.encoder,
                &gpu_frame.view,
                (size.width, size.height),
                overlay,
            );
        }

        self.gpu.submit(gpu_frame);
        Ok(())
    }
}

impl Backend for WgpuBackend {
    fn create_vertex_buffer(&mut self, id: RawHandle, data: &[u8]) {
        let buffer = self.gpu.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen vertex buffer"),
            contents: data,
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.vertex_buffers.insert(id, buffer);
    }

    fn create_index_buffer(&mut self, id: RawHandle, index_type: IndexType, data: &[u8]) {
        let buffer = self.gpu.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen index buffer"),
            contents: data,
            usage: wgpu::BufferUsages::INDEX,
        });
        self.index_buffers.insert(id, (buffer, index_type));
    }

    fn create_texture(&mut self, id: RawHandle, desc: &TextureDesc, data: &[u8]) {
        let device = self.gpu.device();
        let texture = device.create_texture_with_data(
            self.gpu.queue(),
            &wgpu::TextureDescriptor {
                label: Some("lumen texture"),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: conversions::texture_format(desc.format),
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let filter = conversions::filter_mode(desc.filter);
        let address = conversions::address_mode(desc.address_mode);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen sampler"),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        });

        self.textures.insert(
            id,
            TextureEntry {
                _texture: texture,
                view,
                sampler,
            },
        );
    }

    fn create_program(
        &mut self,
        id: RawHandle,
        vertex_src: &str,
        fragment_src: &str,
        reflection: &ShaderReflection,
    ) -> Result<(), ShaderError> {
        // naga already validated both stages; this catches what only wgpu checks,
        // such as layouts the device limits cannot satisfy.
        let scope = self.gpu.device().push_error_scope(wgpu::ErrorFilter::Validation);
        let entry = ProgramEntry::new(self.gpu.device(), vertex_src, fragment_src, reflection);
        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(ShaderError::Backend(err.to_string()));
        }
        self.programs.insert(id, entry);
        Ok(())
    }

    fn create_vertex_array(&mut self, id: RawHandle, format: &VertexFormat) {
        self.vertex_formats.insert(id, format.clone());
    }

    fn destroy(&mut self, kind: ResourceKind, id: RawHandle) {
        match kind {
            ResourceKind::VertexBuffer => {
                self.vertex_buffers.remove(&id);
            }
            ResourceKind::IndexBuffer => {
                self.index_buffers.remove(&id);
            }
            ResourceKind::Texture => {
                self.textures.remove(&id);
                self.texture_groups.retain(|(_, bound), _| !bound.contains(&id));
            }
            ResourceKind::ShaderProgram => {
                self.programs.remove(&id);
                self.pipelines.retain(|p, _| p.program().raw() != id);
                self.uniform_groups.remove(&id);
                self.texture_groups.retain(|(program, _), _| *program != id);
            }
            ResourceKind::VertexArray => {
                self.vertex_formats.remove(&id);
                self.pipelines.retain(|p, _| p.vertex_array().raw() != id);
            }
        }
    }

    fn begin_rendering(&mut self, info: &RenderingInfo, clear: ClearValues) -> Result<(), RenderError> {
        let size = self.gpu.size();
        if !info.extent.is_empty() && (size.width, size.height) != (info.extent.width, info.extent.height) {
            self.gpu
                .resize(PhysicalSize::new(info.extent.width, info.extent.height));
        }
        self.frame = Some(FrameRecording {
            info: *info,
            clear,
            draws: Vec::new(),
            overlay: None,
        });
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        if !self.ensure_pipeline(pipeline) {
            log::warn!("bound pipeline references resources unknown to the backend");
        }
    }

    fn draw(&mut self, call: DrawCall) {
        if let Some(frame) = &mut self.frame {
            frame.draws.push(call);
        }
    }

    fn draw_overlay(&mut self, overlay: OverlayFrame) {
        if let Some(frame) = &mut self.frame {
            frame.overlay = Some(overlay);
        }
    }

    fn present(&mut self) -> Result<(), RenderError> {
        match self.frame.take() {
            Some(frame) => self.render(frame),
            None => Ok(()),
        }
    }
}
