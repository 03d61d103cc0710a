//! Fluent per-draw command chain.
//!
//! ```ignore
//! rc.bind_graphics_pipeline(&pipeline)
//!     .set_uniform_mat4("model", model)
//!     .set_uniform_vec3("light_pos", light)
//!     .bind_texture(0, &albedo)
//!     .draw(&vb, &ib, index_count, vertex_count)?;
//! ```
//!
//! Chain methods consume and return the binder. The first error met is held and
//! returned by the next `draw`; later calls in the chain are skipped.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use super::backend::{Backend, DrawCall};
use super::context::{fail, stale, RenderContext};
use super::error::{PipelineError, RenderError, ResourceKind};
use super::frame::{FrameState, ScissorRect};
use super::handle::Handle;
use super::pipeline::GraphicsPipeline;
use super::resources::{IndexBuffer, Texture, VertexBuffer};
use super::shader::MAX_TEXTURE_SLOTS;
use super::uniform::{UniformPolicy, UniformValue};

/// A pipeline bound on a [`RenderContext`], ready for uniforms, textures and draws.
#[must_use = "a bound pipeline does nothing until `draw` is called"]
pub struct PipelineBinder<'a, B: Backend> {
    ctx: &'a mut RenderContext<B>,
    pipeline: GraphicsPipeline,
    /// Failure of the bind itself; every draw through this binder reports it.
    bind_error: Option<RenderError>,
    /// First failure of a chained call; reported by the next draw.
    pending: Option<RenderError>,
}

impl<'a, B: Backend> PipelineBinder<'a, B> {
    pub(crate) fn new(ctx: &'a mut RenderContext<B>, pipeline: GraphicsPipeline) -> Self {
        let bind_error = bind(ctx, &pipeline).err();
        if let Some(e) = &bind_error {
            log::error!("bind_graphics_pipeline: {e}");
        }
        Self {
            ctx,
            pipeline,
            bind_error,
            pending: None,
        }
    }

    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    // ── uniforms ─────────────────────────────────────────────────────────

    /// Writes a member of the program's uniform block, addressed by name.
    ///
    /// The value persists in the program until overwritten.
    pub fn set_uniform(mut self, name: &str, value: impl Into<UniformValue>) -> Self {
        if self.is_failed() {
            return self;
        }
        let value = value.into();
        let result = self.write_uniform_by_name(name, value);
        self.record(result)
    }

    /// Writes the `location`-th member of the uniform block (declaration order).
    pub fn set_uniform_at(mut self, location: u32, value: impl Into<UniformValue>) -> Self {
        if self.is_failed() {
            return self;
        }
        let value = value.into();
        let result = self.write_uniform_at(location, value);
        self.record(result)
    }

    pub fn set_uniform_mat4(self, name: &str, value: Mat4) -> Self {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_mat3(self, name: &str, value: Mat3) -> Self {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_vec4(self, name: &str, value: Vec4) -> Self {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_vec3(self, name: &str, value: Vec3) -> Self {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_vec2(self, name: &str, value: Vec2) -> Self {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_float(self, name: &str, value: f32) -> Self {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_int(self, name: &str, value: i32) -> Self {
        self.set_uniform(name, value)
    }

    fn write_uniform_by_name(&mut self, name: &str, value: UniformValue) -> Result<(), RenderError> {
        let program_handle = self.pipeline.program();
        let policy = self.ctx.config.uniform_policy;
        let program = self
            .ctx
            .programs
            .get_mut(program_handle)
            .ok_or(stale(ResourceKind::ShaderProgram))?;

        let member = program
            .reflection
            .uniforms
            .as_ref()
            .and_then(|block| block.member(name))
            .map(|(_, m)| (m.offset as usize, m.kind));

        let Some((offset, declared)) = member else {
            return match policy {
                UniformPolicy::Ignore => Ok(()),
                UniformPolicy::Warn => {
                    if self.ctx.warned_uniforms.insert((program_handle.raw(), name.to_owned())) {
                        log::warn!("uniform `{name}` is not declared by {program_handle:?}; ignored");
                    }
                    Ok(())
                }
                UniformPolicy::Reject => Err(RenderError::UnknownUniform {
                    name: name.to_owned(),
                }),
            };
        };

        if declared != value.kind() {
            return Err(RenderError::UniformTypeMismatch {
                name: name.to_owned(),
                declared,
                provided: value.kind(),
            });
        }
        value.write_into(&mut program.uniform_data[offset..]);
        Ok(())
    }

    fn write_uniform_at(&mut self, location: u32, value: UniformValue) -> Result<(), RenderError> {
        let program = self
            .ctx
            .programs
            .get_mut(self.pipeline.program())
            .ok_or(stale(ResourceKind::ShaderProgram))?;

        let members = program
            .reflection
            .uniforms
            .as_ref()
            .map_or(&[][..], |block| block.members.as_slice());
        let member = members
            .get(location as usize)
            .ok_or(RenderError::UnknownUniformLocation {
                location,
                count: members.len() as u32,
            })?;

        if member.kind != value.kind() {
            return Err(RenderError::UniformTypeMismatch {
                name: member.name.clone(),
                declared: member.kind,
                provided: value.kind(),
            });
        }
        let offset = member.offset as usize;
        value.write_into(&mut program.uniform_data[offset..]);
        Ok(())
    }

    // ── textures ─────────────────────────────────────────────────────────

    /// Binds `texture` to `slot` for the rest of the frame.
    pub fn bind_texture(mut self, slot: u32, texture: &Handle<Texture>) -> Self {
        if self.is_failed() {
            return self;
        }
        let result = if slot >= MAX_TEXTURE_SLOTS {
            Err(RenderError::TextureSlotOutOfRange {
                slot,
                max: MAX_TEXTURE_SLOTS,
            })
        } else if !self.ctx.textures.contains(*texture) {
            Err(stale(ResourceKind::Texture))
        } else {
            self.ctx.frame.texture_slots[slot as usize] = Some(*texture);
            Ok(())
        };
        self.record(result)
    }

    // ── draws ────────────────────────────────────────────────────────────

    /// Issues an indexed draw of `index_count` indices.
    ///
    /// `index_count` and `vertex_count` must not exceed the buffers' counts.
    /// Every index stored in `index_buffer`, not only the first `index_count`,
    /// must address a vertex of `vertex_buffer`. With `index_count == 0` the
    /// draw is non-indexed and covers `vertex_count` vertices.
    pub fn draw(
        &mut self,
        vertex_buffer: &Handle<VertexBuffer>,
        index_buffer: &Handle<IndexBuffer>,
        index_count: u32,
        vertex_count: u32,
    ) -> Result<(), RenderError> {
        self.submit(*vertex_buffer, Some(*index_buffer), index_count, vertex_count)
    }

    /// Issues a non-indexed draw of `vertex_count` vertices.
    pub fn draw_arrays(&mut self, vertex_buffer: &Handle<VertexBuffer>, vertex_count: u32) -> Result<(), RenderError> {
        self.submit(*vertex_buffer, None, 0, vertex_count)
    }

    fn submit(
        &mut self,
        vb: Handle<VertexBuffer>,
        ib: Option<Handle<IndexBuffer>>,
        index_count: u32,
        vertex_count: u32,
    ) -> Result<(), RenderError> {
        if let Some(e) = &self.bind_error {
            return Err(e.clone());
        }
        if let Some(e) = self.pending.take() {
            return Err(e);
        }
        match self.build_draw(vb, ib, index_count, vertex_count) {
            Ok(Some(call)) => {
                self.ctx.backend.draw(call);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => fail(e),
        }
    }

    /// Validates the draw and resolves it. `Ok(None)` when nothing would be drawn.
    fn build_draw(
        &mut self,
        vb: Handle<VertexBuffer>,
        ib: Option<Handle<IndexBuffer>>,
        index_count: u32,
        vertex_count: u32,
    ) -> Result<Option<DrawCall>, RenderError> {
        let ctx = &mut *self.ctx;
        if ctx.frame.state != FrameState::Recording {
            return Err(RenderError::FrameState {
                op: "draw",
                state: ctx.frame.state,
            });
        }

        let program = ctx
            .programs
            .get(self.pipeline.program())
            .ok_or(stale(ResourceKind::ShaderProgram))?;
        let vao = ctx
            .vertex_arrays
            .get(self.pipeline.vertex_array())
            .ok_or(stale(ResourceKind::VertexArray))?;
        let vertices = ctx
            .vertex_buffers
            .get(vb)
            .ok_or(stale(ResourceKind::VertexBuffer))?;

        if vertices.stride != vao.format.stride() {
            return Err(RenderError::StrideMismatch {
                buffer: vertices.stride,
                layout: vao.format.stride(),
            });
        }
        if vertex_count > vertices.count {
            return Err(RenderError::CountOutOfRange {
                what: "vertex",
                requested: vertex_count,
                capacity: vertices.count,
            });
        }

        let index_buffer = match ib {
            Some(ib) => {
                let indices = ctx.index_buffers.get(ib).ok_or(stale(ResourceKind::IndexBuffer))?;
                if index_count > indices.count {
                    return Err(RenderError::CountOutOfRange {
                        what: "index",
                        requested: index_count,
                        capacity: indices.count,
                    });
                }
                if index_count > 0 {
                    if let Some(max_index) = indices.max_index.filter(|&m| m >= vertices.count) {
                        return Err(RenderError::IndexOutOfRange {
                            max_index,
                            vertex_count: vertices.count,
                        });
                    }
                }
                (index_count > 0).then(|| (ib.raw(), indices.index_type))
            }
            None => None,
        };

        if index_buffer.is_none() && vertex_count == 0 {
            log::trace!("empty draw skipped");
            return Ok(None);
        }

        let scissor = if self.pipeline.rasterizer().scissor_test {
            let extent = ctx.frame.extent;
            match ctx.frame.scissor.unwrap_or(ScissorRect::full(extent)).clamped(extent) {
                Some(rect) => Some(rect),
                None => {
                    log::trace!("draw skipped: scissor rectangle is empty");
                    return Ok(None);
                }
            }
        } else {
            None
        };

        let program_id = self.pipeline.program().raw();
        let mut textures = Vec::with_capacity(program.reflection.texture_slot_count() as usize);
        for slot in 0..program.reflection.texture_slot_count() {
            let bound = ctx.frame.texture_slots[slot as usize];
            let texture = match bound {
                Some(t) if ctx.textures.contains(t) => t,
                Some(_) => return Err(stale(ResourceKind::Texture)),
                None => {
                    if program.reflection.texture_slots.contains(&slot)
                        && ctx.warned_slots.insert((program_id, slot))
                    {
                        log::warn!(
                            "texture slot {slot} of {:?} is unbound; sampling a white fallback",
                            self.pipeline.program()
                        );
                    }
                    ctx.fallback_texture
                }
            };
            textures.push(texture.raw());
        }

        let call = DrawCall {
            pipeline: self.pipeline,
            vertex_buffer: vb.raw(),
            index_buffer,
            index_count: if index_buffer.is_some() { index_count } else { 0 },
            vertex_count,
            uniforms: program.uniform_data.clone(),
            textures,
            scissor,
        };

        let in_flight = &mut ctx.frame.in_flight;
        in_flight.insert((ResourceKind::ShaderProgram, program_id));
        in_flight.insert((ResourceKind::VertexArray, self.pipeline.vertex_array().raw()));
        in_flight.insert((ResourceKind::VertexBuffer, vb.raw()));
        if let Some((id, _)) = call.index_buffer {
            in_flight.insert((ResourceKind::IndexBuffer, id));
        }
        for &id in &call.textures {
            in_flight.insert((ResourceKind::Texture, id));
        }

        Ok(Some(call))
    }

    fn is_failed(&self) -> bool {
        self.bind_error.is_some() || self.pending.is_some()
    }

    fn record(mut self, result: Result<(), RenderError>) -> Self {
        if let Err(e) = result {
            log::error!("{e}");
            self.pending = Some(e);
        }
        self
    }
}

/// Checks the pipeline against the frame and its resources, then binds it.
fn bind<B: Backend>(ctx: &mut RenderContext<B>, pipeline: &GraphicsPipeline) -> Result<(), RenderError> {
    if ctx.frame.state != FrameState::Recording {
        return Err(RenderError::FrameState {
            op: "bind_graphics_pipeline",
            state: ctx.frame.state,
        });
    }

    if !ctx.validated_pipelines.contains(pipeline) {
        let program = ctx
            .programs
            .get(pipeline.program())
            .ok_or(stale(ResourceKind::ShaderProgram))?;
        let vao = ctx
            .vertex_arrays
            .get(pipeline.vertex_array())
            .ok_or(stale(ResourceKind::VertexArray))?;

        for input in &program.reflection.vertex_inputs {
            let Some(attribute) = vao.format.attribute(input.location) else {
                return Err(PipelineError::VertexInputMissing {
                    location: input.location,
                }
                .into());
            };
            if !attribute.format.feeds(input) {
                return Err(PipelineError::VertexInputMismatch {
                    location: input.location,
                    shader: *input,
                    provided: attribute.format,
                }
                .into());
            }
        }
        ctx.validated_pipelines.insert(*pipeline);
    } else if !ctx.programs.contains(pipeline.program()) {
        return Err(stale(ResourceKind::ShaderProgram));
    } else if !ctx.vertex_arrays.contains(pipeline.vertex_array()) {
        return Err(stale(ResourceKind::VertexArray));
    }

    ctx.backend.bind_pipeline(pipeline);
    Ok(())
}
