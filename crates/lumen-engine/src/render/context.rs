use std::collections::{HashMap, HashSet};

use glam::Vec4;

use super::backend::{Backend, OverlayFrame};
use super::binder::PipelineBinder;
use super::error::{RenderError, ResourceKind, ShaderError};
use super::frame::{ClearValues, Extent, FrameState, RenderingInfo, ScissorRect};
use super::handle::{Handle, Pool, RawHandle};
use super::pipeline::GraphicsPipeline;
use super::resources::{
    AddressMode, FilterMode, IndexBuffer, IndexType, ShaderProgram, Texture, TextureDesc,
    TextureFormat, VertexArray, VertexBuffer,
};
use super::shader::{reflect_program, MAX_TEXTURE_SLOTS};
use super::uniform::UniformPolicy;
use super::vertex::VertexFormat;

/// Render context configuration.
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    /// Handling of uniform names the bound program does not declare.
    pub uniform_policy: UniformPolicy,
}

/// State that only lives between `begin_rendering` and `present`.
#[derive(Debug, Default)]
pub(crate) struct FrameScope {
    pub(crate) state: FrameState,
    pub(crate) extent: Extent,
    /// `None` means the full extent.
    pub(crate) scissor: Option<ScissorRect>,
    pub(crate) texture_slots: [Option<Handle<Texture>>; MAX_TEXTURE_SLOTS as usize],
    /// Resources referenced by draws of this frame.
    pub(crate) in_flight: HashSet<(ResourceKind, RawHandle)>,
}

/// Owner of every GPU resource and the single entry point for frame commands.
///
/// Resources are created and destroyed through the context and addressed by
/// generation-checked [`Handle`]s. A frame is recorded as
/// `begin_rendering → bind_graphics_pipeline(..).draw(..)* → [begin_ui/end_ui] → present`.
pub struct RenderContext<B: Backend> {
    pub(crate) backend: B,
    pub(crate) config: RenderConfig,

    pub(crate) vertex_buffers: Pool<VertexBuffer>,
    pub(crate) index_buffers: Pool<IndexBuffer>,
    pub(crate) textures: Pool<Texture>,
    pub(crate) programs: Pool<ShaderProgram>,
    pub(crate) vertex_arrays: Pool<VertexArray>,

    vao_cache: HashMap<VertexFormat, Handle<VertexArray>>,
    /// Pipelines whose program inputs were checked against their vertex array.
    pub(crate) validated_pipelines: HashSet<GraphicsPipeline>,

    /// 1x1 white texture sampled by declared but unbound slots.
    pub(crate) fallback_texture: Handle<Texture>,

    pub(crate) frame: FrameScope,

    /// Warn-once bookkeeping: unknown uniform names and unbound slots, per program.
    pub(crate) warned_uniforms: HashSet<(RawHandle, String)>,
    pub(crate) warned_slots: HashSet<(RawHandle, u32)>,
}

impl<B: Backend> RenderContext<B> {
    pub fn new(mut backend: B, config: RenderConfig) -> Self {
        let mut textures = Pool::new();
        let desc = TextureDesc {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Unorm,
            filter: FilterMode::Nearest,
            address_mode: AddressMode::ClampToEdge,
        };
        let fallback_texture = textures.insert(Texture { desc });
        backend.create_texture(fallback_texture.raw(), &desc, &[0xff; 4]);

        log::debug!("render context created ({:?})", config);

        Self {
            backend,
            config,
            vertex_buffers: Pool::new(),
            index_buffers: Pool::new(),
            textures,
            programs: Pool::new(),
            vertex_arrays: Pool::new(),
            vao_cache: HashMap::new(),
            validated_pipelines: HashSet::new(),
            fallback_texture,
            frame: FrameScope::default(),
            warned_uniforms: HashSet::new(),
            warned_slots: HashSet::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn frame_state(&self) -> FrameState {
        self.frame.state
    }

    /// Extent given to the last `begin_rendering`.
    pub fn extent(&self) -> Extent {
        self.frame.extent
    }

    // ── resource creation ────────────────────────────────────────────────

    /// Uploads `count` vertices of `stride` bytes each.
    pub fn create_vertex_buffer(
        &mut self,
        stride: u32,
        count: u32,
        data: &[u8],
    ) -> Result<Handle<VertexBuffer>, RenderError> {
        check_size("vertex buffer", stride as usize * count as usize, data.len())?;

        let handle = self.vertex_buffers.insert(VertexBuffer { stride, count });
        self.backend.create_vertex_buffer(handle.raw(), data);
        log::debug!("created vertex buffer {handle:?}: {count} x {stride} bytes");
        Ok(handle)
    }

    /// Uploads a slice of `Pod` vertices; the stride is the size of `V`.
    pub fn create_vertex_buffer_from<V: bytemuck::Pod>(
        &mut self,
        vertices: &[V],
    ) -> Result<Handle<VertexBuffer>, RenderError> {
        self.create_vertex_buffer(
            std::mem::size_of::<V>() as u32,
            vertices.len() as u32,
            bytemuck::cast_slice(vertices),
        )
    }

    /// Uploads `count` indices of `index_type` (native endian).
    pub fn create_index_buffer(
        &mut self,
        index_type: IndexType,
        count: u32,
        data: &[u8],
    ) -> Result<Handle<IndexBuffer>, RenderError> {
        check_size("index buffer", index_type.size() * count as usize, data.len())?;

        let handle = self.index_buffers.insert(IndexBuffer {
            index_type,
            count,
            max_index: index_type.max_index(data),
        });
        self.backend.create_index_buffer(handle.raw(), index_type, data);
        log::debug!("created index buffer {handle:?}: {count} x {index_type:?}");
        Ok(handle)
    }

    pub fn create_index_buffer_u32(&mut self, indices: &[u32]) -> Result<Handle<IndexBuffer>, RenderError> {
        self.create_index_buffer(IndexType::UInt32, indices.len() as u32, bytemuck::cast_slice(indices))
    }

    pub fn create_index_buffer_u16(&mut self, indices: &[u16]) -> Result<Handle<IndexBuffer>, RenderError> {
        self.create_index_buffer(IndexType::UInt16, indices.len() as u32, bytemuck::cast_slice(indices))
    }

    /// Uploads an RGBA8 texture. `pixels` must be tightly packed, row-major.
    pub fn create_texture(&mut self, desc: TextureDesc, pixels: &[u8]) -> Result<Handle<Texture>, RenderError> {
        if desc.width == 0 || desc.height == 0 {
            return fail(RenderError::EmptyTexture {
                width: desc.width,
                height: desc.height,
            });
        }
        check_size("texture", desc.byte_len(), pixels.len())?;

        let handle = self.textures.insert(Texture { desc });
        self.backend.create_texture(handle.raw(), &desc, pixels);
        log::debug!("created texture {handle:?}: {}x{} {:?}", desc.width, desc.height, desc.format);
        Ok(handle)
    }

    /// Parses, validates and links a WGSL vertex + fragment pair.
    ///
    /// Shader errors are reported here and never at draw time.
    pub fn create_graphics_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Handle<ShaderProgram>, ShaderError> {
        let reflection = reflect_program(vertex_src, fragment_src).inspect_err(|e| log::error!("{e}"))?;

        let handle = self.programs.insert(ShaderProgram {
            uniform_data: vec![0u8; reflection.uniform_size()],
            reflection: reflection.clone(),
        });

        if let Err(e) = self.backend.create_program(handle.raw(), vertex_src, fragment_src, &reflection) {
            log::error!("{e}");
            self.programs.remove(handle);
            return Err(e);
        }

        log::debug!(
            "created shader program {handle:?}: {} uniform bytes, {} texture slots, inputs {:?}",
            reflection.uniform_size(),
            reflection.texture_slots.len(),
            reflection.vertex_inputs
        );
        Ok(handle)
    }

    /// Returns the vertex array for `format`, creating it on first request.
    pub fn get_vertex_array(&mut self, format: &VertexFormat) -> Handle<VertexArray> {
        if let Some(&handle) = self.vao_cache.get(format) {
            if self.vertex_arrays.contains(handle) {
                return handle;
            }
        }

        let handle = self.vertex_arrays.insert(VertexArray {
            format: format.clone(),
        });
        self.backend.create_vertex_array(handle.raw(), format);
        self.vao_cache.insert(format.clone(), handle);
        log::debug!("created vertex array {handle:?}: stride {}", format.stride());
        handle
    }

    // ── resource access ──────────────────────────────────────────────────

    pub fn vertex_buffer(&self, handle: Handle<VertexBuffer>) -> Option<&VertexBuffer> {
        self.vertex_buffers.get(handle)
    }

    pub fn index_buffer(&self, handle: Handle<IndexBuffer>) -> Option<&IndexBuffer> {
        self.index_buffers.get(handle)
    }

    pub fn texture(&self, handle: Handle<Texture>) -> Option<&Texture> {
        self.textures.get(handle)
    }

    pub fn program(&self, handle: Handle<ShaderProgram>) -> Option<&ShaderProgram> {
        self.programs.get(handle)
    }

    pub fn vertex_array(&self, handle: Handle<VertexArray>) -> Option<&VertexArray> {
        self.vertex_arrays.get(handle)
    }

    // ── resource destruction ─────────────────────────────────────────────

    pub fn destroy_vertex_buffer(&mut self, handle: Handle<VertexBuffer>) -> Result<(), RenderError> {
        self.check_not_in_flight(ResourceKind::VertexBuffer, handle.raw())?;
        if self.vertex_buffers.remove(handle).is_none() {
            return fail(stale(ResourceKind::VertexBuffer));
        }
        self.backend.destroy(ResourceKind::VertexBuffer, handle.raw());
        log::debug!("destroyed vertex buffer {handle:?}");
        Ok(())
    }

    pub fn destroy_index_buffer(&mut self, handle: Handle<IndexBuffer>) -> Result<(), RenderError> {
        self.check_not_in_flight(ResourceKind::IndexBuffer, handle.raw())?;
        if self.index_buffers.remove(handle).is_none() {
            return fail(stale(ResourceKind::IndexBuffer));
        }
        self.backend.destroy(ResourceKind::IndexBuffer, handle.raw());
        log::debug!("destroyed index buffer {handle:?}");
        Ok(())
    }

    pub fn destroy_texture(&mut self, handle: Handle<Texture>) -> Result<(), RenderError> {
        if handle == self.fallback_texture {
            return fail(stale(ResourceKind::Texture));
        }
        self.check_not_in_flight(ResourceKind::Texture, handle.raw())?;
        if self.textures.remove(handle).is_none() {
            return fail(stale(ResourceKind::Texture));
        }
        self.backend.destroy(ResourceKind::Texture, handle.raw());
        log::debug!("destroyed texture {handle:?}");
        Ok(())
    }

    pub fn destroy_program(&mut self, handle: Handle<ShaderProgram>) -> Result<(), RenderError> {
        self.check_not_in_flight(ResourceKind::ShaderProgram, handle.raw())?;
        if self.programs.remove(handle).is_none() {
            return fail(stale(ResourceKind::ShaderProgram));
        }
        self.validated_pipelines.retain(|p| p.program() != handle);
        self.warned_uniforms.retain(|(id, _)| *id != handle.raw());
        self.warned_slots.retain(|(id, _)| *id != handle.raw());
        self.backend.destroy(ResourceKind::ShaderProgram, handle.raw());
        log::debug!("destroyed shader program {handle:?}");
        Ok(())
    }

    pub fn destroy_vertex_array(&mut self, handle: Handle<VertexArray>) -> Result<(), RenderError> {
        self.check_not_in_flight(ResourceKind::VertexArray, handle.raw())?;
        let vao = match self.vertex_arrays.remove(handle) {
            Some(vao) => vao,
            None => return fail(stale(ResourceKind::VertexArray)),
        };
        if self.vao_cache.get(&vao.format) == Some(&handle) {
            self.vao_cache.remove(&vao.format);
        }
        self.validated_pipelines.retain(|p| p.vertex_array() != handle);
        self.backend.destroy(ResourceKind::VertexArray, handle.raw());
        log::debug!("destroyed vertex array {handle:?}");
        Ok(())
    }

    fn check_not_in_flight(&self, kind: ResourceKind, id: RawHandle) -> Result<(), RenderError> {
        if self.frame.in_flight.contains(&(kind, id)) {
            return fail(RenderError::ResourceInFlight { kind });
        }
        Ok(())
    }

    // ── frame ────────────────────────────────────────────────────────────

    /// Starts a frame: clears colour and depth and sets the viewport to `info.extent`.
    pub fn begin_rendering(
        &mut self,
        info: &RenderingInfo,
        clear_color: Vec4,
        clear_depth: f32,
    ) -> Result<(), RenderError> {
        self.expect_state("begin_rendering", &[FrameState::Idle])?;

        self.backend.begin_rendering(
            info,
            ClearValues {
                color: clear_color,
                depth: clear_depth,
            },
        )?;

        self.frame.state = FrameState::Recording;
        self.frame.extent = info.extent;
        self.frame.scissor = None;
        self.frame.texture_slots = Default::default();
        Ok(())
    }

    /// Binds a pipeline and returns the chainable binder used to set uniforms,
    /// bind textures and draw.
    ///
    /// Errors are held by the binder and returned by its next `draw`.
    pub fn bind_graphics_pipeline(&mut self, pipeline: &GraphicsPipeline) -> PipelineBinder<'_, B> {
        PipelineBinder::new(self, *pipeline)
    }

    /// Scissor rectangle for pipelines with `scissor_test` enabled, until the
    /// end of the frame. Defaults to the full extent.
    pub fn set_scissor(&mut self, rect: ScissorRect) -> Result<(), RenderError> {
        self.expect_state("set_scissor", &[FrameState::Recording])?;
        self.frame.scissor = Some(rect);
        Ok(())
    }

    /// Enters the UI overlay pass. Scene draws are no longer accepted this frame.
    pub fn begin_ui(&mut self) -> Result<(), RenderError> {
        self.expect_state("begin_ui", &[FrameState::Recording])?;
        self.frame.state = FrameState::UiActive;
        Ok(())
    }

    /// Submits the tessellated overlay and closes the UI pass.
    pub fn end_ui(&mut self, overlay: OverlayFrame) -> Result<(), RenderError> {
        self.expect_state("end_ui", &[FrameState::UiActive])?;
        self.backend.draw_overlay(overlay);
        self.frame.state = FrameState::UiDone;
        Ok(())
    }

    /// Shows the frame. Resources referenced by it may be destroyed afterwards.
    pub fn present(&mut self) -> Result<(), RenderError> {
        self.expect_state("present", &[FrameState::Recording, FrameState::UiDone])?;

        let result = self.backend.present();
        self.frame.state = FrameState::Idle;
        self.frame.in_flight.clear();
        result.inspect_err(|e| log::error!("{e}"))
    }

    fn expect_state(&self, op: &'static str, allowed: &[FrameState]) -> Result<(), RenderError> {
        if allowed.contains(&self.frame.state) {
            Ok(())
        } else {
            fail(RenderError::FrameState {
                op,
                state: self.frame.state,
            })
        }
    }

    // ── teardown ─────────────────────────────────────────────────────────

    /// Destroys every remaining resource and returns the backend.
    ///
    /// Resources still alive at this point are leaks of the caller and are
    /// reported at `warn` level.
    pub fn shutdown(mut self) -> B {
        if self.frame.state.in_frame() {
            log::warn!("shutdown while the frame is {}; discarding it", self.frame.state);
        }
        self.frame = FrameScope::default();

        let mut leaked = 0usize;
        for (h, _) in self.vertex_buffers.iter() {
            self.backend.destroy(ResourceKind::VertexBuffer, h.raw());
            leaked += 1;
        }
        for (h, _) in self.index_buffers.iter() {
            self.backend.destroy(ResourceKind::IndexBuffer, h.raw());
            leaked += 1;
        }
        for (h, _) in self.textures.iter() {
            self.backend.destroy(ResourceKind::Texture, h.raw());
            if h != self.fallback_texture {
                leaked += 1;
            }
        }
        for (h, _) in self.programs.iter() {
            self.backend.destroy(ResourceKind::ShaderProgram, h.raw());
            leaked += 1;
        }
        // Vertex arrays are cached by the context and not counted as leaks.
        for (h, _) in self.vertex_arrays.iter() {
            self.backend.destroy(ResourceKind::VertexArray, h.raw());
        }

        if leaked > 0 {
            log::warn!("render context shut down with {leaked} live resource(s)");
        }
        log::debug!("render context shut down");
        self.backend
    }
}

fn check_size(what: &'static str, expected: usize, actual: usize) -> Result<(), RenderError> {
    if expected != actual {
        return fail(RenderError::DataSize {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

pub(crate) fn stale(kind: ResourceKind) -> RenderError {
    RenderError::StaleHandle { kind }
}

/// Logs `err` at error level and returns it.
pub(crate) fn fail<T>(err: RenderError) -> Result<T, RenderError> {
    log::error!("{err}");
    Err(err)
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::render::backend::{RecordedCommand, RecordingBackend};
    use crate::render::frame::FrameState;
    use crate::render::pipeline::{CullMode, DepthStencilState, RasterizerState};
    use crate::render::shader::tests::{FRAGMENT_SRC, VERTEX_SRC};
    use crate::render::vertex::{AttributeFormat, DefaultVertex};
    use crate::render::PipelineError;

    const TRIANGLE: [DefaultVertex; 3] = [
        DefaultVertex {
            position: [-0.5, -0.5, 0.0],
            normal: [0.0, 0.0, 1.0],
            tex_coords: [0.0, 0.0],
        },
        DefaultVertex {
            position: [0.5, -0.5, 0.0],
            normal: [0.0, 0.0, 1.0],
            tex_coords: [1.0, 0.0],
        },
        DefaultVertex {
            position: [0.0, 0.5, 0.0],
            normal: [0.0, 0.0, 1.0],
            tex_coords: [0.5, 1.0],
        },
    ];

    struct Scene {
        rc: RenderContext<RecordingBackend>,
        pipeline: GraphicsPipeline,
        vb: Handle<VertexBuffer>,
        ib: Handle<IndexBuffer>,
    }

    fn scene_with(policy: UniformPolicy) -> Scene {
        let mut rc = RenderContext::new(
            RecordingBackend::new(),
            RenderConfig {
                uniform_policy: policy,
            },
        );
        let program = rc.create_graphics_program(VERTEX_SRC, FRAGMENT_SRC).unwrap();
        let vao = rc.get_vertex_array(&VertexFormat::builder().build_default());
        let pipeline = GraphicsPipeline::builder()
            .set_depth_stencil(DepthStencilState::default())
            .set_rasterizer_state(RasterizerState {
                cull_mode: CullMode::Back,
                ..Default::default()
            })
            .set_vao(vao)
            .set_shader_program(program)
            .build()
            .unwrap();
        let vb = rc.create_vertex_buffer_from(&TRIANGLE).unwrap();
        let ib = rc.create_index_buffer_u32(&[0, 1, 2]).unwrap();
        Scene { rc, pipeline, vb, ib }
    }

    fn scene() -> Scene {
        scene_with(UniformPolicy::Warn)
    }

    fn begin(rc: &mut RenderContext<RecordingBackend>) {
        rc.begin_rendering(
            &RenderingInfo {
                extent: Extent::new(800, 600),
            },
            Vec4::new(0.1, 0.1, 0.1, 1.0),
            1.0,
        )
        .unwrap();
    }

    fn draws(rc: &RenderContext<RecordingBackend>) -> Vec<&crate::render::DrawCall> {
        rc.backend()
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::Draw(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    // ── frame sequence ──

    #[test]
    fn triangle_frame_records_expected_commands() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        begin(&mut rc);
        rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap();
        rc.present().unwrap();

        let commands = rc.backend().commands();
        assert_eq!(commands.len(), 4);
        assert!(matches!(
            commands[0],
            RecordedCommand::BeginRendering { info, clear }
                if info.extent == Extent::new(800, 600) && clear.depth == 1.0
        ));
        assert_eq!(commands[1], RecordedCommand::BindPipeline(pipeline));
        match &commands[2] {
            RecordedCommand::Draw(call) => {
                assert!(call.is_indexed());
                assert_eq!((call.index_count, call.vertex_count), (3, 3));
                assert!(call.pipeline.depth_stencil().depth_test);
                assert_eq!(call.pipeline.rasterizer().cull_mode, CullMode::Back);
                assert_eq!(call.uniforms.len(), 208);
            }
            other => panic!("expected a draw, got {other:?}"),
        }
        assert_eq!(commands[3], RecordedCommand::Present);
        assert_eq!(rc.frame_state(), FrameState::Idle);
        assert_eq!(rc.backend().frames_presented(), 1);

        // a second frame records from a clean slate
        assert_eq!(rc.backend_mut().take_commands().len(), 4);
        begin(&mut rc);
        rc.present().unwrap();
        assert_eq!(rc.backend().commands().len(), 2);
        assert_eq!(rc.backend().frames_presented(), 2);
    }

    #[test]
    fn draw_before_begin_rendering_fails() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        let err = rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap_err();
        assert!(matches!(err, RenderError::FrameState { state: FrameState::Idle, .. }));
        assert!(draws(&rc).is_empty());
    }

    #[test]
    fn bind_error_is_reported_by_every_draw() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        let mut binder = rc.bind_graphics_pipeline(&pipeline);
        assert!(binder.draw(&vb, &ib, 3, 3).is_err());
        assert!(binder.draw_arrays(&vb, 3).is_err());
    }

    #[test]
    fn begin_rendering_twice_fails() {
        let mut s = scene();
        begin(&mut s.rc);
        let err = s
            .rc
            .begin_rendering(&RenderingInfo::default(), Vec4::ZERO, 1.0)
            .unwrap_err();
        assert!(matches!(err, RenderError::FrameState { op: "begin_rendering", .. }));
    }

    #[test]
    fn present_requires_a_frame() {
        let mut s = scene();
        assert!(matches!(
            s.rc.present(),
            Err(RenderError::FrameState { state: FrameState::Idle, .. })
        ));
    }

    #[test]
    fn present_during_ui_pass_fails() {
        let mut s = scene();
        begin(&mut s.rc);
        s.rc.begin_ui().unwrap();
        assert!(matches!(
            s.rc.present(),
            Err(RenderError::FrameState { state: FrameState::UiActive, .. })
        ));
    }

    #[test]
    fn scene_draws_are_rejected_after_begin_ui() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        begin(&mut rc);
        rc.begin_ui().unwrap();
        let err = rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap_err();
        assert!(matches!(err, RenderError::FrameState { state: FrameState::UiActive, .. }));
    }

    #[test]
    fn overlay_is_recorded_after_scene_draws() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        begin(&mut rc);
        rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap();
        rc.begin_ui().unwrap();
        rc.end_ui(OverlayFrame {
            pixels_per_point: 2.0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(rc.frame_state(), FrameState::UiDone);
        rc.present().unwrap();

        let tail: Vec<&RecordedCommand> = rc.backend().commands().iter().skip(2).collect();
        assert!(matches!(tail[0], RecordedCommand::Draw(_)));
        assert_eq!(
            *tail[1],
            RecordedCommand::Overlay {
                primitives: 0,
                pixels_per_point: 2.0
            }
        );
        assert_eq!(*tail[2], RecordedCommand::Present);
    }

    // ── draw validation ──

    #[test]
    fn counts_beyond_buffers_are_rejected() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        begin(&mut rc);
        let err = rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 4, 3).unwrap_err();
        assert!(matches!(err, RenderError::CountOutOfRange { what: "index", requested: 4, capacity: 3 }));

        let err = rc.bind_graphics_pipeline(&pipeline).draw_arrays(&vb, 4).unwrap_err();
        assert!(matches!(err, RenderError::CountOutOfRange { what: "vertex", .. }));
        assert!(draws(&rc).is_empty());
    }

    #[test]
    fn indices_past_the_vertex_buffer_are_rejected() {
        let Scene {
            mut rc, pipeline, vb, ..
        } = scene();
        let ib = rc.create_index_buffer_u16(&[0, 1, 7]).unwrap();
        begin(&mut rc);
        let err = rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap_err();
        assert!(matches!(err, RenderError::IndexOutOfRange { max_index: 7, vertex_count: 3 }));
    }

    #[test]
    fn index_range_is_checked_against_the_whole_buffer() {
        let Scene {
            mut rc, pipeline, vb, ..
        } = scene();
        // index 7 lies beyond the three drawn indices but is still checked
        let tail = rc.create_index_buffer_u32(&[0, 1, 2, 7]).unwrap();
        // indices beyond `vertex_count` but inside the vertex buffer are fine
        let wide = rc.create_index_buffer_u32(&[0, 1, 2]).unwrap();
        begin(&mut rc);

        let err = rc.bind_graphics_pipeline(&pipeline).draw(&vb, &tail, 3, 3).unwrap_err();
        assert!(matches!(err, RenderError::IndexOutOfRange { max_index: 7, vertex_count: 3 }));
        rc.bind_graphics_pipeline(&pipeline).draw(&vb, &wide, 3, 2).unwrap();
        assert_eq!(draws(&rc).len(), 1);
    }

    #[test]
    fn zero_index_count_draws_non_indexed() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        begin(&mut rc);
        rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 0, 3).unwrap();
        rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 0, 0).unwrap();

        let recorded = draws(&rc);
        assert_eq!(recorded.len(), 1);
        assert!(!recorded[0].is_indexed());
        assert_eq!(recorded[0].vertex_count, 3);
    }

    #[test]
    fn stride_mismatch_is_rejected() {
        let Scene { mut rc, pipeline, .. } = scene();
        let narrow = rc.create_vertex_buffer(12, 3, &[0u8; 36]).unwrap();
        begin(&mut rc);
        let err = rc.bind_graphics_pipeline(&pipeline).draw_arrays(&narrow, 3).unwrap_err();
        assert!(matches!(err, RenderError::StrideMismatch { buffer: 12, layout: 32 }));
    }

    #[test]
    fn missing_vertex_input_fails_the_bind() {
        let Scene { mut rc, vb, ib, .. } = scene();
        let program = rc.create_graphics_program(VERTEX_SRC, FRAGMENT_SRC).unwrap();
        let positions_only = VertexFormat::builder()
            .attribute(0, AttributeFormat::Float32x3)
            .attribute(1, AttributeFormat::Float32x3)
            .attribute(3, AttributeFormat::Float32x2)
            .build();
        let vao = rc.get_vertex_array(&positions_only);
        let pipeline = GraphicsPipeline::builder()
            .set_vao(vao)
            .set_shader_program(program)
            .build()
            .unwrap();

        begin(&mut rc);
        let err = rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Pipeline(PipelineError::VertexInputMissing { location: 2 })
        ));
    }

    #[test]
    fn attribute_type_must_match_the_vertex_input() {
        let Scene { mut rc, .. } = scene();
        let program = rc.create_graphics_program(VERTEX_SRC, FRAGMENT_SRC).unwrap();
        let mismatched = VertexFormat::builder()
            .attribute(0, AttributeFormat::Uint32)
            .attribute(1, AttributeFormat::Float32x4)
            .attribute(2, AttributeFormat::Float32)
            .build();
        assert_eq!(mismatched.stride(), 24);
        let vao = rc.get_vertex_array(&mismatched);
        let pipeline = GraphicsPipeline::builder()
            .set_vao(vao)
            .set_shader_program(program)
            .build()
            .unwrap();
        let vb = rc.create_vertex_buffer(24, 3, &[0u8; 72]).unwrap();
        let ib = rc.create_index_buffer_u32(&[0, 1, 2]).unwrap();

        begin(&mut rc);
        let err = rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap_err();
        match err {
            RenderError::Pipeline(PipelineError::VertexInputMismatch { location, shader, provided }) => {
                assert_eq!(location, 0);
                assert_eq!(shader.to_string(), "vec3<f32>");
                assert_eq!(provided, AttributeFormat::Uint32);
            }
            other => panic!("expected an input mismatch, got {other:?}"),
        }
        assert!(draws(&rc).is_empty());
    }

    #[test]
    fn scissor_is_clamped_to_extent() {
        let Scene {
            mut rc, vb, ib, ..
        } = scene();
        let program = rc.create_graphics_program(VERTEX_SRC, FRAGMENT_SRC).unwrap();
        let vao = rc.get_vertex_array(&VertexFormat::builder().build_default());
        let pipeline = GraphicsPipeline::builder()
            .set_rasterizer_state(RasterizerState {
                scissor_test: true,
                ..Default::default()
            })
            .set_vao(vao)
            .set_shader_program(program)
            .build()
            .unwrap();

        begin(&mut rc);
        rc.set_scissor(ScissorRect {
            x: 700,
            y: 500,
            width: 400,
            height: 400,
        })
        .unwrap();
        rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap();

        assert_eq!(
            draws(&rc)[0].scissor,
            Some(ScissorRect {
                x: 700,
                y: 500,
                width: 100,
                height: 100
            })
        );
    }

    // ── resources ──

    #[test]
    fn vertex_buffer_bytes_reach_the_backend_unchanged() {
        let s = scene();
        let stored = s
            .rc
            .backend()
            .resource_data(ResourceKind::VertexBuffer, s.vb.raw())
            .unwrap();
        assert_eq!(stored, bytemuck::cast_slice::<DefaultVertex, u8>(&TRIANGLE));
        assert_eq!(s.rc.vertex_buffer(s.vb).unwrap().count(), 3);
    }

    #[test]
    fn buffer_size_must_match_data() {
        let mut s = scene();
        let err = s.rc.create_vertex_buffer(32, 3, &[0u8; 64]).unwrap_err();
        assert!(matches!(err, RenderError::DataSize { expected: 96, actual: 64, .. }));
    }

    #[test]
    fn empty_texture_is_rejected() {
        let mut s = scene();
        let err = s
            .rc
            .create_texture(TextureDesc::new(0, 4, TextureFormat::Rgba8Srgb), &[])
            .unwrap_err();
        assert!(matches!(err, RenderError::EmptyTexture { width: 0, height: 4 }));
    }

    #[test]
    fn vertex_arrays_are_cached_by_format() {
        let mut s = scene();
        let format = VertexFormat::builder().build_default();
        let a = s.rc.get_vertex_array(&format);
        let b = s.rc.get_vertex_array(&format);
        assert_eq!(a, b);

        let other = s.rc.get_vertex_array(
            &VertexFormat::builder()
                .attribute(0, AttributeFormat::Float32x2)
                .build(),
        );
        assert_ne!(a, other);
    }

    #[test]
    fn destroying_twice_reports_stale_handle() {
        let mut s = scene();
        s.rc.destroy_vertex_buffer(s.vb).unwrap();
        assert!(matches!(
            s.rc.destroy_vertex_buffer(s.vb),
            Err(RenderError::StaleHandle { kind: ResourceKind::VertexBuffer })
        ));
        assert_eq!(s.rc.backend().live_count(ResourceKind::VertexBuffer), 0);
        assert_eq!(s.rc.backend().destroyed(), &[(ResourceKind::VertexBuffer, s.vb.raw())]);
    }

    #[test]
    fn resources_in_flight_cannot_be_destroyed_until_present() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        begin(&mut rc);
        rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap();

        assert!(matches!(
            rc.destroy_index_buffer(ib),
            Err(RenderError::ResourceInFlight { kind: ResourceKind::IndexBuffer })
        ));
        rc.present().unwrap();
        rc.destroy_index_buffer(ib).unwrap();
    }

    #[test]
    fn stale_vertex_buffer_fails_the_draw() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        rc.destroy_vertex_buffer(vb).unwrap();
        begin(&mut rc);
        let err = rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap_err();
        assert!(matches!(err, RenderError::StaleHandle { kind: ResourceKind::VertexBuffer }));
    }

    #[test]
    fn shutdown_destroys_every_resource() {
        let s = scene();
        let backend = s.rc.shutdown();
        for kind in [
            ResourceKind::VertexBuffer,
            ResourceKind::IndexBuffer,
            ResourceKind::Texture,
            ResourceKind::ShaderProgram,
            ResourceKind::VertexArray,
        ] {
            assert_eq!(backend.live_count(kind), 0, "{kind} left alive");
        }
    }

    #[test]
    fn backend_rejected_program_is_not_kept() {
        let mut rc = RenderContext::new(RecordingBackend::new(), RenderConfig::default());
        rc.backend_mut().fail_next_program("bind group layout exceeds device limits");

        let err = rc.create_graphics_program(VERTEX_SRC, FRAGMENT_SRC).unwrap_err();
        assert!(matches!(&err, ShaderError::Backend(m) if m.contains("device limits")));
        assert!(matches!(RenderError::from(err), RenderError::Shader(ShaderError::Backend(_))));
        assert_eq!(rc.backend().live_count(ResourceKind::ShaderProgram), 0);

        let program = rc.create_graphics_program(VERTEX_SRC, FRAGMENT_SRC).unwrap();
        assert!(rc.program(program).is_some());
        assert_eq!(rc.backend().live_count(ResourceKind::ShaderProgram), 1);
    }

    // ── uniforms and textures ──

    #[test]
    fn uniforms_are_snapshotted_per_draw() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        begin(&mut rc);
        rc.bind_graphics_pipeline(&pipeline)
            .set_uniform_mat4("model", model)
            .set_uniform_float("tint", 0.5)
            .draw(&vb, &ib, 3, 3)
            .unwrap();
        rc.bind_graphics_pipeline(&pipeline)
            .set_uniform_float("tint", 0.25)
            .draw(&vb, &ib, 3, 3)
            .unwrap();

        let recorded = draws(&rc);
        let first = &recorded[0].uniforms;
        let second = &recorded[1].uniforms;
        assert_eq!(&first[..64], bytemuck::cast_slice::<f32, u8>(&model.to_cols_array()));
        assert_eq!(&first[204..208], &0.5f32.to_ne_bytes());
        assert_eq!(&second[204..208], &0.25f32.to_ne_bytes());
        // values persist in the program between binds
        assert_eq!(&second[..64], &first[..64]);
    }

    #[test]
    fn unknown_uniform_follows_policy() {
        for (policy, rejected) in [
            (UniformPolicy::Ignore, false),
            (UniformPolicy::Warn, false),
            (UniformPolicy::Reject, true),
        ] {
            let Scene {
                mut rc,
                pipeline,
                vb,
                ib,
            } = scene_with(policy);
            begin(&mut rc);
            let result = rc
                .bind_graphics_pipeline(&pipeline)
                .set_uniform_float("exposure", 1.0)
                .draw(&vb, &ib, 3, 3);
            assert_eq!(result.is_err(), rejected, "{policy:?}");
            if rejected {
                assert!(matches!(result, Err(RenderError::UnknownUniform { .. })));
            }
        }
    }

    #[test]
    fn uniform_type_mismatch_is_always_an_error() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene_with(UniformPolicy::Ignore);
        begin(&mut rc);
        let err = rc
            .bind_graphics_pipeline(&pipeline)
            .set_uniform_vec3("tint", Vec3::ONE)
            .draw(&vb, &ib, 3, 3)
            .unwrap_err();
        assert!(matches!(err, RenderError::UniformTypeMismatch { .. }));
        assert!(draws(&rc).is_empty());
    }

    #[test]
    fn uniform_by_location_uses_declaration_order() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        begin(&mut rc);
        rc.bind_graphics_pipeline(&pipeline)
            .set_uniform_at(4, 0.75f32)
            .draw(&vb, &ib, 3, 3)
            .unwrap();
        assert_eq!(&draws(&rc)[0].uniforms[204..208], &0.75f32.to_ne_bytes());

        let err = rc
            .bind_graphics_pipeline(&pipeline)
            .set_uniform_at(9, 1.0f32)
            .draw(&vb, &ib, 3, 3)
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownUniformLocation { location: 9, count: 5 }));
    }

    #[test]
    fn unbound_texture_slot_uses_white_fallback() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        begin(&mut rc);
        rc.bind_graphics_pipeline(&pipeline).draw(&vb, &ib, 3, 3).unwrap();

        let fallback = rc.fallback_texture.raw();
        assert_eq!(draws(&rc)[0].textures, vec![fallback]);
        assert_eq!(
            rc.backend().resource_data(ResourceKind::Texture, fallback),
            Some(&[0xff; 4][..])
        );
    }

    #[test]
    fn bound_texture_reaches_the_draw() {
        let Scene {
            mut rc,
            pipeline,
            vb,
            ib,
        } = scene();
        let albedo = rc
            .create_texture(TextureDesc::new(2, 2, TextureFormat::Rgba8Srgb), &[0x80; 16])
            .unwrap();
        begin(&mut rc);
        rc.bind_graphics_pipeline(&pipeline)
            .bind_texture(0, &albedo)
            .draw(&vb, &ib, 3, 3)
            .unwrap();
        assert_eq!(draws(&rc)[0].textures, vec![albedo.raw()]);

        let err = rc
            .bind_graphics_pipeline(&pipeline)
            .bind_texture(MAX_TEXTURE_SLOTS, &albedo)
            .draw(&vb, &ib, 3, 3)
            .unwrap_err();
        assert!(matches!(err, RenderError::TextureSlotOutOfRange { .. }));
    }

    #[test]
    fn fallback_texture_cannot_be_destroyed() {
        let mut s = scene();
        let fallback = s.rc.fallback_texture;
        assert!(s.rc.destroy_texture(fallback).is_err());
    }
}
