//! Fixed-function state and the graphics pipeline value.
//!
//! A [`GraphicsPipeline`] is plain data: a vertex array handle, a program handle
//! and the depth/rasterizer state. Backends compile it lazily on first bind and
//! cache the result keyed by the pipeline value.

use super::error::PipelineError;
use super::handle::Handle;
use super::resources::{ShaderProgram, VertexArray};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum CompareOp {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    /// Discards every triangle.
    FrontAndBack,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Depth test state. Stencil is not supported.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: CompareOp,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_compare_op: CompareOp::Less,
        }
    }
}

impl DepthStencilState {
    pub fn disabled() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            depth_compare_op: CompareOp::Always,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct RasterizerState {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    /// Clip draws to the rectangle set with `RenderContext::set_scissor`.
    pub scissor_test: bool,
}

/// Immutable description of how to draw: vertex layout, program and fixed-function state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GraphicsPipeline {
    vertex_array: Handle<VertexArray>,
    program: Handle<ShaderProgram>,
    depth_stencil: DepthStencilState,
    rasterizer: RasterizerState,
}

impl GraphicsPipeline {
    pub fn builder() -> GraphicsPipelineBuilder {
        GraphicsPipelineBuilder::default()
    }

    pub fn vertex_array(&self) -> Handle<VertexArray> {
        self.vertex_array
    }

    pub fn program(&self) -> Handle<ShaderProgram> {
        self.program
    }

    pub fn depth_stencil(&self) -> &DepthStencilState {
        &self.depth_stencil
    }

    pub fn rasterizer(&self) -> &RasterizerState {
        &self.rasterizer
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphicsPipelineBuilder {
    vertex_array: Option<Handle<VertexArray>>,
    program: Option<Handle<ShaderProgram>>,
    depth_stencil: DepthStencilState,
    rasterizer: RasterizerState,
}

impl GraphicsPipelineBuilder {
    pub fn set_depth_stencil(mut self, state: DepthStencilState) -> Self {
        self.depth_stencil = state;
        self
    }

    pub fn set_rasterizer_state(mut self, state: RasterizerState) -> Self {
        self.rasterizer = state;
        self
    }

    pub fn set_vao(mut self, vao: Handle<VertexArray>) -> Self {
        self.vertex_array = Some(vao);
        self
    }

    pub fn set_shader_program(mut self, program: Handle<ShaderProgram>) -> Self {
        self.program = Some(program);
        self
    }

    /// Finishes the pipeline. Compatibility between the program's vertex inputs
    /// and the vertex array is checked when the pipeline is first bound.
    pub fn build(self) -> Result<GraphicsPipeline, PipelineError> {
        Ok(GraphicsPipeline {
            vertex_array: self.vertex_array.ok_or(PipelineError::MissingVertexArray)?,
            program: self.program.ok_or(PipelineError::MissingShaderProgram)?,
            depth_stencil: self.depth_stencil,
            rasterizer: self.rasterizer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::handle::Pool;
    use crate::render::shader::ShaderReflection;
    use crate::render::vertex::VertexFormat;

    fn handles() -> (Handle<VertexArray>, Handle<ShaderProgram>) {
        let mut vaos = Pool::new();
        let mut programs = Pool::new();
        let vao = vaos.insert(VertexArray {
            format: VertexFormat::builder().build_default(),
        });
        let program = programs.insert(ShaderProgram {
            reflection: ShaderReflection {
                vertex_entry: "vs_main".into(),
                fragment_entry: "fs_main".into(),
                uniforms: None,
                texture_slots: Vec::new(),
                vertex_inputs: Vec::new(),
            },
            uniform_data: Vec::new(),
        });
        (vao, program)
    }

    #[test]
    fn missing_vao_is_an_error() {
        let (_, program) = handles();
        let err = GraphicsPipeline::builder().set_shader_program(program).build().unwrap_err();
        assert_eq!(err, PipelineError::MissingVertexArray);
    }

    #[test]
    fn missing_program_is_an_error() {
        let (vao, _) = handles();
        let err = GraphicsPipeline::builder().set_vao(vao).build().unwrap_err();
        assert_eq!(err, PipelineError::MissingShaderProgram);
    }

    #[test]
    fn defaults_enable_depth_test() {
        let (vao, program) = handles();
        let p = GraphicsPipeline::builder().set_vao(vao).set_shader_program(program).build().unwrap();
        assert!(p.depth_stencil().depth_test);
        assert_eq!(p.depth_stencil().depth_compare_op, CompareOp::Less);
        assert_eq!(p.rasterizer().cull_mode, CullMode::None);
        assert!(!p.rasterizer().scissor_test);
    }

    #[test]
    fn builder_is_reusable_as_a_value() {
        let (vao, program) = handles();
        let base = GraphicsPipeline::builder().set_vao(vao).set_shader_program(program);
        let filled = base.clone().build().unwrap();
        let wire = base
            .set_rasterizer_state(RasterizerState {
                polygon_mode: PolygonMode::Line,
                ..Default::default()
            })
            .build()
            .unwrap();
        assert_ne!(filled, wire);
        assert_eq!(wire.program(), filled.program());
    }

    // ── state round-trip ──

    #[test]
    fn every_state_combination_is_stored_as_given() {
        let (vao, program) = handles();
        let compare_ops = [
            CompareOp::Never,
            CompareOp::Less,
            CompareOp::Equal,
            CompareOp::LessOrEqual,
            CompareOp::Greater,
            CompareOp::NotEqual,
            CompareOp::GreaterOrEqual,
            CompareOp::Always,
        ];
        let polygon_modes = [PolygonMode::Fill, PolygonMode::Line, PolygonMode::Point];
        let cull_modes = [CullMode::None, CullMode::Front, CullMode::Back, CullMode::FrontAndBack];
        let front_faces = [FrontFace::CounterClockwise, FrontFace::Clockwise];

        let mut cases = 0;
        for depth_compare_op in compare_ops {
            for (depth_test, depth_write) in [(false, false), (false, true), (true, false), (true, true)] {
                for polygon_mode in polygon_modes {
                    for cull_mode in cull_modes {
                        for front_face in front_faces {
                            for scissor_test in [false, true] {
                                let depth = DepthStencilState {
                                    depth_test,
                                    depth_write,
                                    depth_compare_op,
                                };
                                let raster = RasterizerState {
                                    polygon_mode,
                                    cull_mode,
                                    front_face,
                                    scissor_test,
                                };
                                let p = GraphicsPipeline::builder()
                                    .set_depth_stencil(depth)
                                    .set_rasterizer_state(raster)
                                    .set_vao(vao)
                                    .set_shader_program(program)
                                    .build()
                                    .unwrap();
                                assert_eq!(*p.depth_stencil(), depth);
                                assert_eq!(*p.rasterizer(), raster);
                                assert_eq!(p.vertex_array(), vao);
                                assert_eq!(p.program(), program);
                                cases += 1;
                            }
                        }
                    }
                }
            }
        }
        assert_eq!(cases, 8 * 4 * 3 * 4 * 2 * 2);
    }
}
