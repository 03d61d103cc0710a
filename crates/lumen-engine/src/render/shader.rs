//! WGSL program reflection.
//!
//! Programs are parsed and validated with naga when they are created, so that
//! compile errors surface at creation time, separately from draw-time errors.
//! Reflection extracts what the CPU side needs to honour the binding contract:
//!
//! - uniform block: `@group(0) @binding(0) var<uniform> name: SomeStruct;`
//!   members are set by name or by member index;
//! - texture slot `n`: `texture_2d<f32>` at `@group(1) @binding(2n)` and its
//!   sampler at `@group(1) @binding(2n + 1)`;
//! - vertex inputs: `@location(k)` arguments of the vertex entry point.

use naga::{
    AddressSpace, Binding, ImageClass, ImageDimension, Module, ScalarKind, ShaderStage, TypeInner, VectorSize,
};

use super::error::{ShaderError, Stage};
use super::uniform::UniformKind;

pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;

/// Maximum number of texture slots a program may declare.
pub const MAX_TEXTURE_SLOTS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub kind: UniformKind,
}

/// Layout of the uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub members: Vec<UniformMember>,
    /// Total size in bytes, including trailing padding.
    pub size: u32,
}

impl UniformBlock {
    pub fn member(&self, name: &str) -> Option<(u32, &UniformMember)> {
        self.members
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == name)
            .map(|(i, m)| (i as u32, m))
    }
}

/// Scalar type of a vertex shader input.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InputScalar {
    Float,
    Uint,
    Sint,
}

/// A `@location(k)` argument of the vertex entry point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexInput {
    pub location: u32,
    pub scalar: InputScalar,
    /// 1 for scalars, 2..=4 for vectors.
    pub components: u32,
}

impl std::fmt::Display for VertexInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scalar = match self.scalar {
            InputScalar::Float => "f32",
            InputScalar::Uint => "u32",
            InputScalar::Sint => "i32",
        };
        match self.components {
            1 => f.write_str(scalar),
            n => write!(f, "vec{n}<{scalar}>"),
        }
    }
}

/// Everything the render context knows about a program's interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderReflection {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub uniforms: Option<UniformBlock>,
    /// Declared texture slots, sorted.
    pub texture_slots: Vec<u32>,
    /// Vertex inputs, sorted by location.
    pub vertex_inputs: Vec<VertexInput>,
}

impl ShaderReflection {
    /// Number of texture slots a draw must provide (highest slot + 1).
    pub fn texture_slot_count(&self) -> u32 {
        self.texture_slots.last().map_or(0, |s| s + 1)
    }

    pub fn uniform_size(&self) -> usize {
        self.uniforms.as_ref().map_or(0, |u| u.size as usize)
    }
}

/// Parses, validates and reflects a vertex + fragment WGSL pair.
pub fn reflect_program(vertex_src: &str, fragment_src: &str) -> Result<ShaderReflection, ShaderError> {
    let vs = StageInfo::parse(Stage::Vertex, vertex_src)?;
    let fs = StageInfo::parse(Stage::Fragment, fragment_src)?;

    let uniforms = match (vs.uniforms, fs.uniforms) {
        (Some(a), Some(b)) => Some(merge_blocks(a, b)?),
        (a, b) => a.or(b),
    };

    let mut texture_slots = vs.texture_slots;
    texture_slots.extend(fs.texture_slots);
    texture_slots.sort_unstable();
    texture_slots.dedup();

    Ok(ShaderReflection {
        vertex_entry: vs.entry,
        fragment_entry: fs.entry,
        uniforms,
        texture_slots,
        vertex_inputs: vs.vertex_inputs,
    })
}

fn merge_blocks(a: UniformBlock, b: UniformBlock) -> Result<UniformBlock, ShaderError> {
    // Both stages bind the same buffer, so the layouts must agree exactly.
    if a == b {
        return Ok(a);
    }
    let member = a
        .members
        .iter()
        .zip(&b.members)
        .find(|(x, y)| x != y)
        .map(|(x, _)| x.name.clone())
        .unwrap_or_else(|| "<block size>".to_owned());
    Err(ShaderError::UniformLayoutMismatch { member })
}

struct StageInfo {
    entry: String,
    uniforms: Option<UniformBlock>,
    texture_slots: Vec<u32>,
    vertex_inputs: Vec<VertexInput>,
}

impl StageInfo {
    fn parse(stage: Stage, src: &str) -> Result<Self, ShaderError> {
        let module = naga::front::wgsl::parse_str(src).map_err(|e| ShaderError::Parse {
            stage,
            message: e.emit_to_string(src),
        })?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            stage,
            message: e.emit_to_string(src),
        })?;

        let wanted = match stage {
            Stage::Vertex => ShaderStage::Vertex,
            Stage::Fragment => ShaderStage::Fragment,
        };
        let entry_point = module
            .entry_points
            .iter()
            .find(|ep| ep.stage == wanted)
            .ok_or(ShaderError::MissingEntryPoint { stage })?;

        let vertex_inputs = if stage == Stage::Vertex {
            vertex_input_locations(&module, &entry_point.function)
        } else {
            Vec::new()
        };

        let mut uniforms = None;
        let mut texture_slots = Vec::new();

        for (_, var) in module.global_variables.iter() {
            let Some(rb) = &var.binding else { continue };
            let (group, binding) = (rb.group, rb.binding);
            let unsupported = |reason| ShaderError::UnsupportedBinding {
                stage,
                group,
                binding,
                reason,
            };

            match (&var.space, &module.types[var.ty].inner) {
                (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                    if (group, binding) != (UNIFORM_GROUP, UNIFORM_BINDING) {
                        return Err(unsupported("uniform blocks must be at @group(0) @binding(0)"));
                    }
                    uniforms = Some(UniformBlock {
                        members: members
                            .iter()
                            .enumerate()
                            .map(|(i, m)| UniformMember {
                                name: m.name.clone().unwrap_or_else(|| format!("member{i}")),
                                offset: m.offset,
                                kind: uniform_kind(&module.types[m.ty].inner),
                            })
                            .collect(),
                        size: *span,
                    });
                }
                (AddressSpace::Uniform, _) => {
                    return Err(unsupported("the uniform block must be a struct"));
                }
                (
                    AddressSpace::Handle,
                    TypeInner::Image {
                        dim: ImageDimension::D2,
                        arrayed: false,
                        class:
                            ImageClass::Sampled {
                                kind: ScalarKind::Float,
                                multi: false,
                            },
                    },
                ) => {
                    if group != TEXTURE_GROUP || binding % 2 != 0 {
                        return Err(unsupported("textures must be at @group(1) with an even binding"));
                    }
                    let slot = binding / 2;
                    if slot >= MAX_TEXTURE_SLOTS {
                        return Err(unsupported("texture slot exceeds the supported maximum"));
                    }
                    texture_slots.push(slot);
                }
                (AddressSpace::Handle, TypeInner::Image { .. }) => {
                    return Err(unsupported("texture slots must be texture_2d<f32>"));
                }
                (AddressSpace::Handle, TypeInner::Sampler { comparison: false }) => {
                    if group != TEXTURE_GROUP || binding % 2 != 1 {
                        return Err(unsupported("samplers must be at @group(1) with an odd binding"));
                    }
                }
                (AddressSpace::Handle, TypeInner::Sampler { comparison: true }) => {
                    return Err(unsupported("comparison samplers are not supported"));
                }
                _ => return Err(unsupported("only uniform blocks, textures and samplers are supported")),
            }
        }

        Ok(Self {
            entry: entry_point.name.clone(),
            uniforms,
            texture_slots,
            vertex_inputs,
        })
    }
}

fn vertex_input_locations(module: &Module, function: &naga::Function) -> Vec<VertexInput> {
    let mut inputs = Vec::new();
    let mut push = |location: u32, ty: naga::Handle<naga::Type>| {
        if let Some((scalar, components)) = input_type(&module.types[ty].inner) {
            inputs.push(VertexInput {
                location,
                scalar,
                components,
            });
        }
    };
    for arg in &function.arguments {
        match &arg.binding {
            Some(Binding::Location { location, .. }) => push(*location, arg.ty),
            Some(Binding::BuiltIn(_)) => {}
            None => {
                if let TypeInner::Struct { members, .. } = &module.types[arg.ty].inner {
                    for m in members {
                        if let Some(Binding::Location { location, .. }) = &m.binding {
                            push(*location, m.ty);
                        }
                    }
                }
            }
        }
    }
    inputs.sort_unstable_by_key(|i| i.location);
    inputs
}

fn input_type(inner: &TypeInner) -> Option<(InputScalar, u32)> {
    let (scalar, components) = match inner {
        TypeInner::Scalar(s) => (s, 1),
        TypeInner::Vector { size, scalar } => (scalar, *size as u32),
        _ => return None,
    };
    let scalar = match scalar.kind {
        ScalarKind::Float => InputScalar::Float,
        ScalarKind::Uint => InputScalar::Uint,
        ScalarKind::Sint => InputScalar::Sint,
        _ => return None,
    };
    Some((scalar, components))
}

fn uniform_kind(inner: &TypeInner) -> UniformKind {
    match inner {
        TypeInner::Scalar(s) if s.width == 4 => match s.kind {
            ScalarKind::Float => UniformKind::Float,
            ScalarKind::Sint => UniformKind::Int,
            ScalarKind::Uint => UniformKind::UInt,
            _ => UniformKind::Unsupported,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float && scalar.width == 4 => {
            match size {
                VectorSize::Bi => UniformKind::Vec2,
                VectorSize::Tri => UniformKind::Vec3,
                VectorSize::Quad => UniformKind::Vec4,
            }
        }
        TypeInner::Matrix { columns, rows, scalar } if scalar.width == 4 => match (columns, rows) {
            (VectorSize::Tri, VectorSize::Tri) => UniformKind::Mat3,
            (VectorSize::Quad, VectorSize::Quad) => UniformKind::Mat4,
            _ => UniformKind::Unsupported,
        },
        _ => UniformKind::Unsupported,
    }
}
