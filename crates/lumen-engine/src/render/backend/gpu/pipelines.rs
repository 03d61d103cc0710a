//! Shader modules, bind group layouts and render pipelines.

use std::num::NonZeroU64;

use super::conversions;
use crate::device::DEPTH_FORMAT;
use crate::render::pipeline::GraphicsPipeline;
use crate::render::shader::ShaderReflection;
use crate::render::vertex::VertexFormat;

/// GPU side of a shader program.
pub(super) struct ProgramEntry {
    pub vertex_module: wgpu::ShaderModule,
    pub fragment_module: wgpu::ShaderModule,
    pub reflection: ShaderReflection,
    pub layout: wgpu::PipelineLayout,
    /// Group 0. Empty when the program declares no uniform block.
    pub uniform_layout: wgpu::BindGroupLayout,
    /// Bound at group 0 for programs without a uniform block.
    pub empty_uniform_group: Option<wgpu::BindGroup>,
    /// Group 1, present when the program samples textures.
    pub texture_layout: Option<wgpu::BindGroupLayout>,
}

impl ProgramEntry {
    pub fn new(device: &wgpu::Device, vertex_src: &str, fragment_src: &str, reflection: &ShaderReflection) -> Self {
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen vertex shader"),
            source: wgpu::ShaderSource::Wgsl(vertex_src.into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen fragment shader"),
            source: wgpu::ShaderSource::Wgsl(fragment_src.into()),
        });

        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = reflection
            .uniforms
            .as_ref()
            .map(|block| wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(block.size as u64),
                },
                count: None,
            })
            .into_iter()
            .collect();

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen uniform bgl"),
            entries: &uniform_entries,
        });

        let empty_uniform_group = reflection.uniforms.is_none().then(|| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("lumen empty uniform bind group"),
                layout: &uniform_layout,
                entries: &[],
            })
        });

        let slot_count = reflection.texture_slot_count();
        let texture_layout = (slot_count > 0).then(|| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..slot_count)
                .flat_map(|slot| {
                    [
                        wgpu::BindGroupLayoutEntry {
                            binding: slot * 2,
                            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: slot * 2 + 1,
                            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ]
                })
                .collect();
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lumen texture bgl"),
                entries: &entries,
            })
        });

        // Indexed by group: uniforms at 0, textures at 1.
        let mut group_layouts = vec![&uniform_layout];
        if let Some(layout) = &texture_layout {
            group_layouts.push(layout);
        }

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen program layout"),
            bind_group_layouts: &group_layouts,
            immediate_size: 0,
        });

        Self {
            vertex_module,
            fragment_module,
            reflection: reflection.clone(),
            layout,
            uniform_layout,
            empty_uniform_group,
            texture_layout,
        }
    }
}

/// Target state a pipeline is compiled against.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) struct TargetState {
    pub color_format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub features: wgpu::Features,
}

pub(super) fn create_render_pipeline(
    device: &wgpu::Device,
    pipeline: &GraphicsPipeline,
    program: &ProgramEntry,
    vertex_format: &VertexFormat,
    target: TargetState,
) -> wgpu::RenderPipeline {
    let attributes = conversions::vertex_attributes(vertex_format);
    let (depth_write_enabled, depth_compare) = conversions::depth_state(pipeline.depth_stencil());
    let raster = pipeline.rasterizer();

    let polygon_mode = conversions::polygon_mode(raster.polygon_mode, target.features);
    if polygon_mode == wgpu::PolygonMode::Fill && raster.polygon_mode != Default::default() {
        log::warn!(
            "{:?} polygon mode is not supported by this device; using fill",
            raster.polygon_mode
        );
    }

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("lumen graphics pipeline"),
        layout: Some(&program.layout),

        vertex: wgpu::VertexState {
            module: &program.vertex_module,
            entry_point: Some(&program.reflection.vertex_entry),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: vertex_format.stride() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
        },

        fragment: Some(wgpu::FragmentState {
            module: &program.fragment_module,
            entry_point: Some(&program.reflection.fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: target.color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: conversions::front_face(raster.front_face),
            cull_mode: conversions::cull_mode(raster.cull_mode),
            polygon_mode,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: target.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },

        multiview_mask: None,
        cache: None,
    })
}
