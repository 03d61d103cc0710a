mod model;
mod panel;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use glam::{Mat4, Vec3, Vec4};

use lumen_engine::device::GpuInit;
use lumen_engine::logging::{init_logging, LoggingConfig};
use lumen_engine::render::{
    self, AddressMode, CompareOp, CullMode, DepthStencilState, Extent, FilterMode, GraphicsPipeline,
    PolygonMode, RasterizerState, RenderConfig, RenderingInfo, TextureDesc, TextureFormat, VertexFormat,
};
use lumen_engine::time::FrameClock;
use lumen_engine::ui::UiOverlay;
use lumen_engine::window::{Window, WindowConfig};

use crate::model::Model;
use crate::panel::ViewerState;

const PBR_VERTEX: &str = include_str!("../shaders/pbr_vertex.wgsl");
const PBR_FRAGMENT: &str = include_str!("../shaders/pbr_fragment.wgsl");

const CLEAR_COLOR: Vec4 = Vec4::new(0.2, 0.3, 0.3, 1.0);

/// View a glTF model with Cook-Torrance shading.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a .gltf or .glb file.
    #[arg(default_value = "assets/models/Suzanne.gltf")]
    model: PathBuf,

    /// Disable multisampling.
    #[arg(long)]
    no_msaa: bool,

    /// MSAA sample count; clamped to what the GPU supports.
    #[arg(long, default_value_t = 8)]
    samples: u32,

    /// Log filter in env_logger syntax, e.g. "lumen_engine=debug".
    #[arg(long)]
    log: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        ..Default::default()
    });

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut window = Window::create(WindowConfig {
        title: "lumen - gltf viewer".to_string(),
        enable_msaa: !args.no_msaa,
        aa_sample: args.samples,
        ..Default::default()
    })?;

    let mut rc = render::init(&window, RenderConfig::default(), GpuInit::default())?;

    let vertex_format = VertexFormat::builder().build_default();
    let vao = rc.get_vertex_array(&vertex_format);
    let program = rc
        .create_graphics_program(PBR_VERTEX, PBR_FRAGMENT)
        .context("failed to build the shading program")?;

    let pipeline = GraphicsPipeline::builder()
        .set_depth_stencil(DepthStencilState {
            depth_test: true,
            depth_write: true,
            depth_compare_op: CompareOp::Less,
        })
        .set_rasterizer_state(RasterizerState {
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::Back,
            scissor_test: false,
            ..Default::default()
        })
        .set_vao(vao)
        .set_shader_program(program)
        .build()?;

    let model = Model::load(&args.model).with_context(|| format!("failed to load {}", args.model.display()))?;
    let mesh = &model.meshes[0];

    // Missing metallic/roughness maps reuse the base colour texture.
    let material = model.material(mesh).cloned().unwrap_or_default();
    let base_color = material
        .base_color_texture
        .map(|i| upload_image(&mut rc, &model, i, TextureFormat::Rgba8Srgb))
        .transpose()?;
    let metallic_roughness = match material.metallic_roughness_texture {
        Some(i) => Some(upload_image(&mut rc, &model, i, TextureFormat::Rgba8Unorm)?),
        None => base_color,
    };

    let vertex_buffer = rc.create_vertex_buffer_from(&mesh.vertices)?;
    let index_buffer = rc.create_index_buffer_u32(&mesh.indices)?;
    let index_count = mesh.indices.len() as u32;
    let vertex_count = mesh.vertices.len() as u32;

    let mut ui = UiOverlay::new();
    let [r, g, b, _] = material.base_color_factor;
    let mut state = ViewerState {
        object_color: Vec3::new(r, g, b),
        ..Default::default()
    };
    let mut clock = FrameClock::new();
    let rotation_axis = Vec3::new(0.5, 1.0, 0.0).normalize();

    while !window.should_close() {
        window.tick();
        if window.should_close() {
            break;
        }
        let time = clock.tick();

        let extent = Extent::new(window.width(), window.height());
        let model_matrix = Mat4::from_axis_angle(rotation_axis, time.elapsed);
        let view = Mat4::look_at_rh(state.view_pos, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(state.fov.to_radians(), extent.aspect_ratio(), 0.1, 100.0);

        rc.begin_rendering(&RenderingInfo { extent }, CLEAR_COLOR, 1.0)?;

        let mut binder = rc
            .bind_graphics_pipeline(&pipeline)
            .set_uniform_mat4("model", model_matrix)
            .set_uniform_mat4("view", view)
            .set_uniform_mat4("projection", projection)
            .set_uniform_vec3("light_pos", state.light_pos)
            .set_uniform_vec3("view_pos", state.view_pos)
            .set_uniform_vec3("light_color", state.light_color)
            .set_uniform_vec3("object_color", state.object_color);
        if let Some(texture) = &base_color {
            binder = binder.bind_texture(0, texture);
        }
        if let Some(texture) = &metallic_roughness {
            binder = binder.bind_texture(1, texture);
        }
        binder.draw(&vertex_buffer, &index_buffer, index_count, vertex_count)?;

        let ctx = ui.begin(&window, &mut rc)?;
        panel::show(&ctx, &mut state);
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            window.close();
        }
        ui.end(&window, &mut rc)?;

        rc.present()?;
    }

    rc.destroy_index_buffer(index_buffer)?;
    rc.destroy_vertex_buffer(vertex_buffer)?;
    if let Some(texture) = metallic_roughness.filter(|t| Some(*t) != base_color) {
        rc.destroy_texture(texture)?;
    }
    if let Some(texture) = base_color {
        rc.destroy_texture(texture)?;
    }
    rc.destroy_program(program)?;
    rc.shutdown();

    log::info!("viewer closed");
    Ok(())
}

fn upload_image<B: render::Backend>(
    rc: &mut render::RenderContext<B>,
    model: &Model,
    index: usize,
    format: TextureFormat,
) -> Result<render::Handle<render::Texture>> {
    let image = model
        .images
        .get(index)
        .with_context(|| format!("material references missing image {index}"))?;
    let desc = TextureDesc {
        width: image.width,
        height: image.height,
        format,
        filter: FilterMode::Linear,
        address_mode: AddressMode::Repeat,
    };
    Ok(rc.create_texture(desc, &image.pixels)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_engine::render::{RecordingBackend, RenderContext, UniformKind};

    #[test]
    fn shading_program_follows_the_binding_convention() {
        let mut rc = RenderContext::new(RecordingBackend::new(), RenderConfig::default());
        let program = rc.create_graphics_program(PBR_VERTEX, PBR_FRAGMENT).unwrap();
        let reflection = rc.program(program).unwrap().reflection();

        assert_eq!(reflection.texture_slots, vec![0, 1]);
        let locations: Vec<u32> = reflection.vertex_inputs.iter().map(|i| i.location).collect();
        assert_eq!(locations, vec![0, 1, 2]);

        let block = reflection.uniforms.as_ref().unwrap();
        for name in ["light_pos", "view_pos", "light_color", "object_color"] {
            let (_, member) = block.member(name).unwrap();
            assert_eq!(member.kind, UniformKind::Vec3, "{name}");
        }
        assert_eq!(block.member("model").unwrap().1.kind, UniformKind::Mat4);
    }

    #[test]
    fn args_default_to_msaa_8x() {
        let args = Args::parse_from(["lumen-viewer"]);
        assert!(!args.no_msaa);
        assert_eq!(args.samples, 8);
        assert_eq!(args.model, PathBuf::from("assets/models/Suzanne.gltf"));
    }
}
