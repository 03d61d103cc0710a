use std::collections::HashMap;

use super::{Backend, DrawCall, OverlayFrame};
use crate::render::error::{RenderError, ResourceKind, ShaderError};
use crate::render::frame::{ClearValues, RenderingInfo};
use crate::render::handle::RawHandle;
use crate::render::pipeline::GraphicsPipeline;
use crate::render::resources::{IndexType, TextureDesc};
use crate::render::shader::ShaderReflection;
use crate::render::vertex::VertexFormat;

/// A frame command as observed by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginRendering {
        info: RenderingInfo,
        clear: ClearValues,
    },
    BindPipeline(GraphicsPipeline),
    Draw(DrawCall),
    Overlay {
        primitives: usize,
        pixels_per_point: f32,
    },
    Present,
}

/// Backend that records frame commands and keeps resource bytes in memory.
///
/// Used for tests and for headless inspection of what a frame would submit.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<RecordedCommand>,
    /// Contents of every live resource. Programs and vertex arrays store no bytes.
    resources: HashMap<(ResourceKind, RawHandle), Vec<u8>>,
    destroyed: Vec<(ResourceKind, RawHandle)>,
    frames_presented: u64,
    program_failure: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Returns and clears the recorded commands.
    pub fn take_commands(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Bytes stored for a live resource.
    pub fn resource_data(&self, kind: ResourceKind, id: RawHandle) -> Option<&[u8]> {
        self.resources.get(&(kind, id)).map(Vec::as_slice)
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.resources.keys().filter(|(k, _)| *k == kind).count()
    }

    /// Every `destroy` call received, in order.
    pub fn destroyed(&self) -> &[(ResourceKind, RawHandle)] {
        &self.destroyed
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Makes the next `create_program` fail with `message`, as a driver
    /// rejecting the program would.
    pub fn fail_next_program(&mut self, message: impl Into<String>) {
        self.program_failure = Some(message.into());
    }

    fn store(&mut self, kind: ResourceKind, id: RawHandle, data: Vec<u8>) {
        let previous = self.resources.insert((kind, id), data);
        debug_assert!(previous.is_none(), "{kind} key reused while live");
    }
}

impl Backend for RecordingBackend {
    fn create_vertex_buffer(&mut self, id: RawHandle, data: &[u8]) {
        self.store(ResourceKind::VertexBuffer, id, data.to_vec());
    }

    fn create_index_buffer(&mut self, id: RawHandle, _index_type: IndexType, data: &[u8]) {
        self.store(ResourceKind::IndexBuffer, id, data.to_vec());
    }

    fn create_texture(&mut self, id: RawHandle, _desc: &TextureDesc, data: &[u8]) {
        self.store(ResourceKind::Texture, id, data.to_vec());
    }

    fn create_program(
        &mut self,
        id: RawHandle,
        _vertex_src: &str,
        _fragment_src: &str,
        _reflection: &ShaderReflection,
    ) -> Result<(), ShaderError> {
        if let Some(message) = self.program_failure.take() {
            return Err(ShaderError::Backend(message));
        }
        self.store(ResourceKind::ShaderProgram, id, Vec::new());
        Ok(())
    }

    fn create_vertex_array(&mut self, id: RawHandle, _format: &VertexFormat) {
        self.store(ResourceKind::VertexArray, id, Vec::new());
    }

    fn destroy(&mut self, kind: ResourceKind, id: RawHandle) {
        self.resources.remove(&(kind, id));
        self.destroyed.push((kind, id));
    }

    fn begin_rendering(&mut self, info: &RenderingInfo, clear: ClearValues) -> Result<(), RenderError> {
        self.commands.push(RecordedCommand::BeginRendering { info: *info, clear });
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        self.commands.push(RecordedCommand::BindPipeline(*pipeline));
    }

    fn draw(&mut self, call: DrawCall) {
        self.commands.push(RecordedCommand::Draw(call));
    }

    fn draw_overlay(&mut self, frame: OverlayFrame) {
        self.commands.push(RecordedCommand::Overlay {
            primitives: frame.primitives.len(),
            pixels_per_point: frame.pixels_per_point,
        });
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.commands.push(RecordedCommand::Present);
        self.frames_presented += 1;
        Ok(())
    }
}
