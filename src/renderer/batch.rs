use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use smallvec::SmallVec;
use crate::renderer::contexts::device_ctx::GpuDevice;
use crate::renderer::contexts::frame_ctx::{FrameCommandBuffer, RenderContext};
use crate::renderer::contexts::pipeline_ctx::Pipeline;
use crate::renderer::contexts::pipeline_ctx::state::GraphicsPipelineState;
use crate::renderer::resources::draw_command::DrawCommand;

/// Collects draw commands against one render context and records them into
/// a single command buffer on `submit`.
///
/// Commands are processed in the order they were drawn. Consecutive commands
/// with equal pipeline state bind the pipeline once; descriptor sets with
/// equal content are allocated once per frame.
pub struct RenderBatch<'a, D: GpuDevice> {
    context: &'a mut RenderContext<D>,
    draw_commands: Vec<DrawCommand>,
}

impl<'a, D: GpuDevice> RenderBatch<'a, D> {
    pub fn new(context: &'a mut RenderContext<D>) -> Self {
        Self {
            context,
            draw_commands: Vec::new(),
        }
    }

    /// Copy `dc`, commit its staged data to transient memory and queue it.
    pub fn draw(&mut self, dc: &DrawCommand) -> Result<&mut Self> {
        let mut dc = dc.clone();

        // Fills in dynamic offsets and buffer references
        let allocator = self.context.transient_allocator_mut();
        let mark = allocator.mark();
        let committed = dc.commit_uniforms(allocator)
            .and_then(|()| dc.commit_mesh_attributes(allocator));
        if let Err(e) = committed {
            allocator.rewind(mark);
            return Err(e);
        }

        dc.pipeline_state.set_render_pass(self.context.render_pass());
        dc.pipeline_state.set_subpass(self.context.subpass_id());

        self.draw_commands.push(dc);
        Ok(self)
    }

    pub fn pending(&self) -> usize {
        self.draw_commands.len()
    }

    /// Record every queued command into one render-pass command buffer and
    /// hand it to the context.
    pub fn submit(&mut self) -> Result<()> {
        let draw_commands = std::mem::take(&mut self.draw_commands);

        let cmd = self.context.request_primary_command_buffer_with_renderpass()?;
        let device = self.context.device().clone();
        let area = self.context.render_area();

        device.cmd_set_viewport(cmd.handle(), vk::Viewport {
            x: area.offset.x as f32,
            y: area.offset.y as f32,
            width: area.extent.width as f32,
            height: area.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        device.cmd_set_scissor(cmd.handle(), area);

        self.process_draw_commands(cmd, &draw_commands);

        device.cmd_end_render_pass(cmd.handle());
        device.end_command_buffer(cmd.handle())?;
        self.context.submit(cmd)
    }

    fn process_draw_commands(&mut self, cmd: FrameCommandBuffer, draw_commands: &[DrawCommand]) {
        let mut bound_state: Option<&GraphicsPipelineState> = None;

        for (i, dc) in draw_commands.iter().enumerate() {
            // Cheap value comparison first; hash only when the state changes
            if bound_state != Some(&dc.pipeline_state) {
                match self.bind_pipeline(cmd, &dc.pipeline_state) {
                    Ok(()) => bound_state = Some(&dc.pipeline_state),
                    Err(e) => {
                        log::error!("Skipping draw {}: {}", i, e);
                        bound_state = None;
                        continue;
                    }
                }
            }

            if let Err(e) = self.record_draw(cmd, dc) {
                log::error!("Skipping draw {}: {}", i, e);
            }
        }
    }

    fn bind_pipeline(&mut self, cmd: FrameCommandBuffer, state: &GraphicsPipelineState) -> Result<()> {
        let hash = state.calculate_hash();
        let device = self.context.device().clone();
        let pipeline_cache = self.context.pipeline_cache();

        let slot = self.context.borrow_pipeline(hash);
        let pipeline = match slot {
            Some(pipeline) => {
                log::trace!("Pipeline cache hit ({:#018x})", hash);
                pipeline.handle()
            }
            None => {
                let handle = device.create_graphics_pipeline(state, pipeline_cache)?;
                log::debug!("Created pipeline for {} ({:#018x})", state.shader().name, hash);
                slot.insert(Pipeline::new(handle, Arc::clone(&device))).handle()
            }
        };

        device.cmd_bind_pipeline(cmd.handle(), pipeline);
        Ok(())
    }

    fn record_draw(&mut self, cmd: FrameCommandBuffer, dc: &DrawCommand) -> Result<()> {
        let shader = dc.pipeline_state.shader().clone();
        let device = self.context.device().clone();

        let mut sets: SmallVec<[vk::DescriptorSet; 4]> = SmallVec::new();
        let mut dynamic_offsets: SmallVec<[u32; 8]> = SmallVec::new();

        for (set_id, &layout_key) in shader.layout_keys().iter().enumerate() {
            let data = dc.descriptor_set(set_id)
                .ok_or_else(|| eyre!("Draw command has no data for descriptor set {}", set_id))?;
            let layout = shader.set_layout(set_id)
                .ok_or_else(|| eyre!("Shader {} has no layout for set {}", shader.name, set_id))?;

            let hash = data.content_hash(layout_key);
            let set = self.context.get_descriptor_set(hash, set_id, layout, &data.descriptors)?;

            sets.push(set);
            dynamic_offsets.extend(data.dynamic_offsets());
        }

        if !sets.is_empty() {
            device.cmd_bind_descriptor_sets(
                cmd.handle(),
                shader.pipeline_layout,
                0,
                &sets,
                &dynamic_offsets,
            );
        }

        if !dc.vertex_buffers().is_empty() {
            device.cmd_bind_vertex_buffers(cmd.handle(), 0, dc.vertex_buffers(), dc.vertex_offsets());
        }

        match dc.index_buffer() {
            None => device.cmd_draw(cmd.handle(), dc.num_vertices(), dc.instance_count(), 0, 0),
            Some((buffer, offset)) => {
                device.cmd_bind_index_buffer(cmd.handle(), buffer, offset, vk::IndexType::UINT32);
                device.cmd_draw_indexed(cmd.handle(), dc.num_indices(), dc.instance_count(), 0, 0, 0);
            }
        }

        Ok(())
    }
}
