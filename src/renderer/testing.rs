//! Recording GPU device for unit tests.
//!
//! Handles are fabricated with `vk::Handle::from_raw`, every `cmd_*` call is
//! appended to a command log, and fences can be left unsignaled to stand in
//! for a slow GPU.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use ash::vk;
use ash::vk::Handle;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use gpu_allocator::MemoryLocation;
use gpu_descriptor::DescriptorTotalCount;
use crate::renderer::config::RenderConfig;
use crate::renderer::contexts::device_ctx::capabilities::DeviceCapabilities;
use crate::renderer::contexts::device_ctx::queue::{Queue, QueueFamily};
use crate::renderer::contexts::device_ctx::{
    BufferDesc, GpuDevice, ImageDesc, MappedMemory, MemoryDesc, QueueSubmit, RenderPassBegin,
};
use crate::renderer::contexts::frame_ctx::{RenderContext, RenderContextSettings};
use crate::renderer::contexts::pipeline_ctx::shader::{
    DescriptorBinding, DescriptorSetLayoutInfo, Shader, VertexInputDescription,
};
use crate::renderer::contexts::pipeline_ctx::state::{BlendMode, GraphicsPipelineState};
use crate::renderer::resources::descriptor::DescriptorData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectKind {
    Fence,
    Semaphore,
    CommandPool,
    QueryPool,
    Framebuffer,
    DescriptorPool,
    Pipeline,
    Buffer,
    Memory,
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginRenderPass { framebuffer: vk::Framebuffer },
    EndRenderPass,
    SetViewport { width: f32, height: f32 },
    SetScissor,
    BindPipeline(vk::Pipeline),
    BindDescriptorSets { sets: Vec<vk::DescriptorSet>, dynamic_offsets: Vec<u32> },
    BindVertexBuffers { count: usize },
    BindIndexBuffer { buffer: vk::Buffer, offset: u64 },
    Draw { vertex_count: u32 },
    DrawIndexed { index_count: u32 },
    CopyBuffer { src: vk::Buffer, dst: vk::Buffer, regions: usize },
    CopyBufferToImage { image: vk::Image },
    TransitionImage { image: vk::Image, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout },
    TransferBarrier,
    ResetQueryPool,
    WriteTimestamp { query: u32 },
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub wait_semaphores: Vec<vk::Semaphore>,
    pub signal_semaphores: Vec<vk::Semaphore>,
    pub fence: vk::Fence,
}

#[derive(Debug, Clone, Default)]
pub struct MockStats {
    pub pipelines_created: usize,
    pub pipelines_destroyed: usize,
    pub render_passes_begun: usize,
    pub descriptor_sets_allocated: usize,
    pub descriptor_set_writes: usize,
    pub descriptor_pool_resets: usize,
    pub command_pool_resets: usize,
    pub wait_idle_calls: usize,
}

#[derive(Debug, Clone, Copy)]
struct PoolUsage {
    max_sets: u32,
    allocated: u32,
}

#[derive(Default)]
struct MockState {
    live: HashMap<u64, ObjectKind>,
    buffer_sizes: HashMap<u64, u64>,
    image_extents: HashMap<u64, vk::Extent3D>,
    pools: HashMap<u64, PoolUsage>,
    fences: HashMap<u64, bool>,
    commands: Vec<RecordedCommand>,
    submissions: Vec<Submission>,
    stats: MockStats,
    manual_fences: bool,
    failing_blend: Option<BlendMode>,
    failing_semaphores: bool,
    failing_submits: bool,
}

pub struct MockMemory {
    handle: vk::DeviceMemory,
    bytes: Option<Vec<u8>>,
    size: u64,
}

impl MappedMemory for MockMemory {
    fn device_memory(&self) -> vk::DeviceMemory {
        self.handle
    }

    fn base_offset(&self) -> u64 {
        0
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn mapped_bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    fn mapped_bytes_mut(&mut self) -> Option<&mut [u8]> {
        self.bytes.as_deref_mut()
    }
}

pub struct MockDevice {
    capabilities: DeviceCapabilities,
    next_handle: AtomicU64,
    state: Mutex<MockState>,
    fence_signaled: Condvar,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities::default(),
            next_handle: AtomicU64::new(0x1000),
            state: Mutex::new(MockState::default()),
            fence_signaled: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn create<H: Handle>(&self, kind: ObjectKind) -> H {
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.state().live.insert(raw, kind);
        H::from_raw(raw)
    }

    fn destroy<H: Handle>(&self, handle: H) {
        self.state().live.remove(&handle.as_raw());
    }

    fn record(&self, command: RecordedCommand) {
        self.state().commands.push(command);
    }

    /// When set, submitted fences stay unsignaled until `signal_fence`.
    pub fn set_auto_signal(&self, auto_signal: bool) {
        self.state().manual_fences = !auto_signal;
    }

    pub fn signal_fence(&self, fence: vk::Fence) {
        self.state().fences.insert(fence.as_raw(), true);
        self.fence_signaled.notify_all();
    }

    pub fn is_fence_signaled(&self, fence: vk::Fence) -> bool {
        self.state().fences.get(&fence.as_raw()).copied().unwrap_or(false)
    }

    pub fn fail_pipelines_with_blend(&self, blend: BlendMode) {
        self.state().failing_blend = Some(blend);
    }

    pub fn fail_semaphores(&self, fail: bool) {
        self.state().failing_semaphores = fail;
    }

    pub fn fail_submits(&self, fail: bool) {
        self.state().failing_submits = fail;
    }

    pub fn stats(&self) -> MockStats {
        self.state().stats.clone()
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.state().commands.clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    pub fn buffer_size(&self, buffer: vk::Buffer) -> Option<u64> {
        self.state().buffer_sizes.get(&buffer.as_raw()).copied()
    }

    fn live_of(&self, kind: ObjectKind) -> usize {
        self.state().live.values().filter(|k| **k == kind).count()
    }

    pub fn live_buffers(&self) -> usize {
        self.live_of(ObjectKind::Buffer)
    }

    pub fn live_memory(&self) -> usize {
        self.live_of(ObjectKind::Memory)
    }

    pub fn live_images(&self) -> usize {
        self.live_of(ObjectKind::Image)
    }

    pub fn live_descriptor_pools(&self) -> usize {
        self.live_of(ObjectKind::DescriptorPool)
    }

    pub fn live_objects(&self) -> usize {
        self.state().live.len()
    }

    pub fn max_sets_of_live_pools(&self) -> Vec<u32> {
        let state = self.state();
        let mut sets: Vec<u32> = state.pools
            .iter()
            .filter(|(raw, _)| state.live.contains_key(*raw))
            .map(|(_, usage)| usage.max_sets)
            .collect();
        sets.sort_unstable();
        sets
    }
}

impl GpuDevice for MockDevice {
    type Memory = MockMemory;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let fence: vk::Fence = self.create(ObjectKind::Fence);
        self.state().fences.insert(fence.as_raw(), signaled);
        Ok(fence)
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<bool> {
        let deadline = Instant::now().checked_add(Duration::from_nanos(timeout_ns));
        let mut state = self.state();
        loop {
            if state.fences.get(&fence.as_raw()).copied().unwrap_or(false) {
                return Ok(true);
            }
            state = match deadline {
                None => self.fence_signaled.wait(state).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    self.fence_signaled.wait_timeout(state, deadline - now).unwrap().0
                }
            };
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        self.state().fences.insert(fence.as_raw(), false);
        Ok(())
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.state().fences.remove(&fence.as_raw());
        self.destroy(fence);
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        if self.state().failing_semaphores {
            return Err(eyre!("Mock semaphore creation failure"));
        }
        Ok(self.create(ObjectKind::Semaphore))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.destroy(semaphore);
    }

    fn create_command_pool(&self, _queue_family_index: u32) -> Result<vk::CommandPool> {
        Ok(self.create(ObjectKind::CommandPool))
    }

    fn reset_command_pool(&self, _pool: vk::CommandPool) -> Result<()> {
        self.state().stats.command_pool_resets += 1;
        Ok(())
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.destroy(pool);
    }

    fn allocate_command_buffer(
        &self,
        _pool: vk::CommandPool,
        _level: vk::CommandBufferLevel,
    ) -> Result<vk::CommandBuffer> {
        // Freed with the pool, so not tracked as a live object
        Ok(vk::CommandBuffer::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed)))
    }

    fn begin_command_buffer(&self, _cmd: vk::CommandBuffer) -> Result<()> {
        Ok(())
    }

    fn end_command_buffer(&self, _cmd: vk::CommandBuffer) -> Result<()> {
        Ok(())
    }

    fn create_query_pool(&self, _query_count: u32) -> Result<vk::QueryPool> {
        Ok(self.create(ObjectKind::QueryPool))
    }

    fn destroy_query_pool(&self, pool: vk::QueryPool) {
        self.destroy(pool);
    }

    // Query `i` reads as `i` milliseconds
    fn get_timestamps(&self, _pool: vk::QueryPool, first_query: u32, results: &mut [u64]) -> Result<bool> {
        for (i, result) in results.iter_mut().enumerate() {
            *result = (u64::from(first_query) + i as u64) * 1_000_000;
        }
        Ok(true)
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _attachments: &[vk::ImageView],
        _extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        Ok(self.create(ObjectKind::Framebuffer))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.destroy(framebuffer);
    }

    fn create_descriptor_pool(
        &self,
        _counts: &DescriptorTotalCount,
        max_sets: u32,
    ) -> Result<vk::DescriptorPool> {
        let pool: vk::DescriptorPool = self.create(ObjectKind::DescriptorPool);
        self.state().pools.insert(pool.as_raw(), PoolUsage { max_sets, allocated: 0 });
        Ok(pool)
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<()> {
        let mut state = self.state();
        state.stats.descriptor_pool_resets += 1;
        if let Some(usage) = state.pools.get_mut(&pool.as_raw()) {
            usage.allocated = 0;
        }
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.destroy(pool);
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet> {
        {
            let mut state = self.state();
            let usage = state.pools
                .get_mut(&pool.as_raw())
                .ok_or_else(|| eyre!("Unknown descriptor pool {:?}", pool))?;
            if usage.allocated >= usage.max_sets {
                return Err(eyre!("Descriptor pool {:?} is out of sets", pool));
            }
            usage.allocated += 1;
            state.stats.descriptor_sets_allocated += 1;
        }
        Ok(vk::DescriptorSet::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed)))
    }

    fn write_descriptor_set(&self, _set: vk::DescriptorSet, _descriptors: &[DescriptorData]) {
        self.state().stats.descriptor_set_writes += 1;
    }

    fn create_graphics_pipeline(
        &self,
        state: &GraphicsPipelineState,
        _cache: vk::PipelineCache,
    ) -> Result<vk::Pipeline> {
        if self.state().failing_blend == Some(state.blend_mode()) {
            return Err(eyre!("Pipeline creation rejected by mock device"));
        }
        self.state().stats.pipelines_created += 1;
        Ok(self.create(ObjectKind::Pipeline))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.state().stats.pipelines_destroyed += 1;
        self.destroy(pipeline);
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<(vk::Buffer, MockMemory)> {
        let buffer: vk::Buffer = self.create(ObjectKind::Buffer);
        self.state().buffer_sizes.insert(buffer.as_raw(), desc.size);
        let memory = MockMemory {
            handle: vk::DeviceMemory::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed)),
            bytes: (desc.location != MemoryLocation::GpuOnly).then(|| vec![0; desc.size as usize]),
            size: desc.size,
        };
        Ok((buffer, memory))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer, _memory: MockMemory) {
        self.state().buffer_sizes.remove(&buffer.as_raw());
        self.destroy(buffer);
    }

    fn allocate_memory(&self, desc: &MemoryDesc) -> Result<MockMemory> {
        let handle: vk::DeviceMemory = self.create(ObjectKind::Memory);
        Ok(MockMemory {
            handle,
            bytes: (desc.location != MemoryLocation::GpuOnly).then(|| vec![0; desc.size as usize]),
            size: desc.size,
        })
    }

    fn free_memory(&self, memory: MockMemory) {
        self.destroy(memory.handle);
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<vk::Image> {
        let image: vk::Image = self.create(ObjectKind::Image);
        self.state().image_extents.insert(image.as_raw(), desc.extent);
        Ok(image)
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let extent = self.state()
            .image_extents
            .get(&image.as_raw())
            .copied()
            .unwrap_or_default();
        let size = u64::from(extent.width) * u64::from(extent.height) * u64::from(extent.depth) * 4;
        vk::MemoryRequirements {
            size: size.next_multiple_of(256),
            alignment: 256,
            memory_type_bits: 1,
        }
    }

    fn bind_image_memory(&self, image: vk::Image, memory: &MockMemory, offset: u64) -> Result<()> {
        let required = self.image_memory_requirements(image).size;
        if offset + required > memory.size {
            return Err(eyre!("Image does not fit its memory binding"));
        }
        Ok(())
    }

    fn destroy_image(&self, image: vk::Image) {
        self.state().image_extents.remove(&image.as_raw());
        self.destroy(image);
    }

    fn cmd_begin_render_pass(&self, _cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        self.state().stats.render_passes_begun += 1;
        self.record(RecordedCommand::BeginRenderPass { framebuffer: begin.framebuffer });
    }

    fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {
        self.record(RecordedCommand::EndRenderPass);
    }

    fn cmd_set_viewport(&self, _cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        self.record(RecordedCommand::SetViewport {
            width: viewport.width,
            height: viewport.height,
        });
    }

    fn cmd_set_scissor(&self, _cmd: vk::CommandBuffer, _scissor: vk::Rect2D) {
        self.record(RecordedCommand::SetScissor);
    }

    fn cmd_bind_pipeline(&self, _cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record(RecordedCommand::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_sets(
        &self,
        _cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        _first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        self.record(RecordedCommand::BindDescriptorSets {
            sets: sets.to_vec(),
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn cmd_bind_vertex_buffers(
        &self,
        _cmd: vk::CommandBuffer,
        _first_binding: u32,
        buffers: &[vk::Buffer],
        _offsets: &[u64],
    ) {
        self.record(RecordedCommand::BindVertexBuffers { count: buffers.len() });
    }

    fn cmd_bind_index_buffer(
        &self,
        _cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        _index_type: vk::IndexType,
    ) {
        self.record(RecordedCommand::BindIndexBuffer { buffer, offset });
    }

    fn cmd_draw(
        &self,
        _cmd: vk::CommandBuffer,
        vertex_count: u32,
        _instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.record(RecordedCommand::Draw { vertex_count });
    }

    fn cmd_draw_indexed(
        &self,
        _cmd: vk::CommandBuffer,
        index_count: u32,
        _instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.record(RecordedCommand::DrawIndexed { index_count });
    }

    fn cmd_copy_buffer(
        &self,
        _cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        self.record(RecordedCommand::CopyBuffer { src, dst, regions: regions.len() });
    }

    fn cmd_copy_buffer_to_image(
        &self,
        _cmd: vk::CommandBuffer,
        _src: vk::Buffer,
        dst: vk::Image,
        _regions: &[vk::BufferImageCopy],
    ) {
        self.record(RecordedCommand::CopyBufferToImage { image: dst });
    }

    fn cmd_transition_image_layout(
        &self,
        _cmd: vk::CommandBuffer,
        image: vk::Image,
        _aspect: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) {
        self.record(RecordedCommand::TransitionImage { image, old_layout, new_layout });
    }

    fn cmd_transfer_barrier(&self, _cmd: vk::CommandBuffer) {
        self.record(RecordedCommand::TransferBarrier);
    }

    fn cmd_reset_query_pool(
        &self,
        _cmd: vk::CommandBuffer,
        _pool: vk::QueryPool,
        _first_query: u32,
        _query_count: u32,
    ) {
        self.record(RecordedCommand::ResetQueryPool);
    }

    fn cmd_write_timestamp(
        &self,
        _cmd: vk::CommandBuffer,
        _stage: vk::PipelineStageFlags,
        _pool: vk::QueryPool,
        query: u32,
    ) {
        self.record(RecordedCommand::WriteTimestamp { query });
    }

    fn queue_submit(&self, _queue: vk::Queue, submit: &QueueSubmit) -> Result<()> {
        let mut state = self.state();
        if state.failing_submits {
            return Err(eyre!("Mock queue submission failure"));
        }
        state.submissions.push(Submission {
            command_buffers: submit.command_buffers.to_vec(),
            wait_semaphores: submit.wait_semaphores.to_vec(),
            signal_semaphores: submit.signal_semaphores.to_vec(),
            fence: submit.fence,
        });
        if !state.manual_fences {
            state.fences.insert(submit.fence.as_raw(), true);
            self.fence_signaled.notify_all();
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.state().stats.wait_idle_calls += 1;
        Ok(())
    }
}

/// Set 0: a dynamic uniform block at binding 0 and a storage buffer at binding 1.
/// One vertex binding of packed `vec3` positions.
pub fn test_shader() -> Arc<Shader> {
    let bindings = vec![
        DescriptorBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            block_size: 64,
        },
        DescriptorBinding {
            binding: 1,
            descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            block_size: 0,
        },
    ];
    let vertex_input = VertexInputDescription {
        bindings: vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: 12,
            input_rate: vk::VertexInputRate::VERTEX,
        }],
        attributes: vec![vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        }],
        flags: vk::PipelineVertexInputStateCreateFlags::empty(),
    };

    Arc::new(Shader::new(
        "test",
        vk::ShaderModule::from_raw(1),
        vk::ShaderModule::from_raw(2),
        vertex_input,
        vec![DescriptorSetLayoutInfo {
            layout: vk::DescriptorSetLayout::from_raw(3),
            bindings,
        }],
        vk::PipelineLayout::from_raw(4),
    ))
}

pub fn test_queue() -> Queue {
    let properties = vk::QueueFamilyProperties {
        queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
        queue_count: 1,
        timestamp_valid_bits: 64,
        ..Default::default()
    };
    Queue::new(QueueFamily::new(0, properties), vk::Queue::from_raw(0xF00))
}

pub fn test_settings(device: &MockDevice) -> RenderContextSettings {
    let config = RenderConfig {
        virtual_frame_count: 2,
        transient_memory_per_frame: 64 * 1024,
        ..Default::default()
    };
    RenderContextSettings::from_config(
        &config,
        device.capabilities(),
        0,
        vk::RenderPass::from_raw(0xA00),
        vk::PipelineCache::null(),
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width: 64, height: 64 },
        },
    )
}

pub fn test_context(device: &Arc<MockDevice>) -> RenderContext<MockDevice> {
    test_context_with(device, |_| {})
}

pub fn test_context_with(
    device: &Arc<MockDevice>,
    configure: impl FnOnce(&mut RenderContextSettings),
) -> RenderContext<MockDevice> {
    let mut settings = test_settings(device);
    configure(&mut settings);
    RenderContext::new(settings, device.clone()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_times_out_on_unsignaled_fence() {
        let device = MockDevice::new();
        let fence = device.create_fence(false).unwrap();
        assert!(!device.wait_for_fence(fence, 1_000_000).unwrap());
        device.signal_fence(fence);
        assert!(device.wait_for_fence(fence, 0).unwrap());
    }

    #[test]
    fn descriptor_pool_enforces_set_limit() {
        let device = MockDevice::new();
        let pool = device.create_descriptor_pool(&DescriptorTotalCount::default(), 1).unwrap();
        let layout = vk::DescriptorSetLayout::null();
        assert!(device.allocate_descriptor_set(pool, layout).is_ok());
        assert!(device.allocate_descriptor_set(pool, layout).is_err());
        device.reset_descriptor_pool(pool).unwrap();
        assert!(device.allocate_descriptor_set(pool, layout).is_ok());
    }
}
