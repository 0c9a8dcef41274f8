pub mod capabilities;
pub mod device;
pub mod instance;
pub mod queue;
pub mod target;

use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use gpu_allocator::MemoryLocation;
use gpu_descriptor::DescriptorTotalCount;
use crate::renderer::contexts::device_ctx::capabilities::DeviceCapabilities;
use crate::renderer::contexts::device_ctx::device::AshDevice;
use crate::renderer::contexts::device_ctx::instance::RenderInstance;
use crate::renderer::contexts::device_ctx::queue::Queue;
use crate::renderer::contexts::pipeline_ctx::state::GraphicsPipelineState;
use crate::renderer::resources::descriptor::DescriptorData;

/// A block of device memory, optionally mapped into host address space.
pub trait MappedMemory {
    fn device_memory(&self) -> vk::DeviceMemory;

    /// Offset of this block inside `device_memory()`.
    fn base_offset(&self) -> u64;

    fn size(&self) -> u64;

    fn mapped_bytes(&self) -> Option<&[u8]>;

    fn mapped_bytes_mut(&mut self) -> Option<&mut [u8]>;
}

pub struct BufferDesc<'a> {
    pub name: &'a str,
    pub size: u64,
    pub usage: vk::BufferUsageFlags,
    pub location: MemoryLocation,
}

pub struct MemoryDesc<'a> {
    pub name: &'a str,
    pub size: u64,
    pub alignment: u64,
    pub memory_type_bits: u32,
    pub location: MemoryLocation,
}

pub struct ImageDesc {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub usage: vk::ImageUsageFlags,
    pub tiling: vk::ImageTiling,
}

pub struct RenderPassBegin<'a> {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub render_area: vk::Rect2D,
    pub clear_values: &'a [vk::ClearValue],
}

pub struct QueueSubmit<'a> {
    pub command_buffers: &'a [vk::CommandBuffer],
    pub wait_semaphores: &'a [vk::Semaphore],
    pub wait_stages: &'a [vk::PipelineStageFlags],
    pub signal_semaphores: &'a [vk::Semaphore],
    pub fence: vk::Fence,
}

/// Every GPU call made by the frame machinery goes through this trait.
///
/// Handles are plain `ash::vk` handles. Implementations own nothing on behalf of
/// the caller: whoever creates an object is responsible for destroying it.
pub trait GpuDevice: Send + Sync {
    type Memory: MappedMemory + Send + Sync;

    fn capabilities(&self) -> &DeviceCapabilities;

    // Synchronization
    fn create_fence(&self, signaled: bool) -> Result<vk::Fence>;
    /// Returns `Ok(false)` if the timeout elapsed before the fence was signaled.
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<bool>;
    fn reset_fence(&self, fence: vk::Fence) -> Result<()>;
    fn destroy_fence(&self, fence: vk::Fence);
    fn create_semaphore(&self) -> Result<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    // Command pools and buffers
    fn create_command_pool(&self, queue_family_index: u32) -> Result<vk::CommandPool>;
    fn reset_command_pool(&self, pool: vk::CommandPool) -> Result<()>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn allocate_command_buffer(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
    ) -> Result<vk::CommandBuffer>;
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;

    fn create_query_pool(&self, query_count: u32) -> Result<vk::QueryPool>;
    fn destroy_query_pool(&self, pool: vk::QueryPool);
    /// Read one 64-bit timestamp per element of `results`, starting at
    /// `first_query`. Returns `Ok(false)` if any result is not available yet.
    fn get_timestamps(&self, pool: vk::QueryPool, first_query: u32, results: &mut [u64]) -> Result<bool>;

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // Descriptors
    fn create_descriptor_pool(
        &self,
        counts: &DescriptorTotalCount,
        max_sets: u32,
    ) -> Result<vk::DescriptorPool>;
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<()>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet>;
    /// Writes `descriptors[i]` to binding `i` of `set`.
    fn write_descriptor_set(&self, set: vk::DescriptorSet, descriptors: &[DescriptorData]);

    // Pipelines
    fn create_graphics_pipeline(
        &self,
        state: &GraphicsPipelineState,
        cache: vk::PipelineCache,
    ) -> Result<vk::Pipeline>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    // Memory
    fn create_buffer(&self, desc: &BufferDesc) -> Result<(vk::Buffer, Self::Memory)>;
    fn destroy_buffer(&self, buffer: vk::Buffer, memory: Self::Memory);
    fn allocate_memory(&self, desc: &MemoryDesc) -> Result<Self::Memory>;
    fn free_memory(&self, memory: Self::Memory);
    fn create_image(&self, desc: &ImageDesc) -> Result<vk::Image>;
    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;
    /// `offset` is relative to the start of `memory`, not of its device memory object.
    fn bind_image_memory(&self, image: vk::Image, memory: &Self::Memory, offset: u64) -> Result<()>;
    fn destroy_image(&self, image: vk::Image);

    // Recording
    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, begin: &RenderPassBegin);
    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);
    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport);
    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D);
    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );
    fn cmd_bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[u64],
    );
    fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        index_type: vk::IndexType,
    );
    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn cmd_copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    );
    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        regions: &[vk::BufferImageCopy],
    );
    fn cmd_transition_image_layout(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    );
    /// Makes transfer writes visible to every later read.
    fn cmd_transfer_barrier(&self, cmd: vk::CommandBuffer);
    fn cmd_reset_query_pool(
        &self,
        cmd: vk::CommandBuffer,
        pool: vk::QueryPool,
        first_query: u32,
        query_count: u32,
    );
    fn cmd_write_timestamp(
        &self,
        cmd: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    );

    // Queue
    fn queue_submit(&self, queue: vk::Queue, submit: &QueueSubmit) -> Result<()>;
    fn wait_idle(&self) -> Result<()>;
}

/// Responsibilities:
/// - Bootstrap the Vulkan instance and a headless device
/// - Hand out the shared device and its graphics queue
pub struct RenderDeviceContext {
    pub device: Arc<AshDevice>,
    pub graphics_queue: Arc<Queue>,

    // Declared last so the device is gone before the instance is destroyed.
    pub instance: RenderInstance,
}

impl RenderDeviceContext {
    pub fn new() -> Result<Self> {
        let instance = RenderInstance::new()?;
        let (device, graphics_queue) = instance.create_device()?;

        Ok(Self {
            device: Arc::new(device),
            graphics_queue: Arc::new(graphics_queue),
            instance,
        })
    }
}
