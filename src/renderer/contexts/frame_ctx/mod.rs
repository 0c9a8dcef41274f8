pub mod descriptor_pool;
pub mod frame;
pub mod staging;

use std::sync::Arc;
use std::time::Duration;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use gpu_allocator::MemoryLocation;
use gpu_descriptor::DescriptorTotalCount;
use smallvec::SmallVec;
use crate::renderer::config::RenderConfig;
use crate::renderer::contexts::device_ctx::capabilities::DeviceCapabilities;
use crate::renderer::contexts::device_ctx::queue::QueueGuard;
use crate::renderer::contexts::device_ctx::{GpuDevice, QueueSubmit, RenderPassBegin};
use crate::renderer::contexts::frame_ctx::descriptor_pool::DescriptorPoolBudget;
use crate::renderer::contexts::frame_ctx::frame::{FrameState, TIMESTAMP_QUERY_COUNT, VirtualFrame};
use crate::renderer::contexts::pipeline_ctx::shader::DescriptorSetLayoutInfo;
use crate::renderer::contexts::pipeline_ctx::{Pipeline, PipelineCache};
use crate::renderer::internals::allocator::{AllocatorSettings, TransientAllocator};
use crate::renderer::internals::buffer_allocator::{BufferAllocator, BufferAllocatorSettings};
use crate::renderer::resources::descriptor::DescriptorData;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

impl ClearValues {
    /// Color attachment first, then depth/stencil.
    pub fn as_vk(&self) -> [vk::ClearValue; 2] {
        [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: self.color },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.depth,
                    stencil: self.stencil,
                },
            },
        ]
    }
}

#[derive(Debug, Clone)]
pub struct RenderContextSettings {
    pub virtual_frame_count: usize,
    pub queue_family_index: u32,
    pub transient_memory: BufferAllocatorSettings,
    pub pipeline_cache: vk::PipelineCache,
    pub render_pass: vk::RenderPass,
    pub render_area: vk::Rect2D,
    pub clear_values: ClearValues,
    pub descriptor_pool_sizes: DescriptorTotalCount,
    pub descriptor_pool_max_sets: u32,
    /// Make queue submission wait on the frame's image-acquired semaphore.
    pub wait_image_acquired: bool,
    /// Signal the frame's render-complete semaphore on submission.
    pub signal_render_complete: bool,
    pub fence_timeout: Duration,
    pub timestamp_queries: bool,
}

impl RenderContextSettings {
    pub fn from_config(
        config: &RenderConfig,
        capabilities: &DeviceCapabilities,
        queue_family_index: u32,
        render_pass: vk::RenderPass,
        pipeline_cache: vk::PipelineCache,
        render_area: vk::Rect2D,
    ) -> Self {
        Self {
            virtual_frame_count: config.virtual_frame_count,
            queue_family_index,
            transient_memory: BufferAllocatorSettings {
                allocator: AllocatorSettings {
                    name: "Render Context Transient Memory".into(),
                    size: config.transient_memory_per_frame,
                    frame_count: config.virtual_frame_count,
                    alignment: capabilities.transient_alignment(),
                    location: MemoryLocation::CpuToGpu,
                },
                ..Default::default()
            },
            pipeline_cache,
            render_pass,
            render_area,
            clear_values: ClearValues {
                color: config.clear_color,
                ..Default::default()
            },
            descriptor_pool_sizes: config.descriptor_pool_sizes,
            descriptor_pool_max_sets: config.descriptor_pool_max_sets,
            wait_image_acquired: false,
            signal_render_complete: false,
            fence_timeout: config.fence_timeout,
            timestamp_queries: config.timestamp_queries && capabilities.timestamps_supported,
        }
    }
}

/// A command buffer handed out by a `RenderContext`.
///
/// Only valid until the next `swap`; `submit` rejects buffers from an earlier
/// rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCommandBuffer {
    handle: vk::CommandBuffer,
    epoch: u64,
}

impl FrameCommandBuffer {
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }
}

/// Responsibilities:
/// - Own the ring of virtual frames and their pools and sync objects
/// - Resolve descriptor sets and pipelines through content-hash caches
/// - Sequence command buffer submission and frame rotation
///
/// One context is driven by one thread. Contexts sharing a queue serialize
/// `submit_to_queue` through the queue's lock.
pub struct RenderContext<D: GpuDevice> {
    settings: RenderContextSettings,
    device: Arc<D>,

    frames: Vec<VirtualFrame>,
    current_frame: usize,
    // Bumped on every swap; stamps handed-out command buffers
    epoch: u64,
    subpass_id: u32,

    transient_memory: BufferAllocator<D>,
    descriptor_budget: DescriptorPoolBudget,
    pipelines: PipelineCache<D>,
    gpu_frame_time: Option<Duration>,
}

impl<D: GpuDevice> RenderContext<D> {
    pub fn new(
        mut settings: RenderContextSettings,
        device: Arc<D>,
    ) -> Result<Self> {
        let descriptor_budget = DescriptorPoolBudget::new(
            settings.descriptor_pool_sizes,
            settings.descriptor_pool_max_sets,
            settings.virtual_frame_count,
        )?;

        // One transient region per virtual frame
        settings.transient_memory.allocator.frame_count = settings.virtual_frame_count;
        let transient_memory = BufferAllocator::new(
            settings.transient_memory.clone(),
            device.clone(),
        )?;

        let mut frames = Vec::with_capacity(settings.virtual_frame_count);
        for _ in 0..settings.virtual_frame_count {
            let frame = VirtualFrame::new(
                device.as_ref(),
                settings.queue_family_index,
                &descriptor_budget,
                settings.timestamp_queries,
            );
            match frame {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    for mut frame in frames {
                        frame.destroy(device.as_ref());
                    }
                    return Err(e);
                }
            }
        }

        log::debug!(
            "Created render context with {} virtual frames",
            settings.virtual_frame_count,
        );

        Ok(Self {
            settings,
            device,
            frames,
            current_frame: 0,
            epoch: 0,
            subpass_id: 0,
            transient_memory,
            descriptor_budget,
            pipelines: PipelineCache::new(),
            gpu_frame_time: None,
        })
    }

    fn current(&self) -> &VirtualFrame {
        &self.frames[self.current_frame]
    }

    fn current_mut(&mut self) -> &mut VirtualFrame {
        &mut self.frames[self.current_frame]
    }

    fn ensure_recordable(&self) -> Result<()> {
        if self.current().state == FrameState::Submitted {
            return Err(eyre!(
                "Virtual frame {} was already submitted; swap before recording",
                self.current_frame,
            ));
        }
        Ok(())
    }

    fn stamp(&self, handle: vk::CommandBuffer) -> FrameCommandBuffer {
        FrameCommandBuffer {
            handle,
            epoch: self.epoch,
        }
    }

    /// Allocate a command buffer from the current frame's pool without beginning it.
    pub fn allocate_transient_command_buffer(
        &mut self,
        level: vk::CommandBufferLevel,
    ) -> Result<FrameCommandBuffer> {
        self.ensure_recordable()?;
        let cmd = self.device.allocate_command_buffer(self.current().command_pool, level)?;
        Ok(self.stamp(cmd))
    }

    /// Allocate and begin a one-time primary command buffer.
    pub fn request_primary_command_buffer(&mut self) -> Result<FrameCommandBuffer> {
        let cmd = self.allocate_transient_command_buffer(vk::CommandBufferLevel::PRIMARY)?;
        self.device.begin_command_buffer(cmd.handle)?;
        self.current_mut().state = FrameState::Recording;
        Ok(cmd)
    }

    /// Like `request_primary_command_buffer`, with the context's render pass
    /// begun on the current framebuffer, render area and clear values.
    pub fn request_primary_command_buffer_with_renderpass(&mut self) -> Result<FrameCommandBuffer> {
        if self.current().framebuffer == vk::Framebuffer::null() {
            return Err(eyre!(
                "Virtual frame {} has no framebuffer; call setup_framebuffer_attachments first",
                self.current_frame,
            ));
        }

        let cmd = self.request_primary_command_buffer()?;
        let clear_values = self.settings.clear_values.as_vk();
        self.device.cmd_begin_render_pass(cmd.handle, &RenderPassBegin {
            render_pass: self.settings.render_pass,
            framebuffer: self.current().framebuffer,
            render_area: self.settings.render_area,
            clear_values: &clear_values,
        });

        Ok(cmd)
    }

    /// Queue a finished command buffer for the next `submit_to_queue`.
    pub fn submit(&mut self, buffer: FrameCommandBuffer) -> Result<()> {
        if buffer.epoch != self.epoch {
            return Err(eyre!(
                "Command buffer {:?} was acquired before the last swap",
                buffer.handle,
            ));
        }
        self.ensure_recordable()?;

        let frame = self.current_mut();
        frame.command_buffers.push(buffer.handle);
        frame.state = FrameState::Recording;
        Ok(())
    }

    /// Submit every pending buffer of the current frame, in order, arming its fence.
    ///
    /// With timestamp queries enabled the submission is bracketed by buffers
    /// writing the frame's begin and end timestamps.
    pub fn submit_to_queue(&mut self, queue: &QueueGuard) -> Result<()> {
        self.ensure_recordable()?;

        let timed = self.current().query_pool != vk::QueryPool::null();
        let mut command_buffers: SmallVec<[vk::CommandBuffer; 8]> = SmallVec::new();
        if timed {
            command_buffers.push(self.record_timestamp(0, vk::PipelineStageFlags::TOP_OF_PIPE)?);
        }
        command_buffers.extend_from_slice(&self.current().command_buffers);
        if timed {
            command_buffers.push(self.record_timestamp(1, vk::PipelineStageFlags::BOTTOM_OF_PIPE)?);
        }

        let frame = &self.frames[self.current_frame];
        let wait_semaphores = [frame.image_acquired];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.render_complete];
        let wait_count = usize::from(self.settings.wait_image_acquired);
        let signal_count = usize::from(self.settings.signal_render_complete);

        self.device.reset_fence(frame.fence)?;
        self.device.queue_submit(queue.handle(), &QueueSubmit {
            command_buffers: &command_buffers,
            wait_semaphores: &wait_semaphores[..wait_count],
            wait_stages: &wait_stages[..wait_count],
            signal_semaphores: &signal_semaphores[..signal_count],
            fence: frame.fence,
        })?;

        log::trace!(
            "Frame {}: submitted {} command buffers",
            self.current_frame,
            frame.command_buffers.len(),
        );
        let frame = self.current_mut();
        frame.state = FrameState::Submitted;
        frame.timestamps_written = timed;
        Ok(())
    }

    // Query 0 is written first in a submission and resets the pool
    fn record_timestamp(&self, query: u32, stage: vk::PipelineStageFlags) -> Result<vk::CommandBuffer> {
        let frame = self.current();
        let cmd = self.device.allocate_command_buffer(frame.command_pool, vk::CommandBufferLevel::PRIMARY)?;
        self.device.begin_command_buffer(cmd)?;
        if query == 0 {
            self.device.cmd_reset_query_pool(cmd, frame.query_pool, 0, TIMESTAMP_QUERY_COUNT);
        }
        self.device.cmd_write_timestamp(cmd, stage, frame.query_pool, query);
        self.device.end_command_buffer(cmd)?;
        Ok(cmd)
    }

    /// Advance to the next virtual frame, blocking until the GPU is done with it.
    ///
    /// On error nothing changes: the current frame stays current and a retry
    /// waits on the same fence again.
    pub fn swap(&mut self) -> Result<()> {
        let index = (self.current_frame + 1) % self.frames.len();

        // Frames that never reached the queue have no work in flight
        if self.frames[index].state == FrameState::Submitted {
            let timeout_ns = u64::try_from(self.settings.fence_timeout.as_nanos()).unwrap_or(u64::MAX);
            if !self.device.wait_for_fence(self.frames[index].fence, timeout_ns)? {
                return Err(eyre!(
                    "Frame {} fence not signaled after {:?}; assuming the device is lost",
                    index,
                    self.settings.fence_timeout,
                ));
            }
            if self.frames[index].timestamps_written {
                self.read_gpu_frame_time(index)?;
            }
        }

        let leftover = &self.frames[self.current_frame];
        if leftover.state == FrameState::Recording && !leftover.command_buffers.is_empty() {
            log::warn!(
                "Frame {}: dropping {} command buffers that were never submitted to a queue",
                self.current_frame,
                leftover.command_buffers.len(),
            );
        }

        self.current_frame = index;
        self.epoch += 1;
        self.transient_memory.swap();
        self.transient_memory.free();

        let frame = &mut self.frames[index];
        self.device.reset_command_pool(frame.command_pool)?;
        frame.command_buffers.clear();
        frame.timestamps_written = false;

        if self.descriptor_budget.is_dirty(index) {
            frame.consolidate_descriptor_pools(self.device.as_ref(), &self.descriptor_budget)?;
            self.descriptor_budget.clear_dirty(index);
            log::debug!(
                "Frame {}: consolidated descriptor pools ({} sets)",
                index,
                self.descriptor_budget.max_sets(),
            );
        } else {
            frame.reset_descriptor_pools(self.device.as_ref())?;
        }
        self.descriptor_budget.restore();
        frame.descriptor_set_cache.clear();
        frame.state = FrameState::Idle;

        log::trace!("Swapped to frame {}", index);
        Ok(())
    }

    fn read_gpu_frame_time(&mut self, index: usize) -> Result<()> {
        let mut ticks = [0u64; TIMESTAMP_QUERY_COUNT as usize];
        if !self.device.get_timestamps(self.frames[index].query_pool, 0, &mut ticks)? {
            log::warn!("Frame {}: timestamps not available after fence wait", index);
            return Ok(());
        }

        let period = f64::from(self.device.capabilities().timestamp_period);
        let nanos = ticks[1].saturating_sub(ticks[0]) as f64 * period;
        let elapsed = Duration::from_nanos(nanos as u64);
        log::trace!("Frame {}: GPU time {:?}", index, elapsed);
        self.gpu_frame_time = Some(elapsed);
        Ok(())
    }

    /// Look up a descriptor set by content hash, allocating and writing it on a miss.
    pub fn get_descriptor_set(
        &mut self,
        hash: u64,
        set_id: usize,
        layout: &DescriptorSetLayoutInfo,
        descriptors: &[DescriptorData],
    ) -> Result<vk::DescriptorSet> {
        let frame = &mut self.frames[self.current_frame];
        if let Some(&set) = frame.descriptor_set_cache.get(&hash) {
            log::trace!("Descriptor set cache hit for set {} ({:#018x})", set_id, hash);
            return Ok(set);
        }

        let required = DescriptorPoolBudget::required_for(&layout.bindings)?;
        let pool = if self.descriptor_budget.can_allocate(&required) {
            self.descriptor_budget.consume(&required);
            frame.descriptor_pools[0]
        } else {
            let pool = self.device.create_descriptor_pool(&required, 1)?;
            frame.descriptor_pools.push(pool);
            self.descriptor_budget.grow(&required);
            log::debug!(
                "Descriptor pool of frame {} exhausted; added overflow pool #{}",
                self.current_frame,
                frame.descriptor_pools.len() - 1,
            );
            pool
        };

        let set = self.device.allocate_descriptor_set(pool, layout.layout)?;
        self.device.write_descriptor_set(set, descriptors);
        frame.descriptor_set_cache.insert(hash, set);

        log::debug!("Descriptor set cache miss for set {} ({:#018x})", set_id, hash);
        Ok(set)
    }

    /// Slot in the context-lifetime pipeline cache; fill it on a miss.
    pub fn borrow_pipeline(&mut self, hash: u64) -> &mut Option<Pipeline<D>> {
        self.pipelines.borrow(hash)
    }

    /// (Re)create the current frame's framebuffer over `attachments`.
    pub fn setup_framebuffer_attachments(&mut self, attachments: &[vk::ImageView]) -> Result<()> {
        self.ensure_recordable()?;
        let extent = self.settings.render_area.extent;
        let framebuffer = self.device.create_framebuffer(
            self.settings.render_pass,
            attachments,
            extent,
        )?;

        let frame = &mut self.frames[self.current_frame];
        if frame.framebuffer != vk::Framebuffer::null() {
            // Not submitted in this rotation, and swap waited on the previous one
            self.device.destroy_framebuffer(frame.framebuffer);
        }
        frame.framebuffer = framebuffer;
        Ok(())
    }

    pub fn set_render_area(&mut self, render_area: vk::Rect2D) {
        self.settings.render_area = render_area;
    }

    pub fn render_area(&self) -> vk::Rect2D {
        self.settings.render_area
    }

    pub fn set_clear_values(&mut self, clear_values: ClearValues) {
        self.settings.clear_values = clear_values;
    }

    pub fn clear_values(&self) -> ClearValues {
        self.settings.clear_values
    }

    pub fn set_subpass_id(&mut self, subpass_id: u32) {
        self.subpass_id = subpass_id;
    }

    pub fn subpass_id(&self) -> u32 {
        self.subpass_id
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.settings.render_pass
    }

    pub fn pipeline_cache(&self) -> vk::PipelineCache {
        self.settings.pipeline_cache
    }

    pub fn fence(&self) -> vk::Fence {
        self.current().fence
    }

    pub fn image_acquired_semaphore(&self) -> vk::Semaphore {
        self.current().image_acquired
    }

    pub fn render_complete_semaphore(&self) -> vk::Semaphore {
        self.current().render_complete
    }

    pub fn framebuffer(&self) -> vk::Framebuffer {
        self.current().framebuffer
    }

    pub fn query_pool(&self) -> vk::QueryPool {
        self.current().query_pool
    }

    /// GPU time of the most recently reclaimed frame that wrote timestamps.
    pub fn last_gpu_frame_time(&self) -> Option<Duration> {
        self.gpu_frame_time
    }

    pub fn frame_index(&self) -> usize {
        self.current_frame
    }

    pub fn frame_state(&self) -> FrameState {
        self.current().state
    }

    pub fn virtual_frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn transient_allocator(&self) -> &BufferAllocator<D> {
        &self.transient_memory
    }

    pub fn transient_allocator_mut(&mut self) -> &mut BufferAllocator<D> {
        &mut self.transient_memory
    }

    pub fn descriptor_budget(&self) -> &DescriptorPoolBudget {
        &self.descriptor_budget
    }

    pub fn cached_pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn cached_descriptor_set_count(&self) -> usize {
        self.current().descriptor_set_cache.len()
    }
}

impl<D: GpuDevice> Drop for RenderContext<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle during render context teardown: {}", e);
        }
        self.pipelines.clear();
        for frame in self.frames.iter_mut() {
            frame.destroy(self.device.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Instant;
    use ash::vk::Handle;
    use crate::renderer::testing::{
        MockDevice, RecordedCommand, test_context, test_context_with, test_queue, test_shader,
    };
    use crate::renderer::resources::descriptor::DescriptorSetData;

    #[test]
    fn render_pass_buffer_needs_framebuffer() {
        let device = Arc::new(MockDevice::new());
        let mut ctx = test_context(&device);
        assert!(ctx.request_primary_command_buffer_with_renderpass().is_err());

        ctx.setup_framebuffer_attachments(&[vk::ImageView::from_raw(1)]).unwrap();
        let cmd = ctx.request_primary_command_buffer_with_renderpass().unwrap();
        assert_eq!(device.stats().render_passes_begun, 1);
        assert_eq!(ctx.frame_state(), FrameState::Recording);
        ctx.submit(cmd).unwrap();
    }

    #[test]
    fn submit_to_queue_preserves_order_and_arms_fence() {
        let device = Arc::new(MockDevice::new());
        let queue = test_queue();
        let mut ctx = test_context(&device);

        let a = ctx.request_primary_command_buffer().unwrap();
        let b = ctx.request_primary_command_buffer().unwrap();
        ctx.submit(a).unwrap();
        ctx.submit(b).unwrap();
        ctx.submit_to_queue(&queue.lock().unwrap()).unwrap();

        let submissions = device.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].command_buffers, vec![a.handle(), b.handle()]);
        assert_eq!(submissions[0].fence, ctx.fence());
        assert_eq!(ctx.frame_state(), FrameState::Submitted);

        // A second submission in the same rotation is refused.
        assert!(ctx.submit_to_queue(&queue.lock().unwrap()).is_err());
        assert!(ctx.request_primary_command_buffer().is_err());
    }

    #[test]
    fn stale_command_buffer_is_rejected() {
        let device = Arc::new(MockDevice::new());
        let mut ctx = test_context(&device);
        let cmd = ctx.request_primary_command_buffer().unwrap();
        ctx.swap().unwrap();
        assert!(ctx.submit(cmd).is_err());
    }

    #[test]
    fn swap_cycles_through_frames() {
        let device = Arc::new(MockDevice::new());
        let mut ctx = test_context(&device);
        let n = ctx.virtual_frame_count();
        let first_fence = ctx.fence();
        for i in 1..=n {
            ctx.swap().unwrap();
            assert_eq!(ctx.frame_index(), i % n);
        }
        assert_eq!(ctx.fence(), first_fence);
    }

    #[test]
    fn swap_blocks_until_fence_signaled() {
        let device = Arc::new(MockDevice::new());
        device.set_auto_signal(false);
        let queue = test_queue();
        let mut ctx = test_context_with(&device, |s| s.virtual_frame_count = 1);

        ctx.submit_to_queue(&queue.lock().unwrap()).unwrap();
        let fence = ctx.fence();
        assert!(!device.is_fence_signaled(fence));

        let signaled = Arc::new(AtomicBool::new(false));
        let gpu = {
            let device = device.clone();
            let signaled = signaled.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                signaled.store(true, Ordering::SeqCst);
                device.signal_fence(fence);
            })
        };

        let start = Instant::now();
        ctx.swap().unwrap();
        assert!(signaled.load(Ordering::SeqCst));
        assert!(start.elapsed() >= Duration::from_millis(50));
        gpu.join().unwrap();
    }

    #[test]
    fn swap_times_out_as_device_lost() {
        let device = Arc::new(MockDevice::new());
        device.set_auto_signal(false);
        let queue = test_queue();
        let mut ctx = test_context_with(&device, |s| {
            s.virtual_frame_count = 1;
            s.fence_timeout = Duration::from_millis(10);
        });
        ctx.submit_to_queue(&queue.lock().unwrap()).unwrap();
        assert!(ctx.swap().is_err());
        device.signal_fence(ctx.fence());
    }

    #[test]
    fn swap_retry_after_timeout_waits_on_same_frame() {
        let device = Arc::new(MockDevice::new());
        device.set_auto_signal(false);
        let queue = test_queue();
        let mut ctx = test_context_with(&device, |s| {
            s.virtual_frame_count = 2;
            s.fence_timeout = Duration::from_millis(10);
        });

        ctx.submit_to_queue(&queue.lock().unwrap()).unwrap();
        let first_fence = ctx.fence();
        // Frame 1 was never submitted, so nothing to wait for
        ctx.swap().unwrap();
        assert_eq!(ctx.frame_index(), 1);

        ctx.transient_allocator_mut().allocate(64).unwrap();
        let used = ctx.transient_allocator().used();
        ctx.submit_to_queue(&queue.lock().unwrap()).unwrap();

        for _ in 0..2 {
            assert!(ctx.swap().is_err());
            assert_eq!(ctx.frame_index(), 1);
            assert_eq!(ctx.frame_state(), FrameState::Submitted);
            assert_eq!(ctx.transient_allocator().used(), used);
        }

        device.signal_fence(first_fence);
        ctx.swap().unwrap();
        assert_eq!(ctx.frame_index(), 0);
        assert_eq!(ctx.fence(), first_fence);
        assert_eq!(ctx.frame_state(), FrameState::Idle);
    }

    #[test]
    fn failed_submission_does_not_block_swap() {
        let device = Arc::new(MockDevice::new());
        device.set_auto_signal(false);
        let queue = test_queue();
        let mut ctx = test_context_with(&device, |s| {
            s.virtual_frame_count = 1;
            s.fence_timeout = Duration::from_secs(5);
        });

        let cmd = ctx.request_primary_command_buffer().unwrap();
        ctx.submit(cmd).unwrap();
        device.fail_submits(true);
        assert!(ctx.submit_to_queue(&queue.lock().unwrap()).is_err());
        assert_eq!(ctx.frame_state(), FrameState::Recording);

        let start = Instant::now();
        ctx.swap().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(ctx.frame_state(), FrameState::Idle);

        device.fail_submits(false);
        ctx.submit_to_queue(&queue.lock().unwrap()).unwrap();
        assert_eq!(device.submissions().len(), 1);
    }

    #[test]
    fn timestamps_bracket_submission_and_report_gpu_time() {
        let device = Arc::new(MockDevice::new());
        let queue = test_queue();
        let mut ctx = test_context_with(&device, |s| s.timestamp_queries = true);
        assert_ne!(ctx.query_pool(), vk::QueryPool::null());

        let cmd = ctx.request_primary_command_buffer().unwrap();
        ctx.submit(cmd).unwrap();
        ctx.submit_to_queue(&queue.lock().unwrap()).unwrap();

        let submissions = device.submissions();
        let submitted = &submissions[0].command_buffers;
        assert_eq!(submitted.len(), 3);
        assert_eq!(submitted[1], cmd.handle());

        let commands = device.commands();
        let reset = commands.iter().position(|c| *c == RecordedCommand::ResetQueryPool);
        let begin = commands.iter().position(|c| *c == RecordedCommand::WriteTimestamp { query: 0 });
        let end = commands.iter().position(|c| *c == RecordedCommand::WriteTimestamp { query: 1 });
        assert!(reset.unwrap() < begin.unwrap());
        assert!(begin.unwrap() < end.unwrap());

        // Read back when frame 0 is reclaimed, two swaps later
        ctx.swap().unwrap();
        assert_eq!(ctx.last_gpu_frame_time(), None);
        ctx.swap().unwrap();
        assert_eq!(ctx.last_gpu_frame_time(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn no_timestamps_without_query_pool() {
        let device = Arc::new(MockDevice::new());
        let queue = test_queue();
        let mut ctx = test_context(&device);
        assert_eq!(ctx.query_pool(), vk::QueryPool::null());

        ctx.submit_to_queue(&queue.lock().unwrap()).unwrap();
        ctx.swap().unwrap();
        ctx.swap().unwrap();
        assert!(!device.commands().iter().any(|c| matches!(c, RecordedCommand::WriteTimestamp { .. })));
        assert_eq!(ctx.last_gpu_frame_time(), None);
    }

    #[test]
    fn swap_frees_transient_region_for_reuse() {
        let device = Arc::new(MockDevice::new());
        let mut ctx = test_context_with(&device, |s| s.virtual_frame_count = 2);

        let before = ctx.transient_allocator_mut().allocate(64).unwrap();
        ctx.swap().unwrap();
        ctx.transient_allocator_mut().allocate(64).unwrap();
        ctx.swap().unwrap();
        let after = ctx.transient_allocator_mut().allocate(64).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn identical_descriptors_share_one_set() {
        let device = Arc::new(MockDevice::new());
        let mut ctx = test_context(&device);
        let shader = test_shader();
        let layout = shader.set_layout(0).unwrap();

        let mut data = DescriptorSetData::from_bindings(&layout.bindings);
        data.set_uniform_bytes(0, &[0; 64]);
        let hash = data.content_hash(shader.layout_keys()[0]);

        let a = ctx.get_descriptor_set(hash, 0, layout, &data.descriptors).unwrap();
        let b = ctx.get_descriptor_set(hash, 0, layout, &data.descriptors.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(device.stats().descriptor_sets_allocated, 1);
        assert_eq!(device.stats().descriptor_set_writes, 1);
    }

    #[test]
    fn descriptor_cache_is_cleared_on_rotation() {
        let device = Arc::new(MockDevice::new());
        let mut ctx = test_context_with(&device, |s| s.virtual_frame_count = 1);
        let shader = test_shader();
        let layout = shader.set_layout(0).unwrap();
        let data = DescriptorSetData::from_bindings(&layout.bindings);
        let hash = data.content_hash(shader.layout_keys()[0]);

        ctx.get_descriptor_set(hash, 0, layout, &data.descriptors).unwrap();
        ctx.swap().unwrap();
        assert_eq!(ctx.cached_descriptor_set_count(), 0);
        ctx.get_descriptor_set(hash, 0, layout, &data.descriptors).unwrap();
        assert_eq!(device.stats().descriptor_sets_allocated, 2);
        assert!(device.stats().descriptor_pool_resets >= 1);
    }

    #[test]
    fn pool_growth_marks_dirty_and_consolidates() {
        let device = Arc::new(MockDevice::new());
        let mut ctx = test_context_with(&device, |s| {
            s.virtual_frame_count = 2;
            s.descriptor_pool_max_sets = 1;
        });
        let shader = test_shader();
        let layout = shader.set_layout(0).unwrap();
        let pools_before = device.live_descriptor_pools();

        // Two distinct sets: the second does not fit the one-set main pool.
        for i in 0..2u64 {
            let mut data = DescriptorSetData::from_bindings(&layout.bindings);
            data.set_storage_buffer(1, vk::Buffer::from_raw(100 + i), 0, 16);
            let hash = data.content_hash(shader.layout_keys()[0]);
            ctx.get_descriptor_set(hash, 0, layout, &data.descriptors).unwrap();
        }
        assert_eq!(device.live_descriptor_pools(), pools_before + 1);
        assert_eq!(ctx.descriptor_budget().max_sets(), 2);
        assert!(ctx.descriptor_budget().is_dirty(0));
        assert!(ctx.descriptor_budget().is_dirty(1));

        // Frame 1 rebuilds its single pool at the larger size.
        ctx.swap().unwrap();
        assert!(!ctx.descriptor_budget().is_dirty(1));
        assert_eq!(ctx.descriptor_budget().available_sets(), 2);
        // Frame 0 drops its overflow pool when it comes around again.
        ctx.swap().unwrap();
        assert!(!ctx.descriptor_budget().is_dirty(0));
        assert_eq!(device.live_descriptor_pools(), pools_before);
        assert_eq!(device.max_sets_of_live_pools(), vec![2, 2]);
    }

    #[test]
    fn pipeline_slots_survive_rotation() {
        let device = Arc::new(MockDevice::new());
        let mut ctx = test_context(&device);
        *ctx.borrow_pipeline(1) = Some(Pipeline::new(vk::Pipeline::from_raw(5), device.clone()));
        ctx.swap().unwrap();
        assert!(ctx.borrow_pipeline(1).is_some());
        assert!(ctx.borrow_pipeline(2).is_none());
    }

    #[test]
    fn teardown_waits_idle_and_releases_everything() {
        let device = Arc::new(MockDevice::new());
        {
            let mut ctx = test_context(&device);
            ctx.setup_framebuffer_attachments(&[vk::ImageView::from_raw(1)]).unwrap();
            *ctx.borrow_pipeline(1) = Some(Pipeline::new(vk::Pipeline::from_raw(5), device.clone()));
        }
        let stats = device.stats();
        assert_eq!(stats.wait_idle_calls, 1);
        assert_eq!(stats.pipelines_destroyed, 1);
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn contexts_on_two_threads_share_a_queue() {
        let device = Arc::new(MockDevice::new());
        let queue = Arc::new(test_queue());

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let device = device.clone();
                let queue = queue.clone();
                thread::spawn(move || {
                    let mut ctx = test_context(&device);
                    for _ in 0..5 {
                        let cmd = ctx.request_primary_command_buffer().unwrap();
                        ctx.submit(cmd).unwrap();
                        ctx.submit_to_queue(&queue.lock().unwrap()).unwrap();
                        ctx.swap().unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(device.submissions().len(), 10);
        assert_eq!(device.live_objects(), 0);
    }
}
