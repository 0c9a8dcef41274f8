use std::collections::HashMap;
use ash::vk;
use color_eyre::Result;
use smallvec::SmallVec;
use crate::renderer::contexts::device_ctx::GpuDevice;
use crate::renderer::contexts::frame_ctx::descriptor_pool::DescriptorPoolBudget;

/// Queries reserved per frame for begin/end timestamps.
pub const TIMESTAMP_QUERY_COUNT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No work recorded since the frame was last reclaimed.
    Idle,
    /// Command buffers are being accumulated.
    Recording,
    /// Pending buffers went to the queue; the fence is armed.
    Submitted,
}

pub struct VirtualFrame {
    pub command_pool: vk::CommandPool,
    pub query_pool: vk::QueryPool,
    pub framebuffer: vk::Framebuffer,
    /// The first pool is the frame's main pool; extra pools are added on overflow.
    pub descriptor_pools: SmallVec<[vk::DescriptorPool; 2]>,
    pub descriptor_set_cache: HashMap<u64, vk::DescriptorSet>,

    // Signals when the image to render into is ready.
    pub image_acquired: vk::Semaphore,

    // Signals when the frame's command buffers have finished executing.
    pub render_complete: vk::Semaphore,
    pub fence: vk::Fence,

    pub command_buffers: Vec<vk::CommandBuffer>,
    pub state: FrameState,
    /// The last submission wrote begin/end timestamps into `query_pool`.
    pub timestamps_written: bool,
}

impl VirtualFrame {
    pub fn new<D: GpuDevice>(
        device: &D,
        queue_family_index: u32,
        budget: &DescriptorPoolBudget,
        timestamp_queries: bool,
    ) -> Result<Self> {
        let mut frame = Self {
            command_pool: vk::CommandPool::null(),
            query_pool: vk::QueryPool::null(),
            framebuffer: vk::Framebuffer::null(),
            descriptor_pools: SmallVec::new(),
            descriptor_set_cache: HashMap::new(),
            image_acquired: vk::Semaphore::null(),
            render_complete: vk::Semaphore::null(),
            fence: vk::Fence::null(),
            command_buffers: Vec::new(),
            state: FrameState::Idle,
            timestamps_written: false,
        };

        if let Err(e) = frame.create_objects(device, queue_family_index, budget, timestamp_queries) {
            frame.destroy(device);
            return Err(e);
        }
        Ok(frame)
    }

    fn create_objects<D: GpuDevice>(
        &mut self,
        device: &D,
        queue_family_index: u32,
        budget: &DescriptorPoolBudget,
        timestamp_queries: bool,
    ) -> Result<()> {
        self.command_pool = device.create_command_pool(queue_family_index)?;
        if timestamp_queries {
            self.query_pool = device.create_query_pool(TIMESTAMP_QUERY_COUNT)?;
        }
        let main_pool = device.create_descriptor_pool(budget.pool_sizes(), budget.max_sets())?;
        self.descriptor_pools.push(main_pool);

        self.image_acquired = device.create_semaphore()?;
        self.render_complete = device.create_semaphore()?;
        // Created signaled so the first wait on a fresh frame returns at once.
        self.fence = device.create_fence(true)?;
        Ok(())
    }

    /// Drop every descriptor pool and create one sized to the current budget.
    pub fn consolidate_descriptor_pools<D: GpuDevice>(
        &mut self,
        device: &D,
        budget: &DescriptorPoolBudget,
    ) -> Result<()> {
        for pool in self.descriptor_pools.drain(..) {
            device.destroy_descriptor_pool(pool);
        }
        let pool = device.create_descriptor_pool(budget.pool_sizes(), budget.max_sets())?;
        self.descriptor_pools.push(pool);
        Ok(())
    }

    pub fn reset_descriptor_pools<D: GpuDevice>(&mut self, device: &D) -> Result<()> {
        for &pool in self.descriptor_pools.iter() {
            device.reset_descriptor_pool(pool)?;
        }
        Ok(())
    }

    pub fn destroy<D: GpuDevice>(&mut self, device: &D) {
        for pool in self.descriptor_pools.drain(..) {
            device.destroy_descriptor_pool(pool);
        }
        if self.framebuffer != vk::Framebuffer::null() {
            device.destroy_framebuffer(self.framebuffer);
            self.framebuffer = vk::Framebuffer::null();
        }
        if self.query_pool != vk::QueryPool::null() {
            device.destroy_query_pool(self.query_pool);
            self.query_pool = vk::QueryPool::null();
        }
        for semaphore in [&mut self.image_acquired, &mut self.render_complete] {
            if *semaphore != vk::Semaphore::null() {
                device.destroy_semaphore(*semaphore);
                *semaphore = vk::Semaphore::null();
            }
        }
        if self.fence != vk::Fence::null() {
            device.destroy_fence(self.fence);
            self.fence = vk::Fence::null();
        }
        if self.command_pool != vk::CommandPool::null() {
            // Freeing the pool frees its command buffers
            device.destroy_command_pool(self.command_pool);
            self.command_pool = vk::CommandPool::null();
        }
        self.command_buffers.clear();
        self.descriptor_set_cache.clear();
    }
}
