pub mod shader;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;
use ash::vk;
use crate::renderer::contexts::device_ctx::GpuDevice;

/// Owning handle for a GPU pipeline; destroyed when dropped.
pub struct Pipeline<D: GpuDevice> {
    handle: vk::Pipeline,
    device: Arc<D>,
}

impl<D: GpuDevice> Pipeline<D> {
    pub fn new(handle: vk::Pipeline, device: Arc<D>) -> Self {
        Self { handle, device }
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }
}

impl<D: GpuDevice> Drop for Pipeline<D> {
    fn drop(&mut self) {
        self.device.destroy_pipeline(self.handle);
    }
}

/// Pipelines keyed by state hash, kept for the lifetime of a render context.
pub struct PipelineCache<D: GpuDevice> {
    pipelines: HashMap<u64, Option<Pipeline<D>>>,
}

impl<D: GpuDevice> PipelineCache<D> {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    /// Slot for `hash`; `None` until the caller fills it.
    pub fn borrow(&mut self, hash: u64) -> &mut Option<Pipeline<D>> {
        self.pipelines.entry(hash).or_default()
    }

    pub fn len(&self) -> usize {
        self.pipelines.values().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.pipelines.clear();
    }
}

impl<D: GpuDevice> Default for PipelineCache<D> {
    fn default() -> Self {
        Self::new()
    }
}
