use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use crate::renderer::contexts::device_ctx::{GpuDevice, MemoryDesc};
use crate::renderer::internals::allocator::{
    AllocatorSettings, BufferRegion, LinearRegions, TransientAllocator,
};

#[derive(Debug, Clone)]
pub struct ImageAllocatorSettings {
    pub allocator: AllocatorSettings,
    pub image_usage: vk::ImageUsageFlags,
    pub image_tiling: vk::ImageTiling,
    /// Memory types the images placed in this allocator may live in.
    pub memory_type_bits: u32,
}

impl Default for ImageAllocatorSettings {
    fn default() -> Self {
        Self {
            allocator: AllocatorSettings {
                name: "Transient Images".into(),
                location: gpu_allocator::MemoryLocation::GpuOnly,
                ..Default::default()
            },
            image_usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            image_tiling: vk::ImageTiling::OPTIMAL,
            memory_type_bits: u32::MAX,
        }
    }
}

/// Per-frame linear regions of raw device memory, for binding short-lived images.
///
/// The region alignment is raised to the device's buffer/image granularity so
/// linear and optimal resources never share a page.
pub struct ImageAllocator<D: GpuDevice> {
    settings: ImageAllocatorSettings,
    regions: LinearRegions,
    granularity: u64,
    memory: Option<D::Memory>,
    device: Arc<D>,
}

impl<D: GpuDevice> ImageAllocator<D> {
    pub fn new(
        settings: ImageAllocatorSettings,
        device: Arc<D>,
    ) -> Result<Self> {
        if !settings.allocator.alignment.is_power_of_two() {
            return Err(eyre!(
                "Image allocator alignment {} is not a power of two",
                settings.allocator.alignment,
            ));
        }
        let granularity = settings.allocator.alignment
            .max(device.capabilities().buffer_image_granularity)
            .next_power_of_two();

        let regions = LinearRegions::new(
            settings.allocator.size,
            settings.allocator.frame_count,
            granularity,
        )?;

        let memory = device.allocate_memory(&MemoryDesc {
            name: &settings.allocator.name,
            size: regions.total_size(),
            alignment: granularity,
            memory_type_bits: settings.memory_type_bits,
            location: settings.allocator.location,
        })?;

        Ok(Self {
            settings,
            regions,
            granularity,
            memory: Some(memory),
            device,
        })
    }

    pub fn memory(&self) -> Option<&D::Memory> {
        self.memory.as_ref()
    }

    pub fn granularity(&self) -> u64 {
        self.granularity
    }

    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.settings.image_usage
    }

    pub fn tiling(&self) -> vk::ImageTiling {
        self.settings.image_tiling
    }

    /// Allocate space for `image` and bind it.
    pub fn bind_image(&mut self, image: vk::Image) -> Result<BufferRegion> {
        let requirements = self.device.image_memory_requirements(image);
        if requirements.memory_type_bits & self.settings.memory_type_bits == 0 {
            return Err(eyre!("Image cannot live in transient image memory"));
        }
        if requirements.alignment > self.granularity {
            return Err(eyre!(
                "Image alignment {} exceeds allocator granularity {}",
                requirements.alignment,
                self.granularity,
            ));
        }

        let region = self.allocate(requirements.size).ok_or_else(|| eyre!(
            "Transient image memory \"{}\" exhausted",
            self.settings.allocator.name,
        ))?;

        let memory = self.memory
            .as_ref()
            .ok_or_else(|| eyre!("Image allocator has no memory"))?;
        self.device.bind_image_memory(image, memory, region.offset)?;

        Ok(region)
    }
}

impl<D: GpuDevice> TransientAllocator for ImageAllocator<D> {
    fn allocate(&mut self, byte_count: u64) -> Option<BufferRegion> {
        self.regions.allocate(byte_count)
    }

    fn free(&mut self) {
        self.regions.free();
    }

    fn reset(&mut self) {
        self.regions.reset();
    }

    fn swap(&mut self) {
        self.regions.swap();
    }

    fn settings(&self) -> &AllocatorSettings {
        &self.settings.allocator
    }
}

impl<D: GpuDevice> Drop for ImageAllocator<D> {
    fn drop(&mut self) {
        if let Some(memory) = self.memory.take() {
            self.device.free_memory(memory);
        }
    }
}
