use std::ptr::NonNull;
use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::{OptionExt, eyre};
use gpu_allocator::MemoryLocation;
use crate::renderer::contexts::device_ctx::{BufferDesc, GpuDevice, MappedMemory};
use crate::renderer::internals::allocator::{
    AllocatorMark, AllocatorSettings, BufferRegion, LinearRegions, TransientAllocator,
};

#[derive(Debug, Clone)]
pub struct BufferAllocatorSettings {
    pub allocator: AllocatorSettings,
    pub usage: vk::BufferUsageFlags,
}

impl Default for BufferAllocatorSettings {
    fn default() -> Self {
        Self {
            allocator: AllocatorSettings::default(),
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER
                | vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::VERTEX_BUFFER
                | vk::BufferUsageFlags::INDEX_BUFFER
                | vk::BufferUsageFlags::TRANSFER_SRC
                | vk::BufferUsageFlags::TRANSFER_DST,
        }
    }
}

/// One device buffer carved into per-frame linear regions.
///
/// Regions handed out by `allocate` are offsets into `buffer()`; the bytes behind
/// them stay valid until the owning frame's region is freed.
pub struct BufferAllocator<D: GpuDevice> {
    settings: BufferAllocatorSettings,
    regions: LinearRegions,
    buffer: vk::Buffer,
    memory: Option<D::Memory>,
    device: Arc<D>,
}

impl<D: GpuDevice> BufferAllocator<D> {
    pub fn new(
        settings: BufferAllocatorSettings,
        device: Arc<D>,
    ) -> Result<Self> {
        let regions = LinearRegions::new(
            settings.allocator.size,
            settings.allocator.frame_count,
            settings.allocator.alignment,
        )?;

        let (buffer, memory) = device.create_buffer(&BufferDesc {
            name: &settings.allocator.name,
            size: regions.total_size(),
            usage: settings.usage,
            location: settings.allocator.location,
        })?;

        if settings.allocator.location != MemoryLocation::GpuOnly
            && memory.mapped_bytes().is_none()
        {
            device.destroy_buffer(buffer, memory);
            return Err(eyre!(
                "Host-visible transient buffer \"{}\" is not mapped",
                settings.allocator.name,
            ));
        }

        log::debug!(
            "Created transient buffer \"{}\": {} frames x {} bytes",
            settings.allocator.name,
            settings.allocator.frame_count,
            regions.region_size(),
        );

        Ok(Self {
            settings,
            regions,
            buffer,
            memory: Some(memory),
            device,
        })
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn used(&self) -> u64 {
        self.regions.used()
    }

    pub fn current_region(&self) -> usize {
        self.regions.current_region()
    }

    pub fn mark(&self) -> AllocatorMark {
        self.regions.mark()
    }

    pub fn rewind(&mut self, mark: AllocatorMark) {
        self.regions.rewind(mark);
    }

    /// Copy `data` to the start of `region`.
    pub fn write<T>(
        &mut self,
        region: &BufferRegion,
        data: &[T],
    ) -> Result<presser::CopyRecord>
    where
        T: Copy,
    {
        let byte_count = size_of_val(data) as u64;
        if byte_count > region.size {
            return Err(eyre!(
                "Data ({} bytes) too large for region ({} bytes)",
                byte_count,
                region.size,
            ));
        }

        let bytes = self.memory
            .as_mut()
            .and_then(|m| m.mapped_bytes_mut())
            .ok_or_eyre("Transient buffer is not host visible")?;
        if region.end() > bytes.len() as u64 {
            return Err(eyre!("Region {:?} lies outside the transient buffer", region));
        }

        let base = NonNull::new(bytes.as_mut_ptr()).ok_or_eyre("Null mapping")?;
        // SAFETY: `bytes` is a live, exclusively borrowed mapping of `bytes.len()` bytes.
        let mut raw = unsafe { presser::RawAllocation::from_raw_parts(base, bytes.len()) };
        let mut slab = unsafe { raw.borrow_as_slab() };

        Ok(presser::copy_from_slice_to_offset(data, &mut slab, region.offset as usize)?)
    }

    pub fn mapped_bytes(&self, region: &BufferRegion) -> Option<&[u8]> {
        let bytes = self.memory.as_ref()?.mapped_bytes()?;
        bytes.get(region.offset as usize..region.end() as usize)
    }
}

impl<D: GpuDevice> TransientAllocator for BufferAllocator<D> {
    fn allocate(&mut self, byte_count: u64) -> Option<BufferRegion> {
        let region = self.regions.allocate(byte_count);
        if region.is_none() {
            log::warn!(
                "Transient buffer \"{}\" exhausted ({} of {} bytes used, {} requested)",
                self.settings.allocator.name,
                self.regions.used(),
                self.regions.region_size(),
                byte_count,
            );
        }
        region
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

impl<D: GpuDevice> Drop for BufferAllocator<D> {
    fn drop(&mut self) {
        if let Some(memory) = self.memory.take() {
            self.device.destroy_buffer(self.buffer, memory);
        }
    }
}
