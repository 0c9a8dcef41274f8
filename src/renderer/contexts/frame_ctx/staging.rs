use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use crate::renderer::contexts::device_ctx::{GpuDevice, ImageDesc};
use crate::renderer::contexts::frame_ctx::RenderContext;
use crate::renderer::internals::allocator::{BufferRegion, TransientAllocator};
use crate::renderer::internals::buffer_allocator::BufferAllocator;
use crate::renderer::internals::image_allocator::ImageAllocator;

/// Pixel data to upload into a freshly created image.
pub struct ImageTransferSrcData<'a> {
    pub bytes: &'a [u8],
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub aspect: vk::ImageAspectFlags,
}

/// An image created by `store_image_cmd`; destroyed when dropped.
///
/// Its memory belongs to the image allocator's current region, so it must be
/// dropped before that region is freed.
pub struct StoredImage<D: GpuDevice> {
    image: vk::Image,
    region: BufferRegion,
    device: Arc<D>,
}

impl<D: GpuDevice> StoredImage<D> {
    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn region(&self) -> BufferRegion {
        self.region
    }
}

impl<D: GpuDevice> Drop for StoredImage<D> {
    fn drop(&mut self) {
        self.device.destroy_image(self.image);
    }
}

impl<D: GpuDevice> RenderContext<D> {
    /// Reserve `data.len()` bytes in both this context's transient memory and
    /// `target`, copy `data` into the transient copy and return the copy region.
    ///
    /// Returns `None` if either allocator is out of space.
    pub fn stage_buffer_data(
        &mut self,
        data: &[u8],
        target: &mut BufferAllocator<D>,
    ) -> Option<vk::BufferCopy> {
        let size = data.len() as u64;
        let Some(dst) = target.allocate(size) else {
            log::error!("Stage data: target allocator cannot fit {} bytes", size);
            return None;
        };
        let Some(src) = self.transient_memory.allocate(size) else {
            log::error!("Stage data: transient memory cannot fit {} bytes", size);
            return None;
        };
        if let Err(e) = self.transient_memory.write(&src, data) {
            log::error!("Stage data: {}", e);
            return None;
        }

        Some(vk::BufferCopy {
            src_offset: src.offset,
            dst_offset: dst.offset,
            size,
        })
    }

    pub fn stage_buffer_data_many(
        &mut self,
        data: &[&[u8]],
        target: &mut BufferAllocator<D>,
    ) -> Option<Vec<vk::BufferCopy>> {
        data.iter()
            .map(|bytes| self.stage_buffer_data(bytes, target))
            .collect()
    }

    /// Stage `data` and record + submit a copy into `target`'s buffer.
    ///
    /// The copy runs with the rest of the frame; the returned regions are
    /// readable by any later command.
    pub fn store_buffer_data_cmd(
        &mut self,
        data: &[&[u8]],
        target: &mut BufferAllocator<D>,
    ) -> Result<Vec<BufferRegion>> {
        let total: usize = data.iter().map(|d| d.len()).sum();
        let copies = self.stage_buffer_data_many(data, target).ok_or_else(|| eyre!(
            "Out of memory staging {} bytes for transfer",
            total,
        ))?;

        let cmd = self.request_primary_command_buffer()?;
        self.device.cmd_copy_buffer(
            cmd.handle(),
            self.transient_memory.buffer(),
            target.buffer(),
            &copies,
        );
        self.device.cmd_transfer_barrier(cmd.handle());
        self.device.end_command_buffer(cmd.handle())?;
        self.submit(cmd)?;

        Ok(copies
            .iter()
            .map(|c| BufferRegion {
                offset: c.dst_offset,
                size: c.size,
            })
            .collect())
    }

    /// Create an image in `target`'s memory and record the upload of `data`.
    ///
    /// The image ends up in `SHADER_READ_ONLY_OPTIMAL`.
    pub fn store_image_cmd(
        &mut self,
        data: &ImageTransferSrcData,
        target: &mut ImageAllocator<D>,
    ) -> Result<StoredImage<D>> {
        let image = self.device.create_image(&ImageDesc {
            format: data.format,
            extent: data.extent,
            usage: target.usage() | vk::ImageUsageFlags::TRANSFER_DST,
            tiling: target.tiling(),
        })?;
        // Owned from here on, so every error path below destroys it
        let mut stored = StoredImage {
            image,
            region: BufferRegion { offset: 0, size: 0 },
            device: self.device.clone(),
        };
        stored.region = target.bind_image(image)?;

        let size = data.bytes.len() as u64;
        let src = self.transient_memory.allocate(size).ok_or_else(|| eyre!(
            "Out of transient memory staging {} image bytes",
            size,
        ))?;
        self.transient_memory.write(&src, data.bytes)?;

        let subresource = vk::ImageSubresourceLayers::default()
            .aspect_mask(data.aspect)
            .mip_level(0)
            .base_array_layer(0)
            .layer_count(1);
        let copy = vk::BufferImageCopy::default()
            .buffer_offset(src.offset)
            .image_subresource(subresource)
            .image_extent(data.extent);

        let cmd = self.request_primary_command_buffer()?;
        self.device.cmd_transition_image_layout(
            cmd.handle(),
            image,
            data.aspect,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        self.device.cmd_copy_buffer_to_image(
            cmd.handle(),
            self.transient_memory.buffer(),
            image,
            &[copy],
        );
        self.device.cmd_transition_image_layout(
            cmd.handle(),
            image,
            data.aspect,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        self.device.end_command_buffer(cmd.handle())?;
        self.submit(cmd)?;

        Ok(stored)
    }
}
