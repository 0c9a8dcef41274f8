use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::OptionExt;
use crate::renderer::contexts::device_ctx::device::AshDevice;
use crate::renderer::contexts::device_ctx::{GpuDevice, ImageDesc};
use crate::renderer::internals::allocator::{AllocatorSettings, TransientAllocator};
use crate::renderer::internals::image_allocator::{ImageAllocator, ImageAllocatorSettings};

/// Offscreen render target: a color render pass and one color image per
/// virtual frame, all bound into a single device memory block.
pub struct OffscreenTarget {
    pub render_pass: vk::RenderPass,
    pub format: vk::Format,
    pub extent: vk::Extent2D,

    images: Vec<(vk::Image, vk::ImageView)>,
    // Freed after the images bound into it are destroyed
    memory: Option<ImageAllocator<AshDevice>>,
    device: Arc<AshDevice>,
}

impl OffscreenTarget {
    const USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
        vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw() | vk::ImageUsageFlags::TRANSFER_SRC.as_raw(),
    );

    pub fn new(
        device: Arc<AshDevice>,
        format: vk::Format,
        extent: vk::Extent2D,
        image_count: usize,
    ) -> Result<Self> {
        let render_pass = device.create_color_render_pass(format)?;
        let mut target = Self {
            render_pass,
            format,
            extent,
            images: Vec::with_capacity(image_count),
            memory: None,
            device: device.clone(),
        };

        let desc = ImageDesc {
            format,
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            usage: Self::USAGE,
            tiling: vk::ImageTiling::OPTIMAL,
        };

        // Size each region for one image, as reported by the driver
        let sizing_image = device.create_image(&desc)?;
        let requirements = device.image_memory_requirements(sizing_image);
        device.destroy_image(sizing_image);

        let mut memory = ImageAllocator::new(
            ImageAllocatorSettings {
                allocator: AllocatorSettings {
                    name: "Offscreen Color Targets".into(),
                    size: requirements.size,
                    frame_count: image_count,
                    alignment: requirements.alignment.next_power_of_two(),
                    location: gpu_allocator::MemoryLocation::GpuOnly,
                },
                image_usage: Self::USAGE,
                image_tiling: vk::ImageTiling::OPTIMAL,
                memory_type_bits: requirements.memory_type_bits,
            },
            device.clone(),
        )?;

        for _ in 0..image_count {
            let image = device.create_image(&desc)?;
            if let Err(e) = memory.bind_image(image) {
                device.destroy_image(image);
                return Err(e);
            }
            match device.create_image_view(image, format, vk::ImageAspectFlags::COLOR) {
                Ok(view) => target.images.push((image, view)),
                Err(e) => {
                    device.destroy_image(image);
                    return Err(e);
                }
            }
            // Next image goes into the next frame's region
            memory.swap();
        }
        target.memory = Some(memory);

        log::debug!(
            "Created {} offscreen {:?} targets of {}x{}",
            image_count,
            format,
            extent.width,
            extent.height,
        );
        Ok(target)
    }

    pub fn view(&self, index: usize) -> Result<vk::ImageView> {
        self.images
            .get(index)
            .map(|(_, view)| *view)
            .ok_or_eyre("No offscreen target for this frame")
    }

    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height.max(1) as f32
    }
}

impl Drop for OffscreenTarget {
    fn drop(&mut self) {
        for (image, view) in self.images.drain(..) {
            self.device.destroy_image_view(view);
            self.device.destroy_image(image);
        }
        self.memory = None;
        self.device.destroy_render_pass(self.render_pass);
    }
}
