use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};
use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_descriptor::DescriptorTotalCount;
use smallvec::SmallVec;
use crate::renderer::contexts::device_ctx::capabilities::DeviceCapabilities;
use crate::renderer::contexts::device_ctx::{
    BufferDesc, GpuDevice, ImageDesc, MappedMemory, MemoryDesc, QueueSubmit, RenderPassBegin,
};
use crate::renderer::contexts::frame_ctx::descriptor_pool::pool_sizes;
use crate::renderer::contexts::pipeline_ctx::shader::DescriptorBinding;
use crate::renderer::contexts::pipeline_ctx::state::GraphicsPipelineState;
use crate::renderer::internals::descriptor_set_layout_builder::DescriptorSetLayoutBuilder;
use crate::renderer::resources::descriptor::DescriptorData;

/// A gpu-allocator sub-allocation.
pub struct AshMemory {
    allocation: Allocation,
}

impl MappedMemory for AshMemory {
    fn device_memory(&self) -> vk::DeviceMemory {
        unsafe { self.allocation.memory() }
    }

    fn base_offset(&self) -> u64 {
        self.allocation.offset()
    }

    fn size(&self) -> u64 {
        self.allocation.size()
    }

    fn mapped_bytes(&self) -> Option<&[u8]> {
        self.allocation.mapped_slice()
    }

    fn mapped_bytes_mut(&mut self) -> Option<&mut [u8]> {
        self.allocation.mapped_slice_mut()
    }
}

/// The Vulkan device, its capabilities and its memory allocator
pub struct AshDevice {
    pub logical: ash::Device,
    pub physical: vk::PhysicalDevice,
    capabilities: DeviceCapabilities,
    debug_utils: Option<ash::ext::debug_utils::Device>,

    // Dropped by hand before the logical device is destroyed
    memory_allocator: ManuallyDrop<Mutex<Allocator>>,
}

impl AshDevice {
    pub fn new(
        instance: &ash::Instance,
        physical: vk::PhysicalDevice,
        logical: ash::Device,
        queue_family_index: u32,
        debug_utils: bool,
    ) -> Result<Self> {
        let memory_allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: logical.clone(),
            physical_device: physical,
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: cfg!(debug_assertions),
                log_leaks_on_shutdown: true,
                store_stack_traces: false,
                log_allocations: false,
                log_frees: false,
                log_stack_traces: false,
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let memory_allocator = match memory_allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { logical.destroy_device(None) };
                return Err(e.into());
            }
        };

        let capabilities = DeviceCapabilities::query(instance, physical, queue_family_index, debug_utils);
        let debug_utils = debug_utils.then(|| ash::ext::debug_utils::Device::new(instance, &logical));

        Ok(Self {
            logical,
            physical,
            capabilities,
            debug_utils,
            memory_allocator: ManuallyDrop::new(Mutex::new(memory_allocator)),
        })
    }

    fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.memory_allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))
    }

    fn free_allocation(&self, allocation: Allocation) {
        match self.allocator() {
            Ok(mut allocator) => {
                if let Err(e) = allocator.free(allocation) {
                    log::error!("Failed to free allocation: {}", e);
                }
            }
            Err(e) => log::error!("Leaking allocation: {}", e),
        }
    }

    /// Attach a debug name to a Vulkan object; a no-op without validation.
    pub fn set_object_name<H: vk::Handle>(&self, handle: H, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = std::ffi::CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(handle)
            .object_name(&name);
        if let Err(e) = unsafe { debug_utils.set_debug_utils_object_name(&info) } {
            log::warn!("Failed to name object: {}", e);
        }
    }

    pub fn create_shader_module(&self, spirv: &[u8]) -> Result<vk::ShaderModule> {
        if spirv.len() % 4 != 0 {
            return Err(eyre!("SPIR-V length {} is not a multiple of 4", spirv.len()));
        }
        // Copy into u32s; the byte slice may not be aligned
        let code: Vec<u32> = spirv
            .chunks_exact(4)
            .map(|w| u32::from_ne_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        let info = vk::ShaderModuleCreateInfo::default().code(&code);
        Ok(unsafe { self.logical.create_shader_module(&info, None)? })
    }

    pub fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.logical.destroy_shader_module(module, None) };
    }

    pub fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<vk::DescriptorSetLayout> {
        bindings
            .iter()
            .fold(DescriptorSetLayoutBuilder::new(), |builder, b| builder.add(b))
            .build(&self.logical)
    }

    pub fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.logical.destroy_descriptor_set_layout(layout, None) };
    }

    pub fn create_pipeline_layout(&self, set_layouts: &[vk::DescriptorSetLayout]) -> Result<vk::PipelineLayout> {
        let info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);
        Ok(unsafe { self.logical.create_pipeline_layout(&info, None)? })
    }

    pub fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.logical.destroy_pipeline_layout(layout, None) };
    }

    /// Single-subpass render pass with one cleared color attachment that ends
    /// up readable as a transfer source.
    pub fn create_color_render_pass(&self, format: vk::Format) -> Result<vk::RenderPass> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
        ];
        let color_refs = [
            vk::AttachmentReference::default()
                .attachment(0)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        ];
        let subpasses = [
            vk::SubpassDescription::default()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .color_attachments(&color_refs),
        ];
        let dependencies = [
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE),
        ];
        let info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        Ok(unsafe { self.logical.create_render_pass(&info, None)? })
    }

    pub fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.logical.destroy_render_pass(render_pass, None) };
    }

    pub fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView> {
        let info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(subresource_range(aspect));
        Ok(unsafe { self.logical.create_image_view(&info, None)? })
    }

    pub fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.logical.destroy_image_view(view, None) };
    }
}

impl Drop for AshDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.logical.device_wait_idle() {
                log::error!("Failed to wait for device idle: {}", e);
            }
            ManuallyDrop::drop(&mut self.memory_allocator);
            self.logical.destroy_device(None);
        }
    }
}

fn subresource_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(aspect)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

impl GpuDevice for AshDevice {
    type Memory = AshMemory;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::default().flags(flags);
        Ok(unsafe { self.logical.create_fence(&info, None)? })
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<bool> {
        match unsafe { self.logical.wait_for_fences(&[fence], true, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        Ok(unsafe { self.logical.reset_fences(&[fence])? })
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.logical.destroy_fence(fence, None) };
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::default();
        Ok(unsafe { self.logical.create_semaphore(&info, None)? })
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.logical.destroy_semaphore(semaphore, None) };
    }

    fn create_command_pool(&self, queue_family_index: u32) -> Result<vk::CommandPool> {
        // Buffers are short-lived and only ever reset together with the pool
        let info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        Ok(unsafe { self.logical.create_command_pool(&info, None)? })
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> Result<()> {
        Ok(unsafe { self.logical.reset_command_pool(pool, vk::CommandPoolResetFlags::empty())? })
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.logical.destroy_command_pool(pool, None) };
    }

    fn allocate_command_buffer(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
    ) -> Result<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(level)
            .command_buffer_count(1);
        let buffers = unsafe { self.logical.allocate_command_buffers(&info)? };
        buffers
            .into_iter()
            .next()
            .ok_or_else(|| eyre!("Driver returned no command buffer"))
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        Ok(unsafe { self.logical.begin_command_buffer(cmd, &info)? })
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        Ok(unsafe { self.logical.end_command_buffer(cmd)? })
    }

    fn create_query_pool(&self, query_count: u32) -> Result<vk::QueryPool> {
        let info = vk::QueryPoolCreateInfo::default()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(query_count);
        Ok(unsafe { self.logical.create_query_pool(&info, None)? })
    }

    fn destroy_query_pool(&self, pool: vk::QueryPool) {
        unsafe { self.logical.destroy_query_pool(pool, None) };
    }

    fn get_timestamps(&self, pool: vk::QueryPool, first_query: u32, results: &mut [u64]) -> Result<bool> {
        let read = unsafe {
            self.logical.get_query_pool_results(pool, first_query, results, vk::QueryResultFlags::TYPE_64)
        };
        match read {
            Ok(()) => Ok(true),
            Err(vk::Result::NOT_READY) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        Ok(unsafe { self.logical.create_framebuffer(&info, None)? })
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.logical.destroy_framebuffer(framebuffer, None) };
    }

    fn create_descriptor_pool(
        &self,
        counts: &DescriptorTotalCount,
        max_sets: u32,
    ) -> Result<vk::DescriptorPool> {
        let sizes = pool_sizes(counts);
        let info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&sizes);
        Ok(unsafe { self.logical.create_descriptor_pool(&info, None)? })
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<()> {
        Ok(unsafe { self.logical.reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())? })
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.logical.destroy_descriptor_pool(pool, None) };
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.logical.allocate_descriptor_sets(&info)? };
        sets
            .into_iter()
            .next()
            .ok_or_else(|| eyre!("Driver returned no descriptor set"))
    }

    fn write_descriptor_set(&self, set: vk::DescriptorSet, descriptors: &[DescriptorData]) {
        let buffer_infos: SmallVec<[vk::DescriptorBufferInfo; 8]> = descriptors
            .iter()
            .map(|d| vk::DescriptorBufferInfo {
                buffer: d.vk_buffer(),
                offset: d.offset,
                range: d.range,
            })
            .collect();
        let image_infos: SmallVec<[vk::DescriptorImageInfo; 8]> = descriptors
            .iter()
            .map(|d| vk::DescriptorImageInfo {
                sampler: d.vk_sampler(),
                image_view: d.vk_image_view(),
                image_layout: d.vk_image_layout(),
            })
            .collect();

        let writes: SmallVec<[vk::WriteDescriptorSet; 8]> = descriptors
            .iter()
            .enumerate()
            // Holes in the binding numbering
            .filter(|(_, d)| !d.is_unbound())
            .map(|(i, d)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(i as u32)
                    .descriptor_type(d.descriptor_type());
                if d.is_image() {
                    write.image_info(std::slice::from_ref(&image_infos[i]))
                } else {
                    write.buffer_info(std::slice::from_ref(&buffer_infos[i]))
                }
            })
            .collect();

        unsafe { self.logical.update_descriptor_sets(&writes, &[]) };
    }

    fn create_graphics_pipeline(
        &self,
        state: &GraphicsPipelineState,
        cache: vk::PipelineCache,
    ) -> Result<vk::Pipeline> {
        let shader = state.shader();
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(shader.vertex_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(shader.fragment_module)
                .name(c"main"),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&shader.vertex_input.bindings)
            .vertex_attribute_descriptions(&shader.vertex_input.attributes)
            .flags(shader.vertex_input.flags);
        let input_assembly = state.input_assembly_info();
        let rasterization = state.rasterization_info();
        let multisample = state.multisample_info();
        let depth_stencil = state.depth_stencil_info();

        // Viewport and scissor are set per command buffer
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let color_blend_attachments = [state.color_blend_attachment()];
        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_info = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .layout(shader.pipeline_layout)
            .render_pass(state.render_pass())
            .subpass(state.subpass())
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend_info)
            .depth_stencil_state(&depth_stencil)
            .dynamic_state(&dynamic_info);

        let pipelines = unsafe {
            self.logical
                .create_graphics_pipelines(cache, &[pipeline_info], None)
                .map_err(|(_, e)| eyre!("Failed to create graphics pipeline for {}: {}", shader.name, e))?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| eyre!("Driver returned no pipeline"))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.logical.destroy_pipeline(pipeline, None) };
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<(vk::Buffer, AshMemory)> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.logical.create_buffer(&buffer_info, None)? };

        let requirements = unsafe { self.logical.get_buffer_memory_requirements(buffer) };
        let allocation = self.allocator().and_then(|mut allocator| {
            Ok(allocator.allocate(&AllocationCreateDesc {
                name: desc.name,
                requirements,
                location: desc.location,
                linear: true,
                allocation_scheme: AllocationScheme::DedicatedBuffer(buffer),
            })?)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.logical.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let bound = unsafe {
            self.logical.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        if let Err(e) = bound {
            self.free_allocation(allocation);
            unsafe { self.logical.destroy_buffer(buffer, None) };
            return Err(e.into());
        }

        self.set_object_name(buffer, desc.name);
        Ok((buffer, AshMemory { allocation }))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer, memory: AshMemory) {
        unsafe { self.logical.destroy_buffer(buffer, None) };
        self.free_allocation(memory.allocation);
    }

    fn allocate_memory(&self, desc: &MemoryDesc) -> Result<AshMemory> {
        let requirements = vk::MemoryRequirements {
            size: desc.size,
            alignment: desc.alignment,
            memory_type_bits: desc.memory_type_bits,
        };
        let allocation = self.allocator()?.allocate(&AllocationCreateDesc {
            name: desc.name,
            requirements,
            location: desc.location,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;
        Ok(AshMemory { allocation })
    }

    fn free_memory(&self, memory: AshMemory) {
        self.free_allocation(memory.allocation);
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<vk::Image> {
        let image_type = if desc.extent.depth > 1 {
            vk::ImageType::TYPE_3D
        } else {
            vk::ImageType::TYPE_2D
        };
        let info = vk::ImageCreateInfo::default()
            .image_type(image_type)
            .format(desc.format)
            .extent(desc.extent)
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(desc.tiling)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        Ok(unsafe { self.logical.create_image(&info, None)? })
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.logical.get_image_memory_requirements(image) }
    }

    fn bind_image_memory(&self, image: vk::Image, memory: &AshMemory, offset: u64) -> Result<()> {
        Ok(unsafe {
            self.logical.bind_image_memory(
                image,
                memory.device_memory(),
                memory.base_offset() + offset,
            )?
        })
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.logical.destroy_image(image, None) };
    }

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        let info = vk::RenderPassBeginInfo::default()
            .render_pass(begin.render_pass)
            .framebuffer(begin.framebuffer)
            .render_area(begin.render_area)
            .clear_values(begin.clear_values);
        unsafe { self.logical.cmd_begin_render_pass(cmd, &info, vk::SubpassContents::INLINE) };
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.logical.cmd_end_render_pass(cmd) };
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        unsafe { self.logical.cmd_set_viewport(cmd, 0, &[viewport]) };
    }

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D) {
        unsafe { self.logical.cmd_set_scissor(cmd, 0, &[scissor]) };
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe { self.logical.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline) };
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.logical.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                sets,
                dynamic_offsets,
            );
        }
    }

    fn cmd_bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[u64],
    ) {
        unsafe { self.logical.cmd_bind_vertex_buffers(cmd, first_binding, buffers, offsets) };
    }

    fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        index_type: vk::IndexType,
    ) {
        unsafe { self.logical.cmd_bind_index_buffer(cmd, buffer, offset, index_type) };
    }

    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe { self.logical.cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance) };
    }

    fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.logical.cmd_draw_indexed(
                cmd,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }

    fn cmd_copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        unsafe { self.logical.cmd_copy_buffer(cmd, src, dst, regions) };
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.logical.cmd_copy_buffer_to_image(
                cmd,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                regions,
            );
        }
    }

    fn cmd_transition_image_layout(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) {
        let barriers = [
            vk::ImageMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
                .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
                .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
                .dst_access_mask(vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ)
                .old_layout(old_layout)
                .new_layout(new_layout)
                .subresource_range(subresource_range(aspect))
                .image(image),
        ];
        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe { self.logical.cmd_pipeline_barrier2(cmd, &dependency_info) };
    }

    fn cmd_transfer_barrier(&self, cmd: vk::CommandBuffer) {
        let barriers = [
            vk::MemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::TRANSFER)
                .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
                .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
                .dst_access_mask(vk::AccessFlags2::MEMORY_READ),
        ];
        let dependency_info = vk::DependencyInfo::default().memory_barriers(&barriers);
        unsafe { self.logical.cmd_pipeline_barrier2(cmd, &dependency_info) };
    }

    fn cmd_reset_query_pool(
        &self,
        cmd: vk::CommandBuffer,
        pool: vk::QueryPool,
        first_query: u32,
        query_count: u32,
    ) {
        unsafe { self.logical.cmd_reset_query_pool(cmd, pool, first_query, query_count) };
    }

    fn cmd_write_timestamp(
        &self,
        cmd: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    ) {
        unsafe { self.logical.cmd_write_timestamp(cmd, stage, pool, query) };
    }

    fn queue_submit(&self, queue: vk::Queue, submit: &QueueSubmit) -> Result<()> {
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(submit.command_buffers)
            .wait_semaphores(submit.wait_semaphores)
            .wait_dst_stage_mask(submit.wait_stages)
            .signal_semaphores(submit.signal_semaphores);
        Ok(unsafe { self.logical.queue_submit(queue, &[submit_info], submit.fence)? })
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(unsafe { self.logical.device_wait_idle()? })
    }
}
