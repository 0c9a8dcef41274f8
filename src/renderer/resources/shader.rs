use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use crate::renderer::contexts::device_ctx::device::AshDevice;
use crate::renderer::contexts::pipeline_ctx::shader::{
    DescriptorBinding, DescriptorSetLayoutInfo, Shader, VertexInputDescription,
};
use crate::renderer::shader_data::{PerVertexData, TransformData};

// Compiled from shaders/ by build.rs
const TRIANGLE_VERT_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv"));
const TRIANGLE_FRAG_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv"));

/// Owns the Vulkan objects behind a `Shader` description.
pub struct GraphicsShader {
    shader: Arc<Shader>,
    device: Arc<AshDevice>,
}

#[derive(Default)]
struct ShaderObjects {
    vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    pipeline_layout: vk::PipelineLayout,
}

impl ShaderObjects {
    fn destroy(&self, device: &AshDevice) {
        if self.pipeline_layout != vk::PipelineLayout::null() {
            device.destroy_pipeline_layout(self.pipeline_layout);
        }
        for layout in &self.set_layouts {
            device.destroy_descriptor_set_layout(*layout);
        }
        for module in [self.vertex_module, self.fragment_module] {
            if module != vk::ShaderModule::null() {
                device.destroy_shader_module(module);
            }
        }
    }
}

impl GraphicsShader {
    /// `sets[i]` lists the bindings of descriptor set `i`.
    pub fn new(
        name: &str,
        vertex_spv: &[u8],
        fragment_spv: &[u8],
        vertex_input: VertexInputDescription,
        sets: Vec<Vec<DescriptorBinding>>,
        device: Arc<AshDevice>,
    ) -> Result<Self> {
        let mut objects = ShaderObjects::default();
        if let Err(e) = Self::create_objects(&mut objects, vertex_spv, fragment_spv, &sets, &device) {
            objects.destroy(&device);
            return Err(e);
        }

        let set_layouts = objects.set_layouts
            .iter()
            .zip(sets)
            .map(|(layout, bindings)| DescriptorSetLayoutInfo {
                layout: *layout,
                bindings,
            })
            .collect();

        let shader = Shader::new(
            name,
            objects.vertex_module,
            objects.fragment_module,
            vertex_input,
            set_layouts,
            objects.pipeline_layout,
        );
        log::debug!("Loaded shader {} ({} descriptor sets)", name, shader.set_count());

        Ok(Self {
            shader: Arc::new(shader),
            device,
        })
    }

    fn create_objects(
        objects: &mut ShaderObjects,
        vertex_spv: &[u8],
        fragment_spv: &[u8],
        sets: &[Vec<DescriptorBinding>],
        device: &AshDevice,
    ) -> Result<()> {
        objects.vertex_module = device.create_shader_module(vertex_spv)?;
        objects.fragment_module = device.create_shader_module(fragment_spv)?;
        for bindings in sets {
            objects.set_layouts.push(device.create_descriptor_set_layout(bindings)?);
        }
        objects.pipeline_layout = device.create_pipeline_layout(&objects.set_layouts)?;
        Ok(())
    }

    /// Flat-colored triangles: a dynamic transform block and packed `vec3` positions.
    pub fn triangle(device: Arc<AshDevice>) -> Result<Self> {
        let vertex_input = VertexInputDescription {
            bindings: vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: PerVertexData::STRIDE,
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
        let set0 = vec![DescriptorBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            block_size: size_of::<TransformData>() as u64,
        }];

        Self::new(
            "triangle",
            TRIANGLE_VERT_SPV,
            TRIANGLE_FRAG_SPV,
            vertex_input,
            vec![set0],
            device,
        )
    }

    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }
}

impl Drop for GraphicsShader {
    fn drop(&mut self) {
        ShaderObjects {
            vertex_module: self.shader.vertex_module,
            fragment_module: self.shader.fragment_module,
            set_layouts: self.shader.set_layouts.iter().map(|s| s.layout).collect(),
            pipeline_layout: self.shader.pipeline_layout,
        }
        .destroy(&self.device);
    }
}
