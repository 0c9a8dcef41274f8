use std::hash::{Hash, Hasher};
use ash::vk;
use ash::vk::Handle;
use crate::renderer::internals::hash::hash_value;

/// One binding of a descriptor-set layout, as reported by shader reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub stage_flags: vk::ShaderStageFlags,
    /// Size of the uniform block in bytes, 0 for non-buffer bindings.
    pub block_size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct VertexInputDescription {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
    pub flags: vk::PipelineVertexInputStateCreateFlags,
}

impl Hash for VertexInputDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in &self.bindings {
            (b.binding, b.stride, b.input_rate).hash(state);
        }
        for a in &self.attributes {
            (a.location, a.binding, a.format, a.offset).hash(state);
        }
        self.flags.hash(state);
    }
}

#[derive(Debug, Clone)]
pub struct DescriptorSetLayoutInfo {
    pub layout: vk::DescriptorSetLayout,
    /// Sorted by binding number, without gaps.
    pub bindings: Vec<DescriptorBinding>,
}

/// Reflection metadata for a vertex + fragment program.
///
/// Handles are borrowed: whoever built the modules and layouts destroys them,
/// after every pipeline created from this shader is gone.
#[derive(Debug)]
pub struct Shader {
    pub name: String,
    pub vertex_module: vk::ShaderModule,
    pub fragment_module: vk::ShaderModule,
    pub vertex_input: VertexInputDescription,
    pub set_layouts: Vec<DescriptorSetLayoutInfo>,
    pub pipeline_layout: vk::PipelineLayout,
    layout_keys: Vec<u64>,
    id: u64,
}

impl Shader {
    pub fn new(
        name: impl Into<String>,
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
        vertex_input: VertexInputDescription,
        set_layouts: Vec<DescriptorSetLayoutInfo>,
        pipeline_layout: vk::PipelineLayout,
    ) -> Self {
        let name = name.into();
        let layout_keys: Vec<u64> = set_layouts
            .iter()
            .map(|set| hash_value(set.bindings.as_slice()))
            .collect();

        let id = hash_value(&(
            &name,
            vertex_module.as_raw(),
            fragment_module.as_raw(),
            &vertex_input,
            &layout_keys,
            pipeline_layout.as_raw(),
        ));

        Self {
            name,
            vertex_module,
            fragment_module,
            vertex_input,
            set_layouts,
            pipeline_layout,
            layout_keys,
            id,
        }
    }

    /// Per-set keys mixed into descriptor-set content hashes.
    pub fn layout_keys(&self) -> &[u64] {
        &self.layout_keys
    }

    pub fn set_count(&self) -> usize {
        self.set_layouts.len()
    }

    pub fn set_layout(&self, set_id: usize) -> Option<&DescriptorSetLayoutInfo> {
        self.set_layouts.get(set_id)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}
