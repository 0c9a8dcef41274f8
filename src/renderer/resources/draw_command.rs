use ash::vk;
use bytemuck::Pod;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use smallvec::SmallVec;
use crate::renderer::contexts::device_ctx::GpuDevice;
use crate::renderer::contexts::pipeline_ctx::state::GraphicsPipelineState;
use crate::renderer::internals::allocator::TransientAllocator;
use crate::renderer::internals::buffer_allocator::BufferAllocator;
use crate::renderer::resources::descriptor::DescriptorSetData;

/// One logical draw call: pipeline state, bindings and geometry.
///
/// Uniforms, vertex attributes and indices can be staged as plain bytes; a
/// `RenderBatch` copies them into transient memory when the command is drawn
/// and points the buffer references at the copies.
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub pipeline_state: GraphicsPipelineState,
    descriptor_sets: SmallVec<[DescriptorSetData; 4]>,

    vertex_buffers: SmallVec<[vk::Buffer; 4]>,
    vertex_offsets: SmallVec<[u64; 4]>,
    index_buffer: Option<(vk::Buffer, u64)>,

    staged_attributes: SmallVec<[(u32, Vec<u8>); 4]>,
    staged_indices: Option<Vec<u32>>,

    num_vertices: u32,
    num_indices: u32,
    instance_count: u32,
}

impl DrawCommand {
    pub fn new(pipeline_state: GraphicsPipelineState) -> Self {
        let descriptor_sets = pipeline_state
            .shader()
            .set_layouts
            .iter()
            .map(|set| DescriptorSetData::from_bindings(&set.bindings))
            .collect();

        Self {
            pipeline_state,
            descriptor_sets,
            vertex_buffers: SmallVec::new(),
            vertex_offsets: SmallVec::new(),
            index_buffer: None,
            staged_attributes: SmallVec::new(),
            staged_indices: None,
            num_vertices: 0,
            num_indices: 0,
            instance_count: 1,
        }
    }

    pub fn descriptor_set(&self, set_id: usize) -> Option<&DescriptorSetData> {
        self.descriptor_sets.get(set_id)
    }

    pub fn descriptor_set_mut(&mut self, set_id: usize) -> Result<&mut DescriptorSetData> {
        let count = self.descriptor_sets.len();
        self.descriptor_sets
            .get_mut(set_id)
            .ok_or_else(|| eyre!("Shader has no descriptor set {} (has {})", set_id, count))
    }

    pub fn set_uniform<T: Pod>(&mut self, set_id: usize, binding: u32, value: &T) -> Result<&mut Self> {
        self.descriptor_set_mut(set_id)?.set_uniform(binding, value);
        Ok(self)
    }

    pub fn set_storage_buffer(
        &mut self,
        set_id: usize,
        binding: u32,
        buffer: vk::Buffer,
        offset: u64,
        range: u64,
    ) -> Result<&mut Self> {
        self.descriptor_set_mut(set_id)?.set_storage_buffer(binding, buffer, offset, range);
        Ok(self)
    }

    pub fn set_image(
        &mut self,
        set_id: usize,
        binding: u32,
        sampler: vk::Sampler,
        image_view: vk::ImageView,
        image_layout: vk::ImageLayout,
    ) -> Result<&mut Self> {
        self.descriptor_set_mut(set_id)?.set_image(binding, sampler, image_view, image_layout);
        Ok(self)
    }

    fn check_vertex_binding(&self, binding: u32) -> Result<()> {
        let shader = self.pipeline_state.shader();
        if shader.vertex_input.bindings.iter().any(|b| b.binding == binding) {
            return Ok(());
        }
        Err(eyre!("Shader {} has no vertex input binding {}", shader.name, binding))
    }

    /// Stage per-vertex data for vertex input `binding`.
    pub fn set_attribute<T: Pod>(&mut self, binding: u32, data: &[T]) -> Result<&mut Self> {
        self.check_vertex_binding(binding)?;
        let bytes = bytemuck::cast_slice::<T, u8>(data).to_vec();
        match self.staged_attributes.iter_mut().find(|(b, _)| *b == binding) {
            Some((_, staged)) => *staged = bytes,
            None => self.staged_attributes.push((binding, bytes)),
        }
        Ok(self)
    }

    /// Reference an existing buffer for vertex input `binding`.
    pub fn set_vertex_buffer(&mut self, binding: u32, buffer: vk::Buffer, offset: u64) -> Result<&mut Self> {
        self.check_vertex_binding(binding)?;
        self.bind_vertex_buffer(binding, buffer, offset);
        Ok(self)
    }

    // `binding` was checked against the shader when it was set
    fn bind_vertex_buffer(&mut self, binding: u32, buffer: vk::Buffer, offset: u64) {
        let index = binding as usize;
        if self.vertex_buffers.len() <= index {
            self.vertex_buffers.resize(index + 1, vk::Buffer::null());
            self.vertex_offsets.resize(index + 1, 0);
        }
        self.vertex_buffers[index] = buffer;
        self.vertex_offsets[index] = offset;
    }

    /// Stage `u32` indices; sets the index count.
    pub fn set_indices(&mut self, indices: &[u32]) -> &mut Self {
        self.num_indices = indices.len() as u32;
        self.staged_indices = Some(indices.to_vec());
        self
    }

    pub fn set_index_buffer(&mut self, buffer: vk::Buffer, offset: u64, num_indices: u32) -> &mut Self {
        self.index_buffer = Some((buffer, offset));
        self.num_indices = num_indices;
        self
    }

    pub fn set_num_vertices(&mut self, num_vertices: u32) -> &mut Self {
        self.num_vertices = num_vertices;
        self
    }

    pub fn set_instance_count(&mut self, instance_count: u32) -> &mut Self {
        self.instance_count = instance_count;
        self
    }

    pub fn vertex_buffers(&self) -> &[vk::Buffer] {
        &self.vertex_buffers
    }

    pub fn vertex_offsets(&self) -> &[u64] {
        &self.vertex_offsets
    }

    pub fn index_buffer(&self) -> Option<(vk::Buffer, u64)> {
        self.index_buffer
    }

    pub fn num_vertices(&self) -> u32 {
        self.num_vertices
    }

    pub fn num_indices(&self) -> u32 {
        self.num_indices
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn commit_uniforms<D: GpuDevice>(&mut self, allocator: &mut BufferAllocator<D>) -> Result<()> {
        for set in self.descriptor_sets.iter_mut() {
            set.commit_uniforms(allocator)?;
        }
        Ok(())
    }

    /// Copy staged attributes and indices into `allocator` and bind the copies.
    pub fn commit_mesh_attributes<D: GpuDevice>(&mut self, allocator: &mut BufferAllocator<D>) -> Result<()> {
        for (binding, bytes) in std::mem::take(&mut self.staged_attributes) {
            if bytes.is_empty() {
                // Nothing is read from an empty binding, any buffer will do
                self.bind_vertex_buffer(binding, allocator.buffer(), 0);
                continue;
            }
            let region = allocator.allocate(bytes.len() as u64).ok_or_else(|| eyre!(
                "Out of transient memory for vertex binding {} ({} bytes)",
                binding,
                bytes.len(),
            ))?;
            allocator.write(&region, bytes.as_slice())?;
            self.bind_vertex_buffer(binding, allocator.buffer(), region.offset);
        }

        if let Some(indices) = self.staged_indices.take() {
            if indices.is_empty() {
                self.index_buffer = None;
                self.num_indices = 0;
                return self.check_vertex_buffers();
            }
            let byte_count = size_of_val(indices.as_slice()) as u64;
            let region = allocator.allocate(byte_count).ok_or_else(|| eyre!(
                "Out of transient memory for {} indices ({} bytes)",
                indices.len(),
                byte_count,
            ))?;
            allocator.write(&region, indices.as_slice())?;
            self.index_buffer = Some((allocator.buffer(), region.offset));
        }

        self.check_vertex_buffers()
    }

    fn check_vertex_buffers(&self) -> Result<()> {
        if let Some(missing) = self.vertex_buffers.iter().position(|b| *b == vk::Buffer::null()) {
            return Err(eyre!("Vertex binding {} has no buffer", missing));
        }
        Ok(())
    }
}
