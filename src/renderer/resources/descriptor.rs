use ash::vk;
use ash::vk::Handle;
use bytemuck::{Pod, Zeroable};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use smallvec::SmallVec;
use crate::renderer::contexts::device_ctx::GpuDevice;
use crate::renderer::contexts::pipeline_ctx::shader::DescriptorBinding;
use crate::renderer::internals::allocator::TransientAllocator;
use crate::renderer::internals::buffer_allocator::BufferAllocator;
use crate::renderer::internals::hash::hash_bytes;

/// A single descriptor in a flat, hashable form.
///
/// Two descriptors with the same bytes describe the same binding, so a set's
/// cache key can be computed straight from `bytemuck::cast_slice`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DescriptorData {
    pub sampler: u64,
    pub image_view: u64,
    pub buffer: u64,
    pub offset: u64,
    pub range: u64,
    pub image_layout: i32,
    pub descriptor_type: i32,
}

impl DescriptorData {
    pub fn buffer(
        descriptor_type: vk::DescriptorType,
        buffer: vk::Buffer,
        offset: u64,
        range: u64,
    ) -> Self {
        Self {
            buffer: buffer.as_raw(),
            offset,
            range,
            descriptor_type: descriptor_type.as_raw(),
            ..Default::default()
        }
    }

    pub fn combined_image_sampler(
        sampler: vk::Sampler,
        image_view: vk::ImageView,
        image_layout: vk::ImageLayout,
    ) -> Self {
        Self {
            sampler: sampler.as_raw(),
            image_view: image_view.as_raw(),
            image_layout: image_layout.as_raw(),
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER.as_raw(),
            ..Default::default()
        }
    }

    pub fn descriptor_type(&self) -> vk::DescriptorType {
        vk::DescriptorType::from_raw(self.descriptor_type)
    }

    pub fn vk_buffer(&self) -> vk::Buffer {
        vk::Buffer::from_raw(self.buffer)
    }

    pub fn vk_sampler(&self) -> vk::Sampler {
        vk::Sampler::from_raw(self.sampler)
    }

    pub fn vk_image_view(&self) -> vk::ImageView {
        vk::ImageView::from_raw(self.image_view)
    }

    pub fn vk_image_layout(&self) -> vk::ImageLayout {
        vk::ImageLayout::from_raw(self.image_layout)
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self.descriptor_type(),
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
                | vk::DescriptorType::SAMPLED_IMAGE
                | vk::DescriptorType::STORAGE_IMAGE
                | vk::DescriptorType::SAMPLER
        )
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(
            self.descriptor_type(),
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
                | vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
        )
    }

    /// Nothing has been bound here yet.
    pub fn is_unbound(&self) -> bool {
        self.buffer == 0 && self.image_view == 0 && self.sampler == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorSetData {
    /// Indexed by binding number.
    pub descriptors: Vec<DescriptorData>,
    /// (binding, offset) for every dynamic binding, kept in binding order.
    dynamic_binding_offsets: SmallVec<[(u32, u32); 4]>,
    /// Uniform payloads waiting to be copied into transient memory.
    dynamic_uniforms: SmallVec<[(u32, Vec<u8>); 4]>,
}

impl DescriptorSetData {
    pub fn from_bindings(bindings: &[DescriptorBinding]) -> Self {
        let mut data = Self::default();
        for b in bindings {
            let slot = data.slot(b.binding);
            slot.descriptor_type = b.descriptor_type.as_raw();
            if slot.is_dynamic() {
                data.set_dynamic_offset(b.binding, 0);
            }
        }
        data
    }

    fn slot(&mut self, binding: u32) -> &mut DescriptorData {
        let index = binding as usize;
        if self.descriptors.len() <= index {
            self.descriptors.resize(index + 1, DescriptorData::default());
        }
        &mut self.descriptors[index]
    }

    fn set_dynamic_offset(&mut self, binding: u32, offset: u32) {
        match self.dynamic_binding_offsets.binary_search_by_key(&binding, |(b, _)| *b) {
            Ok(i) => self.dynamic_binding_offsets[i].1 = offset,
            Err(i) => self.dynamic_binding_offsets.insert(i, (binding, offset)),
        }
    }

    /// Stage `bytes` for a dynamic uniform buffer binding.
    ///
    /// Buffer and offset are filled in by `commit_uniforms`.
    pub fn set_uniform_bytes(&mut self, binding: u32, bytes: &[u8]) -> &mut Self {
        self.slot(binding).descriptor_type =
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC.as_raw();
        self.set_dynamic_offset(binding, 0);

        match self.dynamic_uniforms.iter_mut().find(|(b, _)| *b == binding) {
            Some((_, staged)) => {
                staged.clear();
                staged.extend_from_slice(bytes);
            }
            None => self.dynamic_uniforms.push((binding, bytes.to_vec())),
        }
        self
    }

    pub fn set_uniform<T: Pod>(&mut self, binding: u32, value: &T) -> &mut Self {
        self.set_uniform_bytes(binding, bytemuck::bytes_of(value))
    }

    pub fn set_storage_buffer(
        &mut self,
        binding: u32,
        buffer: vk::Buffer,
        offset: u64,
        range: u64,
    ) -> &mut Self {
        *self.slot(binding) = DescriptorData::buffer(
            vk::DescriptorType::STORAGE_BUFFER,
            buffer,
            offset,
            range,
        );
        self
    }

    pub fn set_image(
        &mut self,
        binding: u32,
        sampler: vk::Sampler,
        image_view: vk::ImageView,
        image_layout: vk::ImageLayout,
    ) -> &mut Self {
        *self.slot(binding) =
            DescriptorData::combined_image_sampler(sampler, image_view, image_layout);
        self
    }

    pub fn dynamic_offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.dynamic_binding_offsets.iter().map(|(_, offset)| *offset)
    }

    pub fn has_staged_uniforms(&self) -> bool {
        !self.dynamic_uniforms.is_empty()
    }

    /// Cache key for this set under the layout identified by `layout_key`.
    pub fn content_hash(&self, layout_key: u64) -> u64 {
        hash_bytes(bytemuck::cast_slice(&self.descriptors), layout_key)
    }

    /// Copy staged uniforms into `allocator`, pointing each dynamic binding at
    /// the allocator's buffer and recording its dynamic offset.
    pub fn commit_uniforms<D: GpuDevice>(
        &mut self,
        allocator: &mut BufferAllocator<D>,
    ) -> Result<()> {
        for (binding, bytes) in std::mem::take(&mut self.dynamic_uniforms) {
            if bytes.is_empty() {
                // Valid descriptor without backing data; range must be non-zero
                let range = allocator.settings().alignment.max(1);
                *self.slot(binding) = DescriptorData::buffer(
                    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                    allocator.buffer(),
                    0,
                    range,
                );
                self.set_dynamic_offset(binding, 0);
                continue;
            }
            let byte_count = bytes.len() as u64;
            let region = allocator.allocate(byte_count).ok_or_else(|| eyre!(
                "Out of transient memory for uniform at binding {} ({} bytes)",
                binding,
                byte_count,
            ))?;
            allocator.write(&region, bytes.as_slice())?;

            // The descriptor always points at the start of the buffer; the
            // dynamic offset selects this frame's copy.
            *self.slot(binding) = DescriptorData::buffer(
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                allocator.buffer(),
                0,
                byte_count,
            );
            self.set_dynamic_offset(binding, u32::try_from(region.offset)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::renderer::internals::allocator::AllocatorSettings;
    use crate::renderer::internals::buffer_allocator::BufferAllocatorSettings;
    use crate::renderer::testing::MockDevice;

    #[test]
    fn identical_payloads_hash_identically() {
        let mut a = DescriptorSetData::default();
        a.set_storage_buffer(0, vk::Buffer::from_raw(5), 0, 64);
        let b = a.clone();
        assert_eq!(a.content_hash(1), b.content_hash(1));
        assert_ne!(a.content_hash(1), a.content_hash(2));
    }

    #[test]
    fn dynamic_offsets_do_not_affect_hash() {
        let mut a = DescriptorSetData::default();
        a.set_uniform_bytes(0, &[0; 16]);
        let mut b = a.clone();
        b.set_dynamic_offset(0, 256);
        assert_eq!(a.content_hash(0), b.content_hash(0));
        assert_eq!(b.dynamic_offsets().collect::<Vec<_>>(), vec![256]);
    }

    #[test]
    fn dynamic_offsets_follow_binding_order() {
        let mut data = DescriptorSetData::default();
        data.set_uniform_bytes(2, &[0; 4]);
        data.set_uniform_bytes(0, &[0; 4]);
        data.set_dynamic_offset(2, 20);
        data.set_dynamic_offset(0, 10);
        assert_eq!(data.dynamic_offsets().collect::<Vec<_>>(), vec![10, 20]);
    }

    #[test]
    fn from_bindings_marks_types() {
        let bindings = [
            DescriptorBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                stage_flags: vk::ShaderStageFlags::VERTEX,
                block_size: 64,
            },
            DescriptorBinding {
                binding: 1,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                block_size: 0,
            },
        ];
        let data = DescriptorSetData::from_bindings(&bindings);
        assert_eq!(data.descriptors.len(), 2);
        assert!(data.descriptors[0].is_dynamic());
        assert!(data.descriptors[1].is_image());
        assert_eq!(data.dynamic_offsets().count(), 1);
    }

    #[test]
    fn zero_byte_uniform_commits_without_allocating() {
        let device = Arc::new(MockDevice::new());
        let mut alloc = BufferAllocator::new(
            BufferAllocatorSettings {
                allocator: AllocatorSettings {
                    size: 1024,
                    alignment: 256,
                    ..Default::default()
                },
                ..Default::default()
            },
            device.clone(),
        )
        .unwrap();

        let mut data = DescriptorSetData::default();
        data.set_uniform_bytes(0, &[]);
        data.commit_uniforms(&mut alloc).unwrap();

        assert_eq!(alloc.used(), 0);
        assert!(!data.has_staged_uniforms());
        assert_eq!(data.descriptors[0].vk_buffer(), alloc.buffer());
        assert_eq!(data.dynamic_offsets().collect::<Vec<_>>(), vec![0]);
    }
}
