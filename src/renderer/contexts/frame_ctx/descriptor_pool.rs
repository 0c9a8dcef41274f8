use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use gpu_descriptor::DescriptorTotalCount;
use smallvec::SmallVec;
use crate::renderer::contexts::pipeline_ctx::shader::DescriptorBinding;

const POOLED_TYPES: [vk::DescriptorType; 12] = [
    vk::DescriptorType::SAMPLER,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
    vk::DescriptorType::STORAGE_TEXEL_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
    vk::DescriptorType::INPUT_ATTACHMENT,
    vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
];

pub fn descriptor_count_mut(
    counts: &mut DescriptorTotalCount,
    ty: vk::DescriptorType,
) -> Option<&mut u32> {
    Some(match ty {
        vk::DescriptorType::SAMPLER => &mut counts.sampler,
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER => &mut counts.combined_image_sampler,
        vk::DescriptorType::SAMPLED_IMAGE => &mut counts.sampled_image,
        vk::DescriptorType::STORAGE_IMAGE => &mut counts.storage_image,
        vk::DescriptorType::UNIFORM_TEXEL_BUFFER => &mut counts.uniform_texel_buffer,
        vk::DescriptorType::STORAGE_TEXEL_BUFFER => &mut counts.storage_texel_buffer,
        vk::DescriptorType::UNIFORM_BUFFER => &mut counts.uniform_buffer,
        vk::DescriptorType::STORAGE_BUFFER => &mut counts.storage_buffer,
        vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC => &mut counts.uniform_buffer_dynamic,
        vk::DescriptorType::STORAGE_BUFFER_DYNAMIC => &mut counts.storage_buffer_dynamic,
        vk::DescriptorType::INPUT_ATTACHMENT => &mut counts.input_attachment,
        vk::DescriptorType::ACCELERATION_STRUCTURE_KHR => &mut counts.acceleration_structure,
        _ => return None,
    })
}

pub fn descriptor_count(counts: &DescriptorTotalCount, ty: vk::DescriptorType) -> u32 {
    let mut counts = *counts;
    descriptor_count_mut(&mut counts, ty).map_or(0, |c| *c)
}

/// Non-zero entries of `counts` as Vulkan pool sizes.
pub fn pool_sizes(counts: &DescriptorTotalCount) -> SmallVec<[vk::DescriptorPoolSize; 12]> {
    POOLED_TYPES
        .iter()
        .filter_map(|&ty| {
            let count = descriptor_count(counts, ty);
            (count != 0).then(|| vk::DescriptorPoolSize::default()
                .ty(ty)
                .descriptor_count(count))
        })
        .collect()
}

/// Capacity bookkeeping for the descriptor pools of every virtual frame.
///
/// `pool_sizes`/`max_sets` describe what one consolidated frame pool holds;
/// `available*` track what remains in the current frame's main pool. When a
/// request does not fit, the frame gets an extra exact-size pool and every
/// frame is marked dirty so it rebuilds one larger pool when next reused.
#[derive(Debug, Clone)]
pub struct DescriptorPoolBudget {
    pool_sizes: DescriptorTotalCount,
    max_sets: u32,
    available: DescriptorTotalCount,
    available_sets: u32,
    frame_count: usize,
    dirty_frames: u64,
}

impl DescriptorPoolBudget {
    pub const MAX_FRAMES: usize = u64::BITS as usize;

    pub fn new(
        pool_sizes: DescriptorTotalCount,
        max_sets: u32,
        frame_count: usize,
    ) -> Result<Self> {
        if frame_count == 0 || frame_count > Self::MAX_FRAMES {
            return Err(eyre!(
                "Virtual frame count {} outside 1..={}",
                frame_count,
                Self::MAX_FRAMES,
            ));
        }
        Ok(Self {
            pool_sizes,
            max_sets,
            available: pool_sizes,
            available_sets: max_sets,
            frame_count,
            dirty_frames: 0,
        })
    }

    pub fn required_for(bindings: &[DescriptorBinding]) -> Result<DescriptorTotalCount> {
        let mut counts = DescriptorTotalCount::default();
        for binding in bindings {
            let count = descriptor_count_mut(&mut counts, binding.descriptor_type)
                .ok_or_else(|| eyre!(
                    "Descriptor type {:?} at binding {} cannot be pooled",
                    binding.descriptor_type,
                    binding.binding,
                ))?;
            *count += 1;
        }
        Ok(counts)
    }

    /// One more set with `required` descriptors fits the current frame's main pool.
    pub fn can_allocate(&self, required: &DescriptorTotalCount) -> bool {
        self.available_sets > 0
            && POOLED_TYPES.iter().all(|&ty| {
                descriptor_count(required, ty) <= descriptor_count(&self.available, ty)
            })
    }

    pub fn consume(&mut self, required: &DescriptorTotalCount) {
        for &ty in POOLED_TYPES.iter() {
            let needed = descriptor_count(required, ty);
            if let Some(available) = descriptor_count_mut(&mut self.available, ty) {
                *available = available.saturating_sub(needed);
            }
        }
        self.available_sets = self.available_sets.saturating_sub(1);
    }

    /// Raise the consolidated pool size by one set of `required`.
    pub fn grow(&mut self, required: &DescriptorTotalCount) {
        for &ty in POOLED_TYPES.iter() {
            let extra = descriptor_count(required, ty);
            if let Some(total) = descriptor_count_mut(&mut self.pool_sizes, ty) {
                *total += extra;
            }
        }
        self.max_sets += 1;
        self.dirty_frames = if self.frame_count == Self::MAX_FRAMES {
            u64::MAX
        } else {
            (1u64 << self.frame_count) - 1
        };
    }

    pub fn is_dirty(&self, frame: usize) -> bool {
        self.dirty_frames & (1u64 << frame) != 0
    }

    pub fn clear_dirty(&mut self, frame: usize) {
        self.dirty_frames &= !(1u64 << frame);
    }

    /// The current frame's pool has been reset or rebuilt to full size.
    pub fn restore(&mut self) {
        self.available = self.pool_sizes;
        self.available_sets = self.max_sets;
    }

    pub fn pool_sizes(&self) -> &DescriptorTotalCount {
        &self.pool_sizes
    }

    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    pub fn available_sets(&self) -> u32 {
        self.available_sets
    }
}
