use ash::vk;

/// Device limits and optional features, negotiated once when the device is wrapped.
///
/// Nothing in here changes for the lifetime of the device, so the record is
/// handed out by reference and never re-queried.
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    pub min_uniform_buffer_offset_alignment: u64,
    pub min_storage_buffer_offset_alignment: u64,
    pub non_coherent_atom_size: u64,
    pub buffer_image_granularity: u64,
    pub max_bound_descriptor_sets: u32,
    pub timestamp_period: f32,
    pub timestamps_supported: bool,
    pub debug_utils: bool,
}

impl DeviceCapabilities {
    pub fn query(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
        debug_utils: bool,
    ) -> Self {
        let props = unsafe {
            instance.get_physical_device_properties(physical_device)
        };
        let queue_props = unsafe {
            instance.get_physical_device_queue_family_properties(physical_device)
        };
        let limits = props.limits;

        // A queue without valid timestamp bits cannot write timestamps,
        // whatever the device-wide limit says.
        let queue_timestamps = queue_props
            .get(graphics_queue_family as usize)
            .is_some_and(|q| q.timestamp_valid_bits > 0);

        Self {
            min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
            min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment,
            non_coherent_atom_size: limits.non_coherent_atom_size,
            buffer_image_granularity: limits.buffer_image_granularity,
            max_bound_descriptor_sets: limits.max_bound_descriptor_sets,
            timestamp_period: limits.timestamp_period,
            timestamps_supported: limits.timestamp_compute_and_graphics == vk::TRUE
                || queue_timestamps,
            debug_utils,
        }
    }

    /// Alignment that satisfies every use a transient buffer region can be put to:
    /// dynamic uniform/storage offsets and flushes of non-coherent memory.
    pub fn transient_alignment(&self) -> u64 {
        self.min_uniform_buffer_offset_alignment
            .max(self.min_storage_buffer_offset_alignment)
            .max(self.non_coherent_atom_size)
            .max(16)
            .next_power_of_two()
    }

    pub fn image_granularity(&self) -> u64 {
        self.buffer_image_granularity.max(1).next_power_of_two()
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            min_uniform_buffer_offset_alignment: 256,
            min_storage_buffer_offset_alignment: 256,
            non_coherent_atom_size: 64,
            buffer_image_granularity: 1024,
            max_bound_descriptor_sets: 8,
            timestamp_period: 1.0,
            timestamps_supported: false,
            debug_utils: false,
        }
    }
}
