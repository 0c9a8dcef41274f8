use std::time::Duration;
use gpu_descriptor::DescriptorTotalCount;

/// Contains configuration options for render contexts: frames in flight,
/// transient memory, descriptor pool sizing and clear color
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub virtual_frame_count: usize,
    /// Transient bytes available to each virtual frame.
    pub transient_memory_per_frame: u64,
    /// How long `swap` waits for a frame's fence before treating the device as lost.
    pub fence_timeout: Duration,
    pub descriptor_pool_sizes: DescriptorTotalCount,
    pub descriptor_pool_max_sets: u32,
    pub clear_color: [f32; 4],
    pub timestamp_queries: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            virtual_frame_count: 3,
            transient_memory_per_frame: 4 * 1024 * 1024,
            fence_timeout: Duration::from_secs(100),
            descriptor_pool_sizes: DescriptorTotalCount {
                uniform_buffer_dynamic: 64,
                uniform_buffer: 16,
                storage_buffer: 16,
                combined_image_sampler: 64,
                ..Default::default()
            },
            descriptor_pool_max_sets: 64,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            timestamp_queries: false,
        }
    }
}
