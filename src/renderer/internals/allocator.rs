use color_eyre::Result;
use color_eyre::eyre::eyre;
use gpu_allocator::MemoryLocation;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct BufferRegion {
    /// Absolute offset into the allocator's backing buffer or memory block.
    pub offset: u64,
    pub size: u64,
}

impl BufferRegion {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

#[derive(Debug, Clone)]
pub struct AllocatorSettings {
    pub name: String,
    /// Bytes available to each virtual frame.
    pub size: u64,
    pub frame_count: usize,
    /// Must be a power of two.
    pub alignment: u64,
    pub location: MemoryLocation,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            name: "Transient Memory".into(),
            size: 4 * 1024 * 1024,
            frame_count: 1,
            alignment: 256,
            location: MemoryLocation::CpuToGpu,
        }
    }
}

/// Cursor position of one region, taken with `mark` and restored with `rewind`.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct AllocatorMark {
    region: usize,
    cursor: u64,
}

/// Interface shared by the buffer and image flavours of the frame allocator.
pub trait TransientAllocator {
    /// Sub-allocate `byte_count` bytes from the current frame's region.
    ///
    /// Returns `None`, leaving the region untouched, if the request does not fit.
    fn allocate(&mut self, byte_count: u64) -> Option<BufferRegion>;

    /// Mark the current frame's region as reusable.
    fn free(&mut self);

    /// Mark every frame's region as reusable.
    fn reset(&mut self);

    /// Make the next virtual frame's region current.
    fn swap(&mut self);

    fn settings(&self) -> &AllocatorSettings;
}

/// Bump allocation over `frame_count` equally sized, back-to-back regions.
///
/// Each region keeps its own write cursor; only `free`/`reset` move a cursor
/// backwards.
#[derive(Debug, Clone)]
pub struct LinearRegions {
    region_size: u64,
    alignment: u64,
    current: usize,
    cursors: Vec<u64>,
}

impl LinearRegions {
    pub fn new(
        region_size: u64,
        region_count: usize,
        alignment: u64,
    ) -> Result<Self> {
        if region_count == 0 {
            return Err(eyre!("Allocator needs at least one region"));
        }
        if !alignment.is_power_of_two() {
            return Err(eyre!("Allocator alignment {} is not a power of two", alignment));
        }

        // Keep every region base aligned
        let region_size = region_size
            .checked_next_multiple_of(alignment)
            .ok_or_else(|| eyre!("Allocator region size {} overflows", region_size))?;
        region_size
            .checked_mul(region_count as u64)
            .ok_or_else(|| eyre!("Allocator total size overflows"))?;

        Ok(Self {
            region_size,
            alignment,
            current: 0,
            cursors: vec![0; region_count],
        })
    }

    pub fn allocate(&mut self, byte_count: u64) -> Option<BufferRegion> {
        if byte_count == 0 {
            return None;
        }

        let aligned_size = byte_count.checked_next_multiple_of(self.alignment)?;
        let cursor = self.cursors[self.current];
        let end = cursor.checked_add(aligned_size)?;
        if end > self.region_size {
            return None;
        }

        self.cursors[self.current] = end;

        Some(BufferRegion {
            offset: self.region_base(self.current) + cursor,
            size: byte_count,
        })
    }

    pub fn mark(&self) -> AllocatorMark {
        AllocatorMark {
            region: self.current,
            cursor: self.cursors[self.current],
        }
    }

    /// Release everything allocated in the current region since `mark`.
    ///
    /// Ignored if the region was swapped or freed after the mark was taken.
    pub fn rewind(&mut self, mark: AllocatorMark) {
        if mark.region == self.current && mark.cursor <= self.cursors[self.current] {
            self.cursors[self.current] = mark.cursor;
        }
    }

    pub fn swap(&mut self) {
        self.current = (self.current + 1) % self.cursors.len();
    }

    pub fn free(&mut self) {
        self.cursors[self.current] = 0;
    }

    pub fn reset(&mut self) {
        self.cursors.fill(0);
    }

    pub fn current_region(&self) -> usize {
        self.current
    }

    pub fn region_base(&self, region: usize) -> u64 {
        self.region_size * region as u64
    }

    pub fn region_size(&self) -> u64 {
        self.region_size
    }

    pub fn total_size(&self) -> u64 {
        self.region_size * self.cursors.len() as u64
    }

    /// Bytes consumed in the current region, alignment padding included.
    pub fn used(&self) -> u64 {
        self.cursors[self.current]
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }
}
