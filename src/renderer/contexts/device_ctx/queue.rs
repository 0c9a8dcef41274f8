use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::eyre;

/// A device queue shared between render contexts.
///
/// Submission is not synchronized by the contexts themselves: every
/// `RenderContext::submit_to_queue` call takes a `QueueGuard`, which can only
/// be obtained by locking the queue.
pub struct Queue {
    pub family: QueueFamily,
    handle: Mutex<vk::Queue>,
}

/// Exclusive access to a queue for the duration of one or more submissions.
pub struct QueueGuard<'a> {
    handle: MutexGuard<'a, vk::Queue>,
}

impl Queue {
    pub fn new(
        family: QueueFamily,
        handle: vk::Queue,
    ) -> Self {
        Self {
            family,
            handle: Mutex::new(handle),
        }
    }

    pub fn lock(&self) -> Result<QueueGuard<'_>> {
        let handle = self.handle
            .lock()
            .map_err(|e| eyre!(e.to_string()))?;
        Ok(QueueGuard { handle })
    }
}

impl QueueGuard<'_> {
    pub fn handle(&self) -> vk::Queue {
        *self.handle
    }
}

#[derive(Clone, Debug)]
pub struct QueueFamily {
    pub index: u32,
    pub properties: vk::QueueFamilyProperties,
}

impl QueueFamily {
    pub fn new(
        index: u32,
        properties: vk::QueueFamilyProperties,
    ) -> Self {
        Self {
            index,
            properties,
        }
    }
}

impl PartialEq for QueueFamily {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for QueueFamily {}

impl Hash for QueueFamily {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}
