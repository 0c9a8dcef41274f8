/// "Internals" refers to low-level objects that are used to implement the "Resources" objects.

pub mod allocator;
pub mod buffer_allocator;
pub mod descriptor_set_layout_builder;
pub mod hash;
pub mod image_allocator;
