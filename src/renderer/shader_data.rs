use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Per-draw transform block of the triangle shader (set 0, binding 0)
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, Pod, Zeroable)]
pub struct TransformData {
    pub mvp: Mat4,
    pub color: Vec4,
}

/// One vertex of the triangle shader's only vertex binding
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, Pod, Zeroable)]
pub struct PerVertexData {
    pub position: Vec3,
}

impl PerVertexData {
    pub const STRIDE: u32 = size_of::<Self>() as u32;
}
