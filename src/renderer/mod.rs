pub mod batch;
pub mod camera;
pub mod config;
pub mod contexts;
pub mod internals;
pub mod resources;
pub mod shader_data;

#[cfg(test)]
pub(crate) mod testing;

use ash::vk;
use color_eyre::Result;
use glam::{Mat4, Vec3, Vec4};
use crate::renderer::batch::RenderBatch;
use crate::renderer::camera::Camera;
use crate::renderer::config::RenderConfig;
use crate::renderer::contexts::device_ctx::device::AshDevice;
use crate::renderer::contexts::device_ctx::target::OffscreenTarget;
use crate::renderer::contexts::device_ctx::{GpuDevice, RenderDeviceContext};
use crate::renderer::contexts::frame_ctx::{RenderContext, RenderContextSettings};
use crate::renderer::contexts::pipeline_ctx::state::{BlendMode, GraphicsPipelineState};
use crate::renderer::internals::allocator::{AllocatorSettings, BufferRegion};
use crate::renderer::internals::buffer_allocator::{BufferAllocator, BufferAllocatorSettings};
use crate::renderer::resources::draw_command::DrawCommand;
use crate::renderer::resources::shader::GraphicsShader;
use crate::renderer::shader_data::{PerVertexData, TransformData};

const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

const TRIANGLE: [PerVertexData; 3] = [
    PerVertexData { position: Vec3::new(0.0, -0.5, 0.0) },
    PerVertexData { position: Vec3::new(0.5, 0.5, 0.0) },
    PerVertexData { position: Vec3::new(-0.5, 0.5, 0.0) },
];

const QUAD: [PerVertexData; 4] = [
    PerVertexData { position: Vec3::new(-0.5, -0.5, 0.0) },
    PerVertexData { position: Vec3::new(0.5, -0.5, 0.0) },
    PerVertexData { position: Vec3::new(0.5, 0.5, 0.0) },
    PerVertexData { position: Vec3::new(-0.5, 0.5, 0.0) },
];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Device-resident quad uploaded once at startup
struct StaticQuad {
    vertices: BufferRegion,
    indices: BufferRegion,
}

/// Headless renderer driving one render context into offscreen targets.
///
/// Each frame draws a triangle whose vertices are staged through transient
/// memory and an indexed quad from a device-local buffer.
pub struct Renderer {
    // Field order is drop order: the context waits for the device to go idle
    context: RenderContext<AshDevice>,
    target: OffscreenTarget,
    geometry: BufferAllocator<AshDevice>,
    quad: StaticQuad,
    shader: GraphicsShader,
    opaque: GraphicsPipelineState,
    additive: GraphicsPipelineState,
    camera: Camera,
    frame_number: u64,
    dev: RenderDeviceContext,
}

impl Renderer {
    pub fn new(config: RenderConfig, extent: vk::Extent2D) -> Result<Self> {
        let dev = RenderDeviceContext::new()?;
        let device = dev.device.clone();

        let target = OffscreenTarget::new(
            device.clone(),
            COLOR_FORMAT,
            extent,
            config.virtual_frame_count,
        )?;
        let shader = GraphicsShader::triangle(device.clone())?;

        let settings = RenderContextSettings::from_config(
            &config,
            device.capabilities(),
            dev.graphics_queue.family.index,
            target.render_pass,
            vk::PipelineCache::null(),
            target.render_area(),
        );
        let mut context = RenderContext::new(settings, device.clone())?;

        let mut geometry = BufferAllocator::new(
            BufferAllocatorSettings {
                allocator: AllocatorSettings {
                    name: "Static Geometry".into(),
                    size: 64 * 1024,
                    frame_count: 1,
                    alignment: device.capabilities().transient_alignment(),
                    location: gpu_allocator::MemoryLocation::GpuOnly,
                },
                usage: vk::BufferUsageFlags::VERTEX_BUFFER
                    | vk::BufferUsageFlags::INDEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST,
            },
            device.clone(),
        )?;

        // Copied on the GPU as part of the first frame's submission
        let regions = context.store_buffer_data_cmd(
            &[bytemuck::cast_slice(&QUAD), bytemuck::cast_slice(&QUAD_INDICES)],
            &mut geometry,
        )?;
        let quad = StaticQuad {
            vertices: regions[0],
            indices: regions[1],
        };

        let opaque = GraphicsPipelineState::new(shader.shader().clone())
            .with_blend_mode(BlendMode::Disabled);
        let additive = GraphicsPipelineState::new(shader.shader().clone())
            .with_blend_mode(BlendMode::Additive);

        log::info!(
            "Renderer ready: {}x{}, {} virtual frames",
            extent.width,
            extent.height,
            context.virtual_frame_count(),
        );

        Ok(Self {
            context,
            target,
            geometry,
            quad,
            shader,
            opaque,
            additive,
            camera: Camera::new(),
            frame_number: 0,
            dev,
        })
    }

    pub fn draw(&mut self) -> Result<()> {
        if self.context.framebuffer() == vk::Framebuffer::null() {
            let view = self.target.view(self.context.frame_index())?;
            self.context.setup_framebuffer_attachments(&[view])?;
        }

        self.camera.orbit(self.frame_number as f32 * 0.05, 3.0);
        let viewproj = self.camera.get_viewproj_mat(self.target.aspect_ratio());

        let mut triangle = DrawCommand::new(self.opaque.clone());
        triangle
            .set_uniform(0, 0, &TransformData {
                mvp: viewproj * Mat4::from_translation(Vec3::new(-0.6, 0.0, 0.0)),
                color: Vec4::new(1.0, 0.3, 0.2, 1.0),
            })?
            .set_attribute(0, &TRIANGLE)?
            .set_num_vertices(TRIANGLE.len() as u32);

        let mut quad = DrawCommand::new(self.additive.clone());
        quad
            .set_uniform(0, 0, &TransformData {
                mvp: viewproj * Mat4::from_translation(Vec3::new(0.6, 0.0, 0.0)),
                color: Vec4::new(0.2, 0.4, 1.0, 1.0),
            })?
            .set_vertex_buffer(0, self.geometry.buffer(), self.quad.vertices.offset)?
            .set_index_buffer(self.geometry.buffer(), self.quad.indices.offset, QUAD_INDICES.len() as u32);

        let mut batch = RenderBatch::new(&mut self.context);
        batch.draw(&triangle)?.draw(&quad)?;
        batch.submit()?;

        self.context.submit_to_queue(&self.dev.graphics_queue.lock()?)?;
        self.context.swap()?;
        self.frame_number += 1;
        Ok(())
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn shader(&self) -> &GraphicsShader {
        &self.shader
    }

    pub fn context(&self) -> &RenderContext<AshDevice> {
        &self.context
    }
}
