use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use ash::vk;
use crate::renderer::contexts::pipeline_ctx::shader::Shader;
use crate::renderer::internals::hash::hash_value;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Disabled,
    // Make sure transparent draws are recorded AFTER the opaque ones
    #[default]
    Alpha,
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FixedFunctionState {
    topology: vk::PrimitiveTopology,
    polygon_mode: vk::PolygonMode,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    depth_test: bool,
    depth_write: bool,
    depth_compare: vk::CompareOp,
    blend: BlendMode,
    samples: vk::SampleCountFlags,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: false,
            depth_write: false,
            depth_compare: vk::CompareOp::ALWAYS,
            blend: BlendMode::default(),
            samples: vk::SampleCountFlags::TYPE_1,
        }
    }
}

/// Everything needed to build a graphics pipeline, as a comparable value.
///
/// The shader takes part in equality and hashing through its identity hash only.
#[derive(Clone)]
pub struct GraphicsPipelineState {
    render_pass: vk::RenderPass,
    subpass: u32,
    fixed: FixedFunctionState,
    shader: Arc<Shader>,
}

impl GraphicsPipelineState {
    pub fn new(shader: Arc<Shader>) -> Self {
        Self {
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            fixed: FixedFunctionState::default(),
            shader,
        }
    }

    pub fn with_input_topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.fixed.topology = topology;
        self
    }

    pub fn with_polygon_mode(mut self, mode: vk::PolygonMode) -> Self {
        self.fixed.polygon_mode = mode;
        self
    }

    pub fn with_cull_mode(
        mut self,
        cull_mode: vk::CullModeFlags,
        front_face: vk::FrontFace,
    ) -> Self {
        self.fixed.cull_mode = cull_mode;
        self.fixed.front_face = front_face;
        self
    }

    pub fn with_blend_mode(mut self, blend: BlendMode) -> Self {
        self.fixed.blend = blend;
        self
    }

    pub fn with_sample_count(mut self, samples: vk::SampleCountFlags) -> Self {
        self.fixed.samples = samples;
        self
    }

    pub fn with_depth_test(
        mut self,
        enable: bool,
        compare: Option<vk::CompareOp>,
    ) -> Self {
        self.fixed.depth_test = enable;
        self.fixed.depth_write = enable;
        self.fixed.depth_compare = if enable {
            compare.unwrap_or(vk::CompareOp::LESS_OR_EQUAL)
        } else {
            vk::CompareOp::ALWAYS
        };
        self
    }

    pub fn set_render_pass(&mut self, render_pass: vk::RenderPass) {
        self.render_pass = render_pass;
    }

    pub fn set_subpass(&mut self, subpass: u32) {
        self.subpass = subpass;
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn subpass(&self) -> u32 {
        self.subpass
    }

    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.fixed.blend
    }

    pub fn calculate_hash(&self) -> u64 {
        hash_value(self)
    }

    pub fn input_assembly_info(&self) -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
        vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.fixed.topology)
            .primitive_restart_enable(false)
    }

    pub fn rasterization_info(&self) -> vk::PipelineRasterizationStateCreateInfo<'static> {
        vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.fixed.polygon_mode)
            .line_width(1.0)
            .cull_mode(self.fixed.cull_mode)
            .front_face(self.fixed.front_face)
            .depth_bias_enable(false)
    }

    pub fn multisample_info(&self) -> vk::PipelineMultisampleStateCreateInfo<'static> {
        vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(self.fixed.samples)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false)
    }

    pub fn depth_stencil_info(&self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.fixed.depth_test)
            .depth_write_enable(self.fixed.depth_write)
            .depth_compare_op(self.fixed.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
    }

    pub fn color_blend_attachment(&self) -> vk::PipelineColorBlendAttachmentState {
        let attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA);

        match self.fixed.blend {
            BlendMode::Disabled => attachment.blend_enable(false),
            BlendMode::Alpha => attachment
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD),
            BlendMode::Additive => attachment
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::ONE)
                .dst_color_blend_factor(vk::BlendFactor::DST_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD),
        }
    }
}

impl PartialEq for GraphicsPipelineState {
    fn eq(&self, other: &Self) -> bool {
        self.render_pass == other.render_pass
            && self.subpass == other.subpass
            && self.fixed == other.fixed
            && self.shader.id() == other.shader.id()
    }
}

impl Eq for GraphicsPipelineState {}

impl Hash for GraphicsPipelineState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.render_pass.hash(state);
        self.subpass.hash(state);
        self.fixed.hash(state);
        self.shader.id().hash(state);
    }
}

impl fmt::Debug for GraphicsPipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsPipelineState")
            .field("render_pass", &self.render_pass)
            .field("subpass", &self.subpass)
            .field("fixed", &self.fixed)
            .field("shader", &self.shader.name)
            .finish()
    }
}
