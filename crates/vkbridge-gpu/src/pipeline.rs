//! Compute and render pipeline construction.
//!
//! Construction sets are plain owned data. Native create-info structures are
//! only assembled inside `build`, so sets can be freely cloned, stored and
//! tweaked between builds. Shader modules referenced by a set stay owned by
//! the caller.

use crate::error::{GpuError, Result};
use crate::resource::{GpuResource, ResourceKind};
use crate::util::vk_result_str;
use ash::vk;
use ash::vk::Handle;
use std::ffi::CString;

/// Default shader entry point.
pub const DEFAULT_ENTRY: &std::ffi::CStr = c"main";

/// Specialization constants for one shader stage.
#[derive(Debug, Clone, Default)]
pub struct SpecializationData {
    entries: Vec<vk::SpecializationMapEntry>,
    data: Vec<u8>,
}

impl SpecializationData {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` as constant `constant_id`.
    pub fn push<T: bytemuck::Pod>(&mut self, constant_id: u32, value: T) -> &mut Self {
        let bytes = bytemuck::bytes_of(&value);
        self.entries.push(vk::SpecializationMapEntry {
            constant_id,
            offset: self.data.len() as u32,
            size: bytes.len(),
        });
        self.data.extend_from_slice(bytes);
        self
    }

    /// Concatenate two sets; the entries of `b` are shifted past the data of `a`.
    pub fn concat(a: &Self, b: &Self) -> Self {
        let shift = a.data.len() as u32;
        let entries = a
            .entries
            .iter()
            .copied()
            .chain(b.entries.iter().map(|entry| vk::SpecializationMapEntry {
                offset: entry.offset + shift,
                ..*entry
            }))
            .collect();

        let mut data = Vec::with_capacity(a.data.len() + b.data.len());
        data.extend_from_slice(&a.data);
        data.extend_from_slice(&b.data);

        Self { entries, data }
    }

    /// Map entries, one per constant.
    pub fn entries(&self) -> &[vk::SpecializationMapEntry] {
        &self.entries
    }

    /// Packed constant values.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether no constant was pushed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Borrow as a native specialization info.
    pub fn as_info(&self) -> vk::SpecializationInfo<'_> {
        vk::SpecializationInfo::default()
            .map_entries(&self.entries)
            .data(&self.data)
    }
}

/// One programmable stage of a pipeline.
#[derive(Debug, Clone)]
pub struct ShaderStage {
    /// Single stage bit this shader runs at.
    pub stage: vk::ShaderStageFlags,
    /// Module owned by the caller.
    pub module: vk::ShaderModule,
    /// Entry point name.
    pub entry: CString,
    /// Constants applied at pipeline creation.
    pub specialization: Option<SpecializationData>,
}

impl ShaderStage {
    /// A stage using the `main` entry point and no specialization.
    pub fn new(stage: vk::ShaderStageFlags, module: vk::ShaderModule) -> Self {
        Self {
            stage,
            module,
            entry: DEFAULT_ENTRY.to_owned(),
            specialization: None,
        }
    }

    /// Use `entry` as the entry point.
    ///
    /// Fails when the name contains an interior nul byte.
    pub fn with_entry(mut self, entry: &str) -> Result<Self> {
        self.entry = CString::new(entry)?;
        Ok(self)
    }

    /// Attach specialization constants.
    pub fn with_specialization(mut self, specialization: SpecializationData) -> Self {
        self.specialization = Some(specialization);
        self
    }
}

/// Descriptor set layouts and push constants of a pipeline layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutInfo {
    /// Descriptor set layouts in set order.
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Push constant ranges.
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl LayoutInfo {
    /// Layout from set layouts and push constant ranges.
    pub fn new(
        set_layouts: Vec<vk::DescriptorSetLayout>,
        push_constant_ranges: Vec<vk::PushConstantRange>,
    ) -> Self {
        Self {
            set_layouts,
            push_constant_ranges,
        }
    }

    /// Create the pipeline layout.
    ///
    /// # Safety
    /// The device and every set layout must be valid.
    pub unsafe fn create(&self, device: &ash::Device) -> Result<vk::PipelineLayout> {
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&self.set_layouts)
            .push_constant_ranges(&self.push_constant_ranges);

        device
            .create_pipeline_layout(&layout_info, None)
            .map_err(|e| GpuError::PipelineCreation(vk_result_str(e).to_string()))
    }
}

/// Assemble the native stage info for `stage`; `specialization` must be the
/// borrowed info of `stage.specialization`.
fn stage_create_info<'a>(
    stage: &'a ShaderStage,
    specialization: Option<&'a vk::SpecializationInfo<'a>>,
) -> vk::PipelineShaderStageCreateInfo<'a> {
    let info = vk::PipelineShaderStageCreateInfo::default()
        .stage(stage.stage)
        .module(stage.module)
        .name(&stage.entry);
    match specialization {
        Some(specialization) => info.specialization_info(specialization),
        None => info,
    }
}

/// Compute pipeline: pipeline handle plus its layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputePipeline {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl ComputePipeline {
    /// Wrap existing handles. Ownership passes to the returned value.
    pub fn from_raw(pipeline: vk::Pipeline, layout: vk::PipelineLayout) -> Self {
        Self { pipeline, layout }
    }

    /// Raw pipeline handle.
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Layout the pipeline was created with.
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Destroy the pipeline and its layout.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_pipeline_layout(self.layout, None);
    }
}

impl GpuResource for ComputePipeline {
    type Raw = vk::Pipeline;

    const KIND: ResourceKind = ResourceKind::ComputePipeline;

    fn is_valid(&self) -> bool {
        !self.pipeline.is_null() && !self.layout.is_null()
    }

    fn get(&self) -> vk::Pipeline {
        self.pipeline
    }
}

/// Everything needed to create a compute pipeline.
#[derive(Debug, Clone, Default)]
pub struct ComputeConstructionSet {
    /// The compute stage; `build` fails without one.
    pub stage: Option<ShaderStage>,
    /// Layout created alongside the pipeline.
    pub layout: LayoutInfo,
    /// Pipeline creation flags.
    pub flags: vk::PipelineCreateFlags,
}

/// Builds [`ComputePipeline`]s from a [`ComputeConstructionSet`].
#[derive(Debug, Clone, Default)]
pub struct ComputePipelineBuilder {
    set: ComputeConstructionSet,
}

impl ComputePipelineBuilder {
    /// Builder over an existing construction set.
    pub fn new(set: ComputeConstructionSet) -> Self {
        Self { set }
    }

    /// Use `module` with entry `main` and no specialization.
    pub fn prepare_unspecialized(set: &mut ComputeConstructionSet, module: vk::ShaderModule) {
        set.stage = Some(ShaderStage::new(vk::ShaderStageFlags::COMPUTE, module));
    }

    /// Use a fully described stage.
    pub fn prepare_with_stage(set: &mut ComputeConstructionSet, stage: ShaderStage) {
        set.stage = Some(stage);
    }

    /// The set `build` reads from.
    pub fn construction_set(&self) -> &ComputeConstructionSet {
        &self.set
    }

    pub fn construction_set_mut(&mut self) -> &mut ComputeConstructionSet {
        &mut self.set
    }

    fn stage(&self) -> Result<&ShaderStage> {
        self.set
            .stage
            .as_ref()
            .ok_or_else(|| GpuError::PipelineCreation("compute stage not set".to_string()))
    }

    /// Create the layout and the pipeline.
    ///
    /// # Safety
    /// The device and the stage's shader module must be valid.
    pub unsafe fn build(&self, device: &ash::Device) -> Result<ComputePipeline> {
        let stage = self.stage()?;
        let layout = self.set.layout.create(device)?;

        let specialization = stage.specialization.as_ref().map(SpecializationData::as_info);
        let stage_info = stage_create_info(stage, specialization.as_ref());

        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .flags(self.set.flags)
            .stage(stage_info)
            .layout(layout);

        let pipeline = match device.create_compute_pipelines(
            vk::PipelineCache::null(),
            &[pipeline_info],
            None,
        ) {
            Ok(pipelines) => pipelines.into_iter().next(),
            Err((_pipelines, e)) => {
                device.destroy_pipeline_layout(layout, None);
                return Err(GpuError::PipelineCreation(vk_result_str(e).to_string()));
            }
        };

        let Some(pipeline) = pipeline else {
            device.destroy_pipeline_layout(layout, None);
            return Err(GpuError::PipelineCreation("no pipeline returned".to_string()));
        };

        tracing::debug!("Created compute pipeline {:?}", pipeline);
        Ok(ComputePipeline::from_raw(pipeline, layout))
    }
}

/// A compute pipeline with the command buffer and shader module it runs with.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeStage {
    /// The pipeline and its layout.
    pub pipeline: ComputePipeline,
    /// Buffer recorded with the dispatch.
    pub command_buffer: vk::CommandBuffer,
    /// Module destroyed together with the stage.
    pub shader_module: vk::ShaderModule,
}

impl ComputeStage {
    /// Build an unspecialized compute pipeline for `shader_module`.
    ///
    /// # Safety
    /// All handles must be valid and belong to `device`.
    pub unsafe fn new(
        device: &ash::Device,
        shader_module: vk::ShaderModule,
        layout: LayoutInfo,
        command_buffer: vk::CommandBuffer,
    ) -> Result<Self> {
        let mut set = ComputeConstructionSet {
            layout,
            ..Default::default()
        };
        ComputePipelineBuilder::prepare_unspecialized(&mut set, shader_module);
        let pipeline = ComputePipelineBuilder::new(set).build(device)?;

        Ok(Self {
            pipeline,
            command_buffer,
            shader_module,
        })
    }

    /// Destroy the pipeline and the shader module. The command buffer is
    /// returned with its pool.
    ///
    /// # Safety
    /// The device must be valid and nothing may still use the stage.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        self.pipeline.destroy(device);
        device.destroy_shader_module(self.shader_module, None);
    }
}

/// Where a render pipeline draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    /// A subpass of a classic render pass.
    RenderPass {
        render_pass: vk::RenderPass,
        subpass: u32,
    },
    /// Dynamic rendering with the given attachment formats.
    Dynamic {
        color_formats: Vec<vk::Format>,
        depth_format: Option<vk::Format>,
        stencil_format: Option<vk::Format>,
    },
}

impl RenderTarget {
    /// Number of colour attachments, when known from the target.
    pub fn color_attachment_count(&self) -> Option<usize> {
        match self {
            Self::RenderPass { .. } => None,
            Self::Dynamic { color_formats, .. } => Some(color_formats.len()),
        }
    }
}

/// Everything needed to create a render pipeline.
#[derive(Debug, Clone)]
pub struct RenderConstructionSet {
    /// Shader stages, at least one.
    pub stages: Vec<ShaderStage>,
    /// Layout created alongside the pipeline.
    pub layout: LayoutInfo,
    /// Vertex buffer bindings.
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Vertex attributes read from the bindings.
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Primitive topology of the input assembly.
    pub topology: vk::PrimitiveTopology,
    /// Whether a special index restarts strips and fans.
    pub primitive_restart: bool,
    /// Empty when the viewport is dynamic.
    pub viewports: Vec<vk::Viewport>,
    /// Empty when the scissor is dynamic.
    pub scissors: Vec<vk::Rect2D>,
    /// Rasterization state.
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub line_width: f32,
    pub samples: vk::SampleCountFlags,
    /// Depth and stencil state; `None` disables both tests.
    pub depth_stencil: Option<vk::PipelineDepthStencilStateCreateInfo<'static>>,
    /// Blend state, one entry per colour attachment.
    pub color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    /// Constants used by `CONSTANT_*` blend factors.
    pub blend_constants: [f32; 4],
    /// State set at record time instead of baked in.
    pub dynamic_states: Vec<vk::DynamicState>,
    /// Render pass or dynamic rendering formats.
    pub target: RenderTarget,
    /// Pipeline creation flags.
    pub flags: vk::PipelineCreateFlags,
}

impl Default for RenderConstructionSet {
    fn default() -> Self {
        let color_formats = vec![vk::Format::B8G8R8A8_SRGB];
        Self {
            stages: Vec::new(),
            layout: LayoutInfo::default(),
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart: false,
            viewports: Vec::new(),
            scissors: Vec::new(),
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            line_width: 1.0,
            samples: vk::SampleCountFlags::TYPE_1,
            depth_stencil: Some(default_depth_stencil()),
            color_blend_attachments: opaque_attachments(color_formats.len()),
            blend_constants: [0.0; 4],
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            target: RenderTarget::Dynamic {
                color_formats,
                depth_format: Some(vk::Format::D32_SFLOAT),
                stencil_format: None,
            },
            flags: vk::PipelineCreateFlags::empty(),
        }
    }
}

fn default_depth_stencil() -> vk::PipelineDepthStencilStateCreateInfo<'static> {
    vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false)
}

fn opaque_attachments(count: usize) -> Vec<vk::PipelineColorBlendAttachmentState> {
    vec![
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA);
        count
    ]
}

/// Render pipeline: pipeline handle plus its layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderPipeline {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl RenderPipeline {
    /// Wrap existing handles. Ownership passes to the returned value.
    pub fn from_raw(pipeline: vk::Pipeline, layout: vk::PipelineLayout) -> Self {
        Self { pipeline, layout }
    }

    /// Raw pipeline handle.
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Layout the pipeline was created with.
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Destroy the pipeline and its layout.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_pipeline_layout(self.layout, None);
    }
}

impl GpuResource for RenderPipeline {
    type Raw = vk::Pipeline;

    const KIND: ResourceKind = ResourceKind::RenderPipeline;

    fn is_valid(&self) -> bool {
        !self.pipeline.is_null() && !self.layout.is_null()
    }

    fn get(&self) -> vk::Pipeline {
        self.pipeline
    }
}

/// Builds [`RenderPipeline`]s from a [`RenderConstructionSet`].
#[derive(Debug, Clone, Default)]
pub struct RenderPipelineBuilder {
    set: RenderConstructionSet,
}

impl RenderPipelineBuilder {
    /// Builder over an existing construction set.
    pub fn new(set: RenderConstructionSet) -> Self {
        Self { set }
    }

    /// Reset all fixed-function state to the defaults, keeping stages, layout
    /// and vertex input.
    pub fn prepare_defaults(set: &mut RenderConstructionSet) {
        let defaults = RenderConstructionSet::default();
        *set = RenderConstructionSet {
            stages: std::mem::take(&mut set.stages),
            layout: std::mem::take(&mut set.layout),
            vertex_bindings: std::mem::take(&mut set.vertex_bindings),
            vertex_attributes: std::mem::take(&mut set.vertex_attributes),
            ..defaults
        };
    }

    /// Use `vertex` and `fragment` with entry `main` as the only stages.
    pub fn prepare_vertex_fragment(
        set: &mut RenderConstructionSet,
        vertex: vk::ShaderModule,
        fragment: vk::ShaderModule,
    ) {
        set.stages = vec![
            ShaderStage::new(vk::ShaderStageFlags::VERTEX, vertex),
            ShaderStage::new(vk::ShaderStageFlags::FRAGMENT, fragment),
        ];
    }

    /// Bake a full-extent viewport and scissor into the pipeline.
    pub fn prepare_fixed_viewport(set: &mut RenderConstructionSet, extent: vk::Extent2D) {
        set.viewports = vec![vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        set.scissors = vec![vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        }];
        set.dynamic_states.retain(|state| {
            *state != vk::DynamicState::VIEWPORT && *state != vk::DynamicState::SCISSOR
        });
    }

    /// `count` colour attachments writing RGBA without blending.
    pub fn prepare_opaque_color_attachments(set: &mut RenderConstructionSet, count: usize) {
        set.color_blend_attachments = opaque_attachments(count);
    }

    /// The set `build` reads from.
    pub fn construction_set(&self) -> &RenderConstructionSet {
        &self.set
    }

    pub fn construction_set_mut(&mut self) -> &mut RenderConstructionSet {
        &mut self.set
    }

    fn validate(&self) -> Result<()> {
        if self.set.stages.is_empty() {
            return Err(GpuError::PipelineCreation(
                "render pipeline has no shader stages".to_string(),
            ));
        }
        if let Some(count) = self.set.target.color_attachment_count() {
            if count != self.set.color_blend_attachments.len() {
                return Err(GpuError::PipelineCreation(format!(
                    "{count} colour formats but {} blend attachments",
                    self.set.color_blend_attachments.len()
                )));
            }
        }
        Ok(())
    }

    /// Create the layout and the pipeline.
    ///
    /// # Safety
    /// The device, shader modules and render pass (if any) must be valid.
    pub unsafe fn build(&self, device: &ash::Device) -> Result<RenderPipeline> {
        self.validate()?;
        let set = &self.set;
        let layout = set.layout.create(device)?;

        let specializations: Vec<Option<vk::SpecializationInfo<'_>>> = set
            .stages
            .iter()
            .map(|stage| stage.specialization.as_ref().map(SpecializationData::as_info))
            .collect();
        let stages: Vec<vk::PipelineShaderStageCreateInfo<'_>> = set
            .stages
            .iter()
            .zip(&specializations)
            .map(|(stage, specialization)| stage_create_info(stage, specialization.as_ref()))
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&set.vertex_bindings)
            .vertex_attribute_descriptions(&set.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(set.topology)
            .primitive_restart_enable(set.primitive_restart);

        // Dynamic viewports and scissors still need a count
        let mut viewport_state = vk::PipelineViewportStateCreateInfo::default();
        viewport_state = if set.viewports.is_empty() {
            viewport_state.viewport_count(1)
        } else {
            viewport_state.viewports(&set.viewports)
        };
        viewport_state = if set.scissors.is_empty() {
            viewport_state.scissor_count(1)
        } else {
            viewport_state.scissors(&set.scissors)
        };

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(set.polygon_mode)
            .cull_mode(set.cull_mode)
            .front_face(set.front_face)
            .depth_bias_enable(false)
            .line_width(set.line_width);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(set.samples)
            .sample_shading_enable(false);

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&set.color_blend_attachments)
            .blend_constants(set.blend_constants);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&set.dynamic_states);

        let mut rendering_info = vk::PipelineRenderingCreateInfo::default();
        if let RenderTarget::Dynamic {
            color_formats,
            depth_format,
            stencil_format,
        } = &set.target
        {
            rendering_info = rendering_info
                .color_attachment_formats(color_formats)
                .depth_attachment_format(depth_format.unwrap_or(vk::Format::UNDEFINED))
                .stencil_attachment_format(stencil_format.unwrap_or(vk::Format::UNDEFINED));
        }

        let mut pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .flags(set.flags)
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout);

        if let Some(depth_stencil) = set.depth_stencil.as_ref() {
            pipeline_info = pipeline_info.depth_stencil_state(depth_stencil);
        }

        pipeline_info = match &set.target {
            RenderTarget::RenderPass {
                render_pass,
                subpass,
            } => pipeline_info.render_pass(*render_pass).subpass(*subpass),
            RenderTarget::Dynamic { .. } => pipeline_info.push_next(&mut rendering_info),
        };

        let pipeline = match device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[pipeline_info],
            None,
        ) {
            Ok(pipelines) => pipelines.into_iter().next(),
            Err((_pipelines, e)) => {
                device.destroy_pipeline_layout(layout, None);
                return Err(GpuError::PipelineCreation(vk_result_str(e).to_string()));
            }
        };

        let Some(pipeline) = pipeline else {
            device.destroy_pipeline_layout(layout, None);
            return Err(GpuError::PipelineCreation("no pipeline returned".to_string()));
        };

        tracing::debug!(
            "Created render pipeline {:?} with {} stages",
            pipeline,
            stages.len()
        );
        Ok(RenderPipeline::from_raw(pipeline, layout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialization_offsets_follow_data() {
        let mut data = SpecializationData::new();
        data.push(0, 16u32).push(1, 2.5f32).push(2, 7u64);

        let offsets: Vec<_> = data.entries().iter().map(|e| (e.offset, e.size)).collect();
        assert_eq!(offsets, vec![(0, 4), (4, 4), (8, 8)]);
        assert_eq!(data.data().len(), 16);
    }

    #[test]
    fn concat_shifts_second_set() {
        let mut a = SpecializationData::new();
        a.push(0, 1u32).push(1, 2u32);
        let mut b = SpecializationData::new();
        b.push(5, 3u16);

        let joined = SpecializationData::concat(&a, &b);

        let entries: Vec<_> = joined
            .entries()
            .iter()
            .map(|e| (e.constant_id, e.offset, e.size))
            .collect();
        assert_eq!(entries, vec![(0, 0, 4), (1, 4, 4), (5, 8, 2)]);
        assert_eq!(&joined.data()[8..], &3u16.to_ne_bytes());

        let info = joined.as_info();
        assert_eq!(info.map_entry_count, 3);
        assert_eq!(info.data_size, 10);
    }

    #[test]
    fn unspecialized_compute_stage_uses_main() {
        let mut set = ComputeConstructionSet::default();
        ComputePipelineBuilder::prepare_unspecialized(&mut set, vk::ShaderModule::from_raw(9));

        let stage = set.stage.as_ref().unwrap();
        assert_eq!(stage.stage, vk::ShaderStageFlags::COMPUTE);
        assert_eq!(stage.entry.as_c_str(), DEFAULT_ENTRY);
        assert!(stage.specialization.is_none());
    }

    #[test]
    fn compute_build_needs_a_stage() {
        let builder = ComputePipelineBuilder::default();
        assert!(matches!(builder.stage(), Err(GpuError::PipelineCreation(_))));
    }

    #[test]
    fn stage_info_carries_specialization() {
        let mut data = SpecializationData::new();
        data.push(3, 1u32);
        let stage = ShaderStage::new(vk::ShaderStageFlags::COMPUTE, vk::ShaderModule::from_raw(1))
            .with_specialization(data);

        let specialization = stage.specialization.as_ref().map(SpecializationData::as_info);
        let info = stage_create_info(&stage, specialization.as_ref());
        assert!(!info.p_specialization_info.is_null());
        assert_eq!(info.stage, vk::ShaderStageFlags::COMPUTE);
    }

    #[test]
    fn fixed_viewport_drops_dynamic_state() {
        let mut set = RenderConstructionSet::default();
        RenderPipelineBuilder::prepare_fixed_viewport(
            &mut set,
            vk::Extent2D {
                width: 640,
                height: 480,
            },
        );

        assert!(set.dynamic_states.is_empty());
        assert_eq!(set.viewports[0].width, 640.0);
        assert_eq!(set.scissors[0].extent.height, 480);
    }

    #[test]
    fn defaults_keep_stages_and_reset_state() {
        let mut set = RenderConstructionSet::default();
        RenderPipelineBuilder::prepare_vertex_fragment(
            &mut set,
            vk::ShaderModule::from_raw(1),
            vk::ShaderModule::from_raw(2),
        );
        set.cull_mode = vk::CullModeFlags::NONE;
        set.topology = vk::PrimitiveTopology::LINE_LIST;

        RenderPipelineBuilder::prepare_defaults(&mut set);

        assert_eq!(set.stages.len(), 2);
        assert_eq!(set.stages[1].stage, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(set.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(set.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
    }

    #[test]
    fn render_validation_checks_stages_and_attachments() {
        let mut builder = RenderPipelineBuilder::default();
        assert!(builder.validate().is_err());

        RenderPipelineBuilder::prepare_vertex_fragment(
            builder.construction_set_mut(),
            vk::ShaderModule::from_raw(1),
            vk::ShaderModule::from_raw(2),
        );
        assert!(builder.validate().is_ok());

        RenderPipelineBuilder::prepare_opaque_color_attachments(builder.construction_set_mut(), 3);
        assert!(builder.validate().is_err());

        builder.construction_set_mut().target = RenderTarget::RenderPass {
            render_pass: vk::RenderPass::from_raw(5),
            subpass: 0,
        };
        assert!(builder.validate().is_ok());
        assert_eq!(builder.construction_set().color_blend_attachments.len(), 3);
    }

    #[test]
    fn pipelines_need_both_handles() {
        let pipeline =
            ComputePipeline::from_raw(vk::Pipeline::from_raw(1), vk::PipelineLayout::null());
        assert!(!pipeline.is_valid());

        let pipeline =
            RenderPipeline::from_raw(vk::Pipeline::from_raw(1), vk::PipelineLayout::from_raw(2));
        assert!(pipeline.is_valid());
        assert_eq!(pipeline.kind(), ResourceKind::RenderPipeline);
        assert!(!RenderPipeline::default().is_valid());
    }
}
