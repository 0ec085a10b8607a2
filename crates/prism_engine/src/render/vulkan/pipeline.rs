//! Graphics pipeline state
//!
//! One fixed-function configuration serves the whole scene: triangle lists,
//! dynamic viewport and scissor, back-face culling with clockwise front
//! faces (the projection matrix flips Y), depth testing with writes, MSAA
//! at the device maximum with per-sample shading, and no color blending.

use crate::render::vulkan::shader::ShaderModule;
use crate::render::vulkan::vertex::Vertex;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;
use std::ffi::CStr;

/// Graphics pipeline plus its layout
pub struct GraphicsPipeline {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    device: ash::Device,
}

impl GraphicsPipeline {
    pub fn new(
        device: ash::Device,
        render_pass: vk::RenderPass,
        descriptor_layout: vk::DescriptorSetLayout,
        vertex_shader: &ShaderModule,
        fragment_shader: &ShaderModule,
        msaa_samples: vk::SampleCountFlags,
    ) -> VulkanResult<Self> {
        let entry_point = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };
        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader.handle())
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_shader.handle())
                .name(entry_point)
                .build(),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic so the pipeline survives resizes.
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(msaa_samples)
            .sample_shading_enable(true)
            .min_sample_shading(0.2);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();
        let attachments = [blend_attachment];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&attachments);

        let set_layouts = [descriptor_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info.build()], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::Api(e));
            }
        };
        log::debug!("Graphics pipeline created ({:?} samples)", msaa_samples);

        Ok(Self {
            pipeline,
            layout,
            device,
        })
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
