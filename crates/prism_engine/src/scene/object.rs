//! Drawable object bundles
//!
//! Each drawable owns its geometry buffers, pipeline, and one descriptor
//! set per frame slot. Everything is created at scene setup and only the
//! mapped uniform regions change afterwards; the buffers themselves are
//! never recreated.

use crate::render::vulkan::buffer::{IndexBuffer, UniformBuffer, VertexBuffer};
use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::descriptor::{DescriptorLayout, DescriptorPool, DescriptorWriter};
use crate::render::vulkan::dynamic_uniform::DynamicUniformArena;
use crate::render::vulkan::pipeline::GraphicsPipeline;
use crate::render::vulkan::renderer::{LightCubeUbo, SceneUbo};
use crate::render::vulkan::shader::ShaderModule;
use crate::render::vulkan::texture::Texture2D;
use crate::render::vulkan::VulkanResult;
use crate::scene::mesh::Mesh;
use ash::vk;
use std::path::Path;

/// Textured, lit drawable selecting its transforms from the dynamic
/// uniform arena
pub struct LitObject {
    descriptor_sets: Vec<vk::DescriptorSet>,
    pipeline: GraphicsPipeline,
    specular: Texture2D,
    diffuse: Texture2D,
    index_buffer: IndexBuffer,
    vertex_buffer: VertexBuffer,
    instance_index: usize,
}

impl LitObject {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: &VulkanContext,
        command_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        layout: &DescriptorLayout,
        render_pass: vk::RenderPass,
        scene_ubos: &[UniformBuffer<SceneUbo>],
        arena: &DynamicUniformArena,
        mesh: &Mesh,
        diffuse: Texture2D,
        specular: Texture2D,
        vertex_shader: &Path,
        fragment_shader: &Path,
        instance_index: usize,
    ) -> VulkanResult<Self> {
        let device = context.device().handle().clone();
        let memory_properties = &context.physical_device().memory_properties;
        let queue = context.device().graphics_queue();

        let vertex_buffer = VertexBuffer::new(
            device.clone(),
            memory_properties,
            command_pool,
            queue,
            &mesh.vertices,
        )?;
        let index_buffer = IndexBuffer::new(
            device.clone(),
            memory_properties,
            command_pool,
            queue,
            &mesh.indices,
        )?;

        let vert = ShaderModule::from_file(device.clone(), vertex_shader)?;
        let frag = ShaderModule::from_file(device.clone(), fragment_shader)?;
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass,
            layout.handle(),
            &vert,
            &frag,
            context.physical_device().msaa_samples,
        )?;

        let layouts = vec![layout.handle(); scene_ubos.len()];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;
        for (slot, &set) in descriptor_sets.iter().enumerate() {
            DescriptorWriter::new()
                .uniform_buffer(set, 0, scene_ubos[slot].handle(), scene_ubos[slot].range())
                .dynamic_uniform_buffer(
                    set,
                    1,
                    arena.buffer_handle(slot),
                    arena.descriptor_range(),
                )
                .combined_image_sampler(set, 2, diffuse.view(), diffuse.sampler())
                .combined_image_sampler(set, 3, specular.view(), specular.sampler())
                .update(&device);
        }

        Ok(Self {
            descriptor_sets,
            pipeline,
            specular,
            diffuse,
            index_buffer,
            vertex_buffer,
            instance_index,
        })
    }

    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    pub fn vertex_buffer(&self) -> &VertexBuffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &IndexBuffer {
        &self.index_buffer
    }

    pub fn descriptor_set(&self, frame_slot: usize) -> vk::DescriptorSet {
        self.descriptor_sets[frame_slot]
    }

    pub fn instance_index(&self) -> usize {
        self.instance_index
    }

    pub fn diffuse(&self) -> &Texture2D {
        &self.diffuse
    }

    pub fn specular(&self) -> &Texture2D {
        &self.specular
    }
}

/// Unlit indicator cube drawn at the point light's position
pub struct LightCube {
    descriptor_sets: Vec<vk::DescriptorSet>,
    pipeline: GraphicsPipeline,
    ubos: Vec<UniformBuffer<LightCubeUbo>>,
    index_buffer: IndexBuffer,
    vertex_buffer: VertexBuffer,
}

impl LightCube {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: &VulkanContext,
        command_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        layout: &DescriptorLayout,
        render_pass: vk::RenderPass,
        mesh: &Mesh,
        vertex_shader: &Path,
        fragment_shader: &Path,
        frames_in_flight: usize,
    ) -> VulkanResult<Self> {
        let device = context.device().handle().clone();
        let memory_properties = &context.physical_device().memory_properties;
        let queue = context.device().graphics_queue();

        let vertex_buffer = VertexBuffer::new(
            device.clone(),
            memory_properties,
            command_pool,
            queue,
            &mesh.vertices,
        )?;
        let index_buffer = IndexBuffer::new(
            device.clone(),
            memory_properties,
            command_pool,
            queue,
            &mesh.indices,
        )?;

        let mut ubos = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            ubos.push(UniformBuffer::new(device.clone(), memory_properties)?);
        }

        let vert = ShaderModule::from_file(device.clone(), vertex_shader)?;
        let frag = ShaderModule::from_file(device.clone(), fragment_shader)?;
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass,
            layout.handle(),
            &vert,
            &frag,
            context.physical_device().msaa_samples,
        )?;

        let layouts = vec![layout.handle(); frames_in_flight];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;
        for (slot, &set) in descriptor_sets.iter().enumerate() {
            DescriptorWriter::new()
                .uniform_buffer(set, 0, ubos[slot].handle(), ubos[slot].range())
                .update(&device);
        }

        Ok(Self {
            descriptor_sets,
            pipeline,
            ubos,
            index_buffer,
            vertex_buffer,
        })
    }

    /// Publish this frame slot's model-view-projection.
    pub fn write_transform(&self, frame_slot: usize, ubo: &LightCubeUbo) -> VulkanResult<()> {
        self.ubos[frame_slot].write(ubo)
    }

    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    pub fn vertex_buffer(&self) -> &VertexBuffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &IndexBuffer {
        &self.index_buffer
    }

    pub fn descriptor_set(&self, frame_slot: usize) -> vk::DescriptorSet {
        self.descriptor_sets[frame_slot]
    }
}
