//! Descriptor layouts, pools, and set updates
//!
//! Binding indices are a fixed contract with the shaders: lit objects use
//! binding 0 for the scene uniform buffer, binding 1 for the per-instance
//! dynamic uniform buffer, bindings 2 and 3 for the diffuse and specular
//! maps. The light-cube shader sees binding 0 only. One set per frame slot
//! points at that slot's buffers.

use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;

/// Builder for descriptor set layouts
pub struct DescriptorLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub fn uniform_buffer(mut self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stages)
                .build(),
        );
        self
    }

    pub fn dynamic_uniform_buffer(mut self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .descriptor_count(1)
                .stage_flags(stages)
                .build(),
        );
        self
    }

    pub fn combined_image_sampler(mut self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(stages)
                .build(),
        );
        self
    }

    pub fn build(self, device: &ash::Device) -> VulkanResult<DescriptorLayout> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(DescriptorLayout {
            layout,
            device: device.clone(),
        })
    }
}

impl Default for DescriptorLayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Layout for a lit, textured drawable.
pub fn lit_object_layout(device: &ash::Device) -> VulkanResult<DescriptorLayout> {
    DescriptorLayoutBuilder::new()
        .uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
        .dynamic_uniform_buffer(1, vk::ShaderStageFlags::VERTEX)
        .combined_image_sampler(2, vk::ShaderStageFlags::FRAGMENT)
        .combined_image_sampler(3, vk::ShaderStageFlags::FRAGMENT)
        .build(device)
}

/// Layout for the unlit light-cube indicator.
pub fn light_cube_layout(device: &ash::Device) -> VulkanResult<DescriptorLayout> {
    DescriptorLayoutBuilder::new()
        .uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
        .build(device)
}

/// Descriptor set layout with automatic cleanup
pub struct DescriptorLayout {
    layout: vk::DescriptorSetLayout,
    device: ash::Device,
}

impl DescriptorLayout {
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Fixed-size descriptor pool sized for the scene's sets
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: ash::Device,
}

impl DescriptorPool {
    pub fn new(device: ash::Device, max_sets: u32) -> VulkanResult<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: max_sets,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                descriptor_count: max_sets,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: max_sets * 2,
            },
        ];
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { device.create_descriptor_pool(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self { pool, device })
    }

    /// Allocate one set per provided layout handle. Sets live as long as
    /// the pool; they are never individually freed.
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);
        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(VulkanError::Api)
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Batches descriptor writes for one update call
pub struct DescriptorWriter {
    buffer_infos: Vec<Box<vk::DescriptorBufferInfo>>,
    image_infos: Vec<Box<vk::DescriptorImageInfo>>,
    writes: Vec<vk::WriteDescriptorSet>,
}

impl DescriptorWriter {
    pub fn new() -> Self {
        Self {
            buffer_infos: Vec::new(),
            image_infos: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn uniform_buffer(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) -> Self {
        self.push_buffer(set, binding, buffer, range, vk::DescriptorType::UNIFORM_BUFFER);
        self
    }

    /// Dynamic uniform binding: offset 0 here, the real offset arrives at
    /// bind time. `range` is the per-instance payload, not the stride.
    pub fn dynamic_uniform_buffer(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) -> Self {
        self.push_buffer(
            set,
            binding,
            buffer,
            range,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        );
        self
    }

    pub fn combined_image_sampler(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> Self {
        let info = Box::new(
            vk::DescriptorImageInfo::builder()
                .image_view(view)
                .sampler(sampler)
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .build(),
        );
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(std::slice::from_ref(&info))
            .build();
        self.image_infos.push(info);
        self.writes.push(write);
        self
    }

    fn push_buffer(
        &mut self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
        ty: vk::DescriptorType,
    ) {
        let info = Box::new(
            vk::DescriptorBufferInfo::builder()
                .buffer(buffer)
                .offset(0)
                .range(range)
                .build(),
        );
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(ty)
            .buffer_info(std::slice::from_ref(&info))
            .build();
        self.buffer_infos.push(info);
        self.writes.push(write);
    }

    pub fn update(self, device: &ash::Device) {
        unsafe {
            device.update_descriptor_sets(&self.writes, &[]);
        }
    }
}

impl Default for DescriptorWriter {
    fn default() -> Self {
        Self::new()
    }
}
