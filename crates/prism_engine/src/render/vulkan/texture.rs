//! Sampled 2D textures with generated mip chains
//!
//! Pixels arrive as RGBA8 (decoded from disk by the `image` crate or built
//! procedurally), are staged into a device-local image, and the full mip
//! chain is produced on the GPU with a cascade of blits. The sampler runs
//! trilinear filtering at the device's maximum anisotropy.

use crate::render::vulkan::buffer::Buffer;
use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;
use std::path::Path;

/// Number of mip levels for a full chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Sampled image with view, sampler, and mip chain
pub struct Texture2D {
    sampler: vk::Sampler,
    view: vk::ImageView,
    image: vk::Image,
    memory: vk::DeviceMemory,
    mip_levels: u32,
    extent: vk::Extent2D,
    device: ash::Device,
}

impl Texture2D {
    /// Decode an image file and upload it.
    pub fn from_file(
        context: &VulkanContext,
        command_pool: &CommandPool,
        path: &Path,
    ) -> VulkanResult<Self> {
        let decoded = image::open(path)
            .map_err(|e| {
                VulkanError::ResourceNotFound(format!("{}: {}", path.display(), e))
            })?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        log::info!("Loaded texture {} ({}x{})", path.display(), width, height);
        Self::from_rgba8(context, command_pool, width, height, decoded.as_raw())
    }

    /// Upload raw RGBA8 pixels and generate the mip chain.
    pub fn from_rgba8(
        context: &VulkanContext,
        command_pool: &CommandPool,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> VulkanResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Pixel data is {} bytes, expected {} for {}x{} RGBA8",
                    pixels.len(),
                    expected,
                    width,
                    height
                ),
            });
        }

        let device = context.device().handle().clone();
        let memory_properties = &context.physical_device().memory_properties;
        let format = vk::Format::R8G8B8A8_SRGB;
        let mip_levels = mip_level_count(width, height);

        // Mip generation blits with linear filtering; the format must
        // support it or the cascade is undefined.
        let format_properties = unsafe {
            context
                .instance()
                .get_physical_device_format_properties(context.physical_device().device, format)
        };
        if !format_properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
        {
            return Err(VulkanError::InvalidOperation {
                reason: "Texture format does not support linear blit filtering".to_string(),
            });
        }

        let mut staging = Buffer::new(
            device.clone(),
            memory_properties,
            pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.map_persistent()?;
        staging.write_bytes(0, pixels)?;

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(
                vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
            )
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);
        let image = unsafe { device.create_image(&image_info, None) }
            .map_err(VulkanError::Api)?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type = crate::render::vulkan::buffer::find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory = unsafe { device.allocate_memory(&alloc_info, None) }
            .map_err(VulkanError::Api)?;
        unsafe { device.bind_image_memory(image, memory, 0) }.map_err(VulkanError::Api)?;

        let queue = context.device().graphics_queue();
        command_pool.execute_single_time(queue, |device, cmd| {
            // All mips to TRANSFER_DST before the initial copy.
            barrier(
                device,
                cmd,
                image,
                0,
                mip_levels,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
            );

            let region = vk::BufferImageCopy::builder()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                });
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    staging.handle(),
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region.build()],
                );
            }

            // Blit each level from the one above it, retiring finished
            // levels to SHADER_READ as we go.
            let mut src_width = width as i32;
            let mut src_height = height as i32;
            for level in 1..mip_levels {
                barrier(
                    device,
                    cmd,
                    image,
                    level - 1,
                    1,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::AccessFlags::TRANSFER_READ,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::TRANSFER,
                );

                let dst_width = (src_width / 2).max(1);
                let dst_height = (src_height / 2).max(1);
                let blit = vk::ImageBlit::builder()
                    .src_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: level - 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .src_offsets([
                        vk::Offset3D { x: 0, y: 0, z: 0 },
                        vk::Offset3D {
                            x: src_width,
                            y: src_height,
                            z: 1,
                        },
                    ])
                    .dst_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: level,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .dst_offsets([
                        vk::Offset3D { x: 0, y: 0, z: 0 },
                        vk::Offset3D {
                            x: dst_width,
                            y: dst_height,
                            z: 1,
                        },
                    ]);
                unsafe {
                    device.cmd_blit_image(
                        cmd,
                        image,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[blit.build()],
                        vk::Filter::LINEAR,
                    );
                }

                barrier(
                    device,
                    cmd,
                    image,
                    level - 1,
                    1,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    vk::AccessFlags::TRANSFER_READ,
                    vk::AccessFlags::SHADER_READ,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                );

                src_width = dst_width;
                src_height = dst_height;
            }

            // The last level never became a blit source.
            barrier(
                device,
                cmd,
                image,
                mip_levels - 1,
                1,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            );
        })?;

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe { device.create_image_view(&view_info, None) }
            .map_err(VulkanError::Api)?;

        let max_anisotropy = context
            .physical_device()
            .properties
            .limits
            .max_sampler_anisotropy;
        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(mip_levels as f32)
            .mip_lod_bias(0.0);
        let sampler = unsafe { device.create_sampler(&sampler_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self {
            sampler,
            view,
            image,
            memory,
            mip_levels,
            extent: vk::Extent2D { width, height },
            device,
        })
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Texture2D {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    base_mip: u32,
    mip_count: u32,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
) {
    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: base_mip,
            level_count: mip_count,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);
    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier.build()],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_reaches_one_by_one() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(1024, 1024), 11);
        assert_eq!(mip_level_count(512, 1024), 11);
        // Non-power-of-two rounds down, matching floor(log2) + 1.
        assert_eq!(mip_level_count(1000, 600), 10);
        assert_eq!(mip_level_count(0, 0), 1);
    }
}
