//! Swapchain lifecycle
//!
//! Owns the presentable image chain together with everything that must be
//! rebuilt when the surface changes: image views, the multisampled color
//! target, the depth target, and the framebuffers. The render pass is
//! format-dependent but extent-independent, so it is created once and
//! survives every recreation — pipelines built against it stay valid.
//!
//! Format, present-mode, extent, and image-count selection are pure
//! functions over the queried surface capabilities so the policies can be
//! tested without a device.

use crate::render::vulkan::buffer::find_memory_type;
use crate::render::vulkan::commands::{ActiveRenderPass, CommandRecorder};
use crate::render::vulkan::context::{SwapchainSupportDetails, VulkanContext};
use crate::render::vulkan::render_pass::RenderPass;
use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::window::Window;
use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;

/// Outcome of an acquire or present call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// The image is usable
    Ready(u32),
    /// The surface no longer matches the swapchain; recreate and skip
    Stale,
}

/// Prefer an 8-bit SRGB format with the standard non-linear color space,
/// falling back to whatever the surface reports first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// Prefer mailbox (low latency, no tearing); FIFO is the guaranteed
/// fallback.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Use the surface's current extent unless it reports the "undefined"
/// sentinel, in which case clamp the framebuffer pixel size to the
/// supported range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer_size.0.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: framebuffer_size.1.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One above the minimum so the driver never starves acquire, capped at the
/// reported maximum (zero means unlimited).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count = count.min(capabilities.max_image_count);
    }
    count
}

/// First depth format the device renders to with optimal tiling.
fn find_depth_format(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> VulkanResult<vk::Format> {
    let candidates = [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ];
    for format in candidates {
        let props =
            unsafe { instance.get_physical_device_format_properties(physical_device, format) };
        if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return Ok(format);
        }
    }
    Err(VulkanError::InitializationFailed(
        "No supported depth format".to_string(),
    ))
}

/// Image + memory + view for a render target attachment
struct AttachmentImage {
    view: vk::ImageView,
    image: vk::Image,
    memory: vk::DeviceMemory,
    device: ash::Device,
}

impl AttachmentImage {
    fn new(
        device: ash::Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(samples);
        let image = unsafe { device.create_image(&image_info, None) }
            .map_err(VulkanError::Api)?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type = find_memory_type(
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

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe { device.create_image_view(&view_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self {
            view,
            image,
            memory,
            device,
        })
    }
}

impl Drop for AttachmentImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Everything that gets torn down and rebuilt on recreation
struct ChainResources {
    framebuffers: Vec<vk::Framebuffer>,
    depth: AttachmentImage,
    color: AttachmentImage,
    image_views: Vec<vk::ImageView>,
    swapchain: vk::SwapchainKHR,
    extent: vk::Extent2D,
}

/// Presentable image chain with its attachments and framebuffers
pub struct Swapchain {
    resources: ChainResources,
    render_pass: RenderPass,
    format: vk::SurfaceFormatKHR,
    depth_format: vk::Format,
    loader: SwapchainLoader,
    device: ash::Device,
}

impl Swapchain {
    pub fn new(context: &VulkanContext, window: &Window) -> VulkanResult<Self> {
        let device = context.device().handle().clone();
        let loader = context.device().swapchain_loader().clone();

        let support = context.swapchain_support()?;
        let format = choose_surface_format(&support.formats).ok_or_else(|| {
            VulkanError::InitializationFailed("Surface reports no formats".to_string())
        })?;
        let depth_format =
            find_depth_format(context.instance(), context.physical_device().device)?;
        let render_pass = RenderPass::new(
            device.clone(),
            format.format,
            depth_format,
            context.physical_device().msaa_samples,
        )?;

        let resources = Self::build_chain(
            context,
            &loader,
            &support,
            format,
            depth_format,
            render_pass.handle(),
            window.get_framebuffer_size(),
            vk::SwapchainKHR::null(),
        )?;

        Ok(Self {
            resources,
            render_pass,
            format,
            depth_format,
            loader,
            device,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_chain(
        context: &VulkanContext,
        loader: &SwapchainLoader,
        support: &SwapchainSupportDetails,
        format: vk::SurfaceFormatKHR,
        depth_format: vk::Format,
        render_pass: vk::RenderPass,
        framebuffer_size: (u32, u32),
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<ChainResources> {
        let device = context.device().handle().clone();
        let extent = choose_extent(&support.capabilities, framebuffer_size);
        let present_mode = choose_present_mode(&support.present_modes);
        let image_count = choose_image_count(&support.capabilities);

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let family_indices = [
            context.device().graphics_family(),
            context.device().present_family(),
        ];
        if family_indices[0] != family_indices[1] {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices);
        } else {
            create_info = create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE);
        }

        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(VulkanError::Api)?;
        let images = unsafe { loader.get_swapchain_images(swapchain) }
            .map_err(VulkanError::Api)?;

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { device.create_image_view(&view_info, None) }
                .map_err(VulkanError::Api)?;
            image_views.push(view);
        }

        let memory_properties = &context.physical_device().memory_properties;
        let samples = context.physical_device().msaa_samples;
        let color = AttachmentImage::new(
            device.clone(),
            memory_properties,
            extent,
            format.format,
            samples,
            vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            vk::ImageAspectFlags::COLOR,
        )?;
        let depth = AttachmentImage::new(
            device.clone(),
            memory_properties,
            extent,
            depth_format,
            samples,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?;

        let mut framebuffers = Vec::with_capacity(image_views.len());
        for &view in &image_views {
            // Attachment order matches the render pass: MSAA color, depth,
            // resolve target.
            let attachments = [color.view, depth.view, view];
            let fb_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe { device.create_framebuffer(&fb_info, None) }
                .map_err(VulkanError::Api)?;
            framebuffers.push(framebuffer);
        }

        log::info!(
            "Swapchain built: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            images.len(),
            format.format,
            present_mode
        );

        Ok(ChainResources {
            framebuffers,
            depth,
            color,
            image_views,
            swapchain,
            extent,
        })
    }

    /// Tear down and rebuild everything except the render pass.
    ///
    /// Blocks while the window is minimized: a zero-extent swapchain is
    /// invalid, so we sleep on the event queue until the window comes back.
    /// Waits for the device to go idle before destroying anything, since
    /// in-flight frames may still reference the old images.
    pub fn recreate(&mut self, context: &VulkanContext, window: &mut Window) -> VulkanResult<()> {
        while window.is_minimized() {
            window.wait_events();
        }

        context.device().wait_idle()?;

        let support = context.swapchain_support()?;
        let new_resources = Self::build_chain(
            context,
            &self.loader,
            &support,
            self.format,
            self.depth_format,
            self.render_pass.handle(),
            window.get_framebuffer_size(),
            self.resources.swapchain,
        )?;

        let old = std::mem::replace(&mut self.resources, new_resources);
        self.destroy_resources(old);
        Ok(())
    }

    fn destroy_resources(&self, resources: ChainResources) {
        unsafe {
            for framebuffer in &resources.framebuffers {
                self.device.destroy_framebuffer(*framebuffer, None);
            }
            for view in &resources.image_views {
                self.device.destroy_image_view(*view, None);
            }
            self.loader.destroy_swapchain(resources.swapchain, None);
        }
        // color and depth attachments release themselves on drop
    }

    /// Request the next presentable image, signaling `semaphore` when it is
    /// ready to be written. An out-of-date surface is reported as `Stale`,
    /// never as an error.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VulkanResult<SurfaceStatus> {
        let result = unsafe {
            self.loader.acquire_next_image(
                self.resources.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, _suboptimal)) => Ok(SurfaceStatus::Ready(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SurfaceStatus::Stale),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Queue the image for presentation once `wait_semaphore` signals.
    pub fn present(
        &self,
        queue: vk::Queue,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> VulkanResult<SurfaceStatus> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.resources.swapchain];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };
        match result {
            Ok(false) => Ok(SurfaceStatus::Ready(image_index)),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SurfaceStatus::Stale),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Begin the render pass for the acquired image, recording the clear
    /// values and a full-extent viewport and scissor. The returned guard
    /// ends the pass when dropped.
    pub fn begin_render_pass<'a>(
        &self,
        recorder: &'a CommandRecorder<'a>,
        image_index: u32,
    ) -> ActiveRenderPass<'a> {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.01, 0.01, 0.012, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
            vk::ClearValue::default(),
        ];
        let pass = recorder.begin_render_pass(
            self.render_pass.handle(),
            self.resources.framebuffers[image_index as usize],
            self.resources.extent,
            &clear_values,
        );
        pass.set_viewport_scissor(self.resources.extent);
        pass
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.resources.extent
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn image_count(&self) -> usize {
        self.resources.framebuffers.len()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.resources.extent.width as f32 / self.resources.extent.height.max(1) as f32
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for framebuffer in &self.resources.framebuffers {
                self.device.destroy_framebuffer(*framebuffer, None);
            }
            for view in &self.resources.image_views {
                self.device.destroy_image_view(*view, None);
            }
            self.loader.destroy_swapchain(self.resources.swapchain, None);
        }
        log::debug!("Swapchain destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(f: vk::Format, cs: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format: f,
            color_space: cs,
        }
    }

    #[test]
    fn prefers_srgb_bgra() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn mailbox_preferred_fifo_guaranteed() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    fn capabilities(
        current: (u32, u32),
        min: (u32, u32),
        max: (u32, u32),
        min_images: u32,
        max_images: u32,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            min_image_count: min_images,
            max_image_count: max_images,
            ..Default::default()
        }
    }

    #[test]
    fn current_extent_used_when_defined() {
        let caps = capabilities((800, 600), (1, 1), (4096, 4096), 2, 8);
        assert_eq!(
            choose_extent(&caps, (9999, 9999)),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn undefined_extent_clamps_framebuffer_size() {
        let caps = capabilities((u32::MAX, u32::MAX), (100, 200), (1000, 900), 2, 8);
        // Within range: passes through.
        let chosen = choose_extent(&caps, (640, 480));
        assert_eq!(chosen.width, 640);
        assert_eq!(chosen.height, 480);
        // Outside range: clamped componentwise.
        let clamped = choose_extent(&caps, (5000, 10));
        assert_eq!(clamped.width, 1000);
        assert_eq!(clamped.height, 200);
    }

    #[test]
    fn extent_always_within_reported_bounds() {
        let caps = capabilities((u32::MAX, u32::MAX), (16, 16), (2048, 2048), 2, 8);
        for size in [(0, 0), (16, 16), (1024, 77), (4096, 4096), (u32::MAX, 1)] {
            let extent = choose_extent(&caps, size);
            assert!(extent.width >= 16 && extent.width <= 2048);
            assert!(extent.height >= 16 && extent.height <= 2048);
        }
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        let caps = capabilities((800, 600), (1, 1), (4096, 4096), 2, 8);
        assert_eq!(choose_image_count(&caps), 3);

        let tight = capabilities((800, 600), (1, 1), (4096, 4096), 3, 3);
        assert_eq!(choose_image_count(&tight), 3);

        // Zero maximum means unbounded.
        let unbounded = capabilities((800, 600), (1, 1), (4096, 4096), 4, 0);
        assert_eq!(choose_image_count(&unbounded), 5);
    }
}
