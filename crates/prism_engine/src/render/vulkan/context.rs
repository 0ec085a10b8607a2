//! Vulkan instance, device selection, and context ownership
//!
//! Everything here is created once at startup and immutable afterwards. The
//! [`VulkanContext`] hands shared references down to the rest of the
//! renderer; there is no global lookup. Struct field declaration order
//! doubles as drop order throughout.

use crate::config::RenderConfig;
use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::window::Window;
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use std::collections::HashSet;
use std::ffi::{c_void, CStr, CString};

/// Vulkan instance with optional validation layers and debug messenger
pub struct VulkanInstance {
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    instance: ash::Instance,
    entry: ash::Entry,
}

impl VulkanInstance {
    /// Create the instance with the window-required extensions plus debug
    /// utilities when validation is enabled.
    pub fn new(required_extensions: &[String], config: &RenderConfig) -> VulkanResult<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to load Vulkan library: {}", e))
        })?;

        let validation = config.enable_validation
            && Self::validation_layers_available(&entry, &config.validation_layers)?;
        if config.enable_validation && !validation {
            log::warn!("Validation layers requested but not available, continuing without");
        }

        let app_name = CString::new("prism").map_err(|_| {
            VulkanError::InitializationFailed("Invalid application name".to_string())
        })?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&app_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extension_names: Vec<CString> = required_extensions
            .iter()
            .map(|name| {
                CString::new(name.as_str()).map_err(|_| {
                    VulkanError::InitializationFailed(format!("Invalid extension name: {}", name))
                })
            })
            .collect::<VulkanResult<_>>()?;
        if validation {
            extension_names.push(DebugUtils::name().to_owned());
        }
        let extension_ptrs: Vec<*const i8> =
            extension_names.iter().map(|name| name.as_ptr()).collect();

        let layer_names: Vec<CString> = if validation {
            config
                .validation_layers
                .iter()
                .map(|name| {
                    CString::new(name.as_str()).map_err(|_| {
                        VulkanError::InitializationFailed(format!("Invalid layer name: {}", name))
                    })
                })
                .collect::<VulkanResult<_>>()?
        } else {
            Vec::new()
        };
        let layer_ptrs: Vec<*const i8> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(VulkanError::Api)?;
        log::info!(
            "Vulkan instance created ({} extensions, validation {})",
            extension_ptrs.len(),
            if validation { "on" } else { "off" }
        );

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(debug_callback));
            let messenger = unsafe {
                debug_utils.create_debug_utils_messenger(&messenger_info, None)
            }
            .map_err(VulkanError::Api)?;
            Some((debug_utils, messenger))
        } else {
            None
        };

        Ok(Self {
            debug,
            instance,
            entry,
        })
    }

    fn validation_layers_available(
        entry: &ash::Entry,
        requested: &[String],
    ) -> VulkanResult<bool> {
        let available = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::Api)?;
        let available: HashSet<String> = available
            .iter()
            .map(|layer| {
                unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        Ok(requested.iter().all(|layer| available.contains(layer)))
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Vulkan instance destroyed");
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if callback_data.is_null() {
        std::borrow::Cow::from("<no message>")
    } else {
        CStr::from_ptr((*callback_data).p_message).to_string_lossy()
    };
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[vulkan {:?}] {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[vulkan {:?}] {}", message_type, message);
        }
        _ => {
            log::debug!("[vulkan {:?}] {}", message_type, message);
        }
    }
    vk::FALSE
}

/// Surface capability snapshot used for device evaluation and swapchain
/// creation
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(
        surface_loader: &Surface,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VulkanResult<Self> {
        unsafe {
            Ok(Self {
                capabilities: surface_loader
                    .get_physical_device_surface_capabilities(device, surface)
                    .map_err(VulkanError::Api)?,
                formats: surface_loader
                    .get_physical_device_surface_formats(device, surface)
                    .map_err(VulkanError::Api)?,
                present_modes: surface_loader
                    .get_physical_device_surface_present_modes(device, surface)
                    .map_err(VulkanError::Api)?,
            })
        }
    }
}

/// Selected physical device and its queried properties
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub graphics_family: u32,
    pub present_family: u32,
    /// Highest sample count the color and depth framebuffers both support
    pub msaa_samples: vk::SampleCountFlags,
}

impl PhysicalDeviceInfo {
    /// Pick the first device satisfying every requirement: graphics and
    /// present queues, the required extensions, anisotropic filtering, and a
    /// non-empty set of surface formats and present modes.
    pub fn select_suitable_device(
        instance: &ash::Instance,
        surface_loader: &Surface,
        surface: vk::SurfaceKHR,
        required_extensions: &[String],
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(VulkanError::Api)?;
        if devices.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "No Vulkan-capable GPU found".to_string(),
            ));
        }

        for device in devices {
            match Self::evaluate_device(instance, surface_loader, surface, device, required_extensions)? {
                Some(info) => {
                    let name = unsafe { CStr::from_ptr(info.properties.device_name.as_ptr()) };
                    log::info!(
                        "Selected GPU: {} (graphics family {}, present family {}, {:?} MSAA)",
                        name.to_string_lossy(),
                        info.graphics_family,
                        info.present_family,
                        info.msaa_samples
                    );
                    return Ok(info);
                }
                None => continue,
            }
        }

        Err(VulkanError::InitializationFailed(
            "No GPU satisfies the renderer's requirements".to_string(),
        ))
    }

    fn evaluate_device(
        instance: &ash::Instance,
        surface_loader: &Surface,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
        required_extensions: &[String],
    ) -> VulkanResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };

        if features.sampler_anisotropy == vk::FALSE {
            return Ok(None);
        }
        if !Self::supports_extensions(instance, device, required_extensions)? {
            return Ok(None);
        }

        let (graphics_family, present_family) =
            match Self::find_queue_families(instance, surface_loader, surface, device)? {
                Some(families) => families,
                None => return Ok(None),
            };

        let support = SwapchainSupportDetails::query(surface_loader, device, surface)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            return Ok(None);
        }

        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(device) };
        let msaa_samples = max_sample_count(&properties);

        Ok(Some(Self {
            device,
            properties,
            memory_properties,
            graphics_family,
            present_family,
            msaa_samples,
        }))
    }

    fn supports_extensions(
        instance: &ash::Instance,
        device: vk::PhysicalDevice,
        required: &[String],
    ) -> VulkanResult<bool> {
        let available = unsafe { instance.enumerate_device_extension_properties(device) }
            .map_err(VulkanError::Api)?;
        let available: HashSet<String> = available
            .iter()
            .map(|ext| {
                unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        Ok(required.iter().all(|ext| available.contains(ext)))
    }

    fn find_queue_families(
        instance: &ash::Instance,
        surface_loader: &Surface,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<Option<(u32, u32)>> {
        let families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics = None;
        let mut present = None;
        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics.get_or_insert(index);
            }
            let presentable = unsafe {
                surface_loader.get_physical_device_surface_support(device, index, surface)
            }
            .map_err(VulkanError::Api)?;
            if presentable {
                present.get_or_insert(index);
            }
            if graphics.is_some() && present.is_some() {
                break;
            }
        }

        Ok(graphics.zip(present))
    }

    /// Device-reported minimum alignment for dynamic uniform buffer offsets.
    pub fn min_uniform_buffer_offset_alignment(&self) -> u64 {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }
}

/// Highest MSAA count supported by both color and depth attachments.
fn max_sample_count(properties: &vk::PhysicalDeviceProperties) -> vk::SampleCountFlags {
    let counts = properties.limits.framebuffer_color_sample_counts
        & properties.limits.framebuffer_depth_sample_counts;
    for candidate in [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ] {
        if counts.contains(candidate) {
            return candidate;
        }
    }
    vk::SampleCountFlags::TYPE_1
}

/// Logical device with its queues and swapchain loader
pub struct LogicalDevice {
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    graphics_family: u32,
    present_family: u32,
    swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    pub fn new(
        instance: &ash::Instance,
        physical: &PhysicalDeviceInfo,
        extensions: &[String],
    ) -> VulkanResult<Self> {
        let unique_families: HashSet<u32> =
            [physical.graphics_family, physical.present_family].into();
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extension_names: Vec<CString> = extensions
            .iter()
            .map(|name| {
                CString::new(name.as_str()).map_err(|_| {
                    VulkanError::InitializationFailed(format!("Invalid extension name: {}", name))
                })
            })
            .collect::<VulkanResult<_>>()?;
        let extension_ptrs: Vec<*const i8> =
            extension_names.iter().map(|name| name.as_ptr()).collect();

        // Anisotropic sampling for textures, sample-rate shading for the
        // MSAA pipelines.
        let features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .sample_rate_shading(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical.device, &create_info, None) }
            .map_err(VulkanError::Api)?;
        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);
        log::debug!("Logical device created");

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: physical.graphics_family,
            present_family: physical.present_family,
            swapchain_loader,
        })
    }

    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    pub fn present_family(&self) -> u32 {
        self.present_family
    }

    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Block until the GPU has drained all submitted work.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(VulkanError::Api)
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
        }
        log::debug!("Logical device destroyed");
    }
}

/// Owns the instance, surface, and device. Field order is drop order: the
/// device goes before the instance; the surface is released in `Drop` ahead
/// of both.
pub struct VulkanContext {
    device: LogicalDevice,
    physical_device: PhysicalDeviceInfo,
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Initialize Vulkan against an existing window.
    pub fn new(window: &mut Window, config: &RenderConfig) -> VulkanResult<Self> {
        let required_extensions = window.get_required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("Window extension query failed: {}", e))
        })?;
        let instance = VulkanInstance::new(&required_extensions, config)?;

        let surface = window
            .create_vulkan_surface(instance.handle().handle())
            .map_err(|e| {
                VulkanError::InitializationFailed(format!("Surface creation failed: {}", e))
            })?;
        let surface_loader = Surface::new(instance.entry(), instance.handle());

        let physical_device = PhysicalDeviceInfo::select_suitable_device(
            instance.handle(),
            &surface_loader,
            surface,
            &config.device_extensions,
        )?;
        let device = LogicalDevice::new(
            instance.handle(),
            &physical_device,
            &config.device_extensions,
        )?;

        Ok(Self {
            device,
            physical_device,
            surface,
            surface_loader,
            instance,
        })
    }

    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    pub fn instance(&self) -> &ash::Instance {
        self.instance.handle()
    }

    /// Fresh snapshot of the surface's capabilities, formats, and modes.
    /// Re-queried on every swapchain (re)build since the extent changes.
    pub fn swapchain_support(&self) -> VulkanResult<SwapchainSupportDetails> {
        SwapchainSupportDetails::query(
            &self.surface_loader,
            self.physical_device.device,
            self.surface,
        )
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
        log::debug!("Surface destroyed");
    }
}
