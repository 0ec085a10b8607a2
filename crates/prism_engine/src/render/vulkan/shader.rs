//! SPIR-V shader module loading

use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;
use std::path::Path;

/// Owned shader module created from SPIR-V bytecode
pub struct ShaderModule {
    module: vk::ShaderModule,
    device: ash::Device,
}

impl ShaderModule {
    /// Create from raw SPIR-V bytes. The blob must be 4-byte aligned words;
    /// anything else is a corrupt or truncated file.
    pub fn from_bytes(device: ash::Device, bytes: &[u8]) -> VulkanResult<Self> {
        if bytes.len() % 4 != 0 {
            return Err(VulkanError::InvalidOperation {
                reason: format!("SPIR-V byte length {} is not a multiple of 4", bytes.len()),
            });
        }
        let (prefix, words, suffix) = unsafe { bytes.align_to::<u32>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "SPIR-V data is not 4-byte aligned".to_string(),
            });
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self { module, device })
    }

    /// Load compiled bytecode from disk.
    pub fn from_file(device: ash::Device, path: &Path) -> VulkanResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            VulkanError::ResourceNotFound(format!("{}: {}", path.display(), e))
        })?;
        log::debug!("Loaded shader {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(device, &bytes)
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}
