//! Vulkan error types

use ash::vk;
use thiserror::Error;

/// Errors produced by the Vulkan rendering layer
#[derive(Error, Debug)]
pub enum VulkanError {
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
}

pub type VulkanResult<T> = Result<T, VulkanError>;
