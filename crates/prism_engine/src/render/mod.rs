//! Rendering backends
//!
//! Only a Vulkan backend exists today; keeping it behind this module leaves
//! room for the API-selection layer to grow without touching callers.

pub mod vulkan;

pub use vulkan::{VulkanError, VulkanResult};
