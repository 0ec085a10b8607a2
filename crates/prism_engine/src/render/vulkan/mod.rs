//! Vulkan backend
//!
//! RAII wrappers over the raw API plus the frame-loop renderer built on
//! them. Every wrapper owns a cloned `ash::Device` and cleans up in `Drop`,
//! so struct field order doubles as destruction order throughout.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod dynamic_uniform;
pub mod error;
pub mod pipeline;
pub mod render_pass;
pub mod renderer;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex;

pub use error::{VulkanError, VulkanResult};
pub use renderer::{FrameOutcome, ObjectKey, Renderer};
pub use texture::Texture2D;
