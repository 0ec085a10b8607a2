//! # Prism Engine
//!
//! A small real-time 3D rendering engine built on Vulkan.
//!
//! ## Features
//!
//! - **Vulkan Rendering**: forward renderer with MSAA, depth testing, and
//!   mipmapped textures
//! - **Frames in Flight**: pipelined CPU/GPU frame loop with per-slot
//!   synchronization and uniform buffers
//! - **Dynamic Uniforms**: one aligned arena for all per-object transforms,
//!   bound with dynamic offsets
//! - **Free-Fly Camera**: yaw/pitch mouse look with WASD movement
//! - **Config Driven**: window, validation, and device options loaded from
//!   TOML
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prism_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     prism_engine::foundation::logging::init();
//!     let config = RenderConfig::default();
//!     let app = Application::new(&config, 16)?;
//!     app.run(|_renderer, _camera, _time| Ok(()))?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::too_many_arguments)]

pub mod camera;
pub mod config;
pub mod foundation;
pub mod input;
pub mod overlay;
pub mod render;
pub mod scene;
pub mod window;

mod application;

pub use application::{AppError, Application};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        camera::{Camera, CameraMovement},
        config::RenderConfig,
        foundation::math::{Mat4, Vec3},
        input::InputState,
        overlay::{DebugOverlay, FrameStatsOverlay},
        render::vulkan::{FrameOutcome, ObjectKey, Renderer, Texture2D, VulkanError},
        scene::mesh::Mesh,
        window::{Window, WindowEvent},
        AppError, Application,
    };
}
