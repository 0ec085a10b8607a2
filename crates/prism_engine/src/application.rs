//! Application harness
//!
//! Owns the window, renderer, camera, and input state, and drives the main
//! loop: drain events, advance the camera, let the app stage its scene
//! updates, then draw. A close request finishes the frame in flight before
//! the loop exits; shutdown waits for the device to go idle.

use crate::camera::{Camera, CameraMovement};
use crate::config::{ConfigError, RenderConfig};
use crate::foundation::math::Vec3;
use crate::input::InputState;
use crate::render::vulkan::renderer::Renderer;
use crate::render::vulkan::VulkanError;
use crate::window::{Window, WindowError, WindowEvent};
use std::time::Instant;
use thiserror::Error;

/// Top-level application errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Vulkan(#[from] VulkanError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Window + renderer + camera, wired into one main loop
pub struct Application {
    camera: Camera,
    input: InputState,
    renderer: Renderer,
    window: Window,
}

impl Application {
    /// Create the window and renderer from configuration. `max_instances`
    /// sizes the per-object dynamic uniform arena.
    pub fn new(config: &RenderConfig, max_instances: usize) -> Result<Self, AppError> {
        let mut window = Window::new(
            &config.window_title,
            config.window_width,
            config.window_height,
        )?;
        let renderer = Renderer::new(&mut window, config, max_instances)?;
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), renderer.aspect_ratio());

        Ok(Self {
            camera,
            input: InputState::new(),
            renderer,
            window,
        })
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Run until the window closes. `update` is called once per frame with
    /// the renderer, the camera, and the total elapsed time, and stages
    /// that frame's transforms and scene uniforms.
    pub fn run<F>(mut self, mut update: F) -> Result<(), AppError>
    where
        F: FnMut(&mut Renderer, &Camera, f32) -> Result<(), VulkanError>,
    {
        let start = Instant::now();
        let mut last_frame = Instant::now();

        while !self.window.should_close() {
            let now = Instant::now();
            let delta = now.duration_since(last_frame).as_secs_f32();
            last_frame = now;

            self.input.begin_frame();
            for event in self.window.drain_events() {
                self.input.apply(&event);
                match event {
                    WindowEvent::Close => self.window.set_should_close(true),
                    WindowEvent::Resize(width, height) => {
                        self.renderer.notify_resize();
                        if height > 0 {
                            self.camera.set_aspect(width as f32 / height as f32);
                        }
                    }
                    _ => {}
                }
            }

            if self.input.is_key_down(glfw::Key::R) {
                self.camera.reset();
            }
            self.camera
                .process_movement(CameraMovement::from_input(&self.input), delta);
            if self.input.is_button_down(glfw::MouseButton::Button1) {
                let (dx, dy) = self.input.cursor_delta();
                self.camera.process_mouse(dx as f32, dy as f32);
            }

            update(&mut self.renderer, &self.camera, start.elapsed().as_secs_f32())?;
            self.renderer.draw_frame(&mut self.window, delta)?;
        }

        // Frames may still be in flight; drain them before drop order
        // starts tearing resources down.
        self.renderer.wait_idle()?;
        Ok(())
    }
}
