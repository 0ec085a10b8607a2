//! Window management using GLFW
//!
//! Wraps window creation, Vulkan surface plumbing, and event delivery.
//! Events are not dispatched through callbacks; each frame the application
//! drains a queue of [`WindowEvent`] values, which keeps the consumers
//! testable without a live window.

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("GLFW initialization failed")]
    InitializationFailed,

    #[error("Window creation failed")]
    CreationFailed,

    #[error("Vulkan is not supported by this GLFW build")]
    VulkanUnsupported,

    #[error("GLFW error: {0}")]
    GlfwError(String),
}

pub type WindowResult<T> = Result<T, WindowError>;

/// Events the engine consumes, drained once per frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent {
    /// The user requested the window be closed
    Close,
    /// Framebuffer resized to the given pixel size
    Resize(u32, u32),
    /// Cursor moved to the given position in screen coordinates
    MouseMove(f64, f64),
    /// Mouse button pressed or released
    MouseButton { button: glfw::MouseButton, pressed: bool },
    /// Scroll wheel offset
    Scroll(f64, f64),
    /// Keyboard key pressed or released (repeats are dropped)
    Key { key: glfw::Key, pressed: bool },
}

/// Translate a GLFW event into the engine's event type.
///
/// Returns `None` for event kinds the engine does not consume and for key
/// repeats, which the input layer reconstructs from press/release state.
pub fn map_event(event: glfw::WindowEvent) -> Option<WindowEvent> {
    match event {
        glfw::WindowEvent::Close => Some(WindowEvent::Close),
        glfw::WindowEvent::FramebufferSize(w, h) => {
            Some(WindowEvent::Resize(w.max(0) as u32, h.max(0) as u32))
        }
        glfw::WindowEvent::CursorPos(x, y) => Some(WindowEvent::MouseMove(x, y)),
        glfw::WindowEvent::MouseButton(button, action, _mods) => Some(WindowEvent::MouseButton {
            button,
            pressed: action == glfw::Action::Press,
        }),
        glfw::WindowEvent::Scroll(x, y) => Some(WindowEvent::Scroll(x, y)),
        glfw::WindowEvent::Key(key, _scancode, glfw::Action::Press, _mods) => {
            Some(WindowEvent::Key { key, pressed: true })
        }
        glfw::WindowEvent::Key(key, _scancode, glfw::Action::Release, _mods) => {
            Some(WindowEvent::Key { key, pressed: false })
        }
        _ => None,
    }
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported);
        }

        // Vulkan drives the surface; no OpenGL context
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_mouse_button_polling(true);
        window.set_scroll_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Poll the OS and drain all pending events into engine form.
    pub fn drain_events(&mut self) -> Vec<WindowEvent> {
        self.glfw.poll_events();
        glfw::flush_messages(&self.events)
            .filter_map(|(_, event)| map_event(event))
            .collect()
    }

    /// Block until any event arrives. Used while the window is minimized and
    /// there is nothing to render.
    pub fn wait_events(&mut self) {
        self.glfw.wait_events();
    }

    pub fn get_framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Whether the framebuffer currently has zero area (minimized).
    pub fn is_minimized(&self) -> bool {
        let (width, height) = self.get_framebuffer_size();
        width == 0 || height == 0
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn get_required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create Vulkan surface using GLFW's built-in functionality
    pub fn create_vulkan_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!(
                "Failed to create Vulkan surface: {:?}",
                result
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_close_and_resize() {
        assert_eq!(map_event(glfw::WindowEvent::Close), Some(WindowEvent::Close));
        assert_eq!(
            map_event(glfw::WindowEvent::FramebufferSize(800, 600)),
            Some(WindowEvent::Resize(800, 600))
        );
    }

    #[test]
    fn key_repeats_are_dropped() {
        let repeat = glfw::WindowEvent::Key(
            glfw::Key::W,
            0,
            glfw::Action::Repeat,
            glfw::Modifiers::empty(),
        );
        assert_eq!(map_event(repeat), None);

        let press = glfw::WindowEvent::Key(
            glfw::Key::W,
            0,
            glfw::Action::Press,
            glfw::Modifiers::empty(),
        );
        assert_eq!(
            map_event(press),
            Some(WindowEvent::Key { key: glfw::Key::W, pressed: true })
        );
    }

    #[test]
    fn mouse_button_press_state() {
        let press = glfw::WindowEvent::MouseButton(
            glfw::MouseButton::Button1,
            glfw::Action::Press,
            glfw::Modifiers::empty(),
        );
        assert_eq!(
            map_event(press),
            Some(WindowEvent::MouseButton { button: glfw::MouseButton::Button1, pressed: true })
        );

        let release = glfw::WindowEvent::MouseButton(
            glfw::MouseButton::Button1,
            glfw::Action::Release,
            glfw::Modifiers::empty(),
        );
        assert_eq!(
            map_event(release),
            Some(WindowEvent::MouseButton { button: glfw::MouseButton::Button1, pressed: false })
        );
    }

    #[test]
    fn unconsumed_events_are_none() {
        assert_eq!(map_event(glfw::WindowEvent::Refresh), None);
        assert_eq!(map_event(glfw::WindowEvent::Focus(true)), None);
    }
}
