//! Polled input state
//!
//! Rebuilt every frame from the drained window events so gameplay code can
//! ask "is W held" instead of chasing callbacks.

use crate::window::WindowEvent;
use std::collections::HashSet;

/// Keyboard/mouse state accumulated from window events
#[derive(Debug, Default)]
pub struct InputState {
    keys_down: HashSet<glfw::Key>,
    buttons_down: HashSet<glfw::MouseButton>,
    cursor: (f64, f64),
    cursor_delta: (f64, f64),
    scroll_delta: (f64, f64),
    cursor_seen: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame deltas. Call before applying this frame's events.
    pub fn begin_frame(&mut self) {
        self.cursor_delta = (0.0, 0.0);
        self.scroll_delta = (0.0, 0.0);
    }

    /// Fold one window event into the state.
    pub fn apply(&mut self, event: &WindowEvent) {
        match *event {
            WindowEvent::Key { key, pressed: true } => {
                self.keys_down.insert(key);
            }
            WindowEvent::Key { key, pressed: false } => {
                self.keys_down.remove(&key);
            }
            WindowEvent::MouseButton { button, pressed: true } => {
                self.buttons_down.insert(button);
            }
            WindowEvent::MouseButton { button, pressed: false } => {
                self.buttons_down.remove(&button);
            }
            WindowEvent::MouseMove(x, y) => {
                // The first position report establishes the origin; a delta
                // against (0, 0) would yank the camera on startup.
                if self.cursor_seen {
                    self.cursor_delta.0 += x - self.cursor.0;
                    self.cursor_delta.1 += y - self.cursor.1;
                }
                self.cursor = (x, y);
                self.cursor_seen = true;
            }
            WindowEvent::Scroll(x, y) => {
                self.scroll_delta.0 += x;
                self.scroll_delta.1 += y;
            }
            WindowEvent::Close | WindowEvent::Resize(..) => {}
        }
    }

    pub fn is_key_down(&self, key: glfw::Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn is_button_down(&self, button: glfw::MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    pub fn cursor_position(&self) -> (f64, f64) {
        self.cursor
    }

    /// Cursor movement since the last `begin_frame`.
    pub fn cursor_delta(&self) -> (f64, f64) {
        self.cursor_delta
    }

    /// Scroll offset since the last `begin_frame`.
    pub fn scroll_delta(&self) -> (f64, f64) {
        self.scroll_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_press_and_release() {
        let mut input = InputState::new();
        input.apply(&WindowEvent::Key { key: glfw::Key::W, pressed: true });
        assert!(input.is_key_down(glfw::Key::W));
        input.apply(&WindowEvent::Key { key: glfw::Key::W, pressed: false });
        assert!(!input.is_key_down(glfw::Key::W));
    }

    #[test]
    fn first_cursor_report_has_zero_delta() {
        let mut input = InputState::new();
        input.begin_frame();
        input.apply(&WindowEvent::MouseMove(400.0, 300.0));
        assert_eq!(input.cursor_delta(), (0.0, 0.0));
        assert_eq!(input.cursor_position(), (400.0, 300.0));
    }

    #[test]
    fn cursor_deltas_accumulate_within_frame() {
        let mut input = InputState::new();
        input.apply(&WindowEvent::MouseMove(100.0, 100.0));
        input.begin_frame();
        input.apply(&WindowEvent::MouseMove(110.0, 95.0));
        input.apply(&WindowEvent::MouseMove(115.0, 90.0));
        assert_eq!(input.cursor_delta(), (15.0, -10.0));

        input.begin_frame();
        assert_eq!(input.cursor_delta(), (0.0, 0.0));
    }

    #[test]
    fn button_state_tracks_events() {
        let mut input = InputState::new();
        let button = glfw::MouseButton::Button1;
        assert!(!input.is_button_down(button));
        input.apply(&WindowEvent::MouseButton { button, pressed: true });
        assert!(input.is_button_down(button));
        input.apply(&WindowEvent::MouseButton { button, pressed: false });
        assert!(!input.is_button_down(button));
    }
}
