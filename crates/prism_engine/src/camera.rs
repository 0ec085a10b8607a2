//! Free-fly camera
//!
//! Yaw/pitch orientation with WASD-style planar movement, vertical strafe,
//! and mouse look while the left button is held. Projection is Vulkan
//! clip-space (Y flipped), so pipelines pair this with clockwise winding.

use crate::foundation::math::{look_at, perspective_vk, Mat4, Vec3};
use crate::input::InputState;
use bitflags::bitflags;

bitflags! {
    /// Directions the camera is being asked to move this frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CameraMovement: u8 {
        const FORWARD = 1 << 0;
        const BACKWARD = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
    }
}

impl CameraMovement {
    /// Build a movement mask from held keys (W/A/S/D planar, Q/E vertical).
    pub fn from_input(input: &InputState) -> Self {
        let mut movement = Self::empty();
        if input.is_key_down(glfw::Key::W) {
            movement |= Self::FORWARD;
        }
        if input.is_key_down(glfw::Key::S) {
            movement |= Self::BACKWARD;
        }
        if input.is_key_down(glfw::Key::A) {
            movement |= Self::LEFT;
        }
        if input.is_key_down(glfw::Key::D) {
            movement |= Self::RIGHT;
        }
        if input.is_key_down(glfw::Key::E) {
            movement |= Self::UP;
        }
        if input.is_key_down(glfw::Key::Q) {
            movement |= Self::DOWN;
        }
        movement
    }
}

const DEFAULT_YAW: f32 = -90.0;
const DEFAULT_PITCH: f32 = 0.0;
const PITCH_LIMIT: f32 = 89.0;

/// Free-fly perspective camera
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    fov_y_degrees: f32,
    aspect: f32,
    near: f32,
    far: f32,
    move_speed: f32,
    look_sensitivity: f32,
    home: Vec3,
}

impl Camera {
    /// Camera at `position` looking down −Z, with the given aspect ratio.
    pub fn new(position: Vec3, aspect: f32) -> Self {
        let mut camera = Self {
            position,
            front: Vec3::new(0.0, 0.0, -1.0),
            right: Vec3::new(1.0, 0.0, 0.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            world_up: Vec3::new(0.0, 1.0, 0.0),
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            fov_y_degrees: 45.0,
            aspect,
            near: 0.1,
            far: 50.0,
            move_speed: 2.5,
            look_sensitivity: 0.1,
            home: position,
        };
        camera.update_basis();
        camera
    }

    /// Advance the camera by held movement keys.
    pub fn process_movement(&mut self, movement: CameraMovement, delta_time: f32) {
        let velocity = self.move_speed * delta_time;
        if movement.contains(CameraMovement::FORWARD) {
            self.position += self.front * velocity;
        }
        if movement.contains(CameraMovement::BACKWARD) {
            self.position -= self.front * velocity;
        }
        if movement.contains(CameraMovement::LEFT) {
            self.position -= self.right * velocity;
        }
        if movement.contains(CameraMovement::RIGHT) {
            self.position += self.right * velocity;
        }
        if movement.contains(CameraMovement::UP) {
            self.position += self.world_up * velocity;
        }
        if movement.contains(CameraMovement::DOWN) {
            self.position -= self.world_up * velocity;
        }
    }

    /// Rotate by a mouse delta in screen pixels. Positive `dy` (cursor moving
    /// down the screen) pitches the view down.
    pub fn process_mouse(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.look_sensitivity;
        self.pitch = (self.pitch - dy * self.look_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_basis();
    }

    /// Return to the starting position and orientation.
    pub fn reset(&mut self) {
        self.position = self.home;
        self.yaw = DEFAULT_YAW;
        self.pitch = DEFAULT_PITCH;
        self.update_basis();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn view_matrix(&self) -> Mat4 {
        look_at(self.position, self.position + self.front, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        perspective_vk(self.fov_y_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    /// Combined view-projection, the form the scene uniform buffer carries.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    fn update_basis(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        self.right = self.front.cross(&self.world_up).normalize();
        self.up = self.right.cross(&self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn initial_orientation_looks_down_negative_z() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 3.0), 16.0 / 9.0);
        assert_relative_eq!(camera.front().x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(camera.front().y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(camera.front().z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn forward_movement_follows_front_vector() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 3.0), 1.0);
        camera.process_movement(CameraMovement::FORWARD, 1.0);
        assert!(camera.position().z < 3.0);
        assert_relative_eq!(camera.position().x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn opposing_keys_cancel() {
        let mut camera = Camera::new(Vec3::zeros(), 1.0);
        camera.process_movement(CameraMovement::LEFT | CameraMovement::RIGHT, 1.0);
        assert_relative_eq!(camera.position().norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new(Vec3::zeros(), 1.0);
        // Drag far past vertical; the view must never flip over.
        camera.process_mouse(0.0, -10_000.0);
        assert!(camera.front().y < 1.0);
        assert!(camera.front().y > 0.999);
    }

    #[test]
    fn reset_restores_start_pose() {
        let start = Vec3::new(1.0, 2.0, 3.0);
        let mut camera = Camera::new(start, 1.0);
        camera.process_movement(CameraMovement::FORWARD | CameraMovement::UP, 0.5);
        camera.process_mouse(35.0, -12.0);
        camera.reset();
        assert_relative_eq!(camera.position().x, start.x);
        assert_relative_eq!(camera.front().z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn projection_flips_y() {
        let camera = Camera::new(Vec3::zeros(), 4.0 / 3.0);
        assert!(camera.projection_matrix()[(1, 1)] < 0.0);
    }
}
