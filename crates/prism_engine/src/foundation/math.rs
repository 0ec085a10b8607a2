//! Math type aliases and Vulkan-oriented projection helpers
//!
//! Thin aliases over nalgebra so the rest of the engine never spells out
//! generic parameters. Projection helpers account for Vulkan's inverted Y
//! clip space relative to OpenGL-style conventions.

pub type Vec2 = nalgebra::Vector2<f32>;
pub type Vec3 = nalgebra::Vector3<f32>;
pub type Vec4 = nalgebra::Vector4<f32>;
pub type Mat3 = nalgebra::Matrix3<f32>;
pub type Mat4 = nalgebra::Matrix4<f32>;
pub type Point3 = nalgebra::Point3<f32>;

/// Perspective projection for Vulkan clip space.
///
/// Builds a right-handed perspective matrix and negates the Y scale so that
/// clip-space Y points down, as Vulkan expects. Pipelines built against this
/// projection must use clockwise front-face winding.
pub fn perspective_vk(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let mut proj = nalgebra::Perspective3::new(aspect, fov_y_radians, near, far).to_homogeneous();
    proj[(1, 1)] *= -1.0;
    proj
}

/// View matrix looking from `eye` toward `target` with the given up vector.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
}

/// Normal transformation matrix for a model transform.
///
/// Inverse-transpose keeps normals perpendicular under non-uniform scale.
/// A singular model matrix (zero scale on some axis) falls back to the
/// untransposed input rather than producing NaNs.
pub fn normal_matrix(model: &Mat4) -> Mat4 {
    match model.try_inverse() {
        Some(inv) => inv.transpose(),
        None => *model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perspective_flips_y() {
        let proj = perspective_vk(45.0_f32.to_radians(), 16.0 / 9.0, 0.1, 50.0);
        assert!(proj[(1, 1)] < 0.0);

        // Same matrix without the flip should only differ in the Y scale.
        let gl = nalgebra::Perspective3::new(16.0 / 9.0, 45.0_f32.to_radians(), 0.1, 50.0)
            .to_homogeneous();
        assert_relative_eq!(proj[(0, 0)], gl[(0, 0)]);
        assert_relative_eq!(proj[(1, 1)], -gl[(1, 1)]);
    }

    #[test]
    fn normal_matrix_counters_nonuniform_scale() {
        let model = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0));
        let normal = normal_matrix(&model);
        // A normal along +X on the scaled surface must stay unit-proportional
        // after renormalization; inverse-transpose of a pure scale is 1/scale.
        assert_relative_eq!(normal[(0, 0)], 0.5);
        assert_relative_eq!(normal[(1, 1)], 1.0);
    }

    #[test]
    fn normal_matrix_singular_model_does_not_nan() {
        let model = Mat4::new_nonuniform_scaling(&Vec3::new(0.0, 1.0, 1.0));
        let normal = normal_matrix(&model);
        assert!(normal.iter().all(|v| v.is_finite()));
    }
}
