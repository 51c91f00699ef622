//! Object placement in world space

use crate::foundation::math::{Mat3, Mat4, Vec3};

/// Translation, scale and Y-X-Z Tait-Bryan rotation in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    /// Position offset
    pub translation: Vec3,
    /// Per-axis scale
    pub scale: Vec3,
    /// Euler angles applied Y, then X, then Z
    pub rotation: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            rotation: Vec3::zeros(),
        }
    }
}

impl TransformComponent {
    /// Translate * Ry * Rx * Rz * Scale
    pub fn matrix(&self) -> Mat4 {
        let r = self.rotation_matrix();
        let s = self.scale;
        Mat4::new(
            s.x * r[(0, 0)], s.y * r[(0, 1)], s.z * r[(0, 2)], self.translation.x,
            s.x * r[(1, 0)], s.y * r[(1, 1)], s.z * r[(1, 2)], self.translation.y,
            s.x * r[(2, 0)], s.y * r[(2, 1)], s.z * r[(2, 2)], self.translation.z,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Inverse transpose of the model matrix's upper 3x3
    pub fn normal_matrix(&self) -> Mat3 {
        let r = self.rotation_matrix();
        let inv = Vec3::new(1.0 / self.scale.x, 1.0 / self.scale.y, 1.0 / self.scale.z);
        Mat3::new(
            inv.x * r[(0, 0)], inv.y * r[(0, 1)], inv.z * r[(0, 2)],
            inv.x * r[(1, 0)], inv.y * r[(1, 1)], inv.z * r[(1, 2)],
            inv.x * r[(2, 0)], inv.y * r[(2, 1)], inv.z * r[(2, 2)],
        )
    }

    /// Normal matrix widened to 4x4 for std140 upload
    pub fn normal_matrix4(&self) -> Mat4 {
        self.normal_matrix().to_homogeneous()
    }

    fn rotation_matrix(&self) -> Mat3 {
        let (s1, c1) = self.rotation.y.sin_cos();
        let (s2, c2) = self.rotation.x.sin_cos();
        let (s3, c3) = self.rotation.z.sin_cos();
        Mat3::new(
            c1 * c3 + s1 * s2 * s3, c3 * s1 * s2 - c1 * s3, c2 * s1,
            c2 * s3, c2 * c3, -s2,
            c1 * s2 * s3 - c3 * s1, c1 * c3 * s2 + s1 * s3, c1 * c2,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_identity_transform() {
        let t = TransformComponent::default();
        assert_relative_eq!(t.matrix(), Mat4::identity());
        assert_relative_eq!(t.normal_matrix(), Mat3::identity());
    }

    #[test]
    fn test_matrix_composes_translation_rotation_scale() {
        let t = TransformComponent {
            translation: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::new(2.0, 3.0, 4.0),
            rotation: Vec3::new(0.3, -1.1, 0.7),
        };
        let expected = Mat4::new_translation(&t.translation)
            * Mat4::from_axis_angle(&Vec3::y_axis(), t.rotation.y)
            * Mat4::from_axis_angle(&Vec3::x_axis(), t.rotation.x)
            * Mat4::from_axis_angle(&Vec3::z_axis(), t.rotation.z)
            * Mat4::new_nonuniform_scaling(&t.scale);
        assert_relative_eq!(t.matrix(), expected, epsilon = 1e-5);
    }

    #[test]
    fn test_normal_matrix_is_inverse_transpose() {
        let t = TransformComponent {
            translation: Vec3::new(5.0, 0.0, 0.0),
            scale: Vec3::new(2.0, 0.5, 1.0),
            rotation: Vec3::new(0.0, FRAC_PI_2, 0.2),
        };
        let upper = t.matrix().fixed_view::<3, 3>(0, 0).into_owned();
        let expected = upper.try_inverse().unwrap().transpose();
        assert_relative_eq!(t.normal_matrix(), expected, epsilon = 1e-5);
    }
}
