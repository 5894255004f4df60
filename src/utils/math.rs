//! Additional math helpers layered on top of `glam`.

use glam::{Affine3A, Vec3};

/// Shrinks `v` by `epsilon` along its own direction, clamping at zero.
///
/// Vectors shorter than `epsilon` collapse to exactly [`Vec3::ZERO`].
pub fn shrink_length(v: Vec3, epsilon: f32) -> Vec3 {
    let length = v.length();
    let shrunk = (length - epsilon).max(0.0);
    if shrunk == 0.0 {
        return Vec3::ZERO;
    }
    v * (shrunk / length)
}

/// Largest per-axis scale factor of an affine transform.
pub fn max_axis_scale(transform: &Affine3A) -> f32 {
    let m = transform.matrix3;
    m.x_axis
        .length()
        .max(m.y_axis.length())
        .max(m.z_axis.length())
}

/// Whether all three axes of `scale` are equal within `tolerance`.
pub fn is_uniform_scale(scale: Vec3, tolerance: f32) -> bool {
    (scale.x - scale.y).abs() <= tolerance && (scale.y - scale.z).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn shrink_length_collapses_tiny_vectors() {
        assert_eq!(shrink_length(Vec3::new(0.0, 5e-6, 0.0), 1e-5), Vec3::ZERO);
        let shrunk = shrink_length(Vec3::new(0.0, 2.0, 0.0), 0.5);
        assert_relative_eq!(shrunk.y, 1.5);
    }

    #[test]
    fn max_axis_scale_ignores_rotation() {
        let transform = Affine3A::from_scale_rotation_translation(
            Vec3::new(1.0, 3.0, 2.0),
            Quat::from_rotation_y(0.7),
            Vec3::new(4.0, 0.0, 0.0),
        );
        assert_relative_eq!(max_axis_scale(&transform), 3.0, epsilon = 1e-5);
    }
}
