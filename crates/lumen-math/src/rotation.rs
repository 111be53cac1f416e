// SPDX-License-Identifier: CEPL-1.0
use crate::OutputTransform;
use glam::{Mat4, Vec3};
use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

/// Milliseconds of wall-clock time per degree of spin.
pub const SPIN_MS_PER_DEGREE: u128 = 5;

pub fn spin_angle_degrees(elapsed: Duration) -> u32 {
    ((elapsed.as_millis() / SPIN_MS_PER_DEGREE) % 360) as u32
}

/// Model matrix for the spinning triangle.
///
/// Spins about Y, flips Y into Vulkan clip space, then pre-rotates in the XY
/// plane so the content stays upright on a rotated output.
pub fn spin_matrix(elapsed: Duration, transform: OutputTransform) -> Mat4 {
    let angle = (spin_angle_degrees(elapsed) as f32).to_radians();
    let spin = Mat4::from_rotation_y(-angle) * Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));

    match transform.quarter_turns() {
        0 => spin,
        turns => Mat4::from_rotation_z(turns as f32 * FRAC_PI_2) * spin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn angle_advances_one_degree_per_five_ms_and_wraps() {
        assert_eq!(spin_angle_degrees(Duration::ZERO), 0);
        assert_eq!(spin_angle_degrees(Duration::from_millis(450)), 90);
        assert_eq!(spin_angle_degrees(Duration::from_millis(1805)), 1);
    }

    #[test]
    fn identity_spin_only_flips_y() {
        let m = spin_matrix(Duration::ZERO, OutputTransform::Normal);
        assert!(close(m.transform_point3(Vec3::X), Vec3::X));
        assert!(close(m.transform_point3(Vec3::Y), -Vec3::Y));
        assert!(close(m.transform_point3(Vec3::Z), Vec3::Z));
    }

    #[test]
    fn quarter_rotated_output_turns_content_in_xy() {
        let m = spin_matrix(Duration::ZERO, OutputTransform::Rotate90);
        // (0,1) -> flip -> (0,-1) -> +90° -> (1,0)
        assert!(close(m.transform_point3(Vec3::Y), Vec3::X));

        let flipped = spin_matrix(Duration::ZERO, OutputTransform::Flipped90);
        assert_eq!(m, flipped);
    }

    #[test]
    fn half_turn_negates_x_and_y() {
        let m = spin_matrix(Duration::ZERO, OutputTransform::Rotate180);
        assert!(close(m.transform_point3(Vec3::X), -Vec3::X));
        assert!(close(m.transform_point3(Vec3::Y), Vec3::Y));
    }

    #[test]
    fn spin_about_y_moves_x_towards_z() {
        // 90° of spin after 450 ms
        let m = spin_matrix(Duration::from_millis(450), OutputTransform::Normal);
        let p = m.transform_point3(Vec3::X);
        assert!(close(p, Vec3::Z));
    }
}
