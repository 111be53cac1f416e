// SPDX-License-Identifier: CEPL-1.0
//! Small math helpers shared by the geometry resolver and the renderer.

mod rotation;
mod transform;

pub use glam::{Mat4, Vec3};
pub use rotation::{spin_angle_degrees, spin_matrix, SPIN_MS_PER_DEGREE};
pub use transform::OutputTransform;
