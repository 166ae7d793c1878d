//! Vector and rotation helpers

use glam::{Mat3, Quat, Vec3};

/// Squared lengths below this are treated as zero
pub const EPSILON_SQ: f32 = 1e-8;

/// Rotation whose local +Z axis points along `direction`, keeping +Y up.
///
/// Returns `None` for a zero-length direction.
pub fn look_rotation(direction: Vec3) -> Option<Quat> {
    let forward = direction.try_normalize()?;
    let right = Vec3::Y.cross(forward);
    if right.length_squared() < EPSILON_SQ {
        // Straight up or down: no stable yaw, rotate the shortest arc instead
        return Some(Quat::from_rotation_arc(Vec3::Z, forward));
    }
    let right = right.normalize();
    let up = forward.cross(right);
    Some(Quat::from_mat3(&Mat3::from_cols(right, up, forward)).normalize())
}

/// Squared distance ignoring height
pub fn distance_xz_squared(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz
}

/// Clamp a vector's length to `max`
pub fn clamp_length(v: Vec3, max: f32) -> Vec3 {
    let len_sq = v.length_squared();
    if len_sq > max * max && len_sq > EPSILON_SQ {
        v * (max / len_sq.sqrt())
    } else {
        v
    }
}
