//! Quaternion and vector helpers not provided by `glam`.
//!
//! The interpolation routines take an explicit `shortest_path` flag instead of
//! always taking the short arc, and all tolerance checks use an absolute
//! per-component epsilon.

use glam::{Quat, Vec3};

/// Default tolerance for keyframe equality and identity checks.
pub const DEFAULT_TOLERANCE: f32 = 1e-3;

/// Threshold under which `sin(angle)` is treated as zero in slerp, log and exp.
const QUAT_EPSILON: f32 = 1e-3;

/// Spherical linear interpolation between `p` and `q`.
///
/// When `shortest_path` is set and the quaternions lie in opposite
/// hemispheres, `q` is negated first. Nearly parallel inputs fall back to a
/// normalised linear blend.
#[must_use]
pub fn slerp(t: f32, p: Quat, q: Quat, shortest_path: bool) -> Quat {
    let mut cos = p.dot(q);
    let target = if cos < 0.0 && shortest_path {
        cos = -cos;
        -q
    } else {
        q
    };

    if cos.abs() < 1.0 - QUAT_EPSILON {
        let sin = (1.0 - cos * cos).sqrt();
        let angle = sin.atan2(cos);
        let inv_sin = 1.0 / sin;
        let coeff0 = ((1.0 - t) * angle).sin() * inv_sin;
        let coeff1 = (t * angle).sin() * inv_sin;
        p * coeff0 + target * coeff1
    } else {
        (p * (1.0 - t) + target * t).normalize()
    }
}

/// Normalised linear interpolation between `p` and `q`.
#[must_use]
pub fn nlerp(t: f32, p: Quat, q: Quat, shortest_path: bool) -> Quat {
    let target = if p.dot(q) < 0.0 && shortest_path { -q } else { q };
    (p + (target - p) * t).normalize()
}

/// Spherical quadrangle interpolation through `p` and `q` with inner control
/// quaternions `a` and `b`.
#[must_use]
pub fn squad(t: f32, p: Quat, a: Quat, b: Quat, q: Quat, shortest_path: bool) -> Quat {
    let slerp_t = 2.0 * t * (1.0 - t);
    let slerp_p = slerp(t, p, q, shortest_path);
    let slerp_q = slerp(t, a, b, false);
    slerp(slerp_t, slerp_p, slerp_q, false)
}

/// Quaternion logarithm. The result has a zero `w` component.
#[must_use]
pub fn quat_log(q: Quat) -> Quat {
    if q.w.abs() < 1.0 {
        let norm_v = (q.x * q.x + q.y * q.y + q.z * q.z).sqrt();
        let angle = norm_v.atan2(q.w);
        let sin = angle.sin();
        if sin.abs() >= QUAT_EPSILON {
            let coeff = angle / sin;
            return Quat::from_xyzw(coeff * q.x, coeff * q.y, coeff * q.z, 0.0);
        }
    }
    Quat::from_xyzw(q.x, q.y, q.z, 0.0)
}

/// Quaternion exponential; inverse of [`quat_log`] for pure quaternions.
#[must_use]
pub fn quat_exp(q: Quat) -> Quat {
    let angle = (q.x * q.x + q.y * q.y + q.z * q.z).sqrt();
    let sin = angle.sin();
    let w = angle.cos();
    if sin.abs() >= QUAT_EPSILON {
        let coeff = sin / angle;
        Quat::from_xyzw(coeff * q.x, coeff * q.y, coeff * q.z, w)
    } else {
        Quat::from_xyzw(q.x, q.y, q.z, w)
    }
}

/// Rotation angle (radians, in `[0, 2π]`) encoded by a unit quaternion.
#[must_use]
pub fn rotation_angle(q: Quat) -> f32 {
    let sqr_len = q.x * q.x + q.y * q.y + q.z * q.z;
    if sqr_len > 0.0 {
        2.0 * q.w.clamp(-1.0, 1.0).acos()
    } else {
        0.0
    }
}

#[inline]
#[must_use]
pub fn real_equal(a: f32, b: f32, tolerance: f32) -> bool {
    (a - b).abs() <= tolerance
}

/// Component-wise position equality within `tolerance`.
#[inline]
#[must_use]
pub fn position_equals(a: Vec3, b: Vec3, tolerance: f32) -> bool {
    real_equal(a.x, b.x, tolerance) && real_equal(a.y, b.y, tolerance) && real_equal(a.z, b.z, tolerance)
}

/// Two rotations are equal when the angle between them is within `tolerance`
/// radians. `q` and `-q` compare equal.
#[must_use]
pub fn rotation_equals(a: Quat, b: Quat, tolerance: f32) -> bool {
    let d = a.dot(b);
    let angle = (2.0 * d * d - 1.0).clamp(-1.0, 1.0).acos();
    angle.abs() <= tolerance
}
