//! Keyframe splines.
//!
//! Both splines pass through every point. Tangents follow Catmull-Rom (half the
//! difference of the neighbours); endpoints use the line to their single
//! neighbour unless the first and last points coincide, in which case the
//! spline is treated as closed and wraps around.

use glam::{Quat, Vec3};

use armature_core::math::{quat_exp, quat_log, squad};

use crate::values::Interpolatable;

/// Hermite spline through `Vec3` points.
#[derive(Debug, Clone, Default)]
pub struct SimpleSpline {
    points: Vec<Vec3>,
    tangents: Vec<Vec3>,
}

impl SimpleSpline {
    #[must_use]
    pub fn new(points: Vec<Vec3>) -> Self {
        let mut spline = Self {
            points,
            tangents: Vec::new(),
        };
        spline.recalc_tangents();
        spline
    }

    #[must_use]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    fn recalc_tangents(&mut self) {
        let n = self.points.len();
        self.tangents.clear();
        if n < 2 {
            return;
        }
        let p = &self.points;
        let closed = p[0] == p[n - 1];

        self.tangents.reserve(n);
        for i in 0..n {
            let tangent = if i == 0 {
                if closed { 0.5 * (p[1] - p[n - 2]) } else { 0.5 * (p[1] - p[0]) }
            } else if i == n - 1 {
                if closed { self.tangents[0] } else { 0.5 * (p[i] - p[i - 1]) }
            } else {
                0.5 * (p[i + 1] - p[i - 1])
            };
            self.tangents.push(tangent);
        }
    }

    /// Evaluates the segment starting at point `from` at parameter `t ∈ [0, 1]`.
    #[must_use]
    pub fn interpolate(&self, from: usize, t: f32) -> Vec3 {
        let Some(&start) = self.points.get(from) else {
            return self.points.last().copied().unwrap_or(Vec3::ZERO);
        };
        if from + 1 == self.points.len() || t == 0.0 {
            return start;
        }
        let end = self.points[from + 1];
        if t == 1.0 {
            return end;
        }
        Vec3::interpolate_cubic(start, self.tangents[from], self.tangents[from + 1], end, t, 1.0)
    }
}

/// Squad spline through unit quaternions.
#[derive(Debug, Clone, Default)]
pub struct RotationalSpline {
    points: Vec<Quat>,
    tangents: Vec<Quat>,
}

impl RotationalSpline {
    #[must_use]
    pub fn new(points: Vec<Quat>) -> Self {
        let mut spline = Self {
            points,
            tangents: Vec::new(),
        };
        spline.recalc_tangents();
        spline
    }

    // tangent[i] = p * exp(-0.25 * (log(p⁻¹ * next) + log(p⁻¹ * prev)))
    fn recalc_tangents(&mut self) {
        let n = self.points.len();
        self.tangents.clear();
        if n < 2 {
            return;
        }
        let p = &self.points;
        let closed = p[0] == p[n - 1];

        self.tangents.reserve(n);
        for i in 0..n {
            let point = p[i];
            let inv = point.inverse();
            let (next, prev) = if i == 0 {
                (p[1], if closed { p[n - 2] } else { point })
            } else if i == n - 1 {
                (if closed { p[1] } else { point }, p[i - 1])
            } else {
                (p[i + 1], p[i - 1])
            };
            let part1 = quat_log(inv * next);
            let part2 = quat_log(inv * prev);
            let pre_exp = (part1 + part2) * -0.25;
            self.tangents.push(point * quat_exp(pre_exp));
        }
    }

    #[must_use]
    pub fn interpolate(&self, from: usize, t: f32, shortest_path: bool) -> Quat {
        let Some(&start) = self.points.get(from) else {
            return self.points.last().copied().unwrap_or(Quat::IDENTITY);
        };
        if from + 1 == self.points.len() || t == 0.0 {
            return start;
        }
        let end = self.points[from + 1];
        if t == 1.0 {
            return end;
        }
        squad(t, start, self.tangents[from], self.tangents[from + 1], end, shortest_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spline_passes_through_points() {
        let spline = SimpleSpline::new(vec![Vec3::ZERO, Vec3::X, Vec3::new(2.0, 1.0, 0.0)]);
        assert_eq!(spline.interpolate(0, 0.0), Vec3::ZERO);
        assert_eq!(spline.interpolate(0, 1.0), Vec3::X);
        assert_eq!(spline.interpolate(2, 0.5), Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn collinear_evenly_spaced_points_interpolate_linearly() {
        let spline = SimpleSpline::new(vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0, Vec3::X * 3.0]);
        let mid = spline.interpolate(1, 0.5);
        assert!(mid.abs_diff_eq(Vec3::X * 1.5, 1e-5), "{mid}");
    }

    #[test]
    fn rotational_spline_uniform_rotation() {
        let points: Vec<Quat> = (0..4).map(|i| Quat::from_rotation_y(0.5 * i as f32)).collect();
        let spline = RotationalSpline::new(points.clone());
        assert!(spline.interpolate(1, 1.0, true).abs_diff_eq(points[2], 1e-6));
        let mid = spline.interpolate(1, 0.5, true);
        assert!((mid.length() - 1.0).abs() < 1e-4);
        assert!(mid.abs_diff_eq(Quat::from_rotation_y(0.75), 1e-4), "{mid}");
    }
}
