//! Orthonormal basis for shading-space math.
//!
//! Transforms vectors between world space and a local frame where the
//! surface normal is (0, 0, 1).

use glam::Vec3;

use crate::EPSILON;

/// A right-handed orthonormal basis {u, v, w} with w along the normal.
#[derive(Debug, Clone, Copy)]
pub struct Onb {
    pub u: Vec3,
    pub v: Vec3,
    pub w: Vec3,
}

impl Onb {
    /// Construct an ONB from a surface normal.
    pub fn from_normal(n: Vec3) -> Self {
        let w = n.normalize();

        // Pick a helper axis that is not parallel to the normal.
        let a = if w.x.abs() > 1.0 - EPSILON {
            Vec3::Y
        } else {
            Vec3::X
        };

        let v = w.cross(a).normalize();
        let u = w.cross(v);
        Self { u, v, w }
    }

    /// Construct an ONB from a surface normal and a geometric tangent.
    ///
    /// The TBN frame for normal mapping: u is the tangent made perpendicular
    /// to w by Gram-Schmidt. Falls back to `from_normal` when the tangent is
    /// parallel to the normal.
    pub fn from_normal_tangent(n: Vec3, tangent: Vec3) -> Self {
        let w = n.normalize();
        let u_raw = tangent - w * tangent.dot(w);

        if u_raw.length() < EPSILON {
            return Self::from_normal(n);
        }

        let u = u_raw.normalize();
        let v = w.cross(u);
        Self { u, v, w }
    }

    /// Transform a vector from local (tangent) space to world space.
    #[inline]
    pub fn local(&self, a: Vec3) -> Vec3 {
        a.x * self.u + a.y * self.v + a.z * self.w
    }
}
