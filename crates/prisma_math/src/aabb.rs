use glam::Vec3;

use crate::{Interval, Ray, PADDING_EPSILON};

/// Axis-Aligned Bounding Box for spatial acceleration structures (BVH).
///
/// Stored as corner points with min <= max per component. Degenerate flat
/// boxes are padded so the slab test never collapses to a zero-width slab.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create an AABB from two corner points (any order).
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let mut aabb = Self {
            min: a.min(b),
            max: a.max(b),
        };
        aabb.pad_to_minimums();
        aabb
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            min: box0.min.min(box1.min),
            max: box0.max.max(box1.max),
        }
    }

    /// Test if a ray intersects this AABB within the given interval.
    ///
    /// Slab method on the ray's cached inverse direction: no division and no
    /// branching on the sign of the direction. The component-wise min/max
    /// implicitly swaps slabs for negative direction components.
    pub fn hit(&self, r: &Ray, ray_t: Interval) -> bool {
        let t0 = (self.min - r.origin()) * r.inv_direction();
        let t1 = (self.max - r.origin()) * r.inv_direction();

        let t_smaller = t0.min(t1);
        let t_bigger = t0.max(t1);

        let t_enter = ray_t.min.max(t_smaller.max_element());
        let t_exit = ray_t.max.min(t_bigger.min_element());

        t_enter < t_exit
    }

    /// Translate the AABB by an offset vector.
    pub fn translate(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let size = self.max - self.min;
        if size.x > size.y && size.x > size.z {
            0
        } else if size.y > size.z {
            1
        } else {
            2
        }
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Pad flat axes so BVH children remain testable.
    fn pad_to_minimums(&mut self) {
        for axis in 0..3 {
            if self.max[axis] - self.min[axis] < PADDING_EPSILON {
                self.min[axis] -= PADDING_EPSILON;
                self.max[axis] += PADDING_EPSILON;
            }
        }
    }

    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };
}
