//! Bounding Volume Hierarchy acceleration structure.
//!
//! Mid-split builder: each node sorts its range by the lower bound of the
//! object bounding boxes along the widest axis and splits at the median.
//! Traversal is front-to-back, visiting the child on the near side of the
//! ray first and shortening t_max with the first hit.

use std::cmp::Ordering;
use std::sync::Arc;

use prisma_math::{Aabb, Interval, Ray, Vec3};

use crate::hittable::{HitRecord, Hittable};

/// Stand-in bounds for objects that report no bounding box; effectively
/// "the whole scene", so the BVH never culls them incorrectly.
fn bounds_or_universe(object: &Arc<dyn Hittable>, time0: f32, time1: f32) -> Aabb {
    object.bounding_box(time0, time1).unwrap_or(Aabb {
        min: Vec3::splat(-1e30),
        max: Vec3::splat(1e30),
    })
}

/// BVH node: a branch with two children, or a leaf with one or two objects.
pub enum BvhNode {
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
        /// Axis the children were split along; drives traversal order.
        axis: usize,
    },
    Leaf {
        /// One or two objects, ordered near-first along the split axis.
        objects: Vec<Arc<dyn Hittable>>,
        bbox: Aabb,
    },
    Empty,
}

impl BvhNode {
    /// Build a BVH over shared scene objects for the given shutter interval.
    pub fn new(objects: Vec<Arc<dyn Hittable>>, time0: f32, time1: f32) -> Self {
        if objects.is_empty() {
            return BvhNode::Empty;
        }
        let mut objects = objects;
        Self::build(&mut objects[..], time0, time1)
    }

    fn build(objects: &mut [Arc<dyn Hittable>], time0: f32, time1: f32) -> Self {
        // Bounds of the whole range decide the split axis.
        let bounds = objects
            .iter()
            .map(|o| bounds_or_universe(o, time0, time1))
            .reduce(|a, b| Aabb::surrounding(&a, &b))
            .expect("non-empty range");

        let axis = bounds.longest_axis();

        let key = |o: &Arc<dyn Hittable>| bounds_or_universe(o, time0, time1).min[axis];
        objects.sort_unstable_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal));

        if objects.len() <= 2 {
            // Leaves keep the axis ordering, so the nearer object is
            // intersected first for rays travelling in +axis.
            return BvhNode::Leaf {
                objects: objects.to_vec(),
                bbox: bounds,
            };
        }

        let mid = objects.len() / 2;
        let (left_objects, right_objects) = objects.split_at_mut(mid);

        let left = Self::build(left_objects, time0, time1);
        let right = Self::build(right_objects, time0, time1);

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox: bounds,
            axis,
        }
    }
}

impl Hittable for BvhNode {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool {
        match self {
            BvhNode::Empty => false,

            BvhNode::Leaf { objects, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return false;
                }

                let mut hit_anything = false;
                let mut closest = ray_t.max;

                for object in objects {
                    if object.hit(ray, Interval::new(ray_t.min, closest), rec) {
                        hit_anything = true;
                        closest = rec.t;
                    }
                }
                hit_anything
            }

            BvhNode::Branch {
                left,
                right,
                bbox,
                axis,
            } => {
                if !bbox.hit(ray, ray_t) {
                    return false;
                }

                // Children were split along `axis` with "left" on the lower
                // side; a ray travelling positively along the axis reaches
                // the left child first.
                let (first, second) = if ray.direction()[*axis] >= 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };

                let hit_first = first.hit(ray, ray_t, rec);
                let second_max = if hit_first { rec.t } else { ray_t.max };
                let hit_second = second.hit(ray, Interval::new(ray_t.min, second_max), rec);

                hit_first || hit_second
            }
        }
    }

    fn bounding_box(&self, _time0: f32, _time1: f32) -> Option<Aabb> {
        match self {
            BvhNode::Empty => None,
            BvhNode::Leaf { bbox, .. } | BvhNode::Branch { bbox, .. } => Some(*bbox),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Lambertian;
    use crate::sphere::Sphere;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_spheres(n: usize, seed: u64) -> Vec<Arc<dyn Hittable>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let material = Arc::new(Lambertian::new(Vec3::splat(0.5)));
        (0..n)
            .map(|_| {
                let center = Vec3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                );
                let radius = rng.gen_range(0.1..1.0);
                Arc::new(Sphere::new(center, radius, material.clone())) as Arc<dyn Hittable>
            })
            .collect()
    }

    #[test]
    fn test_bvh_empty() {
        let bvh = BvhNode::new(vec![], 0.0, 1.0);
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::Z);
        let mut rec = HitRecord::default();
        assert!(!bvh.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
        assert!(bvh.bounding_box(0.0, 1.0).is_none());
    }

    #[test]
    fn test_bvh_single_sphere() {
        let objects = random_spheres(1, 3);
        let bvh = BvhNode::new(objects, 0.0, 1.0);
        assert!(matches!(bvh, BvhNode::Leaf { .. }));
    }

    #[test]
    fn test_bvh_matches_linear_sweep() {
        // For every ray, the BVH returns the same hit (same t) as a brute
        // force sweep over all objects.
        let objects = random_spheres(100, 11);
        let bvh = BvhNode::new(objects.clone(), 0.0, 1.0);

        let mut rng = StdRng::seed_from_u64(23);
        let mut checked_hits = 0;

        for _ in 0..500 {
            let origin = Vec3::new(
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
            );
            let dir = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if dir.length_squared() < 1e-6 {
                continue;
            }
            let ray = Ray::new_simple(origin, dir);
            let interval = Interval::new(0.001, f32::INFINITY);

            let mut bvh_rec = HitRecord::default();
            let bvh_hit = bvh.hit(&ray, interval, &mut bvh_rec);

            let mut linear_rec = HitRecord::default();
            let mut linear_hit = false;
            let mut closest = interval.max;
            for object in &objects {
                if object.hit(&ray, Interval::new(interval.min, closest), &mut linear_rec) {
                    linear_hit = true;
                    closest = linear_rec.t;
                }
            }

            assert_eq!(bvh_hit, linear_hit);
            if bvh_hit {
                assert!((bvh_rec.t - linear_rec.t).abs() < 1e-4);
                checked_hits += 1;
            }
        }

        assert!(checked_hits > 20, "too few hits to be meaningful");
    }

    #[test]
    fn test_bvh_box_encloses_children() {
        let objects = random_spheres(50, 99);
        let bvh = BvhNode::new(objects.clone(), 0.0, 1.0);
        let root = bvh.bounding_box(0.0, 1.0).unwrap();

        for object in &objects {
            let bbox = object.bounding_box(0.0, 1.0).unwrap();
            assert!(root.min.cmple(bbox.min).all());
            assert!(root.max.cmpge(bbox.max).all());
        }
    }
}
