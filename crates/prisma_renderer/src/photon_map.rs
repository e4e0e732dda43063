//! Photon storage: a balanced KD-tree over a flat photon array.
//!
//! The array is reorganized in place so that index (lo + hi) / 2 of every
//! subrange holds the median along the axis of largest extent, giving an
//! implicit balanced binary tree addressable by integer ranges. Queries are
//! branch-and-bound: near child first, far child only if the splitting
//! plane is within the current search radius.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use prisma_math::Vec3;

/// A unit of flux carried from a light to a diffuse vertex.
#[derive(Debug, Clone, Copy)]
pub struct Photon {
    /// Position of the photon hit
    pub position: Vec3,
    /// Flux (power) carried by the photon
    pub power: Vec3,
    /// Direction the photon arrived from (unit, pointing back to the source)
    pub incoming: Vec3,
    /// Split axis recorded by the KD-tree builder (0, 1 or 2)
    pub plane: u8,
}

/// A photon found by a k-nearest query, with its squared distance.
///
/// Ordered as a max-heap on distance so the farthest neighbor sits on top.
#[derive(Debug, Clone, Copy)]
pub struct NearPhoton {
    pub index: usize,
    pub dist_sq: f32,
}

impl PartialEq for NearPhoton {
    fn eq(&self, other: &Self) -> bool {
        self.dist_sq == other.dist_sq
    }
}
impl Eq for NearPhoton {}

impl PartialOrd for NearPhoton {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for NearPhoton {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq.total_cmp(&other.dist_sq)
    }
}

/// A balanced KD-tree of photons supporting radius and k-nearest queries.
#[derive(Default)]
pub struct PhotonMap {
    photons: Vec<Photon>,
}

impl PhotonMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a photon. The map is not queryable until `build` runs.
    pub fn add_photon(&mut self, photon: Photon) {
        self.photons.push(photon);
    }

    /// Append a batch of photons (worker-thread merge).
    pub fn extend(&mut self, photons: impl IntoIterator<Item = Photon>) {
        self.photons.extend(photons);
    }

    pub fn len(&self) -> usize {
        self.photons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    pub fn photon(&self, index: usize) -> &Photon {
        &self.photons[index]
    }

    /// Balance the flat array into the implicit KD-tree. O(n log n).
    pub fn build(&mut self) {
        if self.photons.is_empty() {
            return;
        }
        let hi = self.photons.len() - 1;
        self.balance(0, hi);
        log::info!("photon map built with {} photons", self.photons.len());
    }

    fn balance(&mut self, start: usize, end: usize) {
        // Axis of largest extent over this subrange.
        let mut min_p = Vec3::splat(f32::INFINITY);
        let mut max_p = Vec3::splat(f32::NEG_INFINITY);
        for photon in &self.photons[start..=end] {
            min_p = min_p.min(photon.position);
            max_p = max_p.max(photon.position);
        }
        let extents = max_p - min_p;

        let mut axis = 0;
        if extents.y > extents.x {
            axis = 1;
        }
        if extents.z > extents[axis] {
            axis = 2;
        }

        let mid = (start + end) / 2;

        self.photons[start..=end].select_nth_unstable_by(mid - start, |a, b| {
            a.position[axis].total_cmp(&b.position[axis])
        });
        self.photons[mid].plane = axis as u8;

        if mid > start {
            self.balance(start, mid - 1);
        }
        if mid < end {
            self.balance(mid + 1, end);
        }
    }

    /// Collect the indices of all photons within `radius` of `q`.
    pub fn find_in_radius(&self, q: Vec3, radius: f32, results: &mut Vec<usize>) {
        if self.photons.is_empty() {
            return;
        }
        self.radius_recursive(0, self.photons.len() - 1, q, radius * radius, results);
    }

    fn radius_recursive(&self, start: usize, end: usize, q: Vec3, r2: f32, results: &mut Vec<usize>) {
        let mid = (start + end) / 2;
        let current = &self.photons[mid];

        if (current.position - q).length_squared() <= r2 {
            results.push(mid);
        }

        let axis = current.plane as usize;
        let diff = q[axis] - current.position[axis];

        // Near child first; far child only if the sphere crosses the plane.
        if diff < 0.0 {
            if mid > start {
                self.radius_recursive(start, mid - 1, q, r2, results);
            }
            if diff * diff < r2 && mid < end {
                self.radius_recursive(mid + 1, end, q, r2, results);
            }
        } else {
            if mid < end {
                self.radius_recursive(mid + 1, end, q, r2, results);
            }
            if diff * diff < r2 && mid > start {
                self.radius_recursive(start, mid - 1, q, r2, results);
            }
        }
    }

    /// Find up to `k` nearest photons within `initial_radius` of `q`.
    ///
    /// The search radius shrinks to the current k-th neighbor once the heap
    /// fills. Returns the neighbors and the squared radius that bounds them
    /// (distance to the k-th neighbor, or the initial radius squared when
    /// fewer than k photons were found).
    pub fn find_knn(&self, q: Vec3, k: usize, initial_radius: f32) -> (Vec<NearPhoton>, f32) {
        let mut heap: BinaryHeap<NearPhoton> = BinaryHeap::with_capacity(k + 1);
        let mut r2 = initial_radius * initial_radius;

        if self.photons.is_empty() || k == 0 {
            return (Vec::new(), r2);
        }

        self.knn_recursive(0, self.photons.len() - 1, q, k, &mut heap, &mut r2);

        (heap.into_sorted_vec(), r2)
    }

    fn knn_recursive(
        &self,
        start: usize,
        end: usize,
        q: Vec3,
        k: usize,
        heap: &mut BinaryHeap<NearPhoton>,
        r2: &mut f32,
    ) {
        let mid = (start + end) / 2;
        let current = &self.photons[mid];

        let dist_sq = (current.position - q).length_squared();
        if dist_sq < *r2 {
            if heap.len() < k {
                heap.push(NearPhoton { index: mid, dist_sq });
                if heap.len() == k {
                    // Heap is full: from here on the farthest collected
                    // neighbor bounds the search.
                    *r2 = heap.peek().expect("non-empty heap").dist_sq;
                }
            } else {
                heap.pop();
                heap.push(NearPhoton { index: mid, dist_sq });
                *r2 = heap.peek().expect("non-empty heap").dist_sq;
            }
        }

        let axis = current.plane as usize;
        let diff = q[axis] - current.position[axis];

        if diff < 0.0 {
            if mid > start {
                self.knn_recursive(start, mid - 1, q, k, heap, r2);
            }
            if diff * diff < *r2 && mid < end {
                self.knn_recursive(mid + 1, end, q, k, heap, r2);
            }
        } else {
            if mid < end {
                self.knn_recursive(mid + 1, end, q, k, heap, r2);
            }
            if diff * diff < *r2 && mid > start {
                self.knn_recursive(start, mid - 1, q, k, heap, r2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_map(n: usize, seed: u64) -> PhotonMap {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut map = PhotonMap::new();
        for _ in 0..n {
            map.add_photon(Photon {
                position: Vec3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                ),
                power: Vec3::ONE,
                incoming: Vec3::Y,
                plane: 0,
            });
        }
        map.build();
        map
    }

    #[test]
    fn test_radius_search_matches_brute_force() {
        let map = random_map(500, 5);
        let q = Vec3::new(1.0, -2.0, 0.5);
        let radius = 3.0;

        let mut found = Vec::new();
        map.find_in_radius(q, radius, &mut found);

        let brute: usize = (0..map.len())
            .filter(|&i| (map.photon(i).position - q).length_squared() <= radius * radius)
            .count();

        assert_eq!(found.len(), brute);
        for &i in &found {
            assert!((map.photon(i).position - q).length() <= radius + 1e-4);
        }
    }

    #[test]
    fn test_knn_matches_brute_force() {
        let map = random_map(500, 9);
        let q = Vec3::new(0.3, 0.3, -4.0);
        let k = 20;

        let (neighbors, r2) = map.find_knn(q, k, 100.0);
        assert_eq!(neighbors.len(), k);

        // Brute force distances, sorted.
        let mut dists: Vec<f32> = (0..map.len())
            .map(|i| (map.photon(i).position - q).length_squared())
            .collect();
        dists.sort_by(f32::total_cmp);

        let mut found: Vec<f32> = neighbors.iter().map(|n| n.dist_sq).collect();
        found.sort_by(f32::total_cmp);

        for (a, b) in found.iter().zip(dists.iter().take(k)) {
            assert!((a - b).abs() < 1e-5, "knn {a} vs brute {b}");
        }

        // Reported radius is the squared distance to the k-th neighbor.
        assert!((r2 - dists[k - 1]).abs() < 1e-5);
    }

    #[test]
    fn test_knn_respects_initial_radius() {
        let map = random_map(500, 13);
        let q = Vec3::ZERO;
        let radius = 1.0;

        let (neighbors, r2) = map.find_knn(q, 1000, radius);
        let brute = (0..map.len())
            .filter(|&i| (map.photon(i).position - q).length_squared() < radius * radius)
            .count();

        assert_eq!(neighbors.len(), brute);
        // Fewer than k photons in range: radius stays at the initial value.
        assert!((r2 - radius * radius).abs() < 1e-6);
    }

    #[test]
    fn test_knn_empty_map() {
        let map = PhotonMap::new();
        let (neighbors, _) = map.find_knn(Vec3::ZERO, 10, 1.0);
        assert!(neighbors.is_empty());
    }

    #[test]
    fn test_build_assigns_longest_axis() {
        // Photons spread along x only: every split plane must be x.
        let mut map = PhotonMap::new();
        for i in 0..31 {
            map.add_photon(Photon {
                position: Vec3::new(i as f32, 0.0, 0.0),
                power: Vec3::ONE,
                incoming: Vec3::Y,
                plane: 2,
            });
        }
        map.build();

        let mut found = Vec::new();
        map.find_in_radius(Vec3::new(15.0, 0.0, 0.0), 3.1, &mut found);
        // 12, 13, ..., 18
        assert_eq!(found.len(), 7);
    }
}
