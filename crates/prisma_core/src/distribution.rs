//! Inverse-CDF sampling for discrete and continuous distributions.
//!
//! `Distribution1D` importance-samples an array of non-negative weights
//! (light powers, texture rows); `Distribution2D` composes a marginal and
//! per-row conditionals for image-based sampling (HDRI importance sampling).

/// A 1D probability distribution over `n` tabulated function values.
///
/// The CDF has length n + 1 with CDF[0] = 0 and CDF[n] = 1. If the function
/// integrates to zero the CDF is linear, so sampling still returns a
/// uniformly distributed index.
#[derive(Debug, Clone)]
pub struct Distribution1D {
    pub func: Vec<f32>,
    pub cdf: Vec<f32>,
    pub func_int: f32,
}

impl Distribution1D {
    pub fn new(f: &[f32]) -> Self {
        let n = f.len();
        assert!(n > 0, "empty distribution");

        let mut cdf = vec![0.0; n + 1];
        for i in 0..n {
            cdf[i + 1] = cdf[i] + f[i] / n as f32;
        }

        let func_int = cdf[n];
        if func_int == 0.0 {
            for (i, c) in cdf.iter_mut().enumerate() {
                *c = i as f32 / n as f32;
            }
        } else {
            for c in cdf.iter_mut() {
                *c /= func_int;
            }
        }

        Self {
            func: f.to_vec(),
            cdf,
            func_int,
        }
    }

    pub fn count(&self) -> usize {
        self.func.len()
    }

    /// Index of the CDF segment [cdf[i], cdf[i+1]) containing u.
    fn find_segment(&self, u: f32) -> usize {
        // First entry greater than u, minus one; cdf[0] = 0 <= u guarantees
        // the subtraction is safe, the min guards u >= 1.
        let upper = self.cdf.partition_point(|&c| c <= u);
        (upper - 1).min(self.count() - 1)
    }

    /// Sample a continuous value in [0, 1).
    ///
    /// Returns (value, pdf, index).
    pub fn sample_continuous(&self, u: f32) -> (f32, f32, usize) {
        let offset = self.find_segment(u);

        let mut du = u - self.cdf[offset];
        let width = self.cdf[offset + 1] - self.cdf[offset];
        if width > 0.0 {
            du /= width;
        }

        let pdf = self.func[offset] / if self.func_int > 0.0 { self.func_int } else { 1.0 };
        ((offset as f32 + du) / self.count() as f32, pdf, offset)
    }

    /// Sample a discrete index.
    ///
    /// Returns (index, pdf, remapped u) where the remapped random number can
    /// be reused for another sampling dimension.
    pub fn sample_discrete(&self, u: f32) -> (usize, f32, f32) {
        let offset = self.find_segment(u);
        let pdf = self.pdf_discrete(offset);

        let width = self.cdf[offset + 1] - self.cdf[offset];
        let remapped = if width > 0.0 {
            (u - self.cdf[offset]) / width
        } else {
            0.0
        };
        (offset, pdf, remapped)
    }

    /// Probability of drawing a specific index with `sample_discrete`.
    pub fn pdf_discrete(&self, index: usize) -> f32 {
        if index >= self.count() {
            return 0.0;
        }
        if self.func_int > 0.0 {
            self.func[index] / (self.func_int * self.count() as f32)
        } else {
            1.0 / self.count() as f32
        }
    }
}

/// A 2D distribution over an image: one marginal over rows plus a
/// conditional per row.
#[derive(Debug, Clone)]
pub struct Distribution2D {
    pub conditional: Vec<Distribution1D>,
    pub marginal: Distribution1D,
}

impl Distribution2D {
    /// Build from row-major data of `nv` rows with `nu` entries each.
    pub fn new(data: &[f32], nu: usize, nv: usize) -> Self {
        assert_eq!(data.len(), nu * nv, "data does not match dimensions");

        let conditional: Vec<Distribution1D> = (0..nv)
            .map(|v| Distribution1D::new(&data[v * nu..(v + 1) * nu]))
            .collect();

        let marginal_func: Vec<f32> = conditional.iter().map(|c| c.func_int).collect();
        let marginal = Distribution1D::new(&marginal_func);

        Self {
            conditional,
            marginal,
        }
    }

    /// Sample (u, v) in [0, 1)^2 from the joint distribution.
    ///
    /// Returns ((u, v), joint pdf).
    pub fn sample_continuous(&self, u0: f32, u1: f32) -> ((f32, f32), f32) {
        let (d1, pdf_v, v_idx) = self.marginal.sample_continuous(u1);
        let (d0, pdf_u, _) = self.conditional[v_idx].sample_continuous(u0);
        ((d0, d1), pdf_u * pdf_v)
    }

    /// Joint PDF at a (u, v) position.
    pub fn pdf(&self, u: f32, v: f32) -> f32 {
        let nu = self.conditional[0].count();
        let nv = self.marginal.count();

        let iu = ((u * nu as f32) as usize).min(nu - 1);
        let iv = ((v * nv as f32) as usize).min(nv - 1);

        if self.marginal.func_int <= 0.0 {
            return 0.0;
        }
        self.conditional[iv].func[iu] / self.marginal.func_int
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdf_shape() {
        let dist = Distribution1D::new(&[1.0, 3.0, 2.0, 2.0]);
        assert_eq!(dist.cdf.len(), 5);
        assert_eq!(dist.cdf[0], 0.0);
        assert!((dist.cdf[4] - 1.0).abs() < 1e-6);
        // Monotonically non-decreasing.
        for w in dist.cdf.windows(2) {
            assert!(w[1] >= w[0]);
        }
        assert!((dist.func_int - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_discrete_pdf_sums_to_one() {
        let dist = Distribution1D::new(&[1.0, 3.0, 2.0, 2.0]);
        let total: f32 = (0..4).map(|i| dist.pdf_discrete(i)).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(dist.pdf_discrete(17), 0.0);
    }

    #[test]
    fn test_sample_discrete_frequency() {
        // Empirical frequencies converge to f[i] / sum(f).
        let f = [1.0, 3.0, 2.0, 2.0];
        let dist = Distribution1D::new(&f);
        let n = 40_000;
        let mut counts = [0usize; 4];

        for k in 0..n {
            let u = (k as f32 + 0.5) / n as f32;
            let (idx, pdf, remapped) = dist.sample_discrete(u);
            counts[idx] += 1;
            assert!(pdf > 0.0);
            assert!((0.0..=1.0).contains(&remapped));
        }

        let total: f32 = f.iter().sum();
        for i in 0..4 {
            let expected = f[i] / total;
            let observed = counts[i] as f32 / n as f32;
            assert!(
                (observed - expected).abs() < 0.01,
                "index {i}: observed {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_sample_continuous_matches_segment() {
        let dist = Distribution1D::new(&[0.0, 1.0, 0.0, 0.0]);
        // All the mass lives in the second quarter.
        for k in 0..100 {
            let u = k as f32 / 100.0;
            let (x, pdf, idx) = dist.sample_continuous(u);
            assert_eq!(idx, 1);
            assert!((0.25..=0.5).contains(&x), "x = {x}");
            assert!((pdf - 4.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_zero_function_is_uniform() {
        let dist = Distribution1D::new(&[0.0, 0.0, 0.0, 0.0]);
        let (idx, pdf, _) = dist.sample_discrete(0.6);
        assert_eq!(idx, 2);
        assert!((pdf - 0.25).abs() < 1e-6);

        let (x, _, _) = dist.sample_continuous(0.5);
        assert!((x - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_distribution_2d_concentration() {
        // A single bright pixel attracts nearly all samples.
        let mut data = vec![0.0f32; 16];
        data[2 * 4 + 1] = 10.0; // row 2, column 1
        let dist = Distribution2D::new(&data, 4, 4);

        let ((u, v), pdf) = dist.sample_continuous(0.3, 0.7);
        assert!((0.25..=0.5).contains(&u), "u = {u}");
        assert!((0.5..=0.75).contains(&v), "v = {v}");
        assert!(pdf > 0.0);

        // pdf lookup agrees with where the mass is.
        assert!(dist.pdf(0.3, 0.6) > 0.0);
        assert_eq!(dist.pdf(0.9, 0.9), 0.0);
    }
}
