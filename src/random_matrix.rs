//! Generation of random test matrices and synthetic image planes.

use crate::compute_svd::ComputeSVD;
use ndarray::{Array, Array2, Array3};
use ndarray_linalg::{Lapack, Scalar};
use num::traits::cast::cast;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

pub trait RandomMatrix
where
    Self: Scalar + Lapack + ComputeSVD<A = Self>,
{
    /// Generate a random Gaussian matrix.
    ///
    /// # Arguments
    ///
    /// * `dimension`: Tuple (rows, cols) specifying the number of rows and columns.
    /// * `rng`: The random number generator to use.
    fn random_gaussian<R: Rng>(dimension: (usize, usize), rng: &mut R) -> Array2<Self> {
        let normal = Normal::new(0.0, 1.0).unwrap();
        Array2::from_shape_simple_fn(dimension, || {
            cast::<f64, Self>(normal.sample(rng)).unwrap()
        })
    }

    /// Generate a random matrix with orthonormal columns (m >= n) or rows (n > m).
    fn random_orthogonal_matrix<R: Rng>(dimension: (usize, usize), rng: &mut R) -> Array2<Self> {
        let (m, n) = dimension;

        // Orthonormalize a long and skinny matrix and transpose back if needed.
        let mat = Self::random_gaussian((m.max(n), m.min(n)), rng);
        let u = Self::compute_svd(mat.view())
            .expect("`random_orthogonal_matrix`: SVD computation failed.")
            .u;

        if n > m {
            u.t().to_owned()
        } else {
            u
        }
    }

    /// Generate a random approximate low-rank matrix.
    ///
    /// The singular values are logarithmically distributed between
    /// `sigma_max` and `sigma_min`.
    fn random_approximate_low_rank_matrix<R: Rng>(
        dimension: (usize, usize),
        sigma_max: f64,
        sigma_min: f64,
        rng: &mut R,
    ) -> Array2<Self> {
        assert!(
            sigma_min < sigma_max,
            "`sigma_min` must be smaller than `sigma_max`"
        );
        assert!(sigma_min > 0.0, "`sigma_min` must be positive.");

        let min_dim = dimension.0.min(dimension.1);
        let singvals = Array::geomspace(sigma_max, sigma_min, min_dim)
            .unwrap()
            .mapv(|item| cast::<f64, Self>(item).unwrap());

        Self::from_singular_values(dimension, singvals.as_slice().unwrap(), rng)
    }

    /// Generate a random matrix of exact rank `rank` with unit singular values.
    fn random_low_rank_matrix<R: Rng>(
        dimension: (usize, usize),
        rank: usize,
        rng: &mut R,
    ) -> Array2<Self> {
        let min_dim = dimension.0.min(dimension.1);
        assert!(rank <= min_dim, "`rank` must not exceed min(m, n).");

        let singvals: Vec<Self> = (0..min_dim)
            .map(|index| if index < rank { Self::one() } else { Self::zero() })
            .collect();

        Self::from_singular_values(dimension, &singvals, rng)
    }

    /// Build `U diag(singvals) V^T` from random orthogonal factors.
    fn from_singular_values<R: Rng>(
        dimension: (usize, usize),
        singvals: &[Self],
        rng: &mut R,
    ) -> Array2<Self> {
        let min_dim = dimension.0.min(dimension.1);
        assert_eq!(singvals.len(), min_dim);

        let u = Self::random_orthogonal_matrix((dimension.0, min_dim), rng);
        let vt = Self::random_orthogonal_matrix((min_dim, dimension.1), rng);
        let sigma = Array2::from_diag(&Array::from(singvals.to_vec()));
        u.dot(&sigma.dot(&vt))
    }
}

impl RandomMatrix for f64 {}

/// Generate a synthetic 8-bit image as `(height, width, channels)` samples.
///
/// Every channel is a smooth gradient overlaid with uniform noise of the
/// given `amplitude`, so that truncations at decreasing ranks lose
/// progressively more detail.
pub fn random_image<R: Rng>(
    dimension: (usize, usize, usize),
    amplitude: f64,
    rng: &mut R,
) -> Array3<u8> {
    let (height, width, channels) = dimension;
    let noise = Uniform::new_inclusive(-amplitude, amplitude);

    Array3::from_shape_fn(dimension, |(row, col, channel)| {
        let position = (row + col + channel * 7) as f64;
        let gradient = 255.0 * position / (height + width + channels * 7) as f64;
        (gradient + noise.sample(rng)).round().max(0.0).min(255.0) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::RelDiff;

    macro_rules! orthogonal_matrix_tests {

        ($($name:ident: $scalar:ty, $dim:expr, $tol:expr,)*) => {

            $(

        #[test]
        fn $name() {
            let (m, n) = $dim;
            let mut rng = rand::thread_rng();
            let mat = <$scalar>::random_orthogonal_matrix((m, n), &mut rng);

            assert_eq!(mat.dim(), (m, n));

            let gram = if m >= n { mat.t().dot(&mat) } else { mat.dot(&mat.t()) };
            let eye = Array2::<$scalar>::eye(m.min(n));

            assert!(gram.rel_diff(&eye) < $tol);
        }

            )*

        }
    }

    orthogonal_matrix_tests! {
        test_orthogonal_matrix_f64_thin: f64, (60, 20), 1E-12,
        test_orthogonal_matrix_f64_thick: f64, (20, 60), 1E-12,
        test_orthogonal_matrix_f64_square: f64, (30, 30), 1E-12,
    }

    #[test]
    fn test_random_low_rank_matrix_has_requested_rank() {
        let mut rng = rand::thread_rng();
        let mat = f64::random_low_rank_matrix((40, 30), 7, &mut rng);
        let svd = f64::compute_svd(mat.view()).unwrap();

        assert!(svd.s[6] > 0.5);
        assert!(svd.s[7] < 1E-10);
    }

    #[test]
    fn test_random_image_stays_in_range() {
        let mut rng = rand::thread_rng();
        let image = random_image((16, 24, 3), 40.0, &mut rng);

        assert_eq!(image.dim(), (16, 24, 3));
        assert!(image.iter().any(|&value| value > 0));
    }
}
