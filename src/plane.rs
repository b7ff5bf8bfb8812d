//! Factorized representation of a single image plane.
//!
//! A plane $A\in\mathbb{R}^{m\times n}$ is stored as its thin singular value
//! decomposition $A = U\Sigma V^T$ with $r = \min(m, n)$ singular values.
//! Nothing is discarded at factorization time. A rank $k$ approximation is
//! derived on demand as $U_{:, :k}\Sigma_{:k}V^T_{:k, :}$, so changing the
//! rank never touches the stored factors.

use crate::compute_svd::ComputeSVD;
use crate::types::{validate_rank, Result, SvdImageError};
use itertools::Itertools;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};

#[derive(Clone, Debug, PartialEq)]
pub struct PlaneFactorization {
    u: Array2<f64>,
    s: Array1<f64>,
    vt: Array2<f64>,
}

impl PlaneFactorization {
    /// Compute the full thin SVD of `matrix`.
    pub fn factorize(matrix: ArrayView2<f64>) -> Result<Self> {
        let svd = f64::compute_svd(matrix)?;

        Ok(PlaneFactorization {
            u: svd.u,
            s: svd.s,
            vt: svd.vt,
        })
    }

    /// Reconstitute a factorization from previously stored factors.
    ///
    /// The factors must have matching inner dimensions and only finite
    /// entries. The singular values must be non-negative and sorted in
    /// descending order.
    pub fn from_factors(u: Array2<f64>, s: Array1<f64>, vt: Array2<f64>) -> Result<Self> {
        let r = s.len();

        if u.ncols() != r || vt.nrows() != r {
            return Err(SvdImageError::MalformedFactors(format!(
                "u is {}x{}, s has {} values, vt is {}x{}",
                u.nrows(),
                u.ncols(),
                r,
                vt.nrows(),
                vt.ncols()
            )));
        }

        if r != u.nrows().min(vt.ncols()) {
            return Err(SvdImageError::MalformedFactors(format!(
                "expected {} singular values for a {}x{} plane, found {}",
                u.nrows().min(vt.ncols()),
                u.nrows(),
                vt.ncols(),
                r
            )));
        }

        if !u.iter().chain(vt.iter()).all(|value| value.is_finite()) {
            return Err(SvdImageError::MalformedFactors(
                "singular vectors must be finite".to_string(),
            ));
        }

        if !s.iter().all(|value| value.is_finite() && *value >= 0.0) {
            return Err(SvdImageError::MalformedFactors(
                "singular values must be finite and non-negative".to_string(),
            ));
        }

        if !s.iter().tuple_windows().all(|(a, b)| a >= b) {
            return Err(SvdImageError::MalformedFactors(
                "singular values are not sorted in descending order".to_string(),
            ));
        }

        Ok(PlaneFactorization { u, s, vt })
    }

    /// Number of available singular values.
    pub fn rank(&self) -> usize {
        self.s.len()
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.u.nrows()
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        self.vt.ncols()
    }

    /// Shape (rows, cols) of the original plane.
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    /// Return the U matrix
    pub fn u(&self) -> ArrayView2<f64> {
        self.u.view()
    }

    /// Return the singular values
    pub fn s(&self) -> ArrayView1<f64> {
        self.s.view()
    }

    /// Return the Vt matrix
    pub fn vt(&self) -> ArrayView2<f64> {
        self.vt.view()
    }

    /// Number of scalars needed to store a rank `k` truncation.
    pub fn storage_len(&self, k: usize) -> usize {
        k * (self.nrows() + self.ncols() + 1)
    }

    /// Reconstruct the plane from its `k` leading singular triplets.
    ///
    /// Fails with `RankOutOfRange` unless `0 <= k < rank()`. The result
    /// stays in floating point; clamping to pixel values is up to the
    /// caller.
    pub fn reconstruct(&self, k: usize) -> Result<Array2<f64>> {
        let k = validate_rank(k as i64, self.rank())?;

        if k == 0 {
            return Ok(Array2::zeros(self.shape()));
        }

        let mut scaled_u = self.u.slice(s![.., 0..k]).to_owned();
        Zip::from(scaled_u.axis_iter_mut(Axis(1)))
            .and(self.s.slice(s![0..k]))
            .for_each(|mut col, &sigma| col *= sigma);

        Ok(scaled_u.dot(&self.vt.slice(s![0..k, ..])))
    }
}
