//! A simple trait to wrap SVD Computation.
//!
//! The thin decomposition $A = U\Sigma V^T$ of an $m\times n$ matrix is
//! computed with the LAPACK divide and conquer driver. With $r = \min(m, n)$
//! the factor $U$ is $m\times r$, $\Sigma$ is returned as the vector of the
//! $r$ singular values in descending order and $V^T$ is $r\times n$.

use crate::types::{Result, Scalar, SvdImageError};
use ndarray::{Array1, Array2, ArrayView2};
use ndarray_linalg::{JobSvd, SVDDCInto};

pub struct SVDData<A: Scalar> {
    /// The U matrix
    pub u: Array2<A>,
    /// The array of singular values
    pub s: Array1<A::Real>,
    /// The vt matrix
    pub vt: Array2<A>,
}

pub trait ComputeSVD {
    type A: Scalar;

    fn compute_svd(arr: ArrayView2<Self::A>) -> Result<SVDData<Self::A>>;
}

macro_rules! compute_svd_impl {
    ($scalar:ty) => {
        impl ComputeSVD for $scalar {
            type A = $scalar;
            fn compute_svd(arr: ArrayView2<Self::A>) -> Result<SVDData<Self::A>> {
                let r = arr.nrows().min(arr.ncols());

                // LAPACK rejects empty matrices.
                if r == 0 {
                    return Ok(SVDData {
                        u: Array2::zeros((arr.nrows(), 0)),
                        s: Array1::zeros(0),
                        vt: Array2::zeros((0, arr.ncols())),
                    });
                }

                let (u, s, vt) = arr.to_owned().svddc_into(JobSvd::Some)?;

                match (u, vt) {
                    (Some(u), Some(vt)) => Ok(SVDData { u, s, vt }),
                    _ => Err(SvdImageError::MalformedFactors(
                        "SVD driver returned no singular vectors".to_string(),
                    )),
                }
            }
        }
    };
}

compute_svd_impl!(f64);
