//! Accuracy helpers for comparing approximations against reference matrices.

use ndarray::{ArrayBase, Data, Ix2};
use ndarray_linalg::{Lapack, Norm, Scalar};

pub trait RelDiff {
    type A: Scalar + Lapack;

    /// Return the relative Frobenius norm difference of `self` and `other`.
    fn rel_diff<S: Data<Elem = Self::A>>(
        &self,
        other: &ArrayBase<S, Ix2>,
    ) -> <Self::A as Scalar>::Real;
}

impl<A, S> RelDiff for ArrayBase<S, Ix2>
where
    A: Scalar + Lapack,
    S: Data<Elem = A>,
{
    type A = A;

    fn rel_diff<T: Data<Elem = A>>(&self, other: &ArrayBase<T, Ix2>) -> A::Real {
        let diff = self - other;

        diff.norm_l2() / other.norm_l2()
    }
}
