//! Multivariate Gaussian distribution in canonical (information) form.
//!
//! Instead of the mean `mu` and covariance `sig`, the distribution is stored as
//! - the information vector `eta = sig⁻¹ · mu`
//! - the precision matrix `lam = sig⁻¹`
//!
//! In this form independent evidence combines by addition, and a distribution
//! with no information at all (`eta = 0`, `lam = 0`) is representable.

mod error;
pub mod inverse;
mod marginalise;

use std::ops::AddAssign;
use std::ops::SubAssign;

pub use error::{GaussianError, Result};
use gbp_linalg::{prelude::*, seq_n};
pub use inverse::MAX_CONDITION_NUMBER;
use ndarray::s;

/// Gaussian distribution in information form.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalGaussian {
    /// `eta`
    information: Vector<Float>,
    /// `lam`
    precision:   Matrix<Float>,
}

impl Default for CanonicalGaussian {
    /// An empty, zero-dimensional distribution
    fn default() -> Self {
        Self::zeros(0)
    }
}

impl CanonicalGaussian {
    /// Create a new distribution from its information vector and precision
    /// matrix.
    ///
    /// The precision matrix is not required to be invertible, so a
    /// zero-information distribution can be built with this as well.
    ///
    /// # Errors
    ///
    /// Fails if the precision matrix is not square, or its shape does not match
    /// the length of the information vector.
    ///
    /// # Example:
    /// ```
    /// use gbp_gaussian::{CanonicalGaussian, Result};
    /// use ndarray::array;
    /// fn main() -> Result<()> {
    ///     let information = array![1.0, 2.0];
    ///     let precision = array![[2.0, 0.0], [0.0, 4.0]];
    ///     let normal = CanonicalGaussian::new(information, precision)?;
    ///     assert_eq!(normal.mean()?, array![0.5, 0.5]);
    ///     Ok(())
    /// }
    /// ```
    pub fn new(information_vector: Vector<Float>, precision_matrix: Matrix<Float>) -> Result<Self> {
        if !precision_matrix.is_square() {
            Err(GaussianError::NonSquarePrecisionMatrix(
                precision_matrix.nrows(),
                precision_matrix.ncols(),
            ))
        } else if information_vector.len() != precision_matrix.nrows() {
            Err(GaussianError::VectorLengthNotEqualMatrixShape(
                information_vector.len(),
                precision_matrix.nrows(),
                precision_matrix.ncols(),
            ))
        } else {
            Ok(Self {
                information: information_vector,
                precision:   precision_matrix,
            })
        }
    }

    /// Zero-information distribution of dimension `dim`.
    /// Acts as the identity element of fusion.
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        Self {
            information: Vector::<Float>::zeros(dim),
            precision:   Matrix::<Float>::zeros((dim, dim)),
        }
    }

    /// Create a distribution from its mean and covariance matrix
    ///
    /// # Errors
    ///
    /// Fails on a shape mismatch, or when the covariance matrix cannot be
    /// inverted.
    ///
    /// ```
    /// use gbp_gaussian::CanonicalGaussian;
    /// use ndarray::array;
    /// let normal =
    ///     CanonicalGaussian::from_mean_and_covariance(array![1.0, 2.0], array![[0.5, 0.0], [0.0, 0.25]])
    ///         .unwrap();
    /// assert_eq!(normal.information_vector(), &array![2.0, 8.0]);
    /// ```
    pub fn from_mean_and_covariance(mean: Vector<Float>, covariance: Matrix<Float>) -> Result<Self> {
        if !covariance.is_square() {
            return Err(GaussianError::NonSquarePrecisionMatrix(
                covariance.nrows(),
                covariance.ncols(),
            ));
        } else if mean.len() != covariance.nrows() {
            return Err(GaussianError::VectorLengthNotEqualMatrixShape(
                mean.len(),
                covariance.nrows(),
                covariance.ncols(),
            ));
        }

        let precision = inverse::invert(&covariance).map_err(|err| match err {
            GaussianError::NonInvertiblePrecisionMatrix => {
                GaussianError::NonInvertibleCovarianceMatrix
            }
            other => other,
        })?;
        let information = precision.dot(&mean);
        Ok(Self {
            information,
            precision,
        })
    }

    /// Returns the dimension of the distribution, which is the length of the
    /// information vector, equal to the number of rows and columns of the
    /// precision matrix.
    #[inline]
    pub fn len(&self) -> usize {
        self.information.len()
    }

    /// Returns `true` if the distribution has dimension 0
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.information.is_empty()
    }

    /// Returns `true` if both the information vector and the precision matrix
    /// are all zeros, i.e. the distribution carries no information.
    pub fn is_zero_information(&self) -> bool {
        self.information.iter().all(|x| *x == 0.0) && self.precision.iter().all(|x| *x == 0.0)
    }

    /// Get the information vector `eta`
    #[inline(always)]
    pub const fn information_vector(&self) -> &Vector<Float> {
        &self.information
    }

    /// Get the precision matrix `lam`
    #[inline(always)]
    pub const fn precision_matrix(&self) -> &Matrix<Float> {
        &self.precision
    }

    /// Split the distribution into its information vector and precision matrix
    #[must_use]
    pub fn into_parts(self) -> (Vector<Float>, Matrix<Float>) {
        (self.information, self.precision)
    }

    /// The mean `lam⁻¹ · eta`. Computed on every call.
    ///
    /// # Errors
    ///
    /// Fails with a numerical instability error if the precision matrix is
    /// singular or ill-conditioned.
    pub fn mean(&self) -> Result<Vector<Float>> {
        let covariance = inverse::invert(&self.precision)?;
        Ok(covariance.dot(&self.information))
    }

    /// The covariance `lam⁻¹`. Computed on every call.
    ///
    /// # Errors
    ///
    /// Fails with a numerical instability error if the precision matrix is
    /// singular or ill-conditioned.
    pub fn covariance(&self) -> Result<Matrix<Float>> {
        inverse::invert(&self.precision)
    }

    fn block(&self, offset: usize, other: &Self) -> Result<std::ops::Range<usize>> {
        let block = seq_n(offset, other.len());
        if block.end > self.len() {
            return Err(GaussianError::BlockOutOfBounds {
                start: block.start,
                end:   block.end,
                dim:   self.len(),
            });
        }
        Ok(block)
    }

    /// Fuse `other` into the block of `self` starting at `offset`.
    /// The information vector and precision matrix of `other` are added to
    /// the matching slices of `self`.
    ///
    /// # Errors
    ///
    /// Fails if `offset + other.len()` exceeds the dimension of `self`.
    pub fn add_assign_block(&mut self, offset: usize, other: &Self) -> Result<()> {
        let block = self.block(offset, other)?;
        self.information
            .slice_mut(s![block.clone()])
            .add_assign(&other.information);
        self.precision
            .slice_mut(s![block.clone(), block])
            .add_assign(&other.precision);
        Ok(())
    }

    /// Inverse of [`Self::add_assign_block`]
    ///
    /// # Errors
    ///
    /// Fails if `offset + other.len()` exceeds the dimension of `self`.
    pub fn sub_assign_block(&mut self, offset: usize, other: &Self) -> Result<()> {
        let block = self.block(offset, other)?;
        self.information
            .slice_mut(s![block.clone()])
            .sub_assign(&other.information);
        self.precision
            .slice_mut(s![block.clone(), block])
            .sub_assign(&other.precision);
        Ok(())
    }
}

impl std::fmt::Display for CanonicalGaussian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            pretty_format_vector(&self.information, Some("information vector"))
        )?;
        write!(
            f,
            "{}",
            pretty_format_matrix(&self.precision, Some("precision matrix"))
        )
    }
}

// All the arithmetic below panics if the two distributions differ in
// dimension, like the underlying ndarray operations.

impl std::ops::Add<&CanonicalGaussian> for CanonicalGaussian {
    type Output = CanonicalGaussian;

    fn add(mut self, rhs: &CanonicalGaussian) -> Self::Output {
        self += rhs;
        self
    }
}

impl std::ops::Add<&CanonicalGaussian> for &CanonicalGaussian {
    type Output = CanonicalGaussian;

    fn add(self, rhs: &CanonicalGaussian) -> Self::Output {
        CanonicalGaussian {
            information: &self.information + &rhs.information,
            precision:   &self.precision + &rhs.precision,
        }
    }
}

impl std::ops::AddAssign<&CanonicalGaussian> for CanonicalGaussian {
    fn add_assign(&mut self, rhs: &CanonicalGaussian) {
        self.information += &rhs.information;
        self.precision += &rhs.precision;
    }
}

impl std::ops::Sub<&CanonicalGaussian> for CanonicalGaussian {
    type Output = CanonicalGaussian;

    fn sub(mut self, rhs: &CanonicalGaussian) -> Self::Output {
        self -= rhs;
        self
    }
}

impl std::ops::Sub<&CanonicalGaussian> for &CanonicalGaussian {
    type Output = CanonicalGaussian;

    fn sub(self, rhs: &CanonicalGaussian) -> Self::Output {
        CanonicalGaussian {
            information: &self.information - &rhs.information,
            precision:   &self.precision - &rhs.precision,
        }
    }
}

impl std::ops::SubAssign<&CanonicalGaussian> for CanonicalGaussian {
    fn sub_assign(&mut self, rhs: &CanonicalGaussian) {
        self.information -= &rhs.information;
        self.precision -= &rhs.precision;
    }
}

impl std::ops::Mul<&CanonicalGaussian> for CanonicalGaussian {
    type Output = CanonicalGaussian;

    fn mul(self, rhs: &CanonicalGaussian) -> Self::Output {
        // In the information form, the product of two gaussian densities is the
        // sum of the information vectors and the sum of the precision matrices
        self + rhs
    }
}

impl std::ops::MulAssign<&CanonicalGaussian> for CanonicalGaussian {
    fn mul_assign(&mut self, rhs: &CanonicalGaussian) {
        *self += rhs;
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use arbtest::arbtest;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Random symmetric positive definite matrix `A·Aᵀ + n·I`
    fn arbitrary_positive_definite(
        u: &mut arbtest::arbitrary::Unstructured<'_>,
        n: usize,
    ) -> arbtest::arbitrary::Result<Matrix<Float>> {
        let mut a = Matrix::<Float>::zeros((n, n));
        for x in &mut a {
            *x = Float::from(u.int_in_range(-100_i32..=100)?) / 10.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let shift = n as Float;
        Ok(a.dot(&a.t()) + Matrix::<Float>::eye(n) * shift)
    }

    fn arbitrary_vector(
        u: &mut arbtest::arbitrary::Unstructured<'_>,
        n: usize,
    ) -> arbtest::arbitrary::Result<Vector<Float>> {
        let mut v = Vector::<Float>::zeros(n);
        for x in &mut v {
            *x = Float::from(u.int_in_range(-1000_i32..=1000)?) / 100.0;
        }
        Ok(v)
    }

    fn assert_matrix_abs_diff_eq(lhs: &Matrix<Float>, rhs: &Matrix<Float>, epsilon: Float) {
        assert_eq!(lhs.dim(), rhs.dim());
        for (a, b) in lhs.iter().zip(rhs.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = epsilon);
        }
    }

    #[test]
    fn create_from_information_and_precision() {
        let information = array![1.0, 2.0, 3.0];
        let precision = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let normal = CanonicalGaussian::new(information.clone(), precision.clone()).unwrap();
        assert_eq!(normal.information_vector(), &information);
        assert_eq!(normal.precision_matrix(), &precision);
        assert_eq!(normal.covariance().unwrap(), precision);
        assert_eq!(normal.mean().unwrap(), information);
        assert_eq!(normal.len(), 3);
    }

    #[test]
    fn create_from_mean_and_covariance() {
        let mean = array![1.0, 2.0, 3.0];
        let covariance = array![[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.5]];
        let normal =
            CanonicalGaussian::from_mean_and_covariance(mean.clone(), covariance.clone()).unwrap();
        assert_eq!(normal.mean().unwrap(), mean);
        assert_eq!(normal.covariance().unwrap(), covariance);
        assert_eq!(normal.information_vector(), &array![0.5, 2.0, 6.0]);
    }

    #[test]
    fn information_and_precision_of_unequal_dimensions_should_fail() {
        let result = CanonicalGaussian::new(array![1.0, 2.0, 3.0], array![[1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(
            result,
            Err(GaussianError::VectorLengthNotEqualMatrixShape(3, 2, 2))
        );
    }

    #[test]
    fn non_square_precision_matrix_should_fail() {
        let result = CanonicalGaussian::new(array![1.0, 2.0], array![
            [1.0, 0.0],
            [0.0, 1.0],
            [0.0, 0.0]
        ]);
        assert_eq!(result, Err(GaussianError::NonSquarePrecisionMatrix(3, 2)));
    }

    #[test]
    fn singular_covariance_matrix_should_fail() {
        let mean = array![1.0, 2.0, 3.0];
        let covariance = array![[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let result = CanonicalGaussian::from_mean_and_covariance(mean, covariance);
        assert_eq!(result, Err(GaussianError::NonInvertibleCovarianceMatrix));
    }

    #[test]
    fn mean_of_singular_precision_matrix_should_fail() {
        let normal = CanonicalGaussian::new(array![1.0, 2.0, 3.0], array![
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0]
        ])
        .unwrap();
        let err = normal.mean().unwrap_err();
        assert_eq!(err, GaussianError::NonInvertiblePrecisionMatrix);
        assert!(err.is_numerical_instability());
        assert!(normal.covariance().is_err());
    }

    #[test]
    fn zero_information_is_well_formed() {
        let zeros = CanonicalGaussian::zeros(2);
        assert!(zeros.is_zero_information());
        assert_eq!(zeros.len(), 2);
        assert!(zeros.mean().unwrap_err().is_numerical_instability());
        assert!(CanonicalGaussian::default().is_empty());
    }

    #[test]
    fn mean_and_covariance_round_trip() {
        arbtest(|u| {
            let n = u.int_in_range(1_usize..=6)?;
            let precision = arbitrary_positive_definite(u, n)?;
            let information = arbitrary_vector(u, n)?;
            let normal = CanonicalGaussian::new(information.clone(), precision.clone()).unwrap();

            let covariance = normal.covariance().unwrap();
            assert_matrix_abs_diff_eq(
                &covariance.dot(normal.precision_matrix()),
                &Matrix::<Float>::eye(n),
                1e-9,
            );

            let mean = normal.mean().unwrap();
            let recovered = precision.dot(&mean);
            for (a, b) in recovered.iter().zip(information.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-8);
            }
            Ok(())
        })
        .budget_ms(200);
    }

    #[test]
    fn fusing_zero_information_is_identity() {
        arbtest(|u| {
            let n = u.int_in_range(1_usize..=6)?;
            let normal =
                CanonicalGaussian::new(arbitrary_vector(u, n)?, arbitrary_positive_definite(u, n)?)
                    .unwrap();
            let zeros = CanonicalGaussian::zeros(n);
            assert_eq!(&normal + &zeros, normal);
            assert_eq!(normal.clone() * &zeros, normal);

            let mut joint = CanonicalGaussian::zeros(n + 2);
            joint.add_assign_block(1, &normal).unwrap();
            let before = joint.clone();
            joint.add_assign_block(0, &CanonicalGaussian::zeros(2)).unwrap();
            assert_eq!(joint, before);
            Ok(())
        });
    }

    #[test]
    fn add_and_sub_two_normals() {
        let a = CanonicalGaussian::new(array![1.0, 2.0], array![[1.0, 0.0], [0.0, 1.0]]).unwrap();
        let b = CanonicalGaussian::new(array![3.0, 2.0], array![[2.0, 0.5], [0.5, 2.0]]).unwrap();

        let sum = &a + &b;
        assert_eq!(sum.information_vector(), &array![4.0, 4.0]);
        assert_eq!(sum.precision_matrix(), &array![[3.0, 0.5], [0.5, 3.0]]);

        let diff = sum.clone() - &b;
        assert_eq!(diff, a);

        let mut c = a.clone();
        c += &b;
        assert_eq!(c, sum);
        c -= &b;
        assert_eq!(c, a);

        let mut d = a.clone();
        d *= &b;
        assert_eq!(d, sum);
    }

    #[test]
    fn add_and_sub_block() {
        let mut joint = CanonicalGaussian::zeros(4);
        let block = CanonicalGaussian::new(array![1.0, 2.0], array![[3.0, 4.0], [5.0, 6.0]]).unwrap();

        joint.add_assign_block(2, &block).unwrap();
        assert_eq!(joint.information_vector(), &array![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(joint.precision_matrix(), &array![
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 3.0, 4.0],
            [0.0, 0.0, 5.0, 6.0]
        ]);

        joint.sub_assign_block(2, &block).unwrap();
        assert!(joint.is_zero_information());
    }

    #[test]
    fn block_out_of_bounds_should_fail() {
        let mut joint = CanonicalGaussian::zeros(4);
        let block = CanonicalGaussian::zeros(2);
        assert_eq!(
            joint.add_assign_block(3, &block),
            Err(GaussianError::BlockOutOfBounds {
                start: 3,
                end:   5,
                dim:   4,
            })
        );
        assert!(joint.sub_assign_block(4, &block).is_err());
    }

    #[test]
    fn display_contains_both_parts() {
        let normal = CanonicalGaussian::zeros(2);
        let s = normal.to_string();
        assert!(s.contains("information vector"));
        assert!(s.contains("precision matrix"));
    }
}
