//! Matrix inversion guarded against singular and ill-conditioned input.

use gbp_linalg::{Float, Matrix};
use ndarray::Axis;
use ndarray_inverse::Inverse;

use crate::{GaussianError, Result};

/// Largest accepted estimate of the 1-norm condition number `‖A‖₁·‖A⁻¹‖₁`.
/// Above it the inverse has lost most of its significant digits.
pub const MAX_CONDITION_NUMBER: Float = 1e12;

/// Maximum absolute column sum
fn one_norm(matrix: &Matrix<Float>) -> Float {
    matrix
        .map(|x| x.abs())
        .sum_axis(Axis(0))
        .fold(0.0, |acc: Float, &x| acc.max(x))
}

/// Estimate of the 1-norm condition number of `matrix`, given its inverse
#[must_use]
pub fn condition_number(matrix: &Matrix<Float>, inverse: &Matrix<Float>) -> Float {
    one_norm(matrix) * one_norm(inverse)
}

/// Invert a square matrix.
///
/// # Errors
///
/// - [`GaussianError::NonInvertiblePrecisionMatrix`] if the matrix is singular
/// - [`GaussianError::IllConditioned`] if the inverse is not finite, or the
///   condition number exceeds [`MAX_CONDITION_NUMBER`]
pub fn invert(matrix: &Matrix<Float>) -> Result<Matrix<Float>> {
    debug_assert!(matrix.is_square());
    if matrix.is_empty() {
        return Ok(matrix.clone());
    }

    if matrix.det() == 0.0 {
        return Err(GaussianError::NonInvertiblePrecisionMatrix);
    }
    let Some(inverse) = matrix.inv() else {
        return Err(GaussianError::NonInvertiblePrecisionMatrix);
    };

    if inverse.iter().any(|x| !x.is_finite()) {
        return Err(GaussianError::IllConditioned {
            condition_number: Float::INFINITY,
        });
    }

    let condition_number = condition_number(matrix, &inverse);
    // written this way so a NaN estimate is rejected as well
    if !(condition_number <= MAX_CONDITION_NUMBER) {
        return Err(GaussianError::IllConditioned { condition_number });
    }

    Ok(inverse)
}
