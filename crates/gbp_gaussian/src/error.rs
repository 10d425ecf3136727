use gbp_linalg::Float;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GaussianError {
    #[error("the precision matrix is not square, it has shape {0}x{1}")]
    NonSquarePrecisionMatrix(usize, usize),
    #[error(
        "the length of the information vector ({0}) is not equal to the number of rows ({1}) or \
         columns ({2}) of the precision matrix"
    )]
    VectorLengthNotEqualMatrixShape(usize, usize, usize),
    #[error("the covariance matrix is not invertible, which is required to calculate the precision matrix")]
    NonInvertibleCovarianceMatrix,
    #[error("the precision matrix is not invertible, which is required to calculate the covariance matrix")]
    NonInvertiblePrecisionMatrix,
    #[error("the matrix is too ill-conditioned to invert reliably, condition number estimate {condition_number:e}")]
    IllConditioned { condition_number: Float },
    #[error("the block {start}..{end} is empty or outside a distribution of dimension {dim}")]
    BlockOutOfBounds { start: usize, end: usize, dim: usize },
}

impl GaussianError {
    /// Returns `true` if the error stems from a precision (or covariance)
    /// matrix that cannot be inverted, as opposed to a malformed input.
    ///
    /// Retrying the same computation cannot succeed; the caller has to move
    /// the linearisation point or skip the computation.
    pub const fn is_numerical_instability(&self) -> bool {
        matches!(
            self,
            Self::NonInvertibleCovarianceMatrix
                | Self::NonInvertiblePrecisionMatrix
                | Self::IllConditioned { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GaussianError>;
