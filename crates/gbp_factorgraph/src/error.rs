use gbp_gaussian::GaussianError;

use crate::id::{FactorId, VariableId};

/// Errors raised by factor and variable nodes.
///
/// Every variant except [`FactorGraphError::Gaussian`] is a contract
/// violation by whoever builds the graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactorGraphError {
    #[error(transparent)]
    Gaussian(#[from] GaussianError),
    #[error("factor {factor} cannot have more than {max} neighbours")]
    TooManyNeighbours { factor: FactorId, max: usize },
    #[error("variable {variable} is already a neighbour of factor {factor}")]
    DuplicateNeighbour {
        factor:   FactorId,
        variable: VariableId,
    },
    #[error("factor {factor} expects {expected} neighbours, but has {found}")]
    NeighbourCount {
        factor:   FactorId,
        expected: usize,
        found:    usize,
    },
    #[error("variable {variable} has {found} degrees of freedom, expected {expected}")]
    NeighbourDimension {
        variable: VariableId,
        expected: usize,
        found:    usize,
    },
    #[error("measurement of factor {factor} has dimension {found}, expected {expected}")]
    MeasurementDimension {
        factor:   FactorId,
        expected: usize,
        found:    usize,
    },
    #[error("message from {from} has dimension {found}, expected {expected}")]
    MessageDimension {
        from:     VariableId,
        expected: usize,
        found:    usize,
    },
    #[error("factor {factor} received a message from {from}, which is not one of its neighbours")]
    UnknownSender { factor: FactorId, from: VariableId },
    #[error("factor {0} has no measurement")]
    MissingMeasurement(FactorId),
    #[error("factor {0} has not been linearised, call update_factor() first")]
    NotLinearised(FactorId),
    #[error("variable {0} has been dropped while still connected to a factor")]
    NeighbourDropped(VariableId),
}

impl FactorGraphError {
    /// Returns `true` if a precision matrix could not be inverted.
    /// The caller may recover by linearising at a different point.
    pub const fn is_numerical_instability(&self) -> bool {
        matches!(self, Self::Gaussian(err) if err.is_numerical_instability())
    }

    /// Returns `true` if the error is a programming error in the caller.
    pub const fn is_contract_violation(&self) -> bool {
        !self.is_numerical_instability()
    }
}

pub type Result<T> = std::result::Result<T, FactorGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_errors() {
        let singular: FactorGraphError = GaussianError::NonInvertiblePrecisionMatrix.into();
        assert!(singular.is_numerical_instability());
        assert!(!singular.is_contract_violation());

        let missing = FactorGraphError::MissingMeasurement(FactorId::from("f"));
        assert!(missing.is_contract_violation());

        let shape: FactorGraphError = GaussianError::NonSquarePrecisionMatrix(2, 3).into();
        assert!(shape.is_contract_violation());
    }
}
