//! Configuration of the noise models of factors and variables.
//!
//! ```toml
//! [factor]
//! sigma-relative = 0.1
//! sigma-distance = 0.1
//! jacobian-delta = 1e-8
//!
//! [variable]
//! sigma-prior = 1.0
//! ```

use gbp_gaussian::CanonicalGaussian;
use gbp_linalg::prelude::*;
use serde::{Deserialize, Serialize};
use typed_floats::StrictlyPositiveFinite;

use crate::{
    factor::{DistanceFactor, FactorKind, FactorNode, RelativeFactor},
    id::{FactorId, VariableId},
    variable::{Variable, VariableNode},
    Result, DOFS,
};

/// Error returned when a config file cannot be read or parsed
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Gaussian with mean `mean` and covariance `sigma² · I`
fn isotropic(
    mean: &Vector<Float>,
    sigma: StrictlyPositiveFinite<Float>,
    dim: usize,
) -> Result<CanonicalGaussian> {
    let variance = sigma.get().powi(2);
    let precision = Matrix::<Float>::eye(dim) / variance;
    Ok(CanonicalGaussian::new(mean / variance, precision)?)
}

/// **Factor Section**
/// Standard deviations of the measurement noise of each factor kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct FactorSection {
    /// Standard deviation of the offset measured by a relative factor
    pub sigma_relative: StrictlyPositiveFinite<Float>,
    /// Standard deviation of the distance measured by a distance factor
    pub sigma_distance: StrictlyPositiveFinite<Float>,
    /// Step used for numerical jacobians
    #[serde(default = "FactorSection::default_jacobian_delta")]
    pub jacobian_delta: StrictlyPositiveFinite<Float>,
}

impl FactorSection {
    fn default_jacobian_delta() -> StrictlyPositiveFinite<Float> {
        StrictlyPositiveFinite::<Float>::new(DistanceFactor::DEFAULT_JACOBIAN_DELTA)
            .expect("1e-8 > 0.0")
    }
}

impl Default for FactorSection {
    fn default() -> Self {
        Self {
            sigma_relative: StrictlyPositiveFinite::<Float>::new(0.1).expect("0.1 > 0.0"),
            sigma_distance: StrictlyPositiveFinite::<Float>::new(0.1).expect("0.1 > 0.0"),
            jacobian_delta: Self::default_jacobian_delta(),
        }
    }
}

/// **Variable Section**
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct VariableSection {
    /// Standard deviation of the prior of every variable
    pub sigma_prior: StrictlyPositiveFinite<Float>,
}

impl Default for VariableSection {
    fn default() -> Self {
        Self {
            sigma_prior: StrictlyPositiveFinite::<Float>::new(1.0).expect("1.0 > 0.0"),
        }
    }
}

/// Noise models used to build factors and variables
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub factor:   FactorSection,
    #[serde(default)]
    pub variable: VariableSection,
}

impl Config {
    /// Parse a config file from a given path
    pub fn from_file<P>(path: P) -> std::result::Result<Self, ParseError>
    where
        P: AsRef<std::path::Path>,
    {
        std::fs::read_to_string(path)
            .map_err(Into::into)
            .and_then(|contents| Self::parse(contents.as_str()))
    }

    /// Parse a config file
    /// Returns a `ParseError` if the file cannot be parsed
    pub fn parse(contents: &str) -> std::result::Result<Self, ParseError> {
        toml::from_str(contents).map_err(Into::into)
    }

    /// Measurement asserting that `x1 - x0` equals `offset`
    ///
    /// # Errors
    ///
    /// Fails if `offset` does not have [`DOFS`] elements.
    pub fn relative_measurement(&self, offset: &Vector<Float>) -> Result<CanonicalGaussian> {
        isotropic(offset, self.factor.sigma_relative, DOFS)
    }

    /// Measurement asserting that `‖x1 - x0‖` equals `distance`
    ///
    /// # Errors
    ///
    /// Never fails, the measurement is one dimensional by construction.
    pub fn distance_measurement(&self, distance: Float) -> Result<CanonicalGaussian> {
        isotropic(&Vector::<Float>::from_elem(1, distance), self.factor.sigma_distance, 1)
    }

    /// A relative factor with its measurement set to `offset`
    ///
    /// # Errors
    ///
    /// Fails if `offset` does not have [`DOFS`] elements.
    pub fn relative_factor<V: VariableNode>(
        &self,
        id: FactorId,
        offset: &Vector<Float>,
    ) -> Result<FactorNode<V>> {
        let mut factor = FactorNode::new(id, FactorKind::Relative(RelativeFactor::new()));
        factor.set_measurement(self.relative_measurement(offset)?)?;
        Ok(factor)
    }

    /// A distance factor with its measurement set to `distance`
    ///
    /// # Errors
    ///
    /// See [`FactorNode::set_measurement`].
    pub fn distance_factor<V: VariableNode>(
        &self,
        id: FactorId,
        distance: Float,
    ) -> Result<FactorNode<V>> {
        let kind = FactorKind::Distance(DistanceFactor::new(self.factor.jacobian_delta.get()));
        let mut factor = FactorNode::new(id, kind);
        factor.set_measurement(self.distance_measurement(distance)?)?;
        Ok(factor)
    }

    /// A variable with prior mean `mean` and covariance `sigma_prior² · I`
    ///
    /// # Errors
    ///
    /// Fails if `mean` does not have [`DOFS`] elements.
    pub fn variable(&self, id: VariableId, mean: &Vector<Float>) -> Result<Variable> {
        let prior = isotropic(mean, self.variable.sigma_prior, DOFS)?;
        Ok(Variable::new(id, prior))
    }
}
