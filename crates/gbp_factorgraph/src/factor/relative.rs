//! Relative factor: linear constraint on the offset between two variables.

use std::borrow::Cow;

use gbp_linalg::prelude::*;
use ndarray::{concatenate, Axis};

use super::Factor;
use crate::DOFS;

/// Measures the offset `h(x) = x1 - x0` between its two neighbours.
///
/// The measurement model is linear, so the jacobian `[-I, I]` is computed
/// once and reused on every update.
#[derive(Debug, Clone)]
pub struct RelativeFactor {
    cached_jacobian: Matrix<Float>,
}

impl RelativeFactor {
    pub const NEIGHBOURS: usize = 2;

    #[must_use]
    pub fn new() -> Self {
        let eye = Matrix::<Float>::eye(DOFS);
        let cached_jacobian = concatenate![Axis(1), -1.0 * &eye, eye];
        debug_assert_eq!(cached_jacobian.shape(), &[DOFS, DOFS * Self::NEIGHBOURS]);
        Self { cached_jacobian }
    }
}

impl Default for RelativeFactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Factor for RelativeFactor {
    #[inline]
    fn name(&self) -> &'static str {
        "RelativeFactor"
    }

    #[inline]
    fn neighbours(&self) -> usize {
        Self::NEIGHBOURS
    }

    #[inline]
    fn dofs(&self) -> usize {
        DOFS
    }

    #[inline]
    fn measurement_dim(&self) -> usize {
        DOFS
    }

    #[inline(always)]
    fn jacobian_delta(&self) -> Float {
        1e-8
    }

    #[inline(always)]
    fn linear(&self) -> bool {
        true
    }

    #[inline]
    fn jacobian(&self, _linearisation_point: &Vector<Float>) -> Cow<'_, Matrix<Float>> {
        Cow::Borrowed(&self.cached_jacobian)
    }

    #[inline]
    fn measure(&self, linearisation_point: &Vector<Float>) -> Vector<Float> {
        self.cached_jacobian.dot(linearisation_point)
    }
}

impl std::fmt::Display for RelativeFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.name())?;
        write!(
            f,
            "{}",
            pretty_format_matrix(&self.cached_jacobian, Some("jacobian"))
        )
    }
}
