//! Distance factor: non-linear constraint on the euclidean distance between
//! two variables.

use gbp_linalg::prelude::*;
use ndarray::s;

use super::Factor;
use crate::DOFS;

/// Measures the distance `h(x) = ‖x1 - x0‖` between its two neighbours.
/// The jacobian is approximated numerically around the linearisation point.
#[derive(Debug, Clone)]
pub struct DistanceFactor {
    jacobian_delta: Float,
}

impl DistanceFactor {
    pub const NEIGHBOURS: usize = 2;
    pub const DEFAULT_JACOBIAN_DELTA: Float = 1e-8;

    #[must_use]
    pub const fn new(jacobian_delta: Float) -> Self {
        Self { jacobian_delta }
    }
}

impl Default for DistanceFactor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_JACOBIAN_DELTA)
    }
}

impl Factor for DistanceFactor {
    #[inline]
    fn name(&self) -> &'static str {
        "DistanceFactor"
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
        1
    }

    #[inline(always)]
    fn jacobian_delta(&self) -> Float {
        self.jacobian_delta
    }

    #[inline(always)]
    fn linear(&self) -> bool {
        false
    }

    fn measure(&self, linearisation_point: &Vector<Float>) -> Vector<Float> {
        let x0 = linearisation_point.slice(s![..DOFS]);
        let x1 = linearisation_point.slice(s![DOFS..]);
        let offset = &x1 - &x0;
        Vector::<Float>::from_elem(1, offset.euclidean_norm())
    }
}

impl std::fmt::Display for DistanceFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.name())?;
        writeln!(f, "jacobian delta: {}", self.jacobian_delta)
    }
}
