//! Factor and variable nodes of a pairwise Gaussian belief propagation graph.
//!
//! A [`FactorNode`](factor::FactorNode) is connected to exactly two variables.
//! Each update it linearises its measurement model at the current belief
//! means of its neighbours, and sends a marginal message to each of them.
//! Scheduling the updates of many factors and variables is left to the
//! caller.

pub mod config;
mod error;
pub mod factor;
pub mod id;
pub mod message;
pub mod variable;

pub use error::{FactorGraphError, Result};

/// Degrees of freedom of every variable in the graph.
/// The state of a variable is a 2D position:
/// 1. position.x
/// 2. position.y
/// [x, y]
pub const DOFS: usize = 2;

/// prelude module bringing entire public API into score
#[allow(unused_imports)]
pub mod prelude {
    pub use gbp_gaussian::CanonicalGaussian;

    pub use super::{
        config::Config,
        factor::{DistanceFactor, Factor, FactorKind, FactorNode, RelativeFactor},
        id::{FactorId, VariableId},
        message::{MessageCount, MessagesToFactors, MessagesToVariables},
        variable::{Variable, VariableNode},
        FactorGraphError, DOFS,
    };
}
