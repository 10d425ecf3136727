//! Message module.
//!
//! Messages sent between variables and factors are canonical gaussians over
//! the state of the receiving (or sending) variable. A message carrying no
//! information has an all zero information vector and precision matrix.

use std::collections::BTreeMap;

use derive_more::{Add, AddAssign};
use gbp_gaussian::CanonicalGaussian;

use super::id::{FactorId, VariableId};

/// Messages sent from a factor, or stored in its inbox, keyed by variable.
pub type MessagesToVariables = BTreeMap<VariableId, CanonicalGaussian>;
/// Messages sent from a variable, or stored in its inbox, keyed by factor.
pub type MessagesToFactors = BTreeMap<FactorId, CanonicalGaussian>;

/// Number of messages a node has sent and received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Add, AddAssign)]
pub struct MessageCount {
    /// Messages sent
    pub sent:     usize,
    /// Messages received
    pub received: usize,
}

impl MessageCount {
    /// Create a new count with nothing sent or received
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sent:     0,
            received: 0,
        }
    }

    /// Reset both counters to zero
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl std::iter::Sum for MessageCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::new(), |a, b| a + b)
    }
}

impl std::fmt::Display for MessageCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[sent: {}, received: {}]", self.sent, self.received)
    }
}
