//! Variable nodes.
//!
//! A factor only needs to read the belief of its neighbours and deposit
//! messages into their inboxes. [`VariableNode`] is that contract;
//! [`Variable`] is a plain implementation of it that keeps a prior and fuses
//! every incoming message into its belief.

use gbp_gaussian::CanonicalGaussian;
use gbp_linalg::prelude::*;
use tracing::{debug, trace};

use crate::{
    id::{FactorId, VariableId},
    message::{MessageCount, MessagesToFactors},
    FactorGraphError, Result,
};

/// The interface a variable exposes to the factors connected to it.
pub trait VariableNode {
    /// Stable unique key of the variable
    fn id(&self) -> &VariableId;

    /// Dimension of the state of the variable
    fn dofs(&self) -> usize;

    /// Current belief about the state of the variable
    fn belief(&self) -> &CanonicalGaussian;

    /// Mean of the current belief
    ///
    /// # Errors
    ///
    /// Fails if the precision matrix of the belief is not invertible.
    fn belief_mean(&self) -> gbp_gaussian::Result<Vector<Float>> {
        self.belief().mean()
    }

    /// Register a factor as adjacent to the variable.
    /// Called by the factor when the variable is added as its neighbour.
    fn add_neighbour(&mut self, factor: FactorId);

    /// Store a message from a factor, replacing any earlier message from the
    /// same factor.
    fn receive_message_from(&mut self, from: FactorId, message: CanonicalGaussian);
}

/// Variable node with a gaussian prior.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VariableId,
    dofs: usize,
    /// Prior belief, fused into the belief on every update
    pub prior: CanonicalGaussian,
    /// Current belief, `prior + Σ inbox`
    pub belief: CanonicalGaussian,
    /// Latest message from every connected factor
    pub inbox: MessagesToFactors,
    message_count: MessageCount,
}

impl Variable {
    /// Create a new variable with the given prior.
    /// The dimension of the variable is the dimension of the prior, and the
    /// belief starts out equal to it.
    #[must_use]
    pub fn new(id: VariableId, prior: CanonicalGaussian) -> Self {
        Self {
            id,
            dofs: prior.len(),
            belief: prior.clone(),
            prior,
            inbox: MessagesToFactors::new(),
            message_count: MessageCount::default(),
        }
    }

    /// Number of messages sent and received since the last reset
    #[inline]
    pub const fn message_count(&self) -> MessageCount {
        self.message_count
    }

    /// Reset the message counters
    pub fn reset_message_count(&mut self) {
        self.message_count.reset();
    }

    /// Fuse the prior with the latest message from every factor.
    pub fn update_belief(&mut self) {
        let mut belief = self.prior.clone();
        for message in self.inbox.values() {
            belief += message;
        }
        self.belief = belief;
        debug!(variable = %self.id, "updated belief from {} messages", self.inbox.len());
    }

    /// Messages to every connected factor.
    /// The message to a factor is the belief with the last message received
    /// from that factor divided out, so a factor never hears back its own
    /// evidence.
    pub fn prepare_messages(&mut self) -> MessagesToFactors {
        let messages: MessagesToFactors = self
            .inbox
            .iter()
            .map(|(factor_id, message)| (factor_id.clone(), &self.belief - message))
            .collect();
        self.message_count.sent += messages.len();
        trace!(variable = %self.id, "prepared {} messages", messages.len());
        messages
    }

    /// Move the mean of the prior to `mean`, keeping its precision.
    ///
    /// The inbox is cleared to zero information, as every message in it was
    /// computed around the old prior. The belief is reset to the new prior.
    ///
    /// # Errors
    ///
    /// Fails if `mean` does not have the dimension of the variable.
    pub fn change_prior(&mut self, mean: &Vector<Float>) -> Result<()> {
        if mean.len() != self.dofs {
            return Err(FactorGraphError::NeighbourDimension {
                variable: self.id.clone(),
                expected: self.dofs,
                found:    mean.len(),
            });
        }

        let precision = self.prior.precision_matrix().clone();
        let information = precision.dot(mean);
        self.prior = CanonicalGaussian::new(information, precision)?;

        for message in self.inbox.values_mut() {
            *message = CanonicalGaussian::zeros(self.dofs);
        }
        self.belief = self.prior.clone();
        Ok(())
    }
}

impl VariableNode for Variable {
    #[inline]
    fn id(&self) -> &VariableId {
        &self.id
    }

    #[inline]
    fn dofs(&self) -> usize {
        self.dofs
    }

    #[inline]
    fn belief(&self) -> &CanonicalGaussian {
        &self.belief
    }

    fn add_neighbour(&mut self, factor: FactorId) {
        let _ = self
            .inbox
            .insert(factor, CanonicalGaussian::zeros(self.dofs));
    }

    fn receive_message_from(&mut self, from: FactorId, message: CanonicalGaussian) {
        assert_eq!(
            message.len(),
            self.dofs,
            "message from {from} to {} has the wrong dimension",
            self.id
        );
        trace!(variable = %self.id, factor = %from, "received message");
        let _ = self.inbox.insert(from, message);
        self.message_count.received += 1;
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use ndarray::array;
    use pretty_assertions::assert_eq;

    use super::*;

    fn variable() -> Variable {
        let prior =
            CanonicalGaussian::from_mean_and_covariance(array![1.0, 2.0], Matrix::<Float>::eye(2))
                .unwrap();
        Variable::new(VariableId::from("x0"), prior)
    }

    #[test]
    fn belief_starts_at_prior() {
        let variable = variable();
        assert_eq!(variable.dofs(), 2);
        assert_eq!(variable.belief(), &variable.prior);
        assert_eq!(variable.belief_mean().unwrap(), array![1.0, 2.0]);
    }

    #[test]
    fn adding_a_neighbour_seeds_the_inbox() {
        let mut variable = variable();
        variable.add_neighbour(FactorId::from("f"));
        let message = &variable.inbox[&FactorId::from("f")];
        assert!(message.is_zero_information());
        assert_eq!(message.len(), 2);
    }

    #[test]
    fn belief_is_prior_plus_messages() {
        let mut variable = variable();
        let a = CanonicalGaussian::new(array![1.0, 0.0], array![[1.0, 0.0], [0.0, 1.0]]).unwrap();
        let b = CanonicalGaussian::new(array![0.0, 3.0], array![[2.0, 0.0], [0.0, 2.0]]).unwrap();
        variable.receive_message_from(FactorId::from("fa"), a.clone());
        variable.receive_message_from(FactorId::from("fb"), b.clone());
        variable.update_belief();

        let expected = variable.prior.clone() + &a + &b;
        assert_eq!(variable.belief, expected);
        assert_eq!(variable.message_count().received, 2);

        // a newer message from the same factor replaces the old one
        variable.receive_message_from(FactorId::from("fa"), CanonicalGaussian::zeros(2));
        variable.update_belief();
        assert_eq!(variable.belief, variable.prior.clone() + &b);
    }

    #[test]
    #[should_panic(expected = "wrong dimension")]
    fn message_with_wrong_dimension_should_panic() {
        let mut variable = variable();
        variable.receive_message_from(FactorId::from("fa"), CanonicalGaussian::zeros(3));
    }

    #[test]
    fn outgoing_message_excludes_the_receivers_evidence() {
        let mut variable = variable();
        let a = CanonicalGaussian::new(array![1.0, 0.0], array![[1.0, 0.0], [0.0, 1.0]]).unwrap();
        variable.receive_message_from(FactorId::from("fa"), a);
        variable.add_neighbour(FactorId::from("fb"));
        variable.update_belief();

        let messages = variable.prepare_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[&FactorId::from("fa")], variable.prior);
        assert_eq!(messages[&FactorId::from("fb")], variable.belief);
        assert_eq!(variable.message_count().sent, 2);

        variable.reset_message_count();
        assert_eq!(variable.message_count(), MessageCount::default());
    }

    #[test]
    fn change_prior_moves_the_mean_and_clears_the_inbox() {
        let mut variable = variable();
        let a = CanonicalGaussian::new(array![1.0, 0.0], array![[1.0, 0.0], [0.0, 1.0]]).unwrap();
        variable.receive_message_from(FactorId::from("fa"), a);
        variable.update_belief();

        variable.change_prior(&array![-1.0, 4.0]).unwrap();
        assert_eq!(variable.belief_mean().unwrap(), array![-1.0, 4.0]);
        assert!(variable.inbox.values().all(CanonicalGaussian::is_zero_information));
    }

    #[test]
    fn change_prior_with_wrong_dimension_should_fail() {
        let mut variable = variable();
        let err = variable.change_prior(&array![1.0, 2.0, 3.0]).unwrap_err();
        assert!(err.is_contract_violation());
    }
}
