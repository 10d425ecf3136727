//! Factor nodes.
//!
//! A factor node binds a measurement model between two variables. The
//! model is linearised at the belief means of the neighbours, giving a
//! canonical gaussian over their concatenated states. The message to each
//! neighbour is the marginal of that joint, after the latest message from the
//! other neighbour has been folded in.

use std::{
    borrow::Cow,
    cell::RefCell,
    rc::{Rc, Weak},
};

use gbp_gaussian::CanonicalGaussian;
use gbp_linalg::{concatenate_vectors, prelude::*};
use tracing::{debug, trace, warn};

pub use self::{distance::DistanceFactor, relative::RelativeFactor};
use crate::{
    id::{FactorId, VariableId},
    message::{MessageCount, MessagesToVariables},
    variable::{Variable, VariableNode},
    FactorGraphError, Result,
};

mod distance;
mod relative;

/// Common interface for all measurement models
pub trait Factor: std::fmt::Display {
    /// The name of the factor. Used for debugging.
    fn name(&self) -> &'static str;

    /// Returns the number of neighbours this factor expects
    fn neighbours(&self) -> usize;

    /// Degrees of freedom every neighbour must have
    fn dofs(&self) -> usize;

    /// Dimension of the output of [`Factor::measure`]
    fn measurement_dim(&self) -> usize;

    /// The delta for the jacobian calculation
    fn jacobian_delta(&self) -> Float;

    /// Whether the factor is linear or non-linear
    fn linear(&self) -> bool;

    /// The jacobian of the measurement function at `linearisation_point`
    #[must_use]
    #[inline]
    fn jacobian(&self, linearisation_point: &Vector<Float>) -> Cow<'_, Matrix<Float>> {
        Cow::Owned(self.first_order_jacobian(linearisation_point.clone()))
    }

    /// Measurement function
    #[must_use]
    fn measure(&self, linearisation_point: &Vector<Float>) -> Vector<Float>;

    /// The first order jacobian, by forward differences.
    /// This is a default impl as factor variants should compute the first order
    /// jacobian the same way
    fn first_order_jacobian(&self, mut linearisation_point: Vector<Float>) -> Matrix<Float> {
        let h0 = self.measure(&linearisation_point); // value at linearisation point
        let mut jacobian = Matrix::<Float>::zeros((h0.len(), linearisation_point.len()));

        let delta = self.jacobian_delta();

        for i in 0..linearisation_point.len() {
            linearisation_point[i] += delta; // perturb by delta
            let derivatives = (self.measure(&linearisation_point) - &h0) / delta;
            jacobian.column_mut(i).assign(&derivatives);
            linearisation_point[i] -= delta; // reset the perturbation
        }

        jacobian
    }
}

/// Static dispatch enum for the various measurement models
/// Used instead of dynamic dispatch
#[derive(Debug, Clone, derive_more::IsVariant)]
pub enum FactorKind {
    /// `RelativeFactor`
    Relative(RelativeFactor),
    /// `DistanceFactor`
    Distance(DistanceFactor),
}

impl std::fmt::Display for FactorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relative(f) => f.fmt(formatter),
            Self::Distance(f) => f.fmt(formatter),
        }
    }
}

impl Factor for FactorKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Relative(f) => f.name(),
            Self::Distance(f) => f.name(),
        }
    }

    fn neighbours(&self) -> usize {
        match self {
            Self::Relative(f) => f.neighbours(),
            Self::Distance(f) => f.neighbours(),
        }
    }

    fn dofs(&self) -> usize {
        match self {
            Self::Relative(f) => f.dofs(),
            Self::Distance(f) => f.dofs(),
        }
    }

    fn measurement_dim(&self) -> usize {
        match self {
            Self::Relative(f) => f.measurement_dim(),
            Self::Distance(f) => f.measurement_dim(),
        }
    }

    fn jacobian_delta(&self) -> Float {
        match self {
            Self::Relative(f) => f.jacobian_delta(),
            Self::Distance(f) => f.jacobian_delta(),
        }
    }

    fn linear(&self) -> bool {
        match self {
            Self::Relative(f) => f.linear(),
            Self::Distance(f) => f.linear(),
        }
    }

    fn jacobian(&self, linearisation_point: &Vector<Float>) -> Cow<'_, Matrix<Float>> {
        match self {
            Self::Relative(f) => f.jacobian(linearisation_point),
            Self::Distance(f) => f.jacobian(linearisation_point),
        }
    }

    fn measure(&self, linearisation_point: &Vector<Float>) -> Vector<Float> {
        match self {
            Self::Relative(f) => f.measure(linearisation_point),
            Self::Distance(f) => f.measure(linearisation_point),
        }
    }
}

/// Non-owning handle to a neighbouring variable
#[derive(Debug)]
struct Neighbour<V> {
    id:       VariableId,
    variable: Weak<RefCell<V>>,
}

impl<V> Neighbour<V> {
    fn upgrade(&self) -> Result<Rc<RefCell<V>>> {
        self.variable
            .upgrade()
            .ok_or_else(|| FactorGraphError::NeighbourDropped(self.id.clone()))
    }
}

/// The measurement asserted by a factor, with its mean computed once
#[derive(Debug, Clone)]
struct Measurement {
    distribution: CanonicalGaussian,
    mean:         Vector<Float>,
}

/// Result of the latest linearisation
#[derive(Debug, Clone)]
struct Linearisation {
    /// Belief mean of each neighbour when the update started
    state:               Vec<Vector<Float>>,
    /// `state` concatenated in neighbour order
    linearisation_point: Vector<Float>,
    /// Measurement function evaluated at the linearisation point
    predicted:           Vector<Float>,
    /// Joint over the states of all neighbours
    factor:              CanonicalGaussian,
}

/// Factor node in the factorgraph
#[derive(Debug)]
pub struct FactorNode<V: VariableNode = Variable> {
    id:            FactorId,
    /// Variant storing the specialized behavior of each Factor kind.
    kind:          FactorKind,
    neighbours:    Vec<Neighbour<V>>,
    /// Slice of the joint owned by each neighbour, in neighbour order
    layout:        BlockLayout,
    /// Mailbox for incoming message storage
    inbox:         MessagesToVariables,
    measurement:   Option<Measurement>,
    linearisation: Option<Linearisation>,
    message_count: MessageCount,
}

impl<V: VariableNode> FactorNode<V> {
    /// Create a new factor node with no neighbours and no measurement
    #[must_use]
    pub fn new(id: FactorId, kind: FactorKind) -> Self {
        Self {
            id,
            kind,
            neighbours: Vec::new(),
            layout: BlockLayout::new(),
            inbox: MessagesToVariables::new(),
            measurement: None,
            linearisation: None,
            message_count: MessageCount::default(),
        }
    }

    /// Create a new relative factor
    #[must_use]
    pub fn new_relative_factor(id: FactorId) -> Self {
        Self::new(id, FactorKind::Relative(RelativeFactor::new()))
    }

    /// Create a new distance factor
    #[must_use]
    pub fn new_distance_factor(id: FactorId, jacobian_delta: Float) -> Self {
        Self::new(id, FactorKind::Distance(DistanceFactor::new(jacobian_delta)))
    }

    /// Returns the id of the factor
    #[inline]
    pub const fn id(&self) -> &FactorId {
        &self.id
    }

    /// The measurement model of the factor
    #[inline]
    pub const fn kind(&self) -> &FactorKind {
        &self.kind
    }

    /// Ids of the neighbours, in the order they were added
    pub fn neighbours(&self) -> impl Iterator<Item = &VariableId> {
        self.neighbours.iter().map(|neighbour| &neighbour.id)
    }

    /// Latest message received from each neighbour
    #[inline]
    pub const fn inbox(&self) -> &MessagesToVariables {
        &self.inbox
    }

    /// The asserted measurement, if set
    pub fn measurement(&self) -> Option<&CanonicalGaussian> {
        self.measurement
            .as_ref()
            .map(|measurement| &measurement.distribution)
    }

    /// Joint distribution from the latest call to
    /// [`FactorNode::update_factor`]
    pub fn factor(&self) -> Option<&CanonicalGaussian> {
        self.linearisation
            .as_ref()
            .map(|linearisation| &linearisation.factor)
    }

    /// Belief means of the neighbours captured by the latest update
    pub fn state(&self) -> Option<&[Vector<Float>]> {
        self.linearisation
            .as_ref()
            .map(|linearisation| linearisation.state.as_slice())
    }

    /// Point the measurement model was linearised at in the latest update
    pub fn linearisation_point(&self) -> Option<&Vector<Float>> {
        self.linearisation
            .as_ref()
            .map(|linearisation| &linearisation.linearisation_point)
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

    /// Connect a variable to the factor.
    ///
    /// The first call adds neighbour 0, the second neighbour 1. The factor
    /// registers itself on the variable, and seeds its inbox with a message
    /// carrying no information from it. Only a weak handle to the variable is
    /// kept.
    ///
    /// # Errors
    ///
    /// - [`FactorGraphError::TooManyNeighbours`] if the factor already has all
    ///   its neighbours
    /// - [`FactorGraphError::DuplicateNeighbour`] if the variable is already
    ///   connected
    /// - [`FactorGraphError::NeighbourDimension`] if the variable does not have
    ///   the degrees of freedom of the measurement model
    pub fn add_neighbour(&mut self, variable: &Rc<RefCell<V>>) -> Result<()> {
        let max = self.kind.neighbours();
        if self.neighbours.len() >= max {
            return Err(FactorGraphError::TooManyNeighbours {
                factor: self.id.clone(),
                max,
            });
        }

        let (variable_id, dofs) = {
            let variable = variable.borrow();
            (variable.id().clone(), variable.dofs())
        };
        if self.inbox.contains_key(&variable_id) {
            return Err(FactorGraphError::DuplicateNeighbour {
                factor:   self.id.clone(),
                variable: variable_id,
            });
        }
        if dofs != self.kind.dofs() {
            return Err(FactorGraphError::NeighbourDimension {
                variable: variable_id,
                expected: self.kind.dofs(),
                found:    dofs,
            });
        }

        variable.borrow_mut().add_neighbour(self.id.clone());

        let block = self.layout.push(dofs);
        let _ = self
            .inbox
            .insert(variable_id.clone(), CanonicalGaussian::zeros(dofs));
        debug!(
            factor = %self.id,
            variable = %variable_id,
            "added neighbour {} owning {:?}",
            self.neighbours.len(),
            block.range()
        );
        self.neighbours.push(Neighbour {
            id:       variable_id,
            variable: Rc::downgrade(variable),
        });
        Ok(())
    }

    /// Set the measurement asserted by the factor.
    ///
    /// # Errors
    ///
    /// - [`FactorGraphError::MeasurementDimension`] if the dimension differs
    ///   from the output of the measurement model
    /// - a numerical instability error if the mean of the measurement cannot be
    ///   computed
    pub fn set_measurement(&mut self, measurement: CanonicalGaussian) -> Result<()> {
        let expected = self.kind.measurement_dim();
        if measurement.len() != expected {
            return Err(FactorGraphError::MeasurementDimension {
                factor: self.id.clone(),
                expected,
                found: measurement.len(),
            });
        }

        let mean = measurement.mean()?;
        self.measurement = Some(Measurement {
            distribution: measurement,
            mean,
        });
        Ok(())
    }

    /// Store a message from a neighbour, replacing any earlier message from
    /// it.
    ///
    /// # Errors
    ///
    /// - [`FactorGraphError::UnknownSender`] if `from` is not a neighbour
    /// - [`FactorGraphError::MessageDimension`] if the message does not match
    ///   the degrees of freedom of the sender
    pub fn receive_message_from(&mut self, from: &VariableId, message: CanonicalGaussian) -> Result<()> {
        let Some(slot) = self.inbox.get_mut(from) else {
            return Err(FactorGraphError::UnknownSender {
                factor: self.id.clone(),
                from:   from.clone(),
            });
        };
        if message.len() != slot.len() {
            return Err(FactorGraphError::MessageDimension {
                from:     from.clone(),
                expected: slot.len(),
                found:    message.len(),
            });
        }

        trace!(factor = %self.id, variable = %from, "received message");
        *slot = message;
        self.message_count.received += 1;
        Ok(())
    }

    fn check_neighbour_count(&self) -> Result<()> {
        let expected = self.kind.neighbours();
        if self.neighbours.len() == expected {
            Ok(())
        } else {
            Err(FactorGraphError::NeighbourCount {
                factor: self.id.clone(),
                expected,
                found: self.neighbours.len(),
            })
        }
    }

    /// Linearise the measurement model at the current belief means of the
    /// neighbours.
    ///
    /// With `J` the jacobian and `h` the measurement function at the
    /// linearisation point `x0`, the joint over the neighbours becomes
    /// - `eta = Jᵀ · lam_meas · (J · x0 + mu_meas - h)`
    /// - `lam = Jᵀ · lam_meas · J`
    ///
    /// # Errors
    ///
    /// - [`FactorGraphError::NeighbourCount`] unless all neighbours are added
    /// - [`FactorGraphError::MissingMeasurement`] if no measurement is set
    /// - [`FactorGraphError::NeighbourDropped`] if a neighbour no longer exists
    /// - a numerical instability error if the belief mean of a neighbour cannot
    ///   be computed
    ///
    /// The previous linearisation is discarded first, so after a failed update
    /// the factor reports [`FactorGraphError::NotLinearised`] until the next
    /// successful one.
    pub fn update_factor(&mut self) -> Result<()> {
        let _ = self.linearisation.take();
        self.check_neighbour_count()?;
        let measurement = self.require_measurement()?;

        let state = self
            .neighbours
            .iter()
            .map(|neighbour| {
                let variable = neighbour.upgrade()?;
                let mean = variable.borrow().belief_mean().map_err(|err| {
                    warn!(factor = %self.id, variable = %neighbour.id, "belief mean unavailable: {err}");
                    err
                })?;
                Ok(mean)
            })
            .collect::<Result<Vec<_>>>()?;

        let linearisation_point = concatenate_vectors(&state);
        debug_assert_eq!(linearisation_point.len(), self.layout.dim());

        let predicted = self.kind.measure(&linearisation_point);
        let jacobian = self.kind.jacobian(&linearisation_point);

        let weighted_jacobian_t = jacobian.t().dot(measurement.distribution.precision_matrix());
        let precision_matrix = weighted_jacobian_t.dot(jacobian.as_ref());
        let information_vector = weighted_jacobian_t
            .dot(&(jacobian.dot(&linearisation_point) + &measurement.mean - &predicted));

        let factor = CanonicalGaussian::new(information_vector, precision_matrix)?;
        debug!(
            factor = %self.id,
            kind = self.kind.name(),
            linear = self.kind.linear(),
            "linearised at {linearisation_point}"
        );
        trace!("{factor}");

        self.linearisation = Some(Linearisation {
            state,
            linearisation_point,
            predicted,
            factor,
        });
        Ok(())
    }

    /// Compute the message to every neighbour from the latest linearisation,
    /// without sending them.
    ///
    /// Neighbours are visited from last to first. For each target, the
    /// latest inbox message of every other neighbour is folded into that
    /// neighbour's block of the joint, the joint is marginalised onto the
    /// block of the target, and the folded messages are subtracted again.
    ///
    /// # Errors
    ///
    /// - [`FactorGraphError::NotLinearised`] before the first
    ///   [`FactorNode::update_factor`]
    /// - a numerical instability error if a marginal cannot be computed
    pub fn compute_messages(&self) -> Result<MessagesToVariables> {
        let linearisation = self
            .linearisation
            .as_ref()
            .ok_or_else(|| FactorGraphError::NotLinearised(self.id.clone()))?;
        self.check_neighbour_count()?;

        let mut joint = linearisation.factor.clone();
        let mut messages = MessagesToVariables::new();

        for (target, target_block) in self.layout.iter().enumerate().rev() {
            let folded = self
                .layout
                .iter()
                .zip(self.neighbours.iter())
                .enumerate()
                .filter(|(other, _)| *other != target)
                .map(|(_, (block, neighbour))| {
                    let message = self.inbox.get(&neighbour.id).map_or_else(
                        || Cow::Owned(CanonicalGaussian::zeros(block.len)),
                        Cow::Borrowed,
                    );
                    (block, message)
                })
                .collect::<Vec<_>>();

            for (block, message) in &folded {
                joint.add_assign_block(block.offset, message)?;
            }
            let marginal = joint.marginalise(target_block.range());
            for (block, message) in &folded {
                joint.sub_assign_block(block.offset, message)?;
            }

            let marginal = marginal.map_err(|err| {
                warn!(
                    factor = %self.id,
                    variable = %self.neighbours[target].id,
                    "cannot marginalise: {err}"
                );
                err
            })?;
            let _ = messages.insert(self.neighbours[target].id.clone(), marginal);
        }

        Ok(messages)
    }

    /// Compute the message to every neighbour and deposit it in the inbox of
    /// the neighbour, last neighbour first.
    ///
    /// Nothing is deposited if any message cannot be computed, or any
    /// neighbour has been dropped.
    ///
    /// # Errors
    ///
    /// See [`FactorNode::compute_messages`].
    /// [`FactorGraphError::NeighbourDropped`] if a neighbour no longer exists.
    pub fn send_messages(&mut self) -> Result<()> {
        let mut messages = self.compute_messages()?;
        let variables = self
            .neighbours
            .iter()
            .map(|neighbour| Ok((&neighbour.id, neighbour.upgrade()?)))
            .collect::<Result<Vec<_>>>()?;

        let mut sent = 0;
        for (variable_id, variable) in variables.into_iter().rev() {
            if let Some(message) = messages.remove(variable_id) {
                trace!(factor = %self.id, variable = %variable_id, "sending message");
                variable
                    .borrow_mut()
                    .receive_message_from(self.id.clone(), message);
                sent += 1;
            }
        }
        self.message_count.sent += sent;
        Ok(())
    }

    /// Euclidean distance between the measurement function at the latest
    /// linearisation point and the mean of the measurement.
    ///
    /// # Errors
    ///
    /// - [`FactorGraphError::NotLinearised`] before the first
    ///   [`FactorNode::update_factor`]
    /// - [`FactorGraphError::MissingMeasurement`] if no measurement is set
    pub fn residual(&self) -> Result<Float> {
        Ok(self.residual_vector()?.euclidean_norm())
    }

    /// Energy of the factor, `0.5 · rᵀ · lam_meas · r` with `r` the residual
    /// vector.
    ///
    /// # Errors
    ///
    /// See [`FactorNode::residual`].
    pub fn energy(&self) -> Result<Float> {
        let residual = self.residual_vector()?;
        let precision = self.require_measurement()?.distribution.precision_matrix();
        Ok(0.5 * residual.dot(&precision.dot(&residual)))
    }

    fn require_measurement(&self) -> Result<&Measurement> {
        self.measurement
            .as_ref()
            .ok_or_else(|| FactorGraphError::MissingMeasurement(self.id.clone()))
    }

    fn residual_vector(&self) -> Result<Vector<Float>> {
        let linearisation = self
            .linearisation
            .as_ref()
            .ok_or_else(|| FactorGraphError::NotLinearised(self.id.clone()))?;
        Ok(&linearisation.predicted - &self.require_measurement()?.mean)
    }

    /// Check if the factor is a [`RelativeFactor`]
    #[inline(always)]
    pub fn is_relative(&self) -> bool {
        self.kind.is_relative()
    }

    /// Check if the factor is a [`DistanceFactor`]
    #[inline(always)]
    pub fn is_distance(&self) -> bool {
        self.kind.is_distance()
    }
}

impl<V: VariableNode> std::fmt::Display for FactorNode<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "factor {} ({})", self.id, self.kind.name())?;
        for (i, neighbour) in self.neighbours.iter().enumerate() {
            writeln!(f, "  neighbour {i}: {}", neighbour.id)?;
        }
        writeln!(f, "  messages: {}", self.message_count)?;
        if let Some(factor) = self.factor() {
            write!(f, "{factor}")?;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use ndarray::array;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn kind_dispatches_to_the_model() {
        let relative = FactorKind::Relative(RelativeFactor::new());
        let distance = FactorKind::Distance(DistanceFactor::default());

        assert!(relative.is_relative());
        assert!(distance.is_distance());
        assert_eq!(relative.measurement_dim(), 2);
        assert_eq!(distance.measurement_dim(), 1);
        assert!(relative.linear());
        assert!(!distance.linear());

        let x = array![0.0, 0.0, 3.0, 4.0];
        assert_eq!(relative.measure(&x), array![3.0, 4.0]);
        assert_eq!(distance.measure(&x), array![5.0]);
    }

    #[test]
    fn new_factor_is_not_linearised() {
        let factor: FactorNode = FactorNode::new_relative_factor(FactorId::from("f"));
        assert!(factor.factor().is_none());
        assert!(factor.state().is_none());
        assert_eq!(
            factor.compute_messages().unwrap_err(),
            FactorGraphError::NotLinearised(FactorId::from("f"))
        );
        assert_eq!(
            factor.residual().unwrap_err(),
            FactorGraphError::NotLinearised(FactorId::from("f"))
        );
    }

    #[test]
    fn kind_is_fixed_at_construction() {
        let factor: FactorNode = FactorNode::new_distance_factor(FactorId::from("f"), 1e-6);
        assert!(factor.kind().is_distance());
        assert_eq!(factor.kind().measurement_dim(), 1);
        assert_eq!(factor.kind().jacobian_delta(), 1e-6);
    }

    #[test]
    fn measurement_must_match_the_model() {
        let mut factor: FactorNode = FactorNode::new_distance_factor(FactorId::from("f"), 1e-8);
        let two_dimensional = CanonicalGaussian::new(array![1.0, 1.0], Matrix::<Float>::eye(2)).unwrap();
        assert_eq!(
            factor.set_measurement(two_dimensional),
            Err(FactorGraphError::MeasurementDimension {
                factor:   FactorId::from("f"),
                expected: 1,
                found:    2,
            })
        );

        let singular = CanonicalGaussian::zeros(1);
        assert!(factor
            .set_measurement(singular)
            .unwrap_err()
            .is_numerical_instability());
        assert!(factor.measurement().is_none());

        let distance = CanonicalGaussian::new(array![2.0], array![[1.0]]).unwrap();
        factor.set_measurement(distance.clone()).unwrap();
        assert_eq!(factor.measurement(), Some(&distance));
    }
}
