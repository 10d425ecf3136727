//! Identifiers of the nodes in the factorgraph.

use smol_str::SmolStr;

/// Unique identifier of a variable in the factorgraph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub struct VariableId(SmolStr);

impl VariableId {
    /// Create a new `VariableId`.
    #[must_use]
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for VariableId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Unique identifier of a factor in the factorgraph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub struct FactorId(SmolStr);

impl FactorId {
    /// Create a new `FactorId`.
    #[must_use]
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for FactorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
