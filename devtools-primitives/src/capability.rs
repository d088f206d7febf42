//! Capability flags describing the composition of the host process.
//!
//! A capability is a boolean fact ("a reactive routing subsystem is present").
//! The detector collects the facts that hold into a [`CapabilitySet`]; provider
//! groups are activated by predicates over that set.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_ID_LEN: usize = 64;

/// Identifier for a capability the host process may have.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(String);

impl CapabilityId {
    /// Creates a new capability identifier after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapabilityId`] if the supplied identifier is empty,
    /// too long, or contains unsupported characters.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_identifier(&id)?;
        Ok(Self(id))
    }

    /// Returns the capability identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CapabilityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CapabilityId> for String {
    fn from(value: CapabilityId) -> Self {
        value.0
    }
}

fn validate_identifier(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidCapabilityId {
            id: String::new(),
            reason: "identifier cannot be empty".into(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(Error::InvalidCapabilityId {
            id: id.into(),
            reason: format!("identifier length must be <= {MAX_ID_LEN}"),
        });
    }

    if !id
        .chars()
        .all(|c| matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.'))
    {
        return Err(Error::InvalidCapabilityId {
            id: id.into(),
            reason: "identifier must contain alphanumeric, dash, underscore, or dot".into(),
        });
    }

    Ok(())
}

/// Set of capabilities detected on the host process.
///
/// Built once at startup and never mutated afterwards.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<CapabilityId>);

impl CapabilitySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a capability, returning `true` if it was not already present.
    pub fn insert(&mut self, id: CapabilityId) -> bool {
        self.0.insert(id)
    }

    /// Returns `true` when the capability is present.
    #[must_use]
    pub fn contains(&self, id: &CapabilityId) -> bool {
        self.0.contains(id)
    }

    /// Returns `true` when a capability with the given textual id is present.
    #[must_use]
    pub fn contains_str(&self, id: &str) -> bool {
        self.0.iter().any(|candidate| candidate.as_str() == id)
    }

    /// Returns the number of detected capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing was detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the capabilities in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityId> {
        self.0.iter()
    }
}

impl FromIterator<CapabilityId> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = CapabilityId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_id_validation() {
        assert!(CapabilityId::new("routing.reactive").is_ok());
        assert!(CapabilityId::new("routingB").is_ok());
        assert!(CapabilityId::new("").is_err());
        assert!(CapabilityId::new("has space").is_err());
        assert!(CapabilityId::new("x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn set_membership() {
        let mut set = CapabilitySet::new();
        let id = CapabilityId::new("routing.blocking").unwrap();
        assert!(set.insert(id.clone()));
        assert!(!set.insert(id.clone()));
        assert!(set.contains(&id));
        assert!(set.contains_str("routing.blocking"));
        assert!(!set.contains_str("routing.reactive"));
        assert_eq!(set.len(), 1);
    }
}
