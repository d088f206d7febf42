//! Provider groups: named bundles of tools gated by an activation predicate.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use devtools_primitives::{CapabilityId, CapabilitySet};

use crate::detect::ProbeError;
use crate::registry::{ToolDefinition, panic_message};

type PredicateFn = dyn Fn(&CapabilitySet) -> Result<bool, ProbeError> + Send + Sync;

/// Decides whether a provider group is active for a detected capability set.
#[derive(Clone)]
pub struct ActivationPredicate {
    label: String,
    check: Arc<PredicateFn>,
}

impl fmt::Debug for ActivationPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActivationPredicate")
            .field(&self.label)
            .finish()
    }
}

impl ActivationPredicate {
    /// Predicate that is always satisfied.
    #[must_use]
    pub fn always() -> Self {
        Self::fallible("always", |_| Ok(true))
    }

    /// Predicate satisfied when `capability` was detected.
    #[must_use]
    pub fn requires(capability: CapabilityId) -> Self {
        let label = format!("requires {capability}");
        Self::fallible(label, move |caps| Ok(caps.contains(&capability)))
    }

    /// Predicate satisfied when every listed capability was detected.
    #[must_use]
    pub fn requires_all(capabilities: Vec<CapabilityId>) -> Self {
        let label = format!(
            "requires all of [{}]",
            capabilities
                .iter()
                .map(CapabilityId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Self::fallible(label, move |caps| {
            Ok(capabilities.iter().all(|capability| caps.contains(capability)))
        })
    }

    /// Predicate backed by an arbitrary infallible check.
    #[must_use]
    pub fn custom<F>(label: impl Into<String>, check: F) -> Self
    where
        F: Fn(&CapabilitySet) -> bool + Send + Sync + 'static,
    {
        Self::fallible(label, move |caps| Ok(check(caps)))
    }

    /// Predicate backed by a check that may fail while probing.
    #[must_use]
    pub fn fallible<F>(label: impl Into<String>, check: F) -> Self
    where
        F: Fn(&CapabilitySet) -> Result<bool, ProbeError> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            check: Arc::new(check),
        }
    }

    /// Returns the human-readable label used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Evaluates the predicate, converting errors and panics into [`ProbeError`].
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when the check fails or panics. Callers treat that
    /// as "inactive".
    pub fn evaluate(&self, capabilities: &CapabilitySet) -> Result<bool, ProbeError> {
        match catch_unwind(AssertUnwindSafe(|| (self.check)(capabilities))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(ProbeError::new(
                self.label.clone(),
                panic_message(payload.as_ref()),
            )),
        }
    }
}

/// Named bundle of tools sharing an activation predicate.
#[derive(Debug, Clone)]
pub struct ProviderGroup {
    name: String,
    predicate: ActivationPredicate,
    tools: Vec<ToolDefinition>,
}

impl ProviderGroup {
    /// Creates a group with the given predicate and no tools.
    #[must_use]
    pub fn new(name: impl Into<String>, predicate: ActivationPredicate) -> Self {
        Self {
            name: name.into(),
            predicate,
            tools: Vec::new(),
        }
    }

    /// Creates a group that is active on every host.
    #[must_use]
    pub fn always(name: impl Into<String>) -> Self {
        Self::new(name, ActivationPredicate::always())
    }

    /// Adds a tool definition to the group's registration table.
    #[must_use]
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    /// Adds several tool definitions.
    #[must_use]
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Returns the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the activation predicate.
    #[must_use]
    pub fn predicate(&self) -> &ActivationPredicate {
        &self.predicate
    }

    /// Returns the declared tools.
    #[must_use]
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub(crate) fn into_tools(self) -> Vec<ToolDefinition> {
        self.tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(ids: &[&str]) -> CapabilitySet {
        ids.iter()
            .map(|id| CapabilityId::new(*id).unwrap())
            .collect()
    }

    #[test]
    fn requires_checks_membership() {
        let predicate = ActivationPredicate::requires(CapabilityId::new("routingB").unwrap());
        assert!(predicate.evaluate(&caps(&["routingB"])).unwrap());
        assert!(!predicate.evaluate(&caps(&["routingA"])).unwrap());
        assert_eq!(predicate.label(), "requires routingB");
    }

    #[test]
    fn requires_all_needs_every_capability() {
        let predicate = ActivationPredicate::requires_all(vec![
            CapabilityId::new("a").unwrap(),
            CapabilityId::new("b").unwrap(),
        ]);
        assert!(!predicate.evaluate(&caps(&["a"])).unwrap());
        assert!(predicate.evaluate(&caps(&["a", "b"])).unwrap());
    }

    #[test]
    fn panicking_predicate_is_reported_not_propagated() {
        let predicate = ActivationPredicate::custom("explodes", |_| panic!("no route table"));
        let err = predicate.evaluate(&CapabilitySet::new()).unwrap_err();
        assert!(err.to_string().contains("no route table"));
    }
}
