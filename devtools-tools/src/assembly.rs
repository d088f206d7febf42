//! Explicit registry assembly from an ordered list of provider groups.

use std::collections::HashMap;

use devtools_primitives::CapabilitySet;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::detect::CapabilityDetector;
use crate::provider::ProviderGroup;
use crate::registry::ToolRegistry;

/// Fatal registry assembly failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssemblyError {
    /// Two active groups (or one group twice) declared the same tool name.
    #[error("tool `{name}` is declared by both `{first_group}` and `{second_group}`")]
    DuplicateTool {
        /// Colliding tool name.
        name: String,
        /// Group that registered the name first.
        first_group: String,
        /// Group whose registration collided.
        second_group: String,
    },
}

/// Ordered `(predicate, group)` table that produces the [`ToolRegistry`].
#[derive(Debug, Default)]
pub struct RegistryAssembly {
    groups: Vec<ProviderGroup>,
}

impl RegistryAssembly {
    /// Creates an empty assembly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider group. Groups are evaluated in insertion order.
    #[must_use]
    pub fn with_group(mut self, group: ProviderGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Appends a provider group after construction.
    pub fn push(&mut self, group: ProviderGroup) {
        self.groups.push(group);
    }

    /// Returns the declared groups.
    #[must_use]
    pub fn groups(&self) -> &[ProviderGroup] {
        &self.groups
    }

    /// Runs the detector and assembles against its result.
    ///
    /// # Errors
    ///
    /// See [`RegistryAssembly::assemble`].
    pub fn assemble_detected(
        self,
        detector: &CapabilityDetector,
    ) -> Result<ToolRegistry, AssemblyError> {
        let capabilities = detector.detect();
        self.assemble(&capabilities)
    }

    /// Evaluates each group's predicate and merges the active groups' tools.
    ///
    /// Inactive groups and groups whose predicate fails are skipped. Tools whose
    /// definitions fail validation are excluded individually.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::DuplicateTool`] when two active tools share a
    /// name. The first collision in declaration order is reported.
    pub fn assemble(self, capabilities: &CapabilitySet) -> Result<ToolRegistry, AssemblyError> {
        let mut descriptors = Vec::new();
        let mut owners: HashMap<String, String> = HashMap::new();
        let mut active_groups = Vec::new();

        for group in self.groups {
            let active = match group.predicate().evaluate(capabilities) {
                Ok(active) => active,
                Err(err) => {
                    warn!(group = group.name(), error = %err, "activation predicate failed; skipping group");
                    false
                }
            };
            if !active {
                debug!(
                    group = group.name(),
                    predicate = group.predicate().label(),
                    "provider group inactive"
                );
                continue;
            }

            let group_name = group.name().to_owned();
            for definition in group.into_tools() {
                let descriptor = match definition.extract(&group_name) {
                    Ok(descriptor) => descriptor,
                    Err(err) => {
                        warn!(group = %group_name, error = %err, "excluding tool with invalid definition");
                        continue;
                    }
                };

                if let Some(first_group) = owners.get(descriptor.name()) {
                    return Err(AssemblyError::DuplicateTool {
                        name: descriptor.name().to_owned(),
                        first_group: first_group.clone(),
                        second_group: group_name,
                    });
                }
                owners.insert(descriptor.name().to_owned(), group_name.clone());
                descriptors.push(descriptor);
            }
            active_groups.push(group_name);
        }

        let registry = ToolRegistry::from_parts(descriptors, active_groups);
        info!(
            tools = registry.len(),
            groups = ?registry.active_groups(),
            "tool registry assembled"
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use devtools_primitives::CapabilityId;
    use serde_json::Value;

    use crate::context::CallContext;
    use crate::detect::{FnProbe, ProbeError};
    use crate::provider::ActivationPredicate;
    use crate::registry::{Arguments, ToolDefinition, ToolResult};
    use crate::schema::ParameterSchema;

    async fn noop(_args: Arguments, _ctx: CallContext) -> ToolResult<Value> {
        Ok(Value::Null)
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition::new(name, format!("{name} tool"), ParameterSchema::empty(), noop)
    }

    fn routing_b() -> CapabilityId {
        CapabilityId::new("routingB").unwrap()
    }

    fn assembly() -> RegistryAssembly {
        RegistryAssembly::new()
            .with_group(ProviderGroup::always("core").with_tool(tool("ping")))
            .with_group(
                ProviderGroup::new("routes", ActivationPredicate::requires(routing_b()))
                    .with_tool(tool("get_routes")),
            )
    }

    #[test]
    fn inactive_group_is_skipped() {
        let registry = assembly().assemble(&CapabilitySet::new()).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["ping"]);
        assert_eq!(registry.active_groups(), ["core".to_owned()]);
    }

    #[test]
    fn active_group_contributes_tools() {
        let caps: CapabilitySet = [routing_b()].into_iter().collect();
        let registry = assembly().assemble(&caps).unwrap();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            ["ping", "get_routes"]
        );
    }

    #[test]
    fn collision_between_active_groups_fails_deterministically() {
        let build = || {
            RegistryAssembly::new()
                .with_group(ProviderGroup::always("first").with_tool(tool("shared")))
                .with_group(ProviderGroup::always("second").with_tool(tool("shared")))
                .assemble(&CapabilitySet::new())
        };
        let expected = AssemblyError::DuplicateTool {
            name: "shared".into(),
            first_group: "first".into(),
            second_group: "second".into(),
        };
        assert_eq!(build().unwrap_err(), expected);
        assert_eq!(build().unwrap_err(), expected);
    }

    #[test]
    fn collision_with_inactive_group_is_not_an_error() {
        let registry = RegistryAssembly::new()
            .with_group(ProviderGroup::always("first").with_tool(tool("shared")))
            .with_group(
                ProviderGroup::new("second", ActivationPredicate::requires(routing_b()))
                    .with_tool(tool("shared")),
            )
            .assemble(&CapabilitySet::new())
            .unwrap();
        assert_eq!(registry.get("shared").unwrap().group(), "first");
    }

    #[test]
    fn invalid_tool_does_not_abort_assembly() {
        let registry = RegistryAssembly::new()
            .with_group(
                ProviderGroup::always("core")
                    .with_tool(tool("bad name"))
                    .with_tool(tool("ping")),
            )
            .assemble(&CapabilitySet::new())
            .unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["ping"]);
    }

    #[test]
    fn failing_predicate_skips_group() {
        let registry = RegistryAssembly::new()
            .with_group(ProviderGroup::always("core").with_tool(tool("ping")))
            .with_group(
                ProviderGroup::new(
                    "flaky",
                    ActivationPredicate::fallible("flaky", |_| {
                        Err(ProbeError::new("flaky", "route table missing"))
                    }),
                )
                .with_tool(tool("flaky_tool")),
            )
            .assemble(&CapabilitySet::new())
            .unwrap();
        assert!(!registry.contains("flaky_tool"));
    }

    #[test]
    fn assembles_from_detector() {
        let detector = CapabilityDetector::new()
            .with_probe(FnProbe::new(routing_b(), || Ok(true)));
        let registry = assembly().assemble_detected(&detector).unwrap();
        assert!(registry.contains("get_routes"));
    }
}
