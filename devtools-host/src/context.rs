//! Bundle of host collaborators shared by the standard tool groups.

use std::collections::BTreeMap;
use std::sync::Arc;

use devtools_telemetry::{HealthSnapshot, ProcessStats};
use devtools_tools::{
    AssemblyError, CapabilityDetector, CollectorError, FnProbe, ProbeError, RegistryAssembly,
    ToolRegistry,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::components::ComponentInventory;
use crate::dependencies::DependencyCatalog;
use crate::environment::Environment;
use crate::groups;
use crate::routes::{RouteTable, RouterKind};

/// Errors raised while wiring the host into a registry.
#[derive(Debug, Error)]
pub enum HostError {
    /// A capability identifier failed validation.
    #[error(transparent)]
    Capability(#[from] devtools_primitives::Error),
    /// Two active groups declared the same tool.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// Everything the standard tools can report about the host process.
#[derive(Debug, Default)]
pub struct HostContext {
    components: ComponentInventory,
    environment: Environment,
    dependencies: DependencyCatalog,
    routes: BTreeMap<RouterKind, RouteTable>,
    stats: ProcessStats,
}

impl HostContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the component inventory.
    #[must_use]
    pub fn with_components(mut self, components: ComponentInventory) -> Self {
        self.components = components;
        self
    }

    /// Sets the configuration environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Sets the dependency catalog.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: DependencyCatalog) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Registers a route table, replacing any table of the same kind.
    #[must_use]
    pub fn with_route_table(mut self, table: RouteTable) -> Self {
        self.routes.insert(table.kind(), table);
        self
    }

    /// Returns the component inventory.
    #[must_use]
    pub fn components(&self) -> &ComponentInventory {
        &self.components
    }

    /// Returns the configuration environment.
    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Returns the dependency catalog.
    #[must_use]
    pub fn dependencies(&self) -> &DependencyCatalog {
        &self.dependencies
    }

    /// Returns the route table of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Unavailable`] when the host has no such router.
    pub fn route_table(&self, kind: RouterKind) -> Result<&RouteTable, CollectorError> {
        self.routes
            .get(&kind)
            .ok_or_else(|| CollectorError::Unavailable(format!("{} route table", kind.capability_name())))
    }

    /// Samples process health.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        self.stats.snapshot()
    }

    /// Builds probes for the optional subsystems of this host.
    ///
    /// # Errors
    ///
    /// Fails only if a built-in capability id is rejected by validation.
    pub fn detector(self: &Arc<Self>) -> Result<CapabilityDetector, HostError> {
        let mut detector = CapabilityDetector::new();
        for kind in RouterKind::ALL {
            let host = Arc::clone(self);
            detector.push(FnProbe::new(kind.capability()?, move || {
                if host.routes.contains_key(&kind) {
                    Ok(true)
                } else {
                    debug!(router = kind.capability_name(), "no route table registered");
                    Err(ProbeError::new(kind.capability_name(), "no route table registered"))
                }
            }));
        }
        Ok(detector)
    }

    /// Returns the standard provider groups over this host.
    ///
    /// # Errors
    ///
    /// Fails only if a built-in capability id is rejected by validation.
    pub fn assembly(self: &Arc<Self>) -> Result<RegistryAssembly, HostError> {
        let mut assembly = RegistryAssembly::new();
        for group in groups::standard_groups(self)? {
            assembly.push(group);
        }
        Ok(assembly)
    }

    /// Detects capabilities and assembles the standard groups plus `extra`,
    /// in that order.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Assembly`] on a tool name collision between
    /// active groups.
    pub fn registry(
        self: &Arc<Self>,
        extra: impl IntoIterator<Item = devtools_tools::ProviderGroup>,
    ) -> Result<ToolRegistry, HostError> {
        let detector = self.detector()?;
        let mut assembly = self.assembly()?;
        for group in extra {
            assembly.push(group);
        }
        let registry = assembly.assemble_detected(&detector)?;
        info!(
            tools = registry.len(),
            groups = ?registry.active_groups(),
            "host tool registry assembled"
        );
        Ok(registry)
    }
}
