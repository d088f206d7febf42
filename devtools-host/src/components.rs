//! Registry of named components living in the host process.

use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use devtools_tools::CollectorError;
use serde::Serialize;
use tracing::warn;

/// How a component is instantiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// One shared instance.
    Singleton,
    /// A fresh instance per lookup.
    Prototype,
}

/// Resolved description of one component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentDetails {
    /// Registered name.
    pub name: String,
    /// Fully qualified type path.
    pub class: String,
    /// Unqualified type name.
    #[serde(rename = "type")]
    pub short_type: String,
    /// Traits the component is registered under.
    pub interfaces: Vec<String>,
    /// `true` for [`Scope::Singleton`].
    pub singleton: bool,
    /// `true` for [`Scope::Prototype`].
    pub prototype: bool,
}

#[derive(Clone, Debug)]
struct Descriptor {
    class: String,
    interfaces: Vec<String>,
    scope: Scope,
}

type Resolver = Arc<dyn Fn() -> Result<Descriptor, CollectorError> + Send + Sync>;

/// Named components in registration order.
#[derive(Clone, Default)]
pub struct ComponentInventory {
    entries: Vec<(String, Resolver)>,
}

impl fmt::Debug for ComponentInventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInventory")
            .field("components", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl ComponentInventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component of type `T`.
    #[must_use]
    pub fn with<T: ?Sized + 'static>(self, name: impl Into<String>, scope: Scope) -> Self {
        self.with_interfaces::<T>(name, scope, &[])
    }

    /// Registers a component of type `T` exposed under the given traits.
    #[must_use]
    pub fn with_interfaces<T: ?Sized + 'static>(
        self,
        name: impl Into<String>,
        scope: Scope,
        interfaces: &[&str],
    ) -> Self {
        let descriptor = Descriptor {
            class: type_name::<T>().to_owned(),
            interfaces: interfaces.iter().map(|&i| i.to_owned()).collect(),
            scope,
        };
        self.insert(name.into(), Arc::new(move || Ok::<_, CollectorError>(descriptor.clone())))
    }

    /// Registers a component whose type is only known once it is resolved.
    /// A failing resolver is reported per component, never for the whole list.
    #[must_use]
    pub fn with_lazy<F>(self, name: impl Into<String>, scope: Scope, resolve: F) -> Self
    where
        F: Fn() -> Result<String, CollectorError> + Send + Sync + 'static,
    {
        self.insert(
            name.into(),
            Arc::new(move || {
                resolve().map(|class| Descriptor {
                    class,
                    interfaces: Vec::new(),
                    scope,
                })
            }),
        )
    }

    fn insert(mut self, name: String, resolver: Resolver) -> Self {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = resolver,
            None => self.entries.push((name, resolver)),
        }
        self
    }

    /// Returns the registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maps every component name to its type, or to an error note when the
    /// component cannot be resolved.
    #[must_use]
    pub fn list(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(name, resolve)| {
                let class = match resolve() {
                    Ok(descriptor) => descriptor.class,
                    Err(err) => {
                        warn!(component = %name, %err, "component could not be resolved");
                        format!("Error loading component: {err}")
                    }
                };
                (name.clone(), class)
            })
            .collect()
    }

    /// Resolves one component. `None` when no component has that name.
    #[must_use]
    pub fn details(&self, name: &str) -> Option<Result<ComponentDetails, CollectorError>> {
        let (_, resolve) = self.entries.iter().find(|(existing, _)| existing == name)?;
        Some(resolve().map(|descriptor| ComponentDetails {
            name: name.to_owned(),
            short_type: short_type_name(&descriptor.class).to_owned(),
            class: descriptor.class,
            interfaces: descriptor.interfaces,
            singleton: descriptor.scope == Scope::Singleton,
            prototype: descriptor.scope == Scope::Prototype,
        }))
    }
}

/// Strips module paths and generic arguments: `a::b::Cache<u8>` -> `Cache`.
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
