//! Host-side introspection for the devtools MCP server.
//!
//! The host process describes itself through a [`HostContext`]: registered
//! components, its configuration environment, the dependencies it was built
//! with and any route tables its routers expose. [`groups`] turns those
//! facts into the standard provider groups.

#![warn(missing_docs, clippy::pedantic)]

pub mod components;
pub mod context;
pub mod dependencies;
pub mod environment;
pub mod groups;
pub mod routes;

pub use components::{ComponentDetails, ComponentInventory, Scope};
pub use context::{HostContext, HostError};
pub use dependencies::{Dependency, DependencyCatalog};
pub use environment::{Environment, MASK, PropertyMap, is_sensitive};
pub use routes::{RouteInfo, RouteParam, RouteTable, RouterKind};
