//! Standard provider groups over a [`HostContext`].
//!
//! | group             | active when              |
//! |-------------------|--------------------------|
//! | `components`      | always                   |
//! | `environment`     | always                   |
//! | `runtime`         | always                   |
//! | `routes.blocking` | `routing.blocking` found |
//! | `routes.reactive` | `routing.reactive` found |

use std::sync::Arc;

use devtools_tools::collaborator::wrap;
use devtools_tools::{
    ActivationPredicate, CollectorError, ParamSpec, ParamType, ProviderGroup,
};
use serde_json::json;

use crate::context::{HostContext, HostError};
use crate::routes::RouterKind;

/// Returns every standard group in declaration order.
///
/// # Errors
///
/// Fails only if a built-in capability id is rejected by validation.
pub fn standard_groups(host: &Arc<HostContext>) -> Result<Vec<ProviderGroup>, HostError> {
    let mut groups = vec![
        components_group(host),
        environment_group(host),
        runtime_group(host),
    ];
    for kind in RouterKind::ALL {
        groups.push(routes_group(host, kind)?);
    }
    Ok(groups)
}

/// `get_components` and `get_component_details`.
#[must_use]
pub fn components_group(host: &Arc<HostContext>) -> ProviderGroup {
    let listing = Arc::clone(host);
    let details = Arc::clone(host);

    ProviderGroup::always("components")
        .with_tool(wrap(
            "get_components",
            "Gets all components registered in the host process",
            Vec::<ParamSpec>::new(),
            "component inventory",
            move |_, _| Ok::<_, CollectorError>(listing.components().list()),
        ))
        .with_tool(wrap(
            "get_component_details",
            "Gets details about a specific component by name",
            vec![
                ParamSpec::required("name", ParamType::String)
                    .with_description("name of the component"),
            ],
            "component details",
            move |args, _| {
                let name = args.str("name").unwrap_or_default();
                match details.components().details(name) {
                    None => Ok(json!({ "error": format!("Component not found: {name}") })),
                    Some(resolved) => serde_json::to_value(resolved?).map_err(CollectorError::failed),
                }
            },
        ))
}

/// `get_active_profiles` and `get_properties`.
#[must_use]
pub fn environment_group(host: &Arc<HostContext>) -> ProviderGroup {
    let profiles = Arc::clone(host);
    let properties = Arc::clone(host);

    ProviderGroup::always("environment")
        .with_tool(wrap(
            "get_active_profiles",
            "Gets all active configuration profiles",
            Vec::<ParamSpec>::new(),
            "active profiles",
            move |_, _| Ok::<_, CollectorError>(profiles.environment().active_profiles().to_vec()),
        ))
        .with_tool(wrap(
            "get_properties",
            "Gets configuration properties, optionally filtered by key prefix; sensitive values are masked",
            vec![
                ParamSpec::optional("prefix", ParamType::String)
                    .with_description("only return keys starting with this prefix"),
            ],
            "properties",
            move |args, _| {
                Ok::<_, CollectorError>(properties.environment().properties(args.str("prefix")))
            },
        ))
}

/// `get_health_info` and `get_dependency_info`.
#[must_use]
pub fn runtime_group(host: &Arc<HostContext>) -> ProviderGroup {
    let health = Arc::clone(host);
    let dependencies = Arc::clone(host);

    ProviderGroup::always("runtime")
        .with_tool(wrap(
            "get_health_info",
            "Gets health information about the host process",
            Vec::<ParamSpec>::new(),
            "health information",
            move |_, ctx| {
                ctx.info("sampling process statistics");
                Ok::<_, CollectorError>(health.health())
            },
        ))
        .with_tool(wrap(
            "get_dependency_info",
            "Gets information about the dependencies the host was built with",
            Vec::<ParamSpec>::new(),
            "dependency information",
            move |_, _| dependencies.dependencies().list(),
        ))
}

/// Route listing for one router kind, active only when that router exists.
///
/// # Errors
///
/// Fails only if the built-in capability id is rejected by validation.
pub fn routes_group(host: &Arc<HostContext>, kind: RouterKind) -> Result<ProviderGroup, HostError> {
    let routes = Arc::clone(host);
    let (name, description) = match kind {
        RouterKind::Blocking => (
            "get_blocking_routes",
            "Gets all routes served by the blocking router",
        ),
        RouterKind::Reactive => (
            "get_reactive_routes",
            "Gets all routes served by the reactive router",
        ),
    };

    Ok(
        ProviderGroup::new(kind.group_name(), ActivationPredicate::requires(kind.capability()?))
            .with_tool(wrap(
                name,
                description,
                Vec::<ParamSpec>::new(),
                "routes",
                move |_, _| routes.route_table(kind).map(|table| table.routes().to_vec()),
            )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use devtools_tools::{
        CallContext, Dispatcher, InvocationRequest, InvocationResponse, Notifier, ToolRegistry,
    };
    use serde_json::Value;
    use tokio::sync::mpsc;

    use crate::components::{ComponentInventory, Scope};
    use crate::dependencies::DependencyCatalog;
    use crate::environment::{Environment, PropertyMap};
    use crate::routes::{RouteInfo, RouteTable};

    struct Repository;

    fn host() -> Arc<HostContext> {
        Arc::new(
            HostContext::new()
                .with_components(
                    ComponentInventory::new()
                        .with_interfaces::<Repository>("repository", Scope::Singleton, &["Store"]),
                )
                .with_environment(
                    Environment::new().with_profile("test").with_source(
                        PropertyMap::new("defaults")
                            .with("app.name", "demo")
                            .with("app.secret", "s3cr3t"),
                    ),
                )
                .with_dependencies(DependencyCatalog::from_loader(|| {
                    Err(CollectorError::failed("catalog offline"))
                }))
                .with_route_table(
                    RouteTable::new(RouterKind::Blocking)
                        .with_route(RouteInfo::new("/orders", "orders::list").with_methods(["GET"])),
                ),
        )
    }

    fn registry(host: &Arc<HostContext>) -> Arc<ToolRegistry> {
        Arc::new(host.registry(Vec::new()).unwrap())
    }

    async fn call(registry: &Arc<ToolRegistry>, name: &str, arguments: Value) -> Value {
        let dispatcher = Dispatcher::new(Arc::clone(registry));
        match dispatcher
            .invoke(InvocationRequest::new(name, arguments), CallContext::detached(name))
            .await
        {
            InvocationResponse::Success(value) => value,
            InvocationResponse::Failure { kind, message } => panic!("{kind}: {message}"),
        }
    }

    #[test]
    fn gating_follows_router_presence() {
        let registry = registry(&host());
        assert!(registry.contains("get_blocking_routes"));
        assert!(!registry.contains("get_reactive_routes"));
        assert_eq!(
            registry.active_groups(),
            ["components", "environment", "runtime", "routes.blocking"]
        );
    }

    #[tokio::test]
    async fn component_tools() {
        let registry = registry(&host());
        let listing = call(&registry, "get_components", Value::Null).await;
        assert!(listing["repository"].as_str().unwrap().ends_with("Repository"));

        let details = call(&registry, "get_component_details", json!({ "name": "repository" })).await;
        assert_eq!(details["type"], "Repository");
        assert_eq!(details["interfaces"], json!(["Store"]));

        let missing = call(&registry, "get_component_details", json!({ "name": "ghost" })).await;
        assert_eq!(missing, json!({ "error": "Component not found: ghost" }));
    }

    #[tokio::test]
    async fn environment_tools_mask_secrets() {
        let registry = registry(&host());
        let profiles = call(&registry, "get_active_profiles", json!({})).await;
        assert_eq!(profiles, json!(["test"]));

        let properties = call(&registry, "get_properties", json!({ "prefix": "app." })).await;
        assert_eq!(properties, json!({ "app.name": "demo", "app.secret": "******" }));
    }

    #[tokio::test]
    async fn collaborator_failures_become_error_values() {
        let registry = registry(&host());
        let deps = call(&registry, "get_dependency_info", Value::Null).await;
        assert_eq!(
            deps,
            json!({ "error": "Failed to retrieve dependency information: catalog offline" })
        );
    }

    #[tokio::test]
    async fn health_info_notifies_and_reports() {
        let registry = registry(&host());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = CallContext::new("get_health_info", Notifier::new(tx, devtools_tools::LogLevel::Debug));
        let response = Dispatcher::new(Arc::clone(&registry))
            .invoke(InvocationRequest::new("get_health_info", Value::Null), ctx)
            .await;
        let InvocationResponse::Success(health) = response else {
            panic!("health info failed");
        };
        assert_eq!(health["status"], "UP");
        assert_eq!(rx.try_recv().unwrap().logger, "get_health_info");
    }

    #[tokio::test]
    async fn route_listing() {
        let registry = registry(&host());
        let routes = call(&registry, "get_blocking_routes", Value::Null).await;
        assert_eq!(routes[0]["path"], "/orders");
        assert_eq!(routes[0]["methods"], json!(["GET"]));
    }

    #[test]
    fn extra_groups_collide_with_standard_tools() {
        let duplicate = ProviderGroup::always("custom").with_tool(wrap(
            "get_components",
            "Shadows the standard listing",
            Vec::<ParamSpec>::new(),
            "nothing",
            |_, _| Ok::<_, CollectorError>(Value::Null),
        ));
        let err = host().registry([duplicate]).unwrap_err();
        assert!(matches!(err, HostError::Assembly(_)));
    }
}
