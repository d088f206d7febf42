mod common;

use std::sync::Arc;

use common::{Client, serve};
use devtools_mcp::host::{
    ComponentInventory, Dependency, DependencyCatalog, Environment, HostContext, PropertyMap,
    RouteInfo, RouteTable, RouterKind, Scope,
};
use devtools_mcp::tools::CollectorError;
use serde_json::json;

struct OrderService;
struct Clock;

fn host() -> Arc<HostContext> {
    Arc::new(
        HostContext::new()
            .with_components(
                ComponentInventory::new()
                    .with::<OrderService>("orderService", Scope::Singleton)
                    .with::<Clock>("clock", Scope::Prototype)
                    .with_lazy("brokenBean", Scope::Singleton, || {
                        Err(CollectorError::failed("constructor threw"))
                    }),
            )
            .with_environment(
                Environment::new().with_profile("dev").with_source(
                    PropertyMap::new("application")
                        .with("server.port", "8080")
                        .with("db.password", "hunter2"),
                ),
            )
            .with_dependencies(
                DependencyCatalog::new().with(Dependency::new("serde", "1.0.228", "serde")),
            )
            .with_route_table(
                RouteTable::new(RouterKind::Blocking).with_route(
                    RouteInfo::new("/orders/{id}", "OrderController::get")
                        .with_methods(["GET"])
                        .with_param("id", "u64"),
                ),
            ),
    )
}

#[tokio::test]
async fn host_tools_are_served_over_the_wire() {
    let registry = host().registry(std::iter::empty()).unwrap();
    let handle = serve(registry).await;
    let mut client = Client::connect(&handle).await;
    client.initialize().await;

    let names = client.tool_names().await;
    assert!(names.iter().any(|name| name == "get_blocking_routes"));
    assert!(!names.iter().any(|name| name == "get_reactive_routes"));

    let components = client.call("get_components", json!({})).await;
    assert!(
        components["value"]["orderService"]
            .as_str()
            .unwrap()
            .ends_with("OrderService")
    );
    assert!(
        components["value"]["brokenBean"]
            .as_str()
            .unwrap()
            .starts_with("Error loading component")
    );

    let missing = client
        .call("get_component_details", json!({ "name": "ghost" }))
        .await;
    assert_eq!(missing["ok"], true);
    assert_eq!(missing["value"]["error"], "Component not found: ghost");

    let properties = client.call("get_properties", json!({ "prefix": "db." })).await;
    assert_eq!(properties["value"], json!({ "db.password": "******" }));

    let profiles = client.call("get_active_profiles", json!({})).await;
    assert_eq!(profiles["value"], json!(["dev"]));

    let routes = client.call("get_blocking_routes", json!({})).await;
    assert_eq!(routes["value"][0]["path"], "/orders/{id}");

    let health = client.call("get_health_info", json!({})).await;
    assert_eq!(health["value"]["status"], "UP");
    assert!(!client.notifications.is_empty());

    handle.stop().await.unwrap();
}
