//! Sample host process that embeds the devtools server.
//!
//! Connect with any WebSocket client to `ws://127.0.0.1:<port>/mcp`, send
//! `initialize`, then explore the process with `tools/list` and `tools/call`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use devtools_mcp::config::{ConfigLoader, EnvSource};
use devtools_mcp::host::{
    ComponentInventory, Dependency, DependencyCatalog, Environment, HostContext, PropertyMap,
    RouteInfo, RouteTable, RouterKind, Scope,
};
use devtools_mcp::kernel::McpServer;
use devtools_mcp::tools::{
    Arguments, CallContext, ParamSpec, ProviderGroup, ToolDefinition, ToolResult,
};
use serde_json::{Value, json};
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Demo host process exposing its internals over MCP")]
struct Args {
    /// Port override; takes precedence over `devtools.mcp.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Register a reactive route table as well as the blocking one
    #[arg(long)]
    reactive: bool,
}

trait OrderRepository {}

struct InMemoryOrders;
impl OrderRepository for InMemoryOrders {}

struct OrderController;
struct RequestClock;

async fn ping(_args: Arguments, _ctx: CallContext) -> ToolResult<Value> {
    Ok(json!("pong"))
}

fn host_context(reactive: bool) -> HostContext {
    let components = ComponentInventory::new()
        .with_interfaces::<InMemoryOrders>(
            "orderRepository",
            Scope::Singleton,
            &["OrderRepository"],
        )
        .with::<OrderController>("orderController", Scope::Singleton)
        .with::<RequestClock>("requestClock", Scope::Prototype);

    let environment = Environment::new().with_profile("demo").with_source(
        PropertyMap::new("demo.properties")
            .with("devtools.mcp.port", "9999")
            .with("app.name", "order-service")
            .with("app.datasource.url", "postgres://localhost/orders")
            .with("app.datasource.password", "change-me")
            .with("app.api-key", "demo-key"),
    );

    let dependencies = DependencyCatalog::new()
        .with(Dependency::new("tokio", "1", "tokio"))
        .with(Dependency::new("axum", "0.8", "axum"))
        .with(Dependency::new("serde", "1", "serde"));

    let mut host = HostContext::new()
        .with_components(components)
        .with_environment(environment)
        .with_dependencies(dependencies)
        .with_route_table(
            RouteTable::new(RouterKind::Blocking)
                .with_route(
                    RouteInfo::new("/orders", "OrderController::list")
                        .with_methods(["GET"])
                        .produces("application/json"),
                )
                .with_route(
                    RouteInfo::new("/orders/{id}", "OrderController::get")
                        .with_methods(["GET"])
                        .produces("application/json")
                        .with_param("id", "u64"),
                ),
        );
    if reactive {
        host = host.with_route_table(
            RouteTable::new(RouterKind::Reactive).with_route(
                RouteInfo::new("/orders/stream", "OrderController::stream")
                    .with_methods(["GET"])
                    .produces("text/event-stream"),
            ),
        );
    }
    host
}

#[tokio::main]
async fn main() -> Result<()> {
    devtools_mcp::telemetry::init();
    let args = Args::parse();

    let host = Arc::new(host_context(args.reactive));

    let mut config = ConfigLoader::new()
        .with_source(&EnvSource)
        .with_source(host.environment())
        .load()
        .context("invalid devtools configuration")?;
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    let extra = ProviderGroup::always("demo").with_tool(ToolDefinition::new(
        "ping",
        "Replies with pong.",
        Vec::<ParamSpec>::new(),
        ping,
    ));
    let registry = host
        .registry([extra])
        .context("failed to assemble the tool registry")?;
    info!(tools = registry.len(), "tool registry assembled");

    let handle = McpServer::new(config, registry)
        .start()
        .await
        .context("failed to start the devtools server")?;
    info!(url = %handle.url(), "devtools server ready; press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("stopping");
    handle.stop().await.context("server did not stop cleanly")?;
    Ok(())
}
