use std::{fs, sync::Arc};

use mcp_apps_engine::{
    build_app,
    catalog::{MethodCatalog, ResourceCatalog},
    config::Config,
    logging,
    mcp::McpEngine,
    AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;

    let methods = match config.methods_file.as_deref() {
        Some(path) => MethodCatalog::from_json_str(&fs::read_to_string(path)?)?,
        None => MethodCatalog::default(),
    };
    let resources = match config.resources_file.as_deref() {
        Some(path) => ResourceCatalog::from_json_str(&fs::read_to_string(path)?)?,
        None => ResourceCatalog::default(),
    };
    info!(
        tools = methods.len(),
        resources = resources.len(),
        "catalogs loaded"
    );

    let engine = Arc::new(
        McpEngine::builder(&config)
            .methods(methods)
            .resources(resources)
            .build(),
    );
    engine.start();

    let bind_socket = config.bind_socket()?;
    let app = build_app(AppState::new(engine.clone()));
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        routes = ?engine.routes(),
        "server starting"
    );

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    engine.stop();
    info!("server stopped");
    served?;
    Ok(())
}
