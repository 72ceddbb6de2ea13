use nodeflow_integration::AdapterRegistry;
use nodeflow_server::api::{self, AppState};
use nodeflow_server::catalog::WorkflowCatalog;
use nodeflow_server::config::ServerConfig;
use nodeflow_server::webhook::WebhookAdapter;
use nodeflow_workflow::{Dispatcher, RunController};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Optional config file as the first argument
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref()).expect("failed to load configuration");
    tracing::info!(
        integrations = config.integrations.len(),
        "Loaded configuration"
    );

    let catalog = WorkflowCatalog::load_dir(&config.workflows_dir)
        .await
        .expect("failed to load workflows");
    tracing::info!(workflows = catalog.len(), "Loaded workflow catalog");

    let adapters = AdapterRegistry::new().with_adapter(Arc::new(WebhookAdapter::new()));
    tracing::info!(kinds = ?adapters.kinds(), "Registered adapters");

    let dispatcher = Dispatcher::new(adapters, Arc::new(config.integration_store()));
    let controller = RunController::new(dispatcher, config.engine.clone());
    let app = api::router(AppState::new(controller, catalog));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
