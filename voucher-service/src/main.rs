use service_core::observability::init_tracing;
use voucher_service::config::VoucherConfig;
use voucher_service::services::init_metrics;
use voucher_service::startup::Application;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize metrics recorder (must be before any metrics are recorded)
    init_metrics();

    let config = VoucherConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        "voucher-service",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    );
    tracing::info!(
        store = ?config.store,
        environment = ?config.environment,
        "Starting voucher-service"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped().await
}
