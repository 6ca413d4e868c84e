use crate::config::{StoreBackend, VoucherConfig};
use crate::handlers;
use crate::services::{
    AllocationService, InMemoryStore, MongoDb, MongoStore, QuotationService, VoucherService,
    VoucherStore,
};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: VoucherConfig,
    pub store: Arc<dyn VoucherStore>,
    pub vouchers: VoucherService,
    pub quotations: QuotationService,
    pub allocations: AllocationService,
}

impl AppState {
    pub fn new(config: VoucherConfig, store: Arc<dyn VoucherStore>) -> Self {
        Self {
            config,
            vouchers: VoucherService::new(store.clone()),
            quotations: QuotationService::new(store.clone()),
            allocations: AllocationService::new(store.clone()),
            store,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Voucher ledger
        .route(
            "/vouchers",
            post(handlers::create_voucher).get(handlers::list_vouchers),
        )
        .route(
            "/vouchers/:id",
            get(handlers::get_voucher)
                .patch(handlers::correct_voucher)
                .delete(handlers::delete_voucher),
        )
        .route(
            "/vouchers/:id/allocations",
            get(handlers::get_voucher_allocations),
        )
        .route(
            "/available-vouchers",
            get(handlers::list_available_vouchers),
        )
        // Quotations
        .route(
            "/quotations/:kind",
            post(handlers::create_quotation).get(handlers::list_quotations),
        )
        .route(
            "/quotations/:kind/:id",
            get(handlers::get_quotation).patch(handlers::update_quotation),
        )
        .route(
            "/quotations/:kind/:id/payments",
            get(handlers::get_quotation_payments),
        )
        .route(
            "/quotations/:kind/:id/payments/recompute",
            post(handlers::recompute_quotation_total),
        )
        // Payment links
        .route("/allocations", post(handlers::create_allocation))
        .route(
            "/allocations/:id",
            axum::routing::patch(handlers::update_allocation)
                .delete(handlers::delete_allocation),
        )
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}

/// Open the configured store. MongoDB gets its indexes ensured on the way.
pub async fn connect_store(config: &VoucherConfig) -> Result<Arc<dyn VoucherStore>, AppError> {
    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::Mongo => {
            let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
            db.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                e
            })?;
            Ok(Arc::new(MongoStore::new(db)))
        }
    }
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: VoucherConfig) -> Result<Self, AppError> {
        let store = connect_store(&config).await?;
        let state = AppState::new(config.clone(), store);
        let router = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!("Listening on {}", self.port);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
