mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::contracts::{InvoiceIndex, LockBackend, StateStore};

pub use handlers::{
    ApiError, AppState, CreateInvoiceRequest, ErrorResponse, InvoiceNumberResponse, PreviewRequest,
    SequenceNumberResponse, StatsResponse,
};

/// Creates the API router.
pub fn create_router<S, I, L>(state: Arc<AppState<S, I, L>>) -> Router
where
    S: StateStore + 'static,
    I: InvoiceIndex + 'static,
    L: LockBackend + 'static,
{
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats::<S, I, L>))
        .route("/metrics", get(handlers::metrics::<S, I, L>))
        .route("/generators", get(handlers::list_generators::<S, I, L>))
        .route(
            "/invoice-numbers",
            post(handlers::generate_number::<S, I, L>),
        )
        .route(
            "/invoice-numbers/last",
            get(handlers::last_issued::<S, I, L>),
        )
        .route(
            "/invoice-numbers/preview",
            post(handlers::preview_number::<S, I, L>),
        )
        .route(
            "/settings",
            get(handlers::get_settings::<S, I, L>).put(handlers::put_settings::<S, I, L>),
        )
        .route("/invoices", post(handlers::create_invoice::<S, I, L>))
        .route("/invoices/:number", get(handlers::get_invoice::<S, I, L>))
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Creates a ServerConfig from environment variables.
    ///
    /// Environment variables:
    /// - `FOLIO_HOST`: bind address (default: 0.0.0.0)
    /// - `FOLIO_PORT`: bind port (default: 8080)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            host: std::env::var("FOLIO_HOST").unwrap_or(default.host),
            port: std::env::var("FOLIO_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
        }
    }
}

/// Starts the HTTP server.
pub async fn start_server<S, I, L, F>(
    config: ServerConfig,
    state: Arc<AppState<S, I, L>>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: StateStore + 'static,
    I: InvoiceIndex + 'static,
    L: LockBackend + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
