use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::contracts::{
    FolioError, GeneratorDefinition, GeneratorError, InvoiceIndex, InvoiceRecord, LockBackend,
    SequenceNumber, StateStore, StorageError,
};
use crate::numbering::{NumberGenerationService, NumberingConfig};

/// Application state shared across handlers.
pub struct AppState<S: StateStore, I: InvoiceIndex, L: LockBackend> {
    pub service: Arc<NumberGenerationService<S, I, L>>,
    /// Host-side invoice records, the same index the service checks
    pub invoices: Arc<I>,
}

impl<S: StateStore, I: InvoiceIndex, L: LockBackend> AppState<S, I, L> {
    pub fn new(service: Arc<NumberGenerationService<S, I, L>>, invoices: Arc<I>) -> Self {
        Self { service, invoices }
    }
}

/// Response carrying one invoice number.
#[derive(Debug, Serialize)]
pub struct InvoiceNumberResponse {
    pub invoice_number: String,
}

/// A stored counter as seen over HTTP.
#[derive(Debug, Serialize)]
pub struct SequenceNumberResponse {
    pub increment: u64,
    pub year: i32,
    pub month: u32,
    pub value: Option<String>,
}

impl From<SequenceNumber> for SequenceNumberResponse {
    fn from(number: SequenceNumber) -> Self {
        Self {
            increment: number.increment_number(),
            year: number.year(),
            month: number.month(),
            value: number.value().map(str::to_string),
        }
    }
}

/// Request body for previewing a formatted number.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub increment: u64,
    pub year: i32,
    pub month: u32,
    /// Overrides the configured padding
    pub padding: Option<usize>,
    /// Overrides the configured pattern
    pub pattern: Option<String>,
}

/// Request body for confirming an invoice.
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub order_id: Option<String>,
    /// Number assigned by the host. A fresh one is generated when absent.
    pub invoice_number: Option<String>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    Folio(FolioError),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, error) = match self {
            ApiError::Folio(FolioError::Generator(e @ GeneratorError::NotFound(_))) => {
                (StatusCode::NOT_FOUND, "GENERATOR_NOT_FOUND", e.to_string())
            }
            ApiError::Folio(FolioError::Generator(e @ GeneratorError::InvalidSetting { .. })) => {
                (StatusCode::BAD_REQUEST, "INVALID_SETTING", e.to_string())
            }
            ApiError::Folio(FolioError::Generator(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIGURATION_ERROR",
                e.to_string(),
            ),
            ApiError::Folio(FolioError::Storage(e @ StorageError::DuplicateInvoiceNumber(_))) => {
                (StatusCode::CONFLICT, "DUPLICATE_INVOICE_NUMBER", e.to_string())
            }
            ApiError::Folio(FolioError::Storage(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                e.to_string(),
            ),
            ApiError::Folio(FolioError::Lock(e)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "LOCK_UNAVAILABLE", e.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code: code.into(),
            }),
        )
            .into_response()
    }
}

impl From<FolioError> for ApiError {
    fn from(e: FolioError) -> Self {
        ApiError::Folio(e)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Folio(e.into())
    }
}

/// Runs a call that may block on the generator lock or a synced write off
/// the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, FolioError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy"
    }))
}

/// Response for stats endpoint.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_secs: f64,
    pub generated: GenerateStats,
    pub collisions_total: u64,
    pub corrupt_state_total: u64,
    pub lock_waits_total: u64,
    pub errors_total: u64,
}

#[derive(Debug, Serialize)]
pub struct GenerateStats {
    pub total: u64,
    pub rate_per_sec: f64,
    pub avg_latency_us: f64,
}

/// GET /stats
pub async fn get_stats<S, I, L>(State(state): State<Arc<AppState<S, I, L>>>) -> impl IntoResponse
where
    S: StateStore,
    I: InvoiceIndex,
    L: LockBackend,
{
    let snapshot = state.service.metrics().snapshot();

    Json(StatsResponse {
        uptime_secs: snapshot.uptime_secs,
        generated: GenerateStats {
            total: snapshot.generated_total,
            rate_per_sec: safe_rate(snapshot.generated_total, snapshot.uptime_secs),
            avg_latency_us: snapshot.avg_generate_us,
        },
        collisions_total: snapshot.collisions_total,
        corrupt_state_total: snapshot.corrupt_state_total,
        lock_waits_total: snapshot.lock_waits_total,
        errors_total: snapshot.errors_total,
    })
}

/// GET /metrics
/// Returns metrics in Prometheus text exposition format.
pub async fn metrics<S, I, L>(State(state): State<Arc<AppState<S, I, L>>>) -> impl IntoResponse
where
    S: StateStore,
    I: InvoiceIndex,
    L: LockBackend,
{
    let metrics = state.service.metrics();
    let mut output = format!(
        "# HELP folio_uptime_secs Server uptime in seconds\n\
         # TYPE folio_uptime_secs gauge\n\
         folio_uptime_secs {:.3}\n\
         \n",
        metrics.uptime_secs(),
    );
    output.push_str(&metrics.format_prometheus());

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}

/// GET /generators
/// Lists the registered number generators keyed by id.
pub async fn list_generators<S, I, L>(
    State(state): State<Arc<AppState<S, I, L>>>,
) -> Json<BTreeMap<String, GeneratorDefinition>>
where
    S: StateStore,
    I: InvoiceIndex,
    L: LockBackend,
{
    Json(state.service.generator_definitions())
}

/// POST /invoice-numbers
/// Issues the next invoice number.
pub async fn generate_number<S, I, L>(
    State(state): State<Arc<AppState<S, I, L>>>,
) -> Result<impl IntoResponse, ApiError>
where
    S: StateStore + 'static,
    I: InvoiceIndex + 'static,
    L: LockBackend + 'static,
{
    let service = Arc::clone(&state.service);
    let invoice_number = blocking(move || service.generate_and_set()).await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceNumberResponse { invoice_number }),
    ))
}

/// GET /invoice-numbers/last
pub async fn last_issued<S, I, L>(
    State(state): State<Arc<AppState<S, I, L>>>,
) -> Result<Json<SequenceNumberResponse>, ApiError>
where
    S: StateStore + 'static,
    I: InvoiceIndex + 'static,
    L: LockBackend + 'static,
{
    let service = Arc::clone(&state.service);
    blocking(move || service.last_issued())
        .await?
        .map(|last| Json(last.into()))
        .ok_or_else(|| ApiError::NotFound("No invoice number has been issued yet".into()))
}

/// POST /invoice-numbers/preview
/// Formats a counter without touching any state.
pub async fn preview_number<S, I, L>(
    State(state): State<Arc<AppState<S, I, L>>>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<InvoiceNumberResponse>, ApiError>
where
    S: StateStore,
    I: InvoiceIndex,
    L: LockBackend,
{
    if !(1..=12).contains(&req.month) {
        return Err(ApiError::BadRequest(format!(
            "Month must be between 1 and 12, got {}",
            req.month
        )));
    }

    let number = SequenceNumber::new(req.increment, req.year, req.month);
    let invoice_number = state
        .service
        .format(&number, req.padding, req.pattern.as_deref())?;
    Ok(Json(InvoiceNumberResponse { invoice_number }))
}

/// GET /settings
pub async fn get_settings<S, I, L>(
    State(state): State<Arc<AppState<S, I, L>>>,
) -> Result<Json<NumberingConfig>, ApiError>
where
    S: StateStore,
    I: InvoiceIndex,
    L: LockBackend,
{
    Ok(Json(state.service.settings()?))
}

/// PUT /settings
/// Replaces the numbering settings, seeding the counter from
/// `invoice_number_start` while no invoice exists.
pub async fn put_settings<S, I, L>(
    State(state): State<Arc<AppState<S, I, L>>>,
    Json(settings): Json<NumberingConfig>,
) -> Result<Json<NumberingConfig>, ApiError>
where
    S: StateStore + 'static,
    I: InvoiceIndex + 'static,
    L: LockBackend + 'static,
{
    let service = Arc::clone(&state.service);
    let applied = settings.clone();
    match blocking(move || service.apply_settings(applied)).await {
        Ok(()) => Ok(Json(settings)),
        Err(ApiError::Folio(FolioError::Generator(GeneratorError::NotFound(id)))) => Err(
            ApiError::BadRequest(format!("Unknown invoice number generator: {}", id)),
        ),
        Err(e) => Err(e),
    }
}

/// POST /invoices
/// Confirms an invoice, issuing a number unless the host supplied one.
pub async fn create_invoice<S, I, L>(
    State(state): State<Arc<AppState<S, I, L>>>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: StateStore + 'static,
    I: InvoiceIndex + 'static,
    L: LockBackend + 'static,
{
    if req.invoice_number.as_deref().is_some_and(str::is_empty) {
        return Err(ApiError::BadRequest("Invoice number must not be empty".into()));
    }

    let service = Arc::clone(&state.service);
    let invoices = Arc::clone(&state.invoices);
    let record = blocking(move || {
        let invoice_number = match req.invoice_number {
            Some(number) => number,
            None => service.generate_and_set()?,
        };
        let record = InvoiceRecord::new(invoice_number, req.order_id);
        invoices.record(&record)?;
        Ok(record)
    })
    .await?;

    tracing::info!(
        invoice_number = %record.invoice_number,
        invoice_id = %record.id,
        "Invoice confirmed"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /invoices/{number}
pub async fn get_invoice<S, I, L>(
    State(state): State<Arc<AppState<S, I, L>>>,
    Path(number): Path<String>,
) -> Result<Json<InvoiceRecord>, ApiError>
where
    S: StateStore + 'static,
    I: InvoiceIndex + 'static,
    L: LockBackend + 'static,
{
    let invoices = Arc::clone(&state.invoices);
    let lookup = number.clone();
    blocking(move || Ok(invoices.find(&lookup)?))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Invoice not found: {}", number)))
}

fn safe_rate(total: u64, uptime_secs: f64) -> f64 {
    if uptime_secs > 0.0 {
        total as f64 / uptime_secs
    } else {
        0.0
    }
}
