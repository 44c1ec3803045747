use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;

use parkcell_core::client::ParkingClient;
use parkcell_core::reconcile::ReconcileReport;
use parkcell_core::reservations::{CreateReservation, CustomerReservation};
use parkcell_core::scheduler::{ReconcileScheduler, SchedulerConfig};
use parkcell_core::types::{Cell, CustomerId, LotAvailability, LotId, Reservation, Vehicle};
use parkcell_core::ParkingError;

use crate::catalog::Catalog;
use crate::handlers::*;
use crate::BoxError;

pub type AppState = Arc<Mutex<ParkingClient>>;

pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub storage: String,
    pub scheduler: SchedulerConfig,
    pub max_concurrency: usize,
    pub catalog: Option<PathBuf>,
}

pub async fn run(options: ServeOptions) -> Result<(), BoxError> {
    let mut client = create_client(&options.storage)?;
    if let Some(path) = &options.catalog {
        Catalog::load(path)?.apply(&mut client)?;
    }
    let state: AppState = Arc::new(Mutex::new(client));

    let mut scheduler = ReconcileScheduler::new(options.scheduler);
    scheduler.start(state.clone());

    let app = router(state, options.max_concurrency);

    let addr = format!("{}:{}", options.host, options.port);
    tracing::info!("🅿️  Parkcell server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler.stop().await;
    served?;
    tracing::info!("Parkcell server stopped");
    Ok(())
}

pub fn router(state: AppState, max_concurrency: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        // Reservations
        .route("/reservations", post(create_reservation))
        .route("/reservations/active", get(list_active_reservations))
        .route("/reservations/{id}", get(get_reservation))
        .route("/reservations/{id}/close", post(close_reservation))
        // Customers (identity is passed in the path by the authenticated caller)
        .route(
            "/customers/{id}/reservations",
            post(create_customer_reservation).get(list_customer_reservations),
        )
        .route("/customers/{id}/vehicles", get(list_customer_vehicles))
        // Lots & cells
        .route("/lots/availability", get(lot_availability))
        .route("/lots/{id}/capacity", post(ensure_lot_capacity))
        .route("/lots/{id}/cells", get(list_cells))
        .route("/lots/{id}/reservations", get(list_lot_reservations))
        .route("/cells/{id}", get(get_cell))
        .route("/cells/{id}/status", patch(set_cell_status))
        // Maintenance
        .route("/reconcile", post(reconcile))
        .layer(ConcurrencyLimitLayer::new(max_concurrency))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let mut client = state.lock().await;
    ok(HealthResponse {
        status: "ok".to_string(),
        active_reservations: client.list_active_reservations()?.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<CreateReservation>,
) -> ApiResult<Reservation> {
    let mut client = state.lock().await;
    created(client.create_reservation(&req)?)
}

async fn create_customer_reservation(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
    Json(req): Json<CustomerReservationRequest>,
) -> ApiResult<Reservation> {
    let mut client = state.lock().await;
    created(client.create_reservation_for_customer(&CustomerReservation {
        customer_id,
        plate: req.plate,
        vehicle_type_id: req.vehicle_type_id,
        lot_id: req.lot_id,
    })?)
}

async fn list_active_reservations(State(state): State<AppState>) -> ApiResult<Vec<Reservation>> {
    let mut client = state.lock().await;
    ok(client.list_active_reservations()?)
}

async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Reservation> {
    let client = state.lock().await;
    ok(client.get_reservation(&id)?)
}

async fn close_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Reservation> {
    let mut client = state.lock().await;
    ok(client.close_reservation(&id)?)
}

async fn list_customer_reservations(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Vec<Reservation>> {
    let mut client = state.lock().await;
    if query.email.trim().is_empty() {
        ok(client.list_reservations_by_customer(customer_id)?)
    } else {
        ok(client.list_reservations_by_customer_or_email(customer_id, &query.email)?)
    }
}

async fn list_customer_vehicles(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Vec<Vehicle>> {
    let mut client = state.lock().await;
    ok(client.list_vehicles_by_customer_or_email(customer_id, &query.email)?)
}

async fn lot_availability(State(state): State<AppState>) -> ApiResult<Vec<LotAvailability>> {
    let mut client = state.lock().await;
    ok(client.lot_availability()?)
}

async fn ensure_lot_capacity(
    State(state): State<AppState>,
    Path(lot_id): Path<LotId>,
) -> ApiResult<CapacityResponse> {
    let mut client = state.lock().await;
    let created = client.ensure_lot_capacity(lot_id)?;
    ok(CapacityResponse { lot_id, created })
}

async fn list_cells(State(state): State<AppState>, Path(lot_id): Path<LotId>) -> ApiResult<Vec<Cell>> {
    let client = state.lock().await;
    ok(client.list_cells(lot_id)?)
}

async fn list_lot_reservations(
    State(state): State<AppState>,
    Path(lot_id): Path<LotId>,
) -> ApiResult<Vec<Reservation>> {
    let mut client = state.lock().await;
    ok(client.list_reservations_by_lot(lot_id)?)
}

async fn get_cell(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Cell> {
    let client = state.lock().await;
    ok(client.get_cell(&id)?)
}

async fn set_cell_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetCellStatusRequest>,
) -> ApiResult<Cell> {
    let mut client = state.lock().await;
    let cell = client.set_cell_status(&id, &req.status)?;
    tracing::info!(cell_id = %cell.id, status = %cell.status, "Cell status set by operator");
    ok(cell)
}

async fn reconcile(State(state): State<AppState>) -> ApiResult<ReconcileReport> {
    let mut client = state.lock().await;
    ok(client.reconcile()?)
}

// ─── Storage Backend Selection ──────────────────────────────────────────────

/// Opens the configured backend. A backend that cannot be opened is an
/// error: a host configured for persistence never degrades to memory.
pub fn create_client(storage: &str) -> parkcell_core::Result<ParkingClient> {
    if storage == "memory" {
        tracing::info!("💾 Storage backend: in-memory (reservations will not persist)");
        Ok(ParkingClient::new())
    } else if let Some(path) = storage.strip_prefix("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            tracing::info!("💾 Storage backend: SQLite ({})", path);
            ParkingClient::with_sqlite(path)
        }
        #[cfg(not(feature = "sqlite"))]
        {
            let _ = path;
            Err(ParkingError::Configuration(
                "SQLite storage requested but the `sqlite` feature is not enabled. \
                 Rebuild with: cargo build --features sqlite"
                    .to_string(),
            ))
        }
    } else {
        Err(ParkingError::Configuration(format!(
            "unknown storage backend '{}'. Use 'memory' or 'sqlite:<path>'",
            storage
        )))
    }
}
