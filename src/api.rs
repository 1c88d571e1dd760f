//! HTTP API handlers for LunaTrack.
//!
//! Handlers are thin: they read settings and entries from [`Storage`], call the
//! stats engine, and serialize the result. Errors become
//! `{ "error": "<message>" }` bodies via [`ApiError`].
//!
//! Recorded dates are health data. Handlers log counts and derived numbers at
//! `info`; individual dates only appear at `debug`.

use axum::{
    Json, Router,
    extract::{FromRequest, Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
};
use chrono::Utc;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use crate::dates::CalendarDate;
use crate::error::ApiError;
use crate::model::{
    EntriesQuery, EntriesResponse, EntryRequest, FileProtection, InspirationResponse,
    MAX_PREDICTION_COUNT, OvulationToggle, Ports, PredictionResult, Settings, SslConfig,
    SslResponse,
};
use crate::stats::{StatsOptions, compute_stats_for_dates};
use crate::storage::Storage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
}

/// JSON body extractor whose rejections render as [`ApiError::BadRequest`].
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route(
            "/api/enable-ovulation",
            get(get_enable_ovulation).put(put_enable_ovulation),
        )
        .route("/api/ports", get(get_ports).put(put_ports))
        .route("/api/ssl", get(get_ssl).put(put_ssl))
        .route(
            "/api/file-protected",
            get(get_file_protected).put(put_file_protected),
        )
        .route("/api/entries", get(get_entries).post(post_entry))
        .route("/api/entries/:date", delete(delete_entry))
        .route("/api/inspiration/:id", get(get_inspiration))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/health
pub async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// GET /api/settings
#[instrument(skip(state))]
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, ApiError> {
    let settings = state.storage.read_settings().await.map_err(|e| {
        warn!(error = %e, "Failed to read settings");
        ApiError::from(e)
    })?;
    Ok(Json(settings))
}

/// PUT /api/settings - Replace the settings record.
///
/// Fields missing from the body take their defaults. Returns the stored record,
/// or 400 if it fails validation.
#[instrument(skip(state, settings))]
pub async fn put_settings(
    State(state): State<AppState>,
    ApiJson(settings): ApiJson<Settings>,
) -> Result<Json<Settings>, ApiError> {
    state.storage.write_settings(&settings).await.map_err(|e| {
        warn!(error = %e, "Rejected settings update");
        ApiError::from(e)
    })?;

    info!(
        default_cycle_length = settings.default_cycle_length,
        enable_ovulation = settings.enable_ovulation,
        "Settings updated"
    );
    Ok(Json(settings))
}

/// GET /api/enable-ovulation
#[instrument(skip(state))]
pub async fn get_enable_ovulation(
    State(state): State<AppState>,
) -> Result<Json<OvulationToggle>, ApiError> {
    let settings = state.storage.read_settings().await?;
    Ok(Json(OvulationToggle {
        enable_ovulation: settings.enable_ovulation,
    }))
}

/// PUT /api/enable-ovulation
#[instrument(skip(state))]
pub async fn put_enable_ovulation(
    State(state): State<AppState>,
    ApiJson(toggle): ApiJson<OvulationToggle>,
) -> Result<Json<OvulationToggle>, ApiError> {
    state
        .storage
        .update_settings(|s| s.enable_ovulation = toggle.enable_ovulation)
        .await?;

    info!(enable_ovulation = toggle.enable_ovulation, "Ovulation tracking toggled");
    Ok(Json(toggle))
}

/// GET /api/ports
#[instrument(skip(state))]
pub async fn get_ports(State(state): State<AppState>) -> Result<Json<Ports>, ApiError> {
    let settings = state.storage.read_settings().await?;
    Ok(Json(Ports {
        http_port: settings.http_port,
        https_port: settings.https_port,
    }))
}

/// PUT /api/ports
#[instrument(skip(state))]
pub async fn put_ports(
    State(state): State<AppState>,
    ApiJson(ports): ApiJson<Ports>,
) -> Result<Json<Ports>, ApiError> {
    state
        .storage
        .update_settings(|s| {
            s.http_port = ports.http_port;
            s.https_port = ports.https_port;
        })
        .await?;

    info!(http_port = ports.http_port, https_port = ports.https_port, "Ports updated");
    Ok(Json(ports))
}

/// GET /api/ssl - Stored certificate paths, `{ "SSL": null }` when unset.
#[instrument(skip(state))]
pub async fn get_ssl(State(state): State<AppState>) -> Result<Json<SslResponse>, ApiError> {
    let settings = state.storage.read_settings().await?;
    Ok(Json(SslResponse { ssl: settings.ssl }))
}

/// PUT /api/ssl - Store certificate paths.
///
/// Body: `{ "certFile": "cert.pem", "keyFile": "key.pem" }`. Relative paths
/// are resolved against the data directory by whatever starts the HTTPS
/// listener; this server only stores them.
#[instrument(skip(state))]
pub async fn put_ssl(
    State(state): State<AppState>,
    ApiJson(ssl): ApiJson<SslConfig>,
) -> Result<Json<SslResponse>, ApiError> {
    let settings = state
        .storage
        .update_settings(|s| s.ssl = Some(ssl))
        .await
        .map_err(|e| {
            warn!(error = %e, "Rejected SSL update");
            ApiError::from(e)
        })?;

    info!("SSL paths updated");
    Ok(Json(SslResponse { ssl: settings.ssl }))
}

/// GET /api/file-protected
#[instrument(skip(state))]
pub async fn get_file_protected(
    State(state): State<AppState>,
) -> Result<Json<FileProtection>, ApiError> {
    let settings = state.storage.read_settings().await?;
    Ok(Json(FileProtection {
        file_protected: settings.file_protected,
    }))
}

/// PUT /api/file-protected - Set by the client after a backup export, cleared
/// when a new entry makes the backup stale.
#[instrument(skip(state))]
pub async fn put_file_protected(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<FileProtection>,
) -> Result<Json<FileProtection>, ApiError> {
    state
        .storage
        .update_settings(|s| s.file_protected = body.file_protected)
        .await?;

    info!(file_protected = body.file_protected, "File protection updated");
    Ok(Json(body))
}

/// GET /api/entries - Current statistics.
///
/// # Query Parameters
///
/// - `count` (optional): number of predictions, 1 to 24 (default: 6)
///
/// # Response
///
/// ```json
/// {
///     "entries": ["2024-01-01", "2024-01-29"],
///     "averageCycleLength": 28,
///     "predictions": ["2024-02-26", "..."],
///     "forecast": [{ "start": "2024-02-26", "ovulationDate": "2024-03-11",
///                    "fertileWindow": { "start": "2024-03-07", "end": "2024-03-12" } }],
///     "last": "2024-01-29",
///     "daysSinceLast": 12,
///     "nextDate": "2024-02-26",
///     "daysUntilNext": 16
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_entries(
    State(state): State<AppState>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<PredictionResult>, ApiError> {
    if !(1..=MAX_PREDICTION_COUNT).contains(&query.count) {
        return Err(ApiError::BadRequest(format!(
            "count must be between 1 and {MAX_PREDICTION_COUNT}"
        )));
    }

    let settings = state.storage.read_settings().await?;
    let entries = state.storage.read_entries().await.map_err(|e| {
        warn!(error = %e, "Failed to read entries");
        ApiError::from(e)
    })?;

    let options = StatsOptions {
        default_cycle_length: settings.default_cycle_length,
        enable_ovulation: settings.enable_ovulation,
        prediction_count: query.count,
        today: CalendarDate::from(Utc::now().date_naive()),
    };
    let result = compute_stats_for_dates(entries, &options)?;

    info!(
        entry_count = result.entries.len(),
        average_cycle_length = result.average_cycle_length,
        days_until_next = ?result.days_until_next,
        "Stats computed"
    );
    Ok(Json(result))
}

/// POST /api/entries - Record a cycle start date.
///
/// Body: `{ "date": "YYYY-MM-DD" }`. Returns `201 Created` with the full
/// ascending entry list.
#[instrument(skip(state, request))]
pub async fn post_entry(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<EntryRequest>,
) -> Result<(StatusCode, Json<EntriesResponse>), ApiError> {
    let date = CalendarDate::parse(&request.date)?;
    let entries = state.storage.add_entry(date).await?;

    debug!(%date, "Entry added");
    info!(entry_count = entries.len(), "Entry recorded");
    Ok((StatusCode::CREATED, Json(EntriesResponse { entries })))
}

/// DELETE /api/entries/:date - Remove a recorded date.
#[instrument(skip(state, raw_date))]
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(raw_date): Path<String>,
) -> Result<Json<EntriesResponse>, ApiError> {
    let date = CalendarDate::parse(&raw_date)?;
    let entries = state.storage.remove_entry(date).await?;

    debug!(%date, "Entry removed");
    info!(entry_count = entries.len(), "Entry deleted");
    Ok(Json(EntriesResponse { entries }))
}

/// GET /api/inspiration/:id - One message from `inspiration.json`.
#[instrument(skip(state))]
pub async fn get_inspiration(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<InspirationResponse>, ApiError> {
    let id = match raw_id.parse::<u32>() {
        Ok(id) if id >= 1 => id,
        _ => return Err(ApiError::BadRequest("Invalid id".to_string())),
    };

    let record = state.storage.find_inspiration(id).await.map_err(|e| {
        warn!(error = %e, "Failed to load inspiration messages");
        ApiError::Internal("Could not load inspiration messages".to_string())
    })?;

    match record {
        Some(record) => Ok(Json(InspirationResponse {
            id: record.id,
            message: record.text,
        })),
        None => Err(ApiError::NotFound("Message not found".to_string())),
    }
}
