use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::models::{Interval, SeriesInfo};
use crate::services::report_service::{
    BucketTable, ExtremaReport, PointsReport, ReportPeriod, ReportQuery,
};
use crate::services::ReportService;
use crate::source::SourceError;
use crate::store::MemorySeriesStore;

#[derive(Clone)]
pub struct AppState {
    pub report_service: ReportService<MemorySeriesStore>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/series", get(list_series))
        .route("/series/{series_id}/range", get(get_range))
        .route("/series/{series_id}/period", get(get_period))
        .route("/series/{series_id}/table", get(get_table))
        .route("/series/{series_id}/extrema", get(get_extrema))
        .route("/series/{series_id}/points", get(get_points))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

/// Unknown series are a client problem, anything else is ours.
fn status_for(series_id: &str, e: SourceError) -> StatusCode {
    match e {
        SourceError::NotFound(_) => {
            warn!("Series {} not found", series_id);
            StatusCode::NOT_FOUND
        }
        SourceError::Query(_) => {
            error!("Report query failed for series {}: {}", series_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[instrument(skip(state))]
async fn list_series(State(state): State<AppState>) -> Result<Json<Vec<SeriesInfo>>, StatusCode> {
    let series = state.report_service.list_series().map_err(|e| {
        error!("Failed to list series: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!("Listed {} series", series.len());
    Ok(Json(series))
}

#[instrument(skip(state), fields(series_id = %series_id))]
async fn get_range(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> Result<Json<Interval>, StatusCode> {
    debug!("Discovering data range for series {}", series_id);
    let range = state
        .report_service
        .start_run()
        .series_range(&series_id)
        .map_err(|e| status_for(&series_id, e))?;

    info!("Series {} spans {}", series_id, range);
    Ok(Json(range))
}

#[instrument(skip(state), fields(series_id = %series_id))]
async fn get_period(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportPeriod>, StatusCode> {
    let period = state
        .report_service
        .start_run()
        .report_period(&series_id, &query.selected(), query.unit())
        .map_err(|e| status_for(&series_id, e))?;

    info!("Report period for series {} is {}", series_id, period.period);
    Ok(Json(period))
}

#[instrument(skip(state), fields(series_id = %series_id))]
async fn get_table(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<BucketTable>, StatusCode> {
    let table = state
        .report_service
        .start_run()
        .bucket_table(&series_id, &query.selected(), query.unit())
        .map_err(|e| status_for(&series_id, e))?;

    info!("Returning {} bucket rows for series {}", table.rows.len(), series_id);
    Ok(Json(table))
}

#[instrument(skip(state), fields(series_id = %series_id))]
async fn get_extrema(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ExtremaReport>, StatusCode> {
    let report = state
        .report_service
        .start_run()
        .extrema(&series_id, &query.selected(), query.unit(), query.mode())
        .map_err(|e| status_for(&series_id, e))?;

    info!(
        "Returning {:?} extrema for {} buckets of series {}",
        report.mode,
        report.rows.len(),
        series_id
    );
    Ok(Json(report))
}

#[instrument(skip(state), fields(series_id = %series_id))]
async fn get_points(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<PointsReport>, StatusCode> {
    let report = state
        .report_service
        .start_run()
        .graded_points(&series_id, &query.selected(), query.unit())
        .map_err(|e| status_for(&series_id, e))?;

    info!("Returning {} graded points for series {}", report.rows.len(), series_id);
    Ok(Json(report))
}
