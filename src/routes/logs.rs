//! Admin audit log API: query, statistics, export, retention.

use crate::Server;
use crate::database::entities::deletion_logs;
use crate::database::{LogQueryParams, LogStatistics, StatsPeriod};
use crate::error::AppError;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogsResponse {
    pub logs: Vec<deletion_logs::Model>,
    /// Total number of matching records
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// List deletion log entries with optional filtering
#[utoipa::path(
    get,
    path = "/api/admin/logs",
    params(LogQueryParams),
    responses(
        (status = 200, description = "Log entries", body = LogsResponse),
        (status = 400, description = "Invalid query parameters", body = crate::routes::ApiErrorResponse),
        (status = 401, description = "Missing or invalid admin key", body = crate::routes::ApiErrorResponse),
    ),
    security(("admin_key" = [])),
    tag = "admin-logs"
)]
pub async fn list_logs(
    State(server): State<Server>,
    Query(mut params): Query<LogQueryParams>,
) -> Result<Json<LogsResponse>, AppError> {
    params.limit = params.limit.or(Some(50)).map(|x| x.clamp(1, 1000));
    params.offset = params.offset.or(Some(0));

    if let (Some(start), Some(end)) = (params.start_date, params.end_date) {
        if start > end {
            return Err(AppError::BadRequest(
                "start_date must be before end_date".to_string(),
            ));
        }
    }

    let dao = server.database.deletion_logs();
    let total = dao.count_all(&params).await?;
    let logs = dao.find_all(&params).await?;

    Ok(Json(LogsResponse {
        logs,
        total,
        offset: params.offset.unwrap_or(0),
        limit: params.limit.unwrap_or(50),
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatisticsQuery {
    /// Aggregation window, defaults to today
    pub period: Option<StatsPeriod>,
}

/// Aggregated deletion statistics
#[utoipa::path(
    get,
    path = "/api/admin/logs/statistics",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Aggregates for the requested window", body = LogStatistics),
        (status = 401, description = "Missing or invalid admin key", body = crate::routes::ApiErrorResponse),
    ),
    security(("admin_key" = [])),
    tag = "admin-logs"
)]
pub async fn statistics(
    State(server): State<Server>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<LogStatistics>, AppError> {
    let period = query.period.unwrap_or(StatsPeriod::Today);
    let stats = server.database.deletion_logs().statistics(period).await?;
    Ok(Json(stats))
}

/// Export matching log entries as CSV
#[utoipa::path(
    get,
    path = "/api/admin/logs/export",
    params(LogQueryParams),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv"),
        (status = 401, description = "Missing or invalid admin key", body = crate::routes::ApiErrorResponse),
    ),
    security(("admin_key" = [])),
    tag = "admin-logs"
)]
pub async fn export_logs(
    State(server): State<Server>,
    Query(params): Query<LogQueryParams>,
) -> Result<Response, AppError> {
    let csv_text = server.database.deletion_logs().export_csv(&params).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"deletion-logs.csv\"",
            ),
        ],
        csv_text,
    )
        .into_response())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CleanupRequest {
    /// Delete entries older than this many days
    pub days: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// Delete log entries past the retention window
#[utoipa::path(
    post,
    path = "/api/admin/logs/cleanup",
    request_body = CleanupRequest,
    responses(
        (status = 200, description = "Number of deleted entries", body = DeletedResponse),
        (status = 400, description = "Invalid retention window", body = crate::routes::ApiErrorResponse),
        (status = 401, description = "Missing or invalid admin key", body = crate::routes::ApiErrorResponse),
    ),
    security(("admin_key" = [])),
    tag = "admin-logs"
)]
pub async fn cleanup_logs(
    State(server): State<Server>,
    Json(body): Json<CleanupRequest>,
) -> Result<Json<DeletedResponse>, AppError> {
    if body.days == 0 {
        return Err(AppError::BadRequest(
            "days must be greater than zero".to_string(),
        ));
    }
    let deleted = server
        .database
        .deletion_logs()
        .cleanup_older_than(body.days)
        .await?;
    Ok(Json(DeletedResponse { deleted }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteLogsRequest {
    pub ids: Vec<i64>,
}

/// Delete specific log entries by id
#[utoipa::path(
    delete,
    path = "/api/admin/logs",
    request_body = DeleteLogsRequest,
    responses(
        (status = 200, description = "Number of deleted entries", body = DeletedResponse),
        (status = 401, description = "Missing or invalid admin key", body = crate::routes::ApiErrorResponse),
    ),
    security(("admin_key" = [])),
    tag = "admin-logs"
)]
pub async fn delete_logs(
    State(server): State<Server>,
    Json(body): Json<DeleteLogsRequest>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = server
        .database
        .deletion_logs()
        .delete_by_ids(&body.ids)
        .await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// Delete a single log entry
#[utoipa::path(
    delete,
    path = "/api/admin/logs/{id}",
    params(("id" = i64, Path, description = "Log entry id")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "No such entry", body = crate::routes::ApiErrorResponse),
        (status = 401, description = "Missing or invalid admin key", body = crate::routes::ApiErrorResponse),
    ),
    security(("admin_key" = [])),
    tag = "admin-logs"
)]
pub async fn delete_log(
    State(server): State<Server>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if server.database.deletion_logs().delete_by_id(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("log entry {id}")))
    }
}

/// Create admin log API routes
pub fn create_admin_logs_routes() -> Router<Server> {
    Router::new()
        .route("/admin/logs", get(list_logs).delete(delete_logs))
        .route("/admin/logs/statistics", get(statistics))
        .route("/admin/logs/export", get(export_logs))
        .route("/admin/logs/cleanup", post(cleanup_logs))
        .route("/admin/logs/{id}", delete(delete_log))
}
