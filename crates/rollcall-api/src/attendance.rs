//! Attendance sync and history handlers

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use rollcall_core::db::{HistoryFilter, HistoryRow, SqliteAttendanceLedger};
use rollcall_core::models::AttendanceEntry;
use rollcall_core::sync::{RawAttendanceRecord, SyncReconciler, SyncReport};

use crate::auth::AuthenticatedFaculty;
use crate::error::AppError;
use crate::rate_limit::ProtectedEndpoint;
use crate::routes::{faculty_fingerprint, AppState};

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    records: Option<Vec<RawAttendanceRecord>>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    success: bool,
    result: SyncReport,
    data: Vec<AttendanceEntry>,
}

/// POST /v1/attendance/sync
///
/// Always answers 200 once the batch shape is acceptable; per-record failures
/// are reported in the payload so the client can resubmit only the failed
/// subset. Only a malformed batch (missing, empty, or oversized `records`)
/// is a transport-level rejection.
pub async fn attendance_sync(
    State(state): State<AppState>,
    Extension(faculty): Extension<AuthenticatedFaculty>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::AttendanceSync, &faculty.faculty_id)
        .await?;

    let records = check_batch_shape(request.records.as_deref(), state.config.max_sync_batch)?;

    // No usable connection at all is the one store failure that escalates to
    // the transport level
    let conn = state
        .db
        .connect()
        .map_err(|error| AppError::internal(format!("store unavailable: {error}")))?;

    let reconciler = SyncReconciler::new(&conn)
        .with_retention_days(state.config.attendance_retention_days)
        .with_commit_timeout(state.config.record_commit_timeout);
    let outcome = reconciler.sync_batch(records).await;

    tracing::info!(
        endpoint = "attendance_sync",
        faculty = faculty_fingerprint(&faculty.faculty_id),
        total = outcome.report.total_records,
        synced = outcome.report.synced_records,
        failed = outcome.report.failed_records,
        "Processed attendance sync batch"
    );

    Ok(Json(SyncResponse {
        success: true,
        result: outcome.report,
        data: outcome.entries,
    }))
}

/// Reject malformed batches before any per-record work
fn check_batch_shape(
    records: Option<&[RawAttendanceRecord]>,
    max_batch: usize,
) -> Result<&[RawAttendanceRecord], AppError> {
    let records =
        records.ok_or_else(|| AppError::bad_request("records must be a non-empty array"))?;
    if records.is_empty() {
        return Err(AppError::bad_request("records must be a non-empty array"));
    }
    if records.len() > max_batch {
        return Err(AppError::bad_request(format!(
            "records exceeds the batch limit of {max_batch}"
        )));
    }
    Ok(records)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    student_id: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    entries: Vec<HistoryRow>,
}

const HISTORY_DEFAULT_LIMIT: usize = 50;
const HISTORY_MAX_LIMIT: usize = 200;

/// GET /v1/attendance/history
pub async fn attendance_history(
    State(state): State<AppState>,
    Extension(_faculty): Extension<AuthenticatedFaculty>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let student_id = query
        .student_id
        .parse()
        .map_err(|_| AppError::bad_request("studentId is not a valid UUID"))?;
    let from = parse_date_param(query.from.as_deref(), "from")?;
    let to = parse_date_param(query.to.as_deref(), "to")?;

    let conn = state
        .db
        .connect()
        .map_err(|error| AppError::internal(format!("store unavailable: {error}")))?;
    let ledger = SqliteAttendanceLedger::new(&conn);

    let entries = ledger
        .history(&HistoryFilter {
            student_id,
            from,
            to,
            limit: query
                .limit
                .unwrap_or(HISTORY_DEFAULT_LIMIT)
                .min(HISTORY_MAX_LIMIT),
            offset: query.offset.unwrap_or(0),
        })
        .await?;

    Ok(Json(HistoryResponse { entries }))
}

fn parse_date_param(
    value: Option<&str>,
    name: &str,
) -> Result<Option<chrono::NaiveDate>, AppError> {
    value
        .map(|raw| {
            raw.parse().map_err(|_| {
                AppError::bad_request(format!("{name} must be a calendar date (YYYY-MM-DD)"))
            })
        })
        .transpose()
}
