//! services/api/src/web/attendance.rs
//!
//! Check-in, QR scan and daily reporting endpoints.

use crate::web::rest::{engine_error, AttendanceRecordResponse, InstantQuery};
use crate::web::state::{local_now, local_today, AppState};
use attendance_core::domain::{CheckInOutcome, Corroboration};
use attendance_core::engine::EngineError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    pub student_id: String,
    pub classroom_id: String,
    /// Naive local date-time; defaults to now.
    pub at: Option<NaiveDateTime>,
    pub ai_headcount: Option<u32>,
    pub qr_scan_count: Option<u32>,
}

/// The payload of a student's QR code is just their id.
#[derive(Deserialize, ToSchema)]
pub struct ScanRequest {
    pub student_id: String,
    pub at: Option<NaiveDateTime>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ScanResponse {
    /// Either `accepted` or `rejected`.
    pub status: String,
    pub message: String,
    pub classroom_id: Option<String>,
    pub classroom_name: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub classroom_id: String,
    pub day: NaiveDate,
    pub count: usize,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    pub classroom_id: String,
    pub day: NaiveDate,
    pub scanned_count: usize,
    pub total_enrolled: usize,
    pub missing: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct HeadcountRequest {
    /// People counted in a classroom photo by an external detector.
    pub detected_count: u32,
    pub day: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HeadcountResponse {
    pub classroom_id: String,
    pub day: NaiveDate,
    pub detected_count: u32,
    pub scanned_count: usize,
    pub difference: i64,
    /// Either `match` or `mismatch`.
    pub status: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DayQuery {
    /// Calendar day (`YYYY-MM-DD`); defaults to today.
    pub day: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceListQuery {
    /// Calendar day (`YYYY-MM-DD`); defaults to today.
    pub day: Option<NaiveDate>,
    /// Keep only the most recent `limit` records.
    pub limit: Option<usize>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RosterEntryResponse {
    pub id: String,
    pub name: String,
    pub has_attended: bool,
}

/// `classroom_id` is null and `students` empty when no class is running.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ActiveRosterResponse {
    pub classroom_id: Option<String>,
    pub students: Vec<RosterEntryResponse>,
}

fn rejected(status: StatusCode, message: &str) -> (StatusCode, Json<ScanResponse>) {
    (
        status,
        Json(ScanResponse {
            status: "rejected".to_string(),
            message: message.to_string(),
            classroom_id: None,
            classroom_name: None,
        }),
    )
}

fn scan_failure(err: EngineError) -> (StatusCode, Json<ScanResponse>) {
    let (status, message) = engine_error("Failed to process scan", err);
    rejected(status, &message)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Record a check-in for a student in a classroom.
///
/// Enrollment is not verified here; use `/attendance/scan` for the gated flow.
#[utoipa::path(
    post,
    path = "/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Attendance recorded", body = AttendanceRecordResponse),
        (status = 404, description = "Unknown student or classroom"),
        (status = 409, description = "Attendance already marked for that day"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn check_in_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CheckInRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let at = req.at.unwrap_or_else(local_now);
    let corroboration = Corroboration {
        ai_headcount: req.ai_headcount,
        qr_scan_count: req.qr_scan_count,
    };

    let outcome = app_state
        .engine
        .check_in(&req.student_id, &req.classroom_id, at, corroboration)
        .await
        .map_err(|e| engine_error("Failed to check in", e))?;

    match outcome {
        CheckInOutcome::Created(record) => Ok((
            StatusCode::CREATED,
            Json(AttendanceRecordResponse::from(record)),
        )),
        CheckInOutcome::AlreadyMarked => Err((
            StatusCode::CONFLICT,
            "Attendance already marked for today".to_string(),
        )),
    }
}

/// Process a scanned student QR code.
///
/// Resolves the active classroom from the time, checks enrollment, then records
/// attendance once for the day.
#[utoipa::path(
    post,
    path = "/attendance/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Attendance accepted", body = ScanResponse),
        (status = 403, description = "Student is not enrolled in the active classroom", body = ScanResponse),
        (status = 404, description = "Unknown student or no active class", body = ScanResponse),
        (status = 409, description = "Attendance already marked for today", body = ScanResponse),
        (status = 500, description = "Internal server error", body = ScanResponse)
    )
)]
pub async fn scan_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ScanResponse>)> {
    let engine = &app_state.engine;
    let student_id = req.student_id.trim();
    if student_id.is_empty() {
        return Err(rejected(StatusCode::BAD_REQUEST, "Missing student_id"));
    }

    match engine.get_student(student_id).await {
        Ok(_) => {}
        Err(EngineError::NotFound(_)) => {
            return Err(rejected(StatusCode::NOT_FOUND, "Student not found"));
        }
        Err(e) => return Err(scan_failure(e)),
    }

    let at = req.at.unwrap_or_else(local_now);
    let classroom = engine
        .find_active_classroom(at)
        .await
        .map_err(scan_failure)?
        .ok_or_else(|| rejected(StatusCode::NOT_FOUND, "No active class found at this time"))?;

    let enrolled = engine
        .is_enrolled(student_id, &classroom.id)
        .await
        .map_err(scan_failure)?;
    if !enrolled {
        info!(student_id, classroom_id = %classroom.id, "scan rejected: not enrolled");
        return Err(rejected(
            StatusCode::FORBIDDEN,
            "Student is not enrolled in the active classroom",
        ));
    }

    let outcome = engine
        .check_in(student_id, &classroom.id, at, Corroboration::default())
        .await
        .map_err(scan_failure)?;
    if outcome == CheckInOutcome::AlreadyMarked {
        return Err(rejected(
            StatusCode::CONFLICT,
            "Attendance already marked for today",
        ));
    }

    info!(student_id, classroom_id = %classroom.id, "scan accepted");
    Ok(Json(ScanResponse {
        status: "accepted".to_string(),
        message: format!("Attendance marked successfully for {}", classroom.name),
        classroom_id: Some(classroom.id),
        classroom_name: Some(classroom.name),
    }))
}

/// The roster of the classroom running at `at` (default: now), with who has
/// checked in on that day.
#[utoipa::path(
    get,
    path = "/classrooms/active/roster",
    params(InstantQuery),
    responses(
        (status = 200, description = "Roster of the active classroom", body = ActiveRosterResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn active_roster_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<InstantQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let at = query.at.unwrap_or_else(local_now);
    let engine = &app_state.engine;
    let Some(classroom) = engine
        .find_active_classroom(at)
        .await
        .map_err(|e| engine_error("Failed to resolve active classroom", e))?
    else {
        return Ok(Json(ActiveRosterResponse {
            classroom_id: None,
            students: Vec::new(),
        }));
    };

    let entries = engine
        .roster_attendance(&classroom.id, at.date())
        .await
        .map_err(|e| engine_error("Failed to load roster attendance", e))?;
    let students = entries
        .into_iter()
        .map(|entry| RosterEntryResponse {
            id: entry.student.id,
            name: entry.student.name,
            has_attended: entry.has_attended,
        })
        .collect();
    Ok(Json(ActiveRosterResponse {
        classroom_id: Some(classroom.id),
        students,
    }))
}

/// List a classroom's attendance for a day, most recent first.
#[utoipa::path(
    get,
    path = "/classrooms/{classroom_id}/attendance",
    params(
        ("classroom_id" = String, Path, description = "The classroom identifier."),
        AttendanceListQuery
    ),
    responses(
        (status = 200, description = "Attendance records", body = [AttendanceRecordResponse]),
        (status = 404, description = "Unknown classroom"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn attendance_list_handler(
    State(app_state): State<Arc<AppState>>,
    Path(classroom_id): Path<String>,
    Query(query): Query<AttendanceListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let day = query.day.unwrap_or_else(local_today);
    let engine = &app_state.engine;
    engine
        .get_classroom(&classroom_id)
        .await
        .map_err(|e| engine_error("Failed to list attendance", e))?;

    let mut records = engine
        .attendance_list(&classroom_id, day)
        .await
        .map_err(|e| engine_error("Failed to list attendance", e))?;
    if let Some(limit) = query.limit {
        records.truncate(limit);
    }
    let body: Vec<AttendanceRecordResponse> = records
        .into_iter()
        .map(AttendanceRecordResponse::from)
        .collect();
    Ok(Json(body))
}

/// Count the distinct students checked into a classroom on a day.
#[utoipa::path(
    get,
    path = "/classrooms/{classroom_id}/attendance/count",
    params(
        ("classroom_id" = String, Path, description = "The classroom identifier."),
        DayQuery
    ),
    responses(
        (status = 200, description = "Distinct attendees", body = CountResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn attendance_count_handler(
    State(app_state): State<Arc<AppState>>,
    Path(classroom_id): Path<String>,
    Query(query): Query<DayQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let day = query.day.unwrap_or_else(local_today);
    let count = app_state
        .engine
        .attendance_count(&classroom_id, day)
        .await
        .map_err(|e| engine_error("Failed to count attendance", e))?;
    Ok(Json(CountResponse {
        classroom_id,
        day,
        count,
    }))
}

/// Scanned versus enrolled numbers for a classroom on a day.
#[utoipa::path(
    get,
    path = "/classrooms/{classroom_id}/stats",
    params(
        ("classroom_id" = String, Path, description = "The classroom identifier."),
        DayQuery
    ),
    responses(
        (status = 200, description = "Attendance statistics", body = StatsResponse),
        (status = 404, description = "Unknown classroom"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn attendance_stats_handler(
    State(app_state): State<Arc<AppState>>,
    Path(classroom_id): Path<String>,
    Query(query): Query<DayQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let day = query.day.unwrap_or_else(local_today);
    let stats = app_state
        .engine
        .attendance_stats(&classroom_id, day)
        .await
        .map_err(|e| engine_error("Failed to compute attendance stats", e))?;
    Ok(Json(StatsResponse {
        classroom_id: stats.classroom_id,
        day: stats.day,
        scanned_count: stats.scanned_count,
        total_enrolled: stats.total_enrolled,
        missing: stats.missing,
    }))
}

/// Compare an externally detected headcount with the scanned attendance.
#[utoipa::path(
    post,
    path = "/classrooms/{classroom_id}/headcount",
    params(("classroom_id" = String, Path, description = "The classroom identifier.")),
    request_body = HeadcountRequest,
    responses(
        (status = 200, description = "Headcount comparison", body = HeadcountResponse),
        (status = 404, description = "Unknown classroom"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn headcount_handler(
    State(app_state): State<Arc<AppState>>,
    Path(classroom_id): Path<String>,
    Json(req): Json<HeadcountRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let day = req.day.unwrap_or_else(local_today);
    let comparison = app_state
        .engine
        .compare_headcount(&classroom_id, day, req.detected_count)
        .await
        .map_err(|e| engine_error("Failed to compare headcount", e))?;
    Ok(Json(HeadcountResponse {
        classroom_id: comparison.classroom_id,
        day: comparison.day,
        detected_count: comparison.detected_count,
        scanned_count: comparison.scanned_count,
        difference: comparison.difference,
        status: comparison.status.as_str().to_string(),
    }))
}
