//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the catalog endpoints (students, classrooms,
//! enrollments), the response payloads shared by every handler, and the master
//! definition for the OpenAPI specification.

use crate::web::state::{local_now, AppState};
use attendance_core::domain::{
    AttendanceRecord, Classroom, ClassroomRegistration, EnrollOutcome, Student, TimeWindow,
    TIME_OF_DAY_FORMAT,
};
use attendance_core::engine::EngineError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        register_student_handler,
        list_students_handler,
        get_student_handler,
        register_classroom_handler,
        list_classrooms_handler,
        get_classroom_handler,
        active_classroom_handler,
        enroll_handler,
        check_enrollment_handler,
        crate::web::attendance::check_in_handler,
        crate::web::attendance::scan_handler,
        crate::web::attendance::active_roster_handler,
        crate::web::attendance::attendance_list_handler,
        crate::web::attendance::attendance_count_handler,
        crate::web::attendance::attendance_stats_handler,
        crate::web::attendance::headcount_handler,
        crate::web::admin::bulk_register_handler,
        crate::web::admin::list_rosters_handler,
        crate::web::admin::classroom_roster_handler,
    ),
    components(
        schemas(
            RegisterStudentRequest, StudentResponse,
            RegisterClassroomRequest, ClassroomResponse, ActiveClassroomResponse,
            EnrollRequest, EnrollResponse, EnrollmentCheckResponse,
            AttendanceRecordResponse,
            crate::web::attendance::CheckInRequest,
            crate::web::attendance::ScanRequest,
            crate::web::attendance::ScanResponse,
            crate::web::attendance::RosterEntryResponse,
            crate::web::attendance::ActiveRosterResponse,
            crate::web::attendance::CountResponse,
            crate::web::attendance::StatsResponse,
            crate::web::attendance::HeadcountRequest,
            crate::web::attendance::HeadcountResponse,
            crate::web::admin::BulkRegistrationRequest,
            crate::web::admin::RosterResponse,
        )
    ),
    tags(
        (name = "Attendance API", description = "Classroom time windows, enrollments and once-per-day check-ins.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Error Mapping
//=========================================================================================

/// Translates an engine failure into the status code and message the client sees.
/// Storage failures are logged here and reported without detail.
pub(crate) fn engine_error(context: &str, err: EngineError) -> (StatusCode, String) {
    match err {
        EngineError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
        EngineError::InvalidConfiguration(reason) => (StatusCode::BAD_REQUEST, reason),
        EngineError::Storage(e) => {
            error!("{}: {:?}", context, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            name: student.name,
            email: student.email,
            created_at: student.created_at,
        }
    }
}

/// A classroom with its window boundaries in `"HH:MM"` form.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ClassroomResponse {
    pub id: String,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub subject: Option<String>,
    pub department: Option<String>,
}

impl From<Classroom> for ClassroomResponse {
    fn from(classroom: Classroom) -> Self {
        Self {
            id: classroom.id,
            name: classroom.name,
            start_time: classroom.window.start().format(TIME_OF_DAY_FORMAT).to_string(),
            end_time: classroom.window.end().format(TIME_OF_DAY_FORMAT).to_string(),
            subject: classroom.subject,
            department: classroom.department,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecordResponse {
    pub id: Uuid,
    pub student_id: String,
    pub classroom_id: String,
    pub timestamp: NaiveDateTime,
    pub status: String,
    pub ai_headcount: Option<u32>,
    pub qr_scan_count: Option<u32>,
}

impl From<AttendanceRecord> for AttendanceRecordResponse {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            id: record.id,
            student_id: record.student_id,
            classroom_id: record.classroom_id,
            timestamp: record.timestamp,
            status: record.status.as_str().to_string(),
            ai_headcount: record.corroboration.ai_headcount,
            qr_scan_count: record.corroboration.qr_scan_count,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ActiveClassroomResponse {
    pub classroom: Option<ClassroomResponse>,
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct EnrollResponse {
    /// Either `enrolled` or `already_enrolled`.
    pub status: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct EnrollmentCheckResponse {
    pub enrolled: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterStudentRequest {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// Window boundaries default to 08:00 and 18:00 when omitted.
#[derive(Deserialize, ToSchema)]
pub struct RegisterClassroomRequest {
    pub id: String,
    pub name: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub subject: Option<String>,
    pub department: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub student_id: String,
    pub classroom_id: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EnrollmentQuery {
    pub student_id: String,
    pub classroom_id: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InstantQuery {
    /// Naive local date-time; defaults to now.
    pub at: Option<NaiveDateTime>,
}

const DEFAULT_WINDOW_START: &str = "08:00";
const DEFAULT_WINDOW_END: &str = "18:00";

fn require_non_empty(field: &str, value: &str) -> Result<(), (StatusCode, String)> {
    if value.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, format!("{} is required", field)));
    }
    Ok(())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Register a student, or update the name and email of an existing one.
#[utoipa::path(
    post,
    path = "/students",
    request_body = RegisterStudentRequest,
    responses(
        (status = 200, description = "Student stored", body = StudentResponse),
        (status = 400, description = "Missing id or name"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_student_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<RegisterStudentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_non_empty("id", &req.id)?;
    require_non_empty("name", &req.name)?;

    let student = app_state
        .engine
        .register_student(&req.id, &req.name, req.email.as_deref())
        .await
        .map_err(|e| engine_error("Failed to register student", e))?;
    Ok(Json(StudentResponse::from(student)))
}

/// List all students, sorted by name.
#[utoipa::path(
    get,
    path = "/students",
    responses(
        (status = 200, description = "All students", body = [StudentResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_students_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut students = app_state
        .engine
        .list_students()
        .await
        .map_err(|e| engine_error("Failed to list students", e))?;
    students.sort_by(|a, b| a.name.cmp(&b.name));

    let body: Vec<StudentResponse> = students.into_iter().map(StudentResponse::from).collect();
    Ok(Json(body))
}

/// Register a classroom, or update an existing one. The window must not cross midnight.
#[utoipa::path(
    post,
    path = "/classrooms",
    request_body = RegisterClassroomRequest,
    responses(
        (status = 200, description = "Classroom stored", body = ClassroomResponse),
        (status = 400, description = "Malformed or inverted time window"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_classroom_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<RegisterClassroomRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_non_empty("id", &req.id)?;
    require_non_empty("name", &req.name)?;

    let window = TimeWindow::parse(
        req.start_time.as_deref().unwrap_or(DEFAULT_WINDOW_START),
        req.end_time.as_deref().unwrap_or(DEFAULT_WINDOW_END),
    )
    .map_err(|e| engine_error("Invalid classroom window", e.into()))?;

    let registration = ClassroomRegistration {
        id: req.id,
        name: req.name,
        window,
        subject: req.subject,
        department: req.department,
    };
    let classroom = app_state
        .engine
        .register_classroom(&registration)
        .await
        .map_err(|e| engine_error("Failed to register classroom", e))?;
    Ok(Json(ClassroomResponse::from(classroom)))
}

/// List all classrooms, sorted by name.
#[utoipa::path(
    get,
    path = "/classrooms",
    responses(
        (status = 200, description = "All classrooms", body = [ClassroomResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_classrooms_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut classrooms = app_state
        .engine
        .list_classrooms()
        .await
        .map_err(|e| engine_error("Failed to list classrooms", e))?;
    classrooms.sort_by(|a, b| a.name.cmp(&b.name));

    let body: Vec<ClassroomResponse> = classrooms
        .into_iter()
        .map(ClassroomResponse::from)
        .collect();
    Ok(Json(body))
}

/// Fetch one student by id.
#[utoipa::path(
    get,
    path = "/students/{student_id}",
    params(("student_id" = String, Path, description = "The student identifier.")),
    responses(
        (status = 200, description = "The student", body = StudentResponse),
        (status = 404, description = "Unknown student"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_student_handler(
    State(app_state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let student = app_state
        .engine
        .get_student(&student_id)
        .await
        .map_err(|e| engine_error("Failed to load student", e))?;
    Ok(Json(StudentResponse::from(student)))
}

/// Fetch one classroom by id.
#[utoipa::path(
    get,
    path = "/classrooms/{classroom_id}",
    params(("classroom_id" = String, Path, description = "The classroom identifier.")),
    responses(
        (status = 200, description = "The classroom", body = ClassroomResponse),
        (status = 404, description = "Unknown classroom"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_classroom_handler(
    State(app_state): State<Arc<AppState>>,
    Path(classroom_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let classroom = app_state
        .engine
        .get_classroom(&classroom_id)
        .await
        .map_err(|e| engine_error("Failed to load classroom", e))?;
    Ok(Json(ClassroomResponse::from(classroom)))
}

/// Find the classroom whose window contains the given instant (default: now).
#[utoipa::path(
    get,
    path = "/classrooms/active",
    params(InstantQuery),
    responses(
        (status = 200, description = "The active classroom, or null", body = ActiveClassroomResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn active_classroom_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<InstantQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let instant = query.at.unwrap_or_else(local_now);
    let active = app_state
        .engine
        .find_active_classroom(instant)
        .await
        .map_err(|e| engine_error("Failed to resolve active classroom", e))?;

    let response = match active {
        Some(classroom) => ActiveClassroomResponse {
            classroom: Some(classroom.into()),
            message: None,
        },
        None => ActiveClassroomResponse {
            classroom: None,
            message: Some("No active class at this time".to_string()),
        },
    };
    Ok(Json(response))
}

/// Enroll a student in a classroom. Enrolling twice is not an error.
#[utoipa::path(
    post,
    path = "/enrollments",
    request_body = EnrollRequest,
    responses(
        (status = 200, description = "Student is enrolled", body = EnrollResponse),
        (status = 404, description = "Unknown student or classroom"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn enroll_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<EnrollRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .engine
        .enroll(&req.student_id, &req.classroom_id)
        .await
        .map_err(|e| engine_error("Failed to enroll student", e))?;

    let status = match outcome {
        EnrollOutcome::Enrolled => "enrolled",
        EnrollOutcome::AlreadyEnrolled => "already_enrolled",
    };
    Ok(Json(EnrollResponse {
        status: status.to_string(),
    }))
}

/// Check whether a student is enrolled in a classroom. Unknown ids answer `false`.
#[utoipa::path(
    get,
    path = "/enrollments/check",
    params(EnrollmentQuery),
    responses(
        (status = 200, description = "Enrollment status", body = EnrollmentCheckResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn check_enrollment_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<EnrollmentQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let enrolled = app_state
        .engine
        .is_enrolled(&query.student_id, &query.classroom_id)
        .await
        .map_err(|e| engine_error("Failed to check enrollment", e))?;
    Ok(Json(EnrollmentCheckResponse { enrolled }))
}
