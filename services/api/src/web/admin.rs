//! services/api/src/web/admin.rs
//!
//! Administrative endpoints: register a class with its full roster in one call,
//! and read rosters back.

use crate::web::rest::engine_error;
use crate::web::state::AppState;
use attendance_core::domain::{
    BulkRegistration, ClassroomRegistration, ClassroomRoster, TimeWindow, TIME_OF_DAY_FORMAT,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Every field is required and `student_ids` must not be empty.
#[derive(Deserialize, ToSchema)]
pub struct BulkRegistrationRequest {
    pub classroom_id: String,
    pub subject: String,
    pub department: String,
    /// Display name of the classroom.
    pub classroom: String,
    pub start_time: String,
    pub end_time: String,
    pub student_ids: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RosterResponse {
    pub classroom_id: String,
    pub classroom: String,
    pub subject: Option<String>,
    pub department: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub student_ids: Vec<String>,
}

impl From<ClassroomRoster> for RosterResponse {
    fn from(roster: ClassroomRoster) -> Self {
        let classroom = roster.classroom;
        Self {
            classroom_id: classroom.id,
            classroom: classroom.name,
            subject: classroom.subject,
            department: classroom.department,
            start_time: classroom.window.start().format(TIME_OF_DAY_FORMAT).to_string(),
            end_time: classroom.window.end().format(TIME_OF_DAY_FORMAT).to_string(),
            student_ids: roster.student_ids,
        }
    }
}

impl BulkRegistrationRequest {
    fn into_registration(self) -> Result<BulkRegistration, (StatusCode, String)> {
        let required = [
            &self.classroom_id,
            &self.subject,
            &self.department,
            &self.classroom,
            &self.start_time,
            &self.end_time,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err((StatusCode::BAD_REQUEST, "Missing required fields".to_string()));
        }

        let student_ids: Vec<String> = self
            .student_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if student_ids.is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                "Student IDs must be a non-empty list".to_string(),
            ));
        }

        let window = TimeWindow::parse(&self.start_time, &self.end_time)
            .map_err(|e| engine_error("Invalid classroom window", e.into()))?;

        Ok(BulkRegistration {
            classroom: ClassroomRegistration {
                id: self.classroom_id,
                name: self.classroom,
                window,
                subject: Some(self.subject),
                department: Some(self.department),
            },
            student_ids,
        })
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Register a classroom and enroll its students, creating unknown students as placeholders.
#[utoipa::path(
    post,
    path = "/admin/classrooms",
    request_body = BulkRegistrationRequest,
    responses(
        (status = 201, description = "Classroom and roster stored", body = RosterResponse),
        (status = 400, description = "Missing fields or invalid window"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn bulk_register_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<BulkRegistrationRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let registration = req.into_registration()?;
    let roster = app_state
        .engine
        .bulk_register(&registration)
        .await
        .map_err(|e| engine_error("Failed to register classroom roster", e))?;
    Ok((StatusCode::CREATED, Json(RosterResponse::from(roster))))
}

/// Every classroom with its enrolled student ids, in catalog order.
#[utoipa::path(
    get,
    path = "/admin/classrooms",
    responses(
        (status = 200, description = "All rosters", body = [RosterResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_rosters_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rosters = app_state
        .engine
        .all_rosters()
        .await
        .map_err(|e| engine_error("Failed to list rosters", e))?;
    let body: Vec<RosterResponse> = rosters.into_iter().map(RosterResponse::from).collect();
    Ok(Json(body))
}

/// One classroom with its enrolled student ids.
#[utoipa::path(
    get,
    path = "/admin/classrooms/{classroom_id}",
    params(("classroom_id" = String, Path, description = "The classroom identifier.")),
    responses(
        (status = 200, description = "Classroom roster", body = RosterResponse),
        (status = 404, description = "Unknown classroom"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn classroom_roster_handler(
    State(app_state): State<Arc<AppState>>,
    Path(classroom_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let roster = app_state
        .engine
        .classroom_roster(&classroom_id)
        .await
        .map_err(|e| engine_error("Failed to load roster", e))?;
    Ok(Json(RosterResponse::from(roster)))
}
