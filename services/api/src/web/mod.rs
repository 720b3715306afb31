pub mod admin;
pub mod attendance;
pub mod rest;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::web::state::AppState;

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server router.
pub use admin::{bulk_register_handler, classroom_roster_handler, list_rosters_handler};
pub use attendance::{
    active_roster_handler, attendance_count_handler, attendance_list_handler,
    attendance_stats_handler, check_in_handler, headcount_handler, scan_handler,
};
pub use rest::{
    active_classroom_handler, check_enrollment_handler, enroll_handler, get_classroom_handler,
    get_student_handler, list_classrooms_handler, list_students_handler,
    register_classroom_handler, register_student_handler,
};

/// Builds every attendance route on top of the shared state.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Catalog
        .route("/students", post(register_student_handler).get(list_students_handler))
        .route("/students/{student_id}", get(get_student_handler))
        .route("/classrooms", post(register_classroom_handler).get(list_classrooms_handler))
        .route("/classrooms/active", get(active_classroom_handler))
        .route("/classrooms/active/roster", get(active_roster_handler))
        .route("/classrooms/{classroom_id}", get(get_classroom_handler))
        .route("/enrollments", post(enroll_handler))
        .route("/enrollments/check", get(check_enrollment_handler))
        // Attendance
        .route("/attendance/check-in", post(check_in_handler))
        .route("/attendance/scan", post(scan_handler))
        .route("/classrooms/{classroom_id}/attendance", get(attendance_list_handler))
        .route("/classrooms/{classroom_id}/attendance/count", get(attendance_count_handler))
        .route("/classrooms/{classroom_id}/stats", get(attendance_stats_handler))
        .route("/classrooms/{classroom_id}/headcount", post(headcount_handler))
        // Administration
        .route("/admin/classrooms", post(bulk_register_handler).get(list_rosters_handler))
        .route("/admin/classrooms/{classroom_id}", get(classroom_roster_handler))
        .with_state(app_state)
}
