//! crates/attendance_core/src/ports.rs
//!
//! Defines the storage contract for the attendance engine.
//! The engine only ever talks to a `dyn AttendanceStore`, which keeps it
//! independent of whether records live in SQLite, in memory, or elsewhere.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{AttendanceRecord, BulkRegistration, Classroom, ClassroomRegistration, Student};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the underlying store.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Port
//=========================================================================================

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    // --- Students ---
    /// Inserts or updates a student. A `None` email keeps the stored one.
    async fn upsert_student(
        &self,
        id: &str,
        name: &str,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> PortResult<Student>;

    async fn get_student(&self, id: &str) -> PortResult<Option<Student>>;

    async fn list_students(&self) -> PortResult<Vec<Student>>;

    // --- Classrooms ---
    /// Inserts or updates a classroom. `None` subject/department keep the stored values.
    async fn upsert_classroom(
        &self,
        registration: &ClassroomRegistration,
        now: DateTime<Utc>,
    ) -> PortResult<Classroom>;

    async fn get_classroom(&self, id: &str) -> PortResult<Option<Classroom>>;

    /// Every classroom in stable insertion order. Updates keep a classroom's position.
    async fn list_classrooms(&self) -> PortResult<Vec<Classroom>>;

    /// Upserts the classroom, creates every unknown student under
    /// `BulkRegistration::placeholder_name` and enrolls them all, as one unit.
    /// Either the whole roster is written or nothing is.
    async fn register_roster(
        &self,
        bulk: &BulkRegistration,
        now: DateTime<Utc>,
    ) -> PortResult<Classroom>;

    // --- Enrollments ---
    /// Returns `true` when a new edge was created, `false` when it already existed.
    async fn add_enrollment(
        &self,
        student_id: &str,
        classroom_id: &str,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<bool>;

    async fn is_enrolled(&self, student_id: &str, classroom_id: &str) -> PortResult<bool>;

    /// Enrolled student ids in enrollment order.
    async fn enrolled_student_ids(&self, classroom_id: &str) -> PortResult<Vec<String>>;

    // --- Attendance ---
    /// Atomically inserts `record` unless one already exists for the same
    /// student, classroom and calendar day. Returns `false` without writing
    /// anything in that case.
    async fn insert_attendance_once(&self, record: &AttendanceRecord) -> PortResult<bool>;

    /// Records for one classroom and day, most recent first.
    async fn attendance_for_day(
        &self,
        classroom_id: &str,
        day: NaiveDate,
    ) -> PortResult<Vec<AttendanceRecord>>;

    /// Number of distinct students with a record for the classroom on `day`.
    async fn distinct_attendees(&self, classroom_id: &str, day: NaiveDate) -> PortResult<usize>;
}
