//! crates/attendance_core/src/engine.rs
//!
//! The attendance window engine: active-classroom resolution, enrollment
//! lookups and the once-per-day check-in rule, all on top of an injected
//! `AttendanceStore`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    AttendanceRecord, AttendanceStats, AttendanceStatus, BulkRegistration, CheckInOutcome,
    Classroom, ClassroomRegistration, ClassroomRoster, Corroboration, EnrollOutcome,
    HeadcountComparison, RosterAttendance, Student, WindowError,
};
use crate::ports::{AttendanceStore, PortError};

//=========================================================================================
// Engine Error and Result Types
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl From<PortError> for EngineError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => EngineError::NotFound(what),
            other => EngineError::Storage(other),
        }
    }
}

impl From<WindowError> for EngineError {
    fn from(err: WindowError) -> Self {
        EngineError::InvalidConfiguration(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

//=========================================================================================
// The Engine
//=========================================================================================

/// Holds nothing but its store handle, so it is cheap to share behind an `Arc`.
#[derive(Clone)]
pub struct AttendanceEngine {
    store: Arc<dyn AttendanceStore>,
}

impl AttendanceEngine {
    pub fn new(store: Arc<dyn AttendanceStore>) -> Self {
        Self { store }
    }

    // --- Catalog administration ---

    pub async fn register_student(
        &self,
        id: &str,
        name: &str,
        email: Option<&str>,
    ) -> EngineResult<Student> {
        let student = self.store.upsert_student(id, name, email, Utc::now()).await?;
        debug!(student_id = %student.id, "student registered");
        Ok(student)
    }

    pub async fn register_classroom(
        &self,
        registration: &ClassroomRegistration,
    ) -> EngineResult<Classroom> {
        let classroom = self.store.upsert_classroom(registration, Utc::now()).await?;
        debug!(classroom_id = %classroom.id, window = %classroom.window, "classroom registered");
        Ok(classroom)
    }

    pub async fn get_student(&self, student_id: &str) -> EngineResult<Student> {
        self.store
            .get_student(student_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Student {}", student_id)))
    }

    pub async fn get_classroom(&self, classroom_id: &str) -> EngineResult<Classroom> {
        self.store
            .get_classroom(classroom_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Classroom {}", classroom_id)))
    }

    pub async fn list_students(&self) -> EngineResult<Vec<Student>> {
        Ok(self.store.list_students().await?)
    }

    pub async fn list_classrooms(&self) -> EngineResult<Vec<Classroom>> {
        Ok(self.store.list_classrooms().await?)
    }

    /// Enrolling twice is a success both times; only the first call creates the edge.
    pub async fn enroll(&self, student_id: &str, classroom_id: &str) -> EngineResult<EnrollOutcome> {
        self.get_student(student_id).await?;
        self.get_classroom(classroom_id).await?;

        let created = self
            .store
            .add_enrollment(student_id, classroom_id, Utc::now())
            .await?;
        if created {
            debug!(student_id, classroom_id, "student enrolled");
            Ok(EnrollOutcome::Enrolled)
        } else {
            Ok(EnrollOutcome::AlreadyEnrolled)
        }
    }

    /// Upserts the classroom, creates placeholder students for unknown ids and
    /// enrolls every listed student. The store writes the batch as one unit, so a
    /// failure leaves neither the classroom change nor a partial roster behind.
    pub async fn bulk_register(&self, bulk: &BulkRegistration) -> EngineResult<ClassroomRoster> {
        let classroom = self.store.register_roster(bulk, Utc::now()).await?;
        info!(
            classroom_id = %classroom.id,
            students = bulk.student_ids.len(),
            "bulk registration complete"
        );
        self.classroom_roster(&classroom.id).await
    }

    pub async fn classroom_roster(&self, classroom_id: &str) -> EngineResult<ClassroomRoster> {
        let classroom = self.get_classroom(classroom_id).await?;
        let student_ids = self.store.enrolled_student_ids(classroom_id).await?;
        Ok(ClassroomRoster {
            classroom,
            student_ids,
        })
    }

    pub async fn all_rosters(&self) -> EngineResult<Vec<ClassroomRoster>> {
        let classrooms = self.store.list_classrooms().await?;
        let mut rosters = Vec::with_capacity(classrooms.len());
        for classroom in classrooms {
            let student_ids = self.store.enrolled_student_ids(&classroom.id).await?;
            rosters.push(ClassroomRoster {
                classroom,
                student_ids,
            });
        }
        Ok(rosters)
    }

    /// Every enrolled student with whether they checked in on `day`, sorted by name.
    pub async fn roster_attendance(
        &self,
        classroom_id: &str,
        day: NaiveDate,
    ) -> EngineResult<Vec<RosterAttendance>> {
        let roster = self.classroom_roster(classroom_id).await?;
        let attended: HashSet<String> = self
            .store
            .attendance_for_day(classroom_id, day)
            .await?
            .into_iter()
            .map(|record| record.student_id)
            .collect();

        let mut entries = Vec::with_capacity(roster.student_ids.len());
        for student_id in &roster.student_ids {
            let student = self.get_student(student_id).await?;
            entries.push(RosterAttendance {
                has_attended: attended.contains(&student.id),
                student,
            });
        }
        entries.sort_by(|a, b| {
            a.student
                .name
                .cmp(&b.student.name)
                .then_with(|| a.student.id.cmp(&b.student.id))
        });
        Ok(entries)
    }

    // --- Window queries ---

    pub async fn is_within_window(
        &self,
        classroom_id: &str,
        instant: NaiveDateTime,
    ) -> EngineResult<bool> {
        let classroom = self.get_classroom(classroom_id).await?;
        Ok(classroom.window.contains_instant(instant))
    }

    /// First classroom in catalog order whose window contains `instant`.
    ///
    /// Overlapping windows are resolved by catalog position, not by which
    /// window is narrower.
    pub async fn find_active_classroom(
        &self,
        instant: NaiveDateTime,
    ) -> EngineResult<Option<Classroom>> {
        let classrooms = self.store.list_classrooms().await?;
        let active = classrooms
            .into_iter()
            .find(|classroom| classroom.window.contains_instant(instant));

        match &active {
            Some(classroom) => {
                debug!(classroom_id = %classroom.id, window = %classroom.window, %instant, "active classroom found")
            }
            None => debug!(%instant, "no active classroom"),
        }
        Ok(active)
    }

    /// Missing students or classrooms are simply "not enrolled".
    pub async fn is_enrolled(&self, student_id: &str, classroom_id: &str) -> EngineResult<bool> {
        Ok(self.store.is_enrolled(student_id, classroom_id).await?)
    }

    // --- Check-in ---

    /// Records a `present` check-in unless one already exists for the same
    /// student, classroom and calendar day of `at`.
    ///
    /// Enrollment is not checked here; callers gate on `is_enrolled` first.
    pub async fn check_in(
        &self,
        student_id: &str,
        classroom_id: &str,
        at: NaiveDateTime,
        corroboration: Corroboration,
    ) -> EngineResult<CheckInOutcome> {
        self.get_student(student_id).await?;
        self.get_classroom(classroom_id).await?;

        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            classroom_id: classroom_id.to_string(),
            timestamp: at,
            status: AttendanceStatus::Present,
            corroboration,
            created_at: Utc::now(),
        };

        if self.store.insert_attendance_once(&record).await? {
            debug!(record_id = %record.id, student_id, classroom_id, "attendance recorded");
            Ok(CheckInOutcome::Created(record))
        } else {
            info!(student_id, classroom_id, day = %record.day(), "attendance already marked");
            Ok(CheckInOutcome::AlreadyMarked)
        }
    }

    // --- Reporting ---

    pub async fn attendance_count(&self, classroom_id: &str, day: NaiveDate) -> EngineResult<usize> {
        Ok(self.store.distinct_attendees(classroom_id, day).await?)
    }

    pub async fn attendance_list(
        &self,
        classroom_id: &str,
        day: NaiveDate,
    ) -> EngineResult<Vec<AttendanceRecord>> {
        Ok(self.store.attendance_for_day(classroom_id, day).await?)
    }

    pub async fn attendance_stats(
        &self,
        classroom_id: &str,
        day: NaiveDate,
    ) -> EngineResult<AttendanceStats> {
        let roster = self.classroom_roster(classroom_id).await?;
        let scanned_count = self.attendance_count(classroom_id, day).await?;
        let total_enrolled = roster.student_ids.len();
        Ok(AttendanceStats {
            classroom_id: classroom_id.to_string(),
            day,
            scanned_count,
            total_enrolled,
            missing: total_enrolled as i64 - scanned_count as i64,
        })
    }

    /// `detected_count` comes from an external headcount estimate and is taken as given.
    pub async fn compare_headcount(
        &self,
        classroom_id: &str,
        day: NaiveDate,
        detected_count: u32,
    ) -> EngineResult<HeadcountComparison> {
        self.get_classroom(classroom_id).await?;
        let scanned_count = self.attendance_count(classroom_id, day).await?;
        Ok(HeadcountComparison::new(
            classroom_id.to_string(),
            day,
            detected_count,
            scanned_count,
        ))
    }
}
