//! crates/attendance_core/src/domain.rs
//!
//! Defines the pure, core data structures for the attendance engine.
//! These structs are independent of any database or serialization format.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

/// Wire format of a time-of-day boundary.
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M";

//=========================================================================================
// Time Windows
//=========================================================================================

/// Why a pair of boundaries could not become a `TimeWindow`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("'{0}' is not a valid HH:MM time of day")]
    Malformed(String),
    #[error("window start {start} is after its end {end}; windows crossing midnight are not supported")]
    StartAfterEnd { start: String, end: String },
}

/// A daily recurring interval, inclusive on both ends.
///
/// The ordering is linear: a window never wraps around midnight, so
/// `start <= end` always holds for a constructed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::StartAfterEnd {
                start: start.format(TIME_OF_DAY_FORMAT).to_string(),
                end: end.format(TIME_OF_DAY_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Builds a window from two `"HH:MM"` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, WindowError> {
        Self::new(parse_time_of_day(start)?, parse_time_of_day(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// True iff `time` lies within `[start, end]`.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }

    /// Only the time-of-day part of `instant` matters.
    pub fn contains_instant(&self, instant: NaiveDateTime) -> bool {
        self.contains(instant.time())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format(TIME_OF_DAY_FORMAT),
            self.end.format(TIME_OF_DAY_FORMAT)
        )
    }
}

/// Parses a 24-hour `"HH:MM"` string. Surrounding whitespace is ignored.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, WindowError> {
    NaiveTime::parse_from_str(value.trim(), TIME_OF_DAY_FORMAT)
        .map_err(|_| WindowError::Malformed(value.to_string()))
}

//=========================================================================================
// Catalog Entities
//=========================================================================================

/// A student, identified by an externally assigned institutional ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A classroom and its daily attendance window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classroom {
    pub id: String,
    pub name: String,
    pub window: TimeWindow,
    pub subject: Option<String>,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or updating a classroom.
///
/// `subject` and `department` left as `None` keep whatever the classroom
/// already had.
#[derive(Debug, Clone)]
pub struct ClassroomRegistration {
    pub id: String,
    pub name: String,
    pub window: TimeWindow,
    pub subject: Option<String>,
    pub department: Option<String>,
}

/// Input for the administrative "register a class and its roster" action.
#[derive(Debug, Clone)]
pub struct BulkRegistration {
    pub classroom: ClassroomRegistration,
    pub student_ids: Vec<String>,
}

impl BulkRegistration {
    /// Name given to students that a roster mentions before they registered.
    pub fn placeholder_name(student_id: &str) -> String {
        format!("Student {}", student_id)
    }
}

/// A classroom together with the ids of every enrolled student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassroomRoster {
    pub classroom: Classroom,
    pub student_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled,
    AlreadyEnrolled,
}

//=========================================================================================
// Attendance
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
        }
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            other => Err(format!("unknown attendance status '{}'", other)),
        }
    }
}

/// Opaque auxiliary counts stored next to a check-in for later human review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Corroboration {
    pub ai_headcount: Option<u32>,
    pub qr_scan_count: Option<u32>,
}

/// An immutable attendance fact. At most one exists per student, classroom and day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: String,
    pub classroom_id: String,
    /// Naive local time; no timezone normalization is applied.
    pub timestamp: NaiveDateTime,
    pub status: AttendanceStatus,
    pub corroboration: Corroboration,
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// The calendar day the uniqueness rule is keyed on.
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Result of a check-in attempt. `AlreadyMarked` is an expected outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInOutcome {
    Created(AttendanceRecord),
    AlreadyMarked,
}

impl CheckInOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CheckInOutcome::Created(_))
    }
}

/// One enrolled student and whether they checked in on the day asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterAttendance {
    pub student: Student,
    pub has_attended: bool,
}

/// Daily numbers for one classroom, as shown on an instructor dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceStats {
    pub classroom_id: String,
    pub day: NaiveDate,
    pub scanned_count: usize,
    pub total_enrolled: usize,
    /// Negative only when students outside the roster were checked in.
    pub missing: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadcountStatus {
    Match,
    Mismatch,
}

impl HeadcountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeadcountStatus::Match => "match",
            HeadcountStatus::Mismatch => "mismatch",
        }
    }
}

/// An externally detected headcount set against the scanned attendance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadcountComparison {
    pub classroom_id: String,
    pub day: NaiveDate,
    pub detected_count: u32,
    pub scanned_count: usize,
    pub difference: i64,
    pub status: HeadcountStatus,
}

impl HeadcountComparison {
    pub fn new(classroom_id: String, day: NaiveDate, detected_count: u32, scanned_count: usize) -> Self {
        let difference = i64::from(detected_count) - scanned_count as i64;
        let status = if difference == 0 {
            HeadcountStatus::Match
        } else {
            HeadcountStatus::Mismatch
        };
        Self {
            classroom_id,
            day,
            detected_count,
            scanned_count,
            difference,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let window = TimeWindow::parse("08:00", "18:00").unwrap();
        assert!(window.contains(t(8, 0)));
        assert!(window.contains(t(18, 0)));
        assert!(window.contains(t(12, 30)));
        assert!(!window.contains(t(7, 59)));
        assert!(!window.contains(t(18, 1)));
    }

    #[test]
    fn seconds_past_the_end_minute_fall_outside() {
        let window = TimeWindow::parse("09:00", "10:30").unwrap();
        let late = NaiveTime::from_hms_opt(10, 30, 1).unwrap();
        assert!(!window.contains(late));
    }

    #[test]
    fn start_after_end_is_rejected() {
        let err = TimeWindow::parse("22:00", "02:00").unwrap_err();
        assert!(matches!(err, WindowError::StartAfterEnd { .. }));
    }

    #[test]
    fn zero_length_window_is_allowed() {
        let window = TimeWindow::parse("09:00", "09:00").unwrap();
        assert!(window.contains(t(9, 0)));
        assert!(!window.contains(t(9, 1)));
    }

    #[test]
    fn malformed_time_is_rejected() {
        assert_eq!(
            TimeWindow::parse("9am", "10:00").unwrap_err(),
            WindowError::Malformed("9am".to_string())
        );
        assert!(TimeWindow::parse("25:00", "26:00").is_err());
    }

    #[test]
    fn window_displays_as_hh_mm_range() {
        let window = TimeWindow::parse("09:05", "10:30").unwrap();
        assert_eq!(window.to_string(), "09:05-10:30");
    }

    #[test]
    fn headcount_comparison_reports_difference() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let over = HeadcountComparison::new("CS101".into(), day, 12, 10);
        assert_eq!(over.difference, 2);
        assert_eq!(over.status, HeadcountStatus::Mismatch);

        let exact = HeadcountComparison::new("CS101".into(), day, 3, 3);
        assert_eq!(exact.status, HeadcountStatus::Match);
    }
}
