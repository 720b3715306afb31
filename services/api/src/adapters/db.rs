//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `AttendanceStore` port from the `attendance_core` crate. It handles all
//! interactions with the SQLite database using `sqlx`.

use std::str::FromStr;

use async_trait::async_trait;
use attendance_core::domain::{
    AttendanceRecord, AttendanceStatus, BulkRegistration, Classroom, ClassroomRegistration,
    Corroboration, Student, TimeWindow,
};
use attendance_core::ports::{AttendanceStore, PortError, PortResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `AttendanceStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url`, creating the database file if needed.
    /// Foreign keys are enforced on every connection.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// `RETURNING` statements are drained with `fetch_all`. `fetch_one` leaves the
/// statement un-reset, which keeps its implicit transaction open on the pooled
/// connection and hides the write from other connections.
fn single_row<T>(rows: Vec<T>, what: &str) -> PortResult<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| PortError::Unexpected(format!("{} returned no row", what)))
}

/// Foreign-key failures mean one of the referenced ids does not exist.
fn write_error(e: sqlx::Error, subject: String) -> PortError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            PortError::NotFound(subject)
        }
        _ => unexpected(e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct StudentRecord {
    id: String,
    name: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
}
impl StudentRecord {
    fn to_domain(self) -> Student {
        Student {
            id: self.id,
            name: self.name,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ClassroomRecord {
    id: String,
    name: String,
    time_window_start: NaiveTime,
    time_window_end: NaiveTime,
    subject: Option<String>,
    department: Option<String>,
    created_at: DateTime<Utc>,
}
impl ClassroomRecord {
    fn to_domain(self) -> PortResult<Classroom> {
        let window = TimeWindow::new(self.time_window_start, self.time_window_end).map_err(|e| {
            PortError::Unexpected(format!("Classroom {} has a corrupt window: {}", self.id, e))
        })?;
        Ok(Classroom {
            id: self.id,
            name: self.name,
            window,
            subject: self.subject,
            department: self.department,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: Uuid,
    student_id: String,
    classroom_id: String,
    timestamp: NaiveDateTime,
    status: String,
    ai_headcount: Option<i64>,
    qr_scan_count: Option<i64>,
    created_at: DateTime<Utc>,
}
impl AttendanceRow {
    fn to_domain(self) -> PortResult<AttendanceRecord> {
        let status = AttendanceStatus::from_str(&self.status).map_err(PortError::Unexpected)?;
        let count = |value: Option<i64>| {
            value
                .map(u32::try_from)
                .transpose()
                .map_err(|e| PortError::Unexpected(format!("Record {}: {}", self.id, e)))
        };
        let corroboration = Corroboration {
            ai_headcount: count(self.ai_headcount)?,
            qr_scan_count: count(self.qr_scan_count)?,
        };
        Ok(AttendanceRecord {
            id: self.id,
            student_id: self.student_id,
            classroom_id: self.classroom_id,
            timestamp: self.timestamp,
            status,
            corroboration,
            created_at: self.created_at,
        })
    }
}

const CLASSROOM_COLUMNS: &str =
    "id, name, time_window_start, time_window_end, subject, department, created_at";

const STUDENT_UPSERT: &str = "INSERT INTO students (id, name, email, created_at) VALUES (?, ?, ?, ?)
     ON CONFLICT (id) DO UPDATE SET
         name = excluded.name,
         email = COALESCE(excluded.email, students.email)
     RETURNING id, name, email, created_at";

const ENROLLMENT_INSERT: &str =
    "INSERT INTO enrollments (student_id, classroom_id, enrolled_at) VALUES (?, ?, ?)
     ON CONFLICT (student_id, classroom_id) DO NOTHING";

fn classroom_upsert_sql() -> String {
    format!(
        "INSERT INTO classrooms ({CLASSROOM_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
             name = excluded.name,
             time_window_start = excluded.time_window_start,
             time_window_end = excluded.time_window_end,
             subject = COALESCE(excluded.subject, classrooms.subject),
             department = COALESCE(excluded.department, classrooms.department)
         RETURNING {CLASSROOM_COLUMNS}"
    )
}

const ATTENDANCE_COLUMNS: &str =
    "id, student_id, classroom_id, timestamp, status, ai_headcount, qr_scan_count, created_at";

//=========================================================================================
// `AttendanceStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AttendanceStore for DbAdapter {
    async fn upsert_student(
        &self,
        id: &str,
        name: &str,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> PortResult<Student> {
        let rows = sqlx::query_as::<_, StudentRecord>(STUDENT_UPSERT)
            .bind(id)
            .bind(name)
            .bind(email)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(single_row(rows, "student upsert")?.to_domain())
    }

    async fn get_student(&self, id: &str) -> PortResult<Option<Student>> {
        let record = sqlx::query_as::<_, StudentRecord>(
            "SELECT id, name, email, created_at FROM students WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(StudentRecord::to_domain))
    }

    async fn list_students(&self) -> PortResult<Vec<Student>> {
        let records = sqlx::query_as::<_, StudentRecord>(
            "SELECT id, name, email, created_at FROM students ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(StudentRecord::to_domain).collect())
    }

    async fn upsert_classroom(
        &self,
        registration: &ClassroomRegistration,
        now: DateTime<Utc>,
    ) -> PortResult<Classroom> {
        let sql = classroom_upsert_sql();
        let rows = sqlx::query_as::<_, ClassroomRecord>(&sql)
            .bind(&registration.id)
            .bind(&registration.name)
            .bind(registration.window.start())
            .bind(registration.window.end())
            .bind(registration.subject.as_deref())
            .bind(registration.department.as_deref())
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        single_row(rows, "classroom upsert")?.to_domain()
    }

    async fn register_roster(
        &self,
        bulk: &BulkRegistration,
        now: DateTime<Utc>,
    ) -> PortResult<Classroom> {
        let registration = &bulk.classroom;
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let sql = classroom_upsert_sql();
        let rows = sqlx::query_as::<_, ClassroomRecord>(&sql)
            .bind(&registration.id)
            .bind(&registration.name)
            .bind(registration.window.start())
            .bind(registration.window.end())
            .bind(registration.subject.as_deref())
            .bind(registration.department.as_deref())
            .bind(now)
            .fetch_all(&mut *tx)
            .await
            .map_err(unexpected)?;
        let classroom = single_row(rows, "classroom upsert")?.to_domain()?;

        for student_id in &bulk.student_ids {
            sqlx::query(
                "INSERT INTO students (id, name, email, created_at) VALUES (?, ?, NULL, ?)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(student_id)
            .bind(BulkRegistration::placeholder_name(student_id))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

            sqlx::query(ENROLLMENT_INSERT)
                .bind(student_id)
                .bind(&classroom.id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| write_error(e, format!("Student {}", student_id)))?;
        }

        // Dropping `tx` on an early return rolls the whole roster back.
        tx.commit().await.map_err(unexpected)?;
        Ok(classroom)
    }

    async fn get_classroom(&self, id: &str) -> PortResult<Option<Classroom>> {
        let sql = format!("SELECT {CLASSROOM_COLUMNS} FROM classrooms WHERE id = ?");
        let record = sqlx::query_as::<_, ClassroomRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(ClassroomRecord::to_domain).transpose()
    }

    async fn list_classrooms(&self) -> PortResult<Vec<Classroom>> {
        let sql = format!("SELECT {CLASSROOM_COLUMNS} FROM classrooms ORDER BY rowid");
        let records = sqlx::query_as::<_, ClassroomRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(ClassroomRecord::to_domain).collect()
    }

    async fn add_enrollment(
        &self,
        student_id: &str,
        classroom_id: &str,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let result = sqlx::query(ENROLLMENT_INSERT)
            .bind(student_id)
            .bind(classroom_id)
            .bind(enrolled_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!("Student {} or classroom {}", student_id, classroom_id),
                )
            })?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_enrolled(&self, student_id: &str, classroom_id: &str) -> PortResult<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrollments WHERE student_id = ? AND classroom_id = ?",
        )
        .bind(student_id)
        .bind(classroom_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(single_row(found, "enrollment lookup")? > 0)
    }

    async fn enrolled_student_ids(&self, classroom_id: &str) -> PortResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT student_id FROM enrollments WHERE classroom_id = ? ORDER BY rowid",
        )
        .bind(classroom_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn insert_attendance_once(&self, record: &AttendanceRecord) -> PortResult<bool> {
        // The unique index on (student_id, classroom_id, attendance_day) makes
        // this a single atomic compare-and-insert.
        let sql = format!(
            "INSERT INTO attendance_records ({ATTENDANCE_COLUMNS}, attendance_day)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (student_id, classroom_id, attendance_day) DO NOTHING"
        );
        let result = sqlx::query(&sql)
            .bind(record.id)
            .bind(&record.student_id)
            .bind(&record.classroom_id)
            .bind(record.timestamp)
            .bind(record.status.as_str())
            .bind(record.corroboration.ai_headcount.map(i64::from))
            .bind(record.corroboration.qr_scan_count.map(i64::from))
            .bind(record.created_at)
            .bind(record.day())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!(
                        "Student {} or classroom {}",
                        record.student_id, record.classroom_id
                    ),
                )
            })?;
        Ok(result.rows_affected() == 1)
    }

    async fn attendance_for_day(
        &self,
        classroom_id: &str,
        day: NaiveDate,
    ) -> PortResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records
             WHERE classroom_id = ? AND attendance_day = ?
             ORDER BY timestamp DESC"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(classroom_id)
            .bind(day)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        rows.into_iter().map(AttendanceRow::to_domain).collect()
    }

    async fn distinct_attendees(&self, classroom_id: &str, day: NaiveDate) -> PortResult<usize> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT student_id) FROM attendance_records
             WHERE classroom_id = ? AND attendance_day = ?",
        )
        .bind(classroom_id)
        .bind(day)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(single_row(count, "attendee count")? as usize)
    }
}
