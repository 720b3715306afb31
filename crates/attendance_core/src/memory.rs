//! crates/attendance_core/src/memory.rs
//!
//! An `AttendanceStore` kept entirely in process memory. Used by tests and by
//! embedders that do not need persistence.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    AttendanceRecord, BulkRegistration, Classroom, ClassroomRegistration, Student,
};
use crate::ports::{AttendanceStore, PortError, PortResult};

#[derive(Default)]
struct Tables {
    // Vecs keep insertion order, which is the catalog order callers rely on.
    students: Vec<Student>,
    classrooms: Vec<Classroom>,
    enrollments: Vec<(String, String, DateTime<Utc>)>,
    attendance: Vec<AttendanceRecord>,
    attendance_keys: HashSet<(String, String, NaiveDate)>,
}

impl Tables {
    fn upsert_student(
        &mut self,
        id: &str,
        name: &str,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Student {
        if let Some(existing) = self.students.iter_mut().find(|s| s.id == id) {
            existing.name = name.to_string();
            if let Some(email) = email {
                existing.email = Some(email.to_string());
            }
            return existing.clone();
        }

        let student = Student {
            id: id.to_string(),
            name: name.to_string(),
            email: email.map(str::to_string),
            created_at: now,
        };
        self.students.push(student.clone());
        student
    }

    fn upsert_classroom(
        &mut self,
        registration: &ClassroomRegistration,
        now: DateTime<Utc>,
    ) -> Classroom {
        if let Some(existing) = self.classrooms.iter_mut().find(|c| c.id == registration.id) {
            existing.name = registration.name.clone();
            existing.window = registration.window;
            if registration.subject.is_some() {
                existing.subject = registration.subject.clone();
            }
            if registration.department.is_some() {
                existing.department = registration.department.clone();
            }
            return existing.clone();
        }

        let classroom = Classroom {
            id: registration.id.clone(),
            name: registration.name.clone(),
            window: registration.window,
            subject: registration.subject.clone(),
            department: registration.department.clone(),
            created_at: now,
        };
        self.classrooms.push(classroom.clone());
        classroom
    }

    fn add_enrollment(
        &mut self,
        student_id: &str,
        classroom_id: &str,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        if !self.students.iter().any(|s| s.id == student_id) {
            return Err(PortError::NotFound(format!("Student {}", student_id)));
        }
        if !self.classrooms.iter().any(|c| c.id == classroom_id) {
            return Err(PortError::NotFound(format!("Classroom {}", classroom_id)));
        }
        if self
            .enrollments
            .iter()
            .any(|(s, c, _)| s == student_id && c == classroom_id)
        {
            return Ok(false);
        }
        self.enrollments
            .push((student_id.to_string(), classroom_id.to_string(), enrolled_at));
        Ok(true)
    }
}

/// All tables sit behind one lock, so check-and-insert is atomic.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl AttendanceStore for InMemoryStore {
    async fn upsert_student(
        &self,
        id: &str,
        name: &str,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> PortResult<Student> {
        Ok(self.lock()?.upsert_student(id, name, email, now))
    }

    async fn get_student(&self, id: &str) -> PortResult<Option<Student>> {
        Ok(self.lock()?.students.iter().find(|s| s.id == id).cloned())
    }

    async fn list_students(&self) -> PortResult<Vec<Student>> {
        Ok(self.lock()?.students.clone())
    }

    async fn upsert_classroom(
        &self,
        registration: &ClassroomRegistration,
        now: DateTime<Utc>,
    ) -> PortResult<Classroom> {
        Ok(self.lock()?.upsert_classroom(registration, now))
    }

    async fn get_classroom(&self, id: &str) -> PortResult<Option<Classroom>> {
        Ok(self.lock()?.classrooms.iter().find(|c| c.id == id).cloned())
    }

    async fn list_classrooms(&self) -> PortResult<Vec<Classroom>> {
        Ok(self.lock()?.classrooms.clone())
    }

    async fn register_roster(
        &self,
        bulk: &BulkRegistration,
        now: DateTime<Utc>,
    ) -> PortResult<Classroom> {
        let mut tables = self.lock()?;
        let classroom = tables.upsert_classroom(&bulk.classroom, now);
        for student_id in &bulk.student_ids {
            if !tables.students.iter().any(|s| &s.id == student_id) {
                let name = BulkRegistration::placeholder_name(student_id);
                tables.upsert_student(student_id, &name, None, now);
            }
            tables.add_enrollment(student_id, &classroom.id, now)?;
        }
        Ok(classroom)
    }

    async fn add_enrollment(
        &self,
        student_id: &str,
        classroom_id: &str,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        self.lock()?.add_enrollment(student_id, classroom_id, enrolled_at)
    }

    async fn is_enrolled(&self, student_id: &str, classroom_id: &str) -> PortResult<bool> {
        Ok(self
            .lock()?
            .enrollments
            .iter()
            .any(|(s, c, _)| s == student_id && c == classroom_id))
    }

    async fn enrolled_student_ids(&self, classroom_id: &str) -> PortResult<Vec<String>> {
        Ok(self
            .lock()?
            .enrollments
            .iter()
            .filter(|(_, c, _)| c == classroom_id)
            .map(|(s, _, _)| s.clone())
            .collect())
    }

    async fn insert_attendance_once(&self, record: &AttendanceRecord) -> PortResult<bool> {
        let mut tables = self.lock()?;
        let key = (
            record.student_id.clone(),
            record.classroom_id.clone(),
            record.day(),
        );
        if !tables.attendance_keys.insert(key) {
            return Ok(false);
        }
        tables.attendance.push(record.clone());
        Ok(true)
    }

    async fn attendance_for_day(
        &self,
        classroom_id: &str,
        day: NaiveDate,
    ) -> PortResult<Vec<AttendanceRecord>> {
        let mut records: Vec<AttendanceRecord> = self
            .lock()?
            .attendance
            .iter()
            .filter(|r| r.classroom_id == classroom_id && r.day() == day)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn distinct_attendees(&self, classroom_id: &str, day: NaiveDate) -> PortResult<usize> {
        let tables = self.lock()?;
        let students: HashSet<&str> = tables
            .attendance
            .iter()
            .filter(|r| r.classroom_id == classroom_id && r.day() == day)
            .map(|r| r.student_id.as_str())
            .collect();
        Ok(students.len())
    }
}
