pub mod domain;
pub mod engine;
pub mod memory;
pub mod ports;

pub use domain::{
    AttendanceRecord, AttendanceStats, AttendanceStatus, BulkRegistration, CheckInOutcome,
    Classroom, ClassroomRegistration, ClassroomRoster, Corroboration, EnrollOutcome,
    HeadcountComparison, HeadcountStatus, RosterAttendance, Student, TimeWindow, WindowError,
};
pub use engine::{AttendanceEngine, EngineError, EngineResult};
pub use memory::InMemoryStore;
pub use ports::{AttendanceStore, PortError, PortResult};
