//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use attendance_core::engine::AttendanceEngine;
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AttendanceEngine>,
}

impl AppState {
    pub fn new(engine: AttendanceEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// The instant used when a request does not name one: server-local wall clock.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn local_today() -> NaiveDate {
    local_now().date()
}
