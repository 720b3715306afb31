mod common;

use std::sync::Arc;

use api_lib::web::{router, state::AppState};
use attendance_core::engine::AttendanceEngine;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

async fn make_app() -> (TempDir, Router) {
    let (dir, adapter) = common::setup_test_db().await;
    let engine = AttendanceEngine::new(Arc::new(adapter));
    let app = router(Arc::new(AppState::new(engine)));
    (dir, app)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("response body is JSON")
}

async fn seed_cs101(app: &Router) {
    let (status, _) = send(
        app,
        "POST",
        "/classrooms",
        Some(json!({ "id": "CS101", "name": "Intro to CS", "start_time": "09:00", "end_time": "10:30" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(app, "POST", "/students", Some(json!({ "id": "S1", "name": "Ada" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        "POST",
        "/enrollments",
        Some(json!({ "student_id": "S1", "classroom_id": "CS101" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "enrolled");
}

#[tokio::test]
async fn check_in_flow_over_http() {
    let (_dir, app) = make_app().await;
    seed_cs101(&app).await;

    let (status, body) = send(&app, "GET", "/classrooms/active?at=2024-09-02T09:15:00", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["classroom"]["id"], "CS101");

    let check_in = json!({ "student_id": "S1", "classroom_id": "CS101", "at": "2024-09-02T09:15:00", "ai_headcount": 30 });
    let (status, body) = send(&app, "POST", "/attendance/check-in", Some(check_in.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let record = json_body(&body);
    assert_eq!(record["status"], "present");
    assert_eq!(record["ai_headcount"], 30);

    let (status, _) = send(&app, "POST", "/attendance/check-in", Some(check_in)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "GET", "/classrooms/CS101/attendance/count?day=2024-09-02", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["count"], 1);

    let (status, body) = send(&app, "GET", "/classrooms/CS101/attendance?day=2024-09-02", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);

    let (_, body) = send(&app, "GET", "/classrooms/active?at=2024-09-02T11:00:00", None).await;
    assert!(json_body(&body)["classroom"].is_null());
}

#[tokio::test]
async fn scan_reports_each_rejection() {
    let (_dir, app) = make_app().await;
    seed_cs101(&app).await;
    send(&app, "POST", "/students", Some(json!({ "id": "S2", "name": "Grace" }))).await;

    let (status, body) = send(
        &app,
        "POST",
        "/attendance/scan",
        Some(json!({ "student_id": "NOPE", "at": "2024-09-02T09:15:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["message"], "Student not found");

    let (status, body) = send(
        &app,
        "POST",
        "/attendance/scan",
        Some(json!({ "student_id": "S1", "at": "2024-09-02T12:00:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["message"], "No active class found at this time");

    let (status, body) = send(
        &app,
        "POST",
        "/attendance/scan",
        Some(json!({ "student_id": "S2", "at": "2024-09-02T09:15:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json_body(&body)["status"], "rejected");

    let scan = json!({ "student_id": "S1", "at": "2024-09-02T09:15:00" });
    let (status, body) = send(&app, "POST", "/attendance/scan", Some(scan.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let accepted = json_body(&body);
    assert_eq!(accepted["status"], "accepted");
    assert_eq!(accepted["classroom_id"], "CS101");
    assert_eq!(accepted["message"], "Attendance marked successfully for Intro to CS");

    let (status, _) = send(&app, "POST", "/attendance/scan", Some(scan)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn inverted_window_is_a_bad_request() {
    let (_dir, app) = make_app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/classrooms",
        Some(json!({ "id": "NIGHT", "name": "Night shift", "start_time": "22:00", "end_time": "02:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/classrooms", None).await;
    assert!(json_body(&body).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn enrolling_twice_reports_already_enrolled() {
    let (_dir, app) = make_app().await;
    seed_cs101(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/enrollments",
        Some(json!({ "student_id": "S1", "classroom_id": "CS101" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "already_enrolled");

    let (status, _) = send(
        &app,
        "POST",
        "/enrollments",
        Some(json!({ "student_id": "GHOST", "classroom_id": "CS101" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/enrollments/check?student_id=S1&classroom_id=CS101", None).await;
    assert_eq!(json_body(&body)["enrolled"], true);
}

#[tokio::test]
async fn bulk_registration_creates_roster_and_placeholders() {
    let (_dir, app) = make_app().await;
    let request = json!({
        "classroom_id": "MATH1",
        "subject": "Algebra",
        "department": "Mathematics",
        "classroom": "Room 4",
        "start_time": "10:00",
        "end_time": "11:00",
        "student_ids": ["M1", " M2 ", ""]
    });

    let (status, body) = send(&app, "POST", "/admin/classrooms", Some(request)).await;
    assert_eq!(status, StatusCode::CREATED);
    let roster = json_body(&body);
    assert_eq!(roster["student_ids"], json!(["M1", "M2"]));
    assert_eq!(roster["start_time"], "10:00");

    let (_, body) = send(&app, "GET", "/students", None).await;
    let names: Vec<String> = json_body(&body)
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Student M1", "Student M2"]);

    let (status, _) = send(&app, "GET", "/admin/classrooms/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/admin/classrooms", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn bulk_registration_requires_students() {
    let (_dir, app) = make_app().await;
    let request = json!({
        "classroom_id": "MATH1",
        "subject": "Algebra",
        "department": "Mathematics",
        "classroom": "Room 4",
        "start_time": "10:00",
        "end_time": "11:00",
        "student_ids": []
    });
    let (status, body) = send(&app, "POST", "/admin/classrooms", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body).unwrap(), "Student IDs must be a non-empty list");
}

#[tokio::test]
async fn headcount_and_stats_compare_against_scans() {
    let (_dir, app) = make_app().await;
    seed_cs101(&app).await;
    send(
        &app,
        "POST",
        "/attendance/check-in",
        Some(json!({ "student_id": "S1", "classroom_id": "CS101", "at": "2024-09-02T09:15:00" })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/classrooms/CS101/headcount",
        Some(json!({ "detected_count": 3, "day": "2024-09-02" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let comparison = json_body(&body);
    assert_eq!(comparison["difference"], 2);
    assert_eq!(comparison["status"], "mismatch");

    let (status, body) = send(&app, "GET", "/classrooms/CS101/stats?day=2024-09-02", None).await;
    assert_eq!(status, StatusCode::OK);
    let stats = json_body(&body);
    assert_eq!(stats["scanned_count"], 1);
    assert_eq!(stats["total_enrolled"], 1);
    assert_eq!(stats["missing"], 0);
}

#[tokio::test]
async fn single_student_and_classroom_lookups() {
    let (_dir, app) = make_app().await;
    seed_cs101(&app).await;

    let (status, body) = send(&app, "GET", "/students/S1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["name"], "Ada");

    let (status, body) = send(&app, "GET", "/classrooms/CS101", None).await;
    assert_eq!(status, StatusCode::OK);
    let classroom = json_body(&body);
    assert_eq!(classroom["start_time"], "09:00");
    assert_eq!(classroom["end_time"], "10:30");

    let (status, _) = send(&app, "GET", "/students/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/classrooms/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn active_roster_shows_who_has_attended() {
    let (_dir, app) = make_app().await;
    seed_cs101(&app).await;
    send(&app, "POST", "/students", Some(json!({ "id": "S0", "name": "Zed" }))).await;
    send(
        &app,
        "POST",
        "/enrollments",
        Some(json!({ "student_id": "S0", "classroom_id": "CS101" })),
    )
    .await;
    send(
        &app,
        "POST",
        "/attendance/scan",
        Some(json!({ "student_id": "S0", "at": "2024-09-02T09:10:00" })),
    )
    .await;

    let (status, body) = send(&app, "GET", "/classrooms/active/roster?at=2024-09-02T09:20:00", None).await;
    assert_eq!(status, StatusCode::OK);
    let roster = json_body(&body);
    assert_eq!(roster["classroom_id"], "CS101");
    assert_eq!(
        roster["students"],
        json!([
            { "id": "S1", "name": "Ada", "has_attended": false },
            { "id": "S0", "name": "Zed", "has_attended": true }
        ])
    );

    let (status, body) = send(&app, "GET", "/classrooms/active/roster?at=2024-09-02T20:00:00", None).await;
    assert_eq!(status, StatusCode::OK);
    let idle = json_body(&body);
    assert!(idle["classroom_id"].is_null());
    assert_eq!(idle["students"], json!([]));
}

#[tokio::test]
async fn attendance_list_honours_limit() {
    let (_dir, app) = make_app().await;
    seed_cs101(&app).await;
    send(&app, "POST", "/students", Some(json!({ "id": "S2", "name": "Grace" }))).await;
    for (student_id, at) in [("S1", "2024-09-02T09:05:00"), ("S2", "2024-09-02T09:25:00")] {
        let (status, _) = send(
            &app,
            "POST",
            "/attendance/check-in",
            Some(json!({ "student_id": student_id, "classroom_id": "CS101", "at": at })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, "GET", "/classrooms/CS101/attendance?day=2024-09-02&limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    let records = json_body(&body);
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["student_id"], "S2");

    let (_, body) = send(&app, "GET", "/classrooms/CS101/attendance?day=2024-09-02", None).await;
    assert_eq!(json_body(&body).as_array().unwrap().len(), 2);
}
