#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{Value, json};

use common::{ADMIN_EMAIL, ADMIN_PASSWORD, bearer, state};

#[actix_web::test]
async fn health_is_public_and_api_needs_a_token() {
    let state = state().await;
    let app = test_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/users/me").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Missing Authorization header");

    let req = test::TestRequest::get()
        .uri("/api/users/me")
        .insert_header(bearer("not-a-jwt"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn login_rejects_bad_credentials() {
    let state = state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": ADMIN_EMAIL, "password": "wrong" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": ADMIN_EMAIL }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["password"].is_array());
}

#[actix_web::test]
async fn malformed_json_is_a_plain_bad_request() {
    let state = state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

#[actix_web::test]
async fn admin_manages_users_and_employees_are_limited() {
    let state = state().await;
    let app = test_app!(state);
    let admin = login!(app, ADMIN_EMAIL, ADMIN_PASSWORD);

    let employee_id = create_user!(app, admin, "Jane Doe", "jane@example.com", "Employee");
    assert_eq!(employee_id, "EMP0002");

    // same email, different case
    let req = test::TestRequest::post()
        .uri("/api/users")
        .insert_header(bearer(&admin))
        .set_json(json!({
            "name": "Jane Again", "email": "JANE@example.com", "role": "Employee", "password": "password123"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let jane = login!(app, "jane@example.com", "password123");

    let req = test::TestRequest::get().uri("/api/users/me").insert_header(bearer(&jane)).to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["employee_id"], "EMP0002");
    assert!(me.get("password_hash").is_none());

    let req = test::TestRequest::get().uri("/api/users").insert_header(bearer(&jane)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/users/search?name=jane")
        .insert_header(bearer(&admin))
        .to_request();
    let found: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found.as_array().map(Vec::len), Some(1));

    let req = test::TestRequest::put()
        .uri("/api/users/EMP0002/status")
        .insert_header(bearer(&admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "jane@example.com", "password": "password123" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn leave_is_deducted_on_approval() {
    let state = state().await;
    let app = test_app!(state);
    let admin = login!(app, ADMIN_EMAIL, ADMIN_PASSWORD);
    create_user!(app, admin, "Jane Doe", "jane@example.com", "Employee");
    let jane = login!(app, "jane@example.com", "password123");

    let req = test::TestRequest::post()
        .uri("/api/leave/apply")
        .insert_header(bearer(&jane))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["leave_type"].is_array());

    let req = test::TestRequest::post()
        .uri("/api/leave/apply")
        .insert_header(bearer(&jane))
        .set_json(json!({
            "leave_type": "annual", "start_date": "2026-03-02", "end_date": "2026-03-04", "reason": "Family trip"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["days"], 3);
    let leave_id = body["leave_id"].as_i64().unwrap();

    // an employee cannot approve anything
    let req = test::TestRequest::put()
        .uri(&format!("/api/leave/{leave_id}/status"))
        .insert_header(bearer(&jane))
        .set_json(json!({ "status": "Approved" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri(&format!("/api/leave/{leave_id}/status"))
        .insert_header(bearer(&admin))
        .set_json(json!({ "status": "approved" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri(&format!("/api/leave/{leave_id}/status"))
        .insert_header(bearer(&admin))
        .set_json(json!({ "status": "Approved" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["message"], "Leave approved successfully.");

    let req = test::TestRequest::get().uri("/api/leave/balance").insert_header(bearer(&jane)).to_request();
    let balance: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(balance["annual"], 18);

    let req = test::TestRequest::get()
        .uri("/api/employee/dashboard/summary")
        .insert_header(bearer(&jane))
        .to_request();
    let summary: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summary.as_array().map(Vec::len), Some(3));
}

#[actix_web::test]
async fn manual_attendance_needs_admin_approval() {
    let state = state().await;
    let app = test_app!(state);
    let admin = login!(app, ADMIN_EMAIL, ADMIN_PASSWORD);
    create_user!(app, admin, "Jane Doe", "jane@example.com", "Employee");
    let jane = login!(app, "jane@example.com", "password123");

    let req = test::TestRequest::post()
        .uri("/api/attendance/manual")
        .insert_header(bearer(&jane))
        .set_json(json!({
            "date": "2026-01-05", "punch_in": "17:30", "punch_out": "09:00", "reason": "Forgot to punch in"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/attendance/manual")
        .insert_header(bearer(&jane))
        .set_json(json!({
            "date": "2026-01-05", "punch_in": "09:00", "punch_out": "17:30", "reason": "Forgot to punch in"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/attendance/requests")
        .insert_header(bearer(&admin))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["total"], 1);
    let id = page["items"][0]["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/attendance/approve/{id}"))
        .insert_header(bearer(&admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // already reviewed
    let req = test::TestRequest::put()
        .uri(&format!("/api/attendance/reject/{id}"))
        .insert_header(bearer(&admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/attendance/my-records?start_date=2026-01-01&end_date=2026-01-31")
        .insert_header(bearer(&jane))
        .to_request();
    let records: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(records[0]["approval_status"], "Approved");
}

#[actix_web::test]
async fn course_submissions_are_reviewed_once() {
    let state = state().await;
    let app = test_app!(state);
    let admin = login!(app, ADMIN_EMAIL, ADMIN_PASSWORD);
    create_user!(app, admin, "Jane Doe", "jane@example.com", "Employee");
    let jane = login!(app, "jane@example.com", "password123");

    let req = test::TestRequest::get().uri("/api/courses").insert_header(bearer(&jane)).to_request();
    let courses: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(courses.as_array().map(Vec::len), Some(3));
    let course_id = courses[0]["id"].as_i64().unwrap();

    let submit = || {
        test::TestRequest::post()
            .uri(&format!("/api/courses/{course_id}/submit"))
            .insert_header(bearer(&jane))
            .set_json(json!({ "completion_notes": "Done" }))
            .to_request()
    };
    let resp = test::call_service(&app, submit()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let submission_id = body["submission_id"].as_i64().unwrap();

    assert_eq!(test::call_service(&app, submit()).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::put()
        .uri(&format!("/api/submissions/{submission_id}/status"))
        .insert_header(bearer(&admin))
        .set_json(json!({ "status": "Approved", "reviewer_comment": "Well done" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["message"], "Submission approved");

    let req = test::TestRequest::get().uri("/api/my-submissions").insert_header(bearer(&jane)).to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine[0]["status"], "Approved");
}

#[actix_web::test]
async fn payslip_is_a_pdf_attachment() {
    let state = state().await;
    let app = test_app!(state);
    let admin = login!(app, ADMIN_EMAIL, ADMIN_PASSWORD);
    create_user!(app, admin, "Jane Doe", "jane@example.com", "Employee");
    let jane = login!(app, "jane@example.com", "password123");

    let add = || {
        test::TestRequest::post()
            .uri("/api/salary/add")
            .insert_header(bearer(&admin))
            .set_json(json!({
                "employee_id": "EMP0002", "salary_month": "2026-01",
                "basic_salary": 5000.0, "bonus": 500.0, "deductions": 250.0
            }))
            .to_request()
    };
    assert_eq!(test::call_service(&app, add()).await.status(), StatusCode::CREATED);
    assert_eq!(test::call_service(&app, add()).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get()
        .uri("/api/salary/my-records/payslip?month=2026-01")
        .insert_header(bearer(&jane))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "application/pdf");
    let disposition = resp.headers().get("content-disposition").unwrap().to_str().unwrap().to_string();
    assert!(disposition.contains("Payslip_EMP0002_2026-01.pdf"));
    let bytes = test::read_body(resp).await;
    assert!(bytes.starts_with(b"%PDF"));

    let req = test::TestRequest::get()
        .uri("/api/salary/my-records/payslip?month=2025-12")
        .insert_header(bearer(&jane))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/salary/my-records").insert_header(bearer(&jane)).to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["net_salary"], 5250.0);
}

#[actix_web::test]
async fn dashboard_counts_active_staff() {
    let state = state().await;
    let app = test_app!(state);
    let admin = login!(app, ADMIN_EMAIL, ADMIN_PASSWORD);
    create_user!(app, admin, "Jane Doe", "jane@example.com", "Employee");
    create_user!(app, admin, "Sam Lee", "sam@example.com", "Manager");

    let req = test::TestRequest::get()
        .uri("/api/dashboard/department-counts")
        .insert_header(bearer(&admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["Engineering"], 2);

    let req = test::TestRequest::get()
        .uri("/api/dashboard/employee-growth?limit=abc")
        .insert_header(bearer(&admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/attendance/weekly-chart")
        .insert_header(bearer(&admin))
        .to_request();
    let chart: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(chart.as_array().map(Vec::len), Some(7));
}

#[actix_web::test]
async fn profiles_follow_role_gates() {
    let state = state().await;
    let app = test_app!(state);
    let admin = login!(app, ADMIN_EMAIL, ADMIN_PASSWORD);

    let jane_id = create_user!(app, admin, "Jane Doe", "jane@example.com", "Employee");
    let manager_id = create_user!(app, admin, "Mia Lee", "mia@example.com", "Manager");
    let jane = login!(app, "jane@example.com", "password123");
    let manager = login!(app, "mia@example.com", "password123");

    // profile rows come with the account, so the first write is an update
    let req = test::TestRequest::put()
        .uri(&format!("/api/profile/{jane_id}"))
        .insert_header(bearer(&jane))
        .set_json(json!({ "personal_details": { "dob": "1992-05-10" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Profile updated successfully");

    let req = test::TestRequest::get()
        .uri(&format!("/api/profile/{jane_id}"))
        .insert_header(bearer(&manager))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["personal_details"]["dob"], "1992-05-10");

    let req = test::TestRequest::get()
        .uri(&format!("/api/profile/{manager_id}"))
        .insert_header(bearer(&jane))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri(&format!("/api/profile/{manager_id}"))
        .insert_header(bearer(&jane))
        .set_json(json!({ "dependents": [] }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri(&format!("/api/profile/{jane_id}"))
        .insert_header(bearer(&jane))
        .set_json(json!({ "dependents": { "name": "Sam" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["dependents"].is_array());

    let req = test::TestRequest::put()
        .uri("/api/profile/EMP0999")
        .insert_header(bearer(&admin))
        .set_json(json!({}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri("/api/profiles?key=jane")
        .insert_header(bearer(&manager))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/profiles?key=jane")
        .insert_header(bearer(&admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["employee_id"], jane_id.as_str());
}

#[actix_web::test]
async fn refresh_token_cannot_call_the_api() {
    let state = state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let refresh = body["refresh_token"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri("/api/users/me")
        .insert_header(bearer(refresh))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Access token required");

    let access = login!(app, ADMIN_EMAIL, ADMIN_PASSWORD);
    let req = test::TestRequest::get()
        .uri("/api/users/me")
        .insert_header(bearer(&access))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}
