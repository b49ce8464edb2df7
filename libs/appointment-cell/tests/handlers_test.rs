// libs/appointment-cell/tests/handlers_test.rs
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::services::{CredentialHasher, LogNotifier};
use appointment_cell::{appointment_routes, AppointmentState, MemoryClinicStore};
use shared_models::ClinicService;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use shared_utils::ClinicClock;

// ==============================================================================
// TEST FIXTURES
// ==============================================================================

async fn clinic() -> (Router, ClinicService) {
    let store = Arc::new(MemoryClinicStore::with_demo_data());
    let service = store.inspect(|ledger| ledger.services[0].clone()).await;

    let config = TestConfig::default().to_arc();
    let now = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
    let clock = ClinicClock::fixed_local(now, config.clinic_offset());

    let state = AppointmentState::new(config, store.clone(), store, Arc::new(LogNotifier), clock)
        .with_hasher(CredentialHasher::fast());
    (appointment_routes(state), service)
}

fn booking_body(service: &ClinicService, start: &str, end: &str) -> Value {
    json!({
        "serviceId": service.id,
        "date": "2026-03-01",
        "startTime": start,
        "endTime": end,
        "problem": "Fever for three days",
        "name": "Rahim Uddin",
        "email": "rahim@example.com",
        "phone": "01712345678",
        "password": "secret123"
    })
}

fn json_request(method: &str, uri: &str, auth: Option<String>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn doctor_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", JwtTestUtils::doctor_bearer())
        .body(Body::empty())
        .unwrap()
}

fn patient_bearer() -> String {
    let token = JwtTestUtils::create_test_token(
        &TestUser::patient("rahim@example.com"),
        &TestConfig::default().jwt_secret,
        None,
    );
    format!("Bearer {}", token)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn book(app: &Router, service: &ClinicService, start: &str, end: &str) -> Uuid {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/", None, booking_body(service, start, end)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    Uuid::parse_str(body["appointmentId"].as_str().unwrap()).unwrap()
}

async fn submit_payment(app: &Router, id: Uuid) -> StatusCode {
    let body = json!({
        "method": "BKASH",
        "senderNumber": "01812345678",
        "transactionId": "8N7A6B5C4D"
    });
    app.clone()
        .oneshot(json_request("POST", &format!("/{}/payment", id), None, body))
        .await
        .unwrap()
        .status()
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn booking_returns_receipt() {
    let (app, service) = clinic().await;

    let response = app
        .oneshot(json_request("POST", "/", None, booking_body(&service, "19:00", "19:30")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["resumed"], json!(false));
    assert_eq!(body["newPatient"], json!(true));
    assert!(body["patientId"].is_string());
}

#[tokio::test]
async fn double_booking_is_a_conflict() {
    let (app, service) = clinic().await;
    book(&app, &service, "19:00", "19:30").await;

    let mut second = booking_body(&service, "19:00", "19:30");
    second["email"] = json!("karim@example.com");
    let response = app.oneshot(json_request("POST", "/", None, second)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("This slot is already booked or pending verification"));
}

#[tokio::test]
async fn invalid_booking_lists_fields() {
    let (app, service) = clinic().await;

    let mut body = booking_body(&service, "19:30", "19:00");
    body["password"] = json!("123");
    let response = app.oneshot(json_request("POST", "/", None, body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|field| field["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["endTime", "password"]);
}

// ==============================================================================
// PAYMENT AND VERIFICATION
// ==============================================================================

#[tokio::test]
async fn payment_submission_is_public_and_verification_is_not() {
    let (app, service) = clinic().await;
    let id = book(&app, &service, "19:00", "19:30").await;

    assert_eq!(submit_payment(&app, id).await, StatusCode::OK);

    let anonymous = app
        .clone()
        .oneshot(json_request("POST", &format!("/{}/verify", id), None, json!({"action": "APPROVE"})))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let patient = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/{}/verify", id),
            Some(patient_bearer()),
            json!({"action": "APPROVE"}),
        ))
        .await
        .unwrap();
    assert_eq!(patient.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn doctor_approves_payment() {
    let (app, service) = clinic().await;
    let id = book(&app, &service, "19:00", "19:30").await;
    submit_payment(&app, id).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/{}/verify", id),
            Some(JwtTestUtils::doctor_bearer()),
            json!({"action": "APPROVE", "notes": "Matched statement"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appointment"]["status"], json!("CONFIRMED"));
    assert_eq!(body["payment"]["status"], json!("PAID"));

    let detail = body_json(app.oneshot(doctor_get(&format!("/{}", id))).await.unwrap()).await;
    assert_eq!(detail["appointment"]["status"], json!("CONFIRMED"));
    assert_eq!(detail["appointment"]["patient"]["email"], json!("rahim@example.com"));
    assert!(detail["appointment"]["patient"].get("credentialHash").is_none());
    assert_eq!(detail["paymentAttempts"].as_array().unwrap().len(), 1);
    assert_eq!(detail["auditTrail"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn verifying_twice_is_a_conflict() {
    let (app, service) = clinic().await;
    let id = book(&app, &service, "19:00", "19:30").await;
    submit_payment(&app, id).await;

    let verify = || {
        json_request(
            "POST",
            &format!("/{}/verify", id),
            Some(JwtTestUtils::doctor_bearer()),
            json!({"action": "REJECT"}),
        )
    };
    assert_eq!(app.clone().oneshot(verify()).await.unwrap().status(), StatusCode::OK);

    let again = app.oneshot(verify()).await.unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

// ==============================================================================
// PATIENT PORTAL
// ==============================================================================

async fn sign_in(app: &Router, email: &str, password: &str) -> axum::response::Response {
    app.clone()
        .oneshot(json_request("POST", "/sign-in", None, json!({"email": email, "password": password})))
        .await
        .unwrap()
}

#[tokio::test]
async fn patient_signs_in_with_booking_password_and_sees_own_appointments() {
    let (app, service) = clinic().await;
    let own = book(&app, &service, "19:00", "19:30").await;

    let mut other = booking_body(&service, "19:30", "20:00");
    other["email"] = json!("karim@example.com");
    let response = app.clone().oneshot(json_request("POST", "/", None, other)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = sign_in(&app, "Rahim@Example.com", "secret123").await;
    assert_eq!(response.status(), StatusCode::OK);
    let session = body_json(response).await;
    assert_eq!(session["patient"]["email"], json!("rahim@example.com"));
    assert!(session["patient"].get("credentialHash").is_none());
    let bearer = format!("Bearer {}", session["token"].as_str().unwrap());

    let response = app
        .oneshot(Request::builder().uri("/mine").header("Authorization", bearer).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["appointments"][0]["id"], json!(own));
    assert_eq!(body["appointments"][0]["status"], json!("PENDING_PAYMENT"));
    assert_eq!(body["appointments"][0]["service"]["name"], json!(service.name));
    assert_eq!(body["appointments"][0]["payment"]["amount"], json!(service.fee));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_unauthorized() {
    let (app, service) = clinic().await;
    book(&app, &service, "19:00", "19:30").await;

    let wrong = sign_in(&app, "rahim@example.com", "not-my-password").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let unknown = sign_in(&app, "nobody@example.com", "secret123").await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(unknown).await["error"], json!("Invalid email or password"));
}

#[tokio::test]
async fn portal_listing_is_for_patients_only() {
    let (app, _) = clinic().await;

    let anonymous = app
        .clone()
        .oneshot(Request::builder().uri("/mine").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let doctor = app.oneshot(doctor_get("/mine")).await.unwrap();
    assert_eq!(doctor.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn patient_without_bookings_gets_empty_list() {
    let (app, _) = clinic().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/mine")
                .header("Authorization", patient_bearer())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], json!(0));
}

// ==============================================================================
// DOCTOR CONSOLE
// ==============================================================================

#[tokio::test]
async fn console_lists_by_status() {
    let (app, service) = clinic().await;
    let submitted = book(&app, &service, "19:00", "19:30").await;
    book(&app, &service, "19:30", "20:00").await;
    submit_payment(&app, submitted).await;

    let response = app
        .oneshot(doctor_get("/?status=PENDING_VERIFICATION"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["appointments"][0]["id"], json!(submitted));
    assert_eq!(body["appointments"][0]["service"]["name"], json!(service.name));
}

#[tokio::test]
async fn summary_uses_clinic_today() {
    let (app, service) = clinic().await;
    book(&app, &service, "19:00", "19:30").await;

    let response = app.oneshot(doctor_get("/summary")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["date"], json!("2026-03-01"));
    assert_eq!(body["activeToday"], json!(1));
    assert_eq!(body["confirmedRevenue"], json!(0));
}

#[tokio::test]
async fn completing_unconfirmed_appointment_is_a_conflict() {
    let (app, service) = clinic().await;
    let id = book(&app, &service, "19:00", "19:30").await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/{}/complete", id),
            Some(JwtTestUtils::doctor_bearer()),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn meeting_link_is_stored() {
    let (app, service) = clinic().await;
    let id = book(&app, &service, "19:00", "19:30").await;

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/{}/meeting-link", id),
            Some(JwtTestUtils::doctor_bearer()),
            json!({"link": "https://meet.example.com/room-1"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["meetingLink"], json!("https://meet.example.com/room-1"));
}

#[tokio::test]
async fn unknown_appointment_is_not_found() {
    let (app, _) = clinic().await;

    let response = app.oneshot(doctor_get(&format!("/{}", Uuid::new_v4()))).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
