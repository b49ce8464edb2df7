// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_doctor, require_patient};

use crate::models::{
    AppointmentFilter, BookingRequest, ManualPaymentDetails, MeetingLinkRequest, SignInRequest, VerifyPaymentRequest,
};
use crate::state::AppointmentState;

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let receipt = state.admission().admit(request).await?;

    Ok((StatusCode::CREATED, Json(json!(receipt))))
}

#[axum::debug_handler]
pub async fn submit_payment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Json(details): Json<ManualPaymentDetails>,
) -> Result<Json<Value>, AppError> {
    let payment = state.payments().submit_manual_payment(appointment_id, details).await?;

    Ok(Json(json!({
        "payment": payment,
        "message": "Payment details submitted for verification"
    })))
}

#[axum::debug_handler]
pub async fn patient_sign_in(
    State(state): State<AppointmentState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<Value>, AppError> {
    let session = state.portal().sign_in(request).await?;

    Ok(Json(json!(session)))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let email = require_patient(&user)?;

    let appointments = state.portal().appointments(email).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// DOCTOR CONSOLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let appointments = state.console().appointments(&filter).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_summary(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let summary = state.console().summary(state.clock.today()).await?;

    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let detail = state.console().appointment(appointment_id).await?;
    let attempts = state.bookings.payment_attempts(appointment_id).await?;
    let audit = state.bookings.audit_trail(appointment_id).await?;

    Ok(Json(json!({
        "appointment": detail,
        "paymentAttempts": attempts,
        "auditTrail": audit
    })))
}

#[axum::debug_handler]
pub async fn verify_payment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let verified = state
        .payments()
        .verify(appointment_id, request.action, request.notes)
        .await?;

    Ok(Json(json!({
        "appointment": verified.appointment,
        "payment": verified.payment
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let appointment = state.lifecycle().complete(appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let appointment = state.lifecycle().cancel(appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn set_meeting_link(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<MeetingLinkRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let appointment = state.lifecycle().set_meeting_link(appointment_id, request.link).await?;

    Ok(Json(json!(appointment)))
}
