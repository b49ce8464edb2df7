// libs/availability-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_doctor;
use shared_utils::time_format::parse_calendar_date;

use crate::models::{NewDateException, NewWeeklyRule, Slot};
use crate::services::{ScheduleService, SlotService};
use crate::state::AvailabilityState;

// ==============================================================================
// REQUEST STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotQuery {
    pub service_id: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRulesRequest {
    pub rules: Vec<NewWeeklyRule>,
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_slots(
    State(state): State<AvailabilityState>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Vec<Slot>>, AppError> {
    let (service_id, date) = match (query.service_id.as_deref(), query.date.as_deref()) {
        (Some(service_id), Some(date)) if !service_id.is_empty() && !date.is_empty() => (service_id, date),
        _ => return Err(AppError::BadRequest("Missing parameters".to_string())),
    };

    let service_id = Uuid::parse_str(service_id)
        .map_err(|_| AppError::BadRequest("Invalid serviceId".to_string()))?;
    let date = parse_calendar_date(date, state.clock.offset())
        .ok_or_else(|| AppError::BadRequest("Invalid date, expected YYYY-MM-DD".to_string()))?;

    let service = SlotService::new(state.store.clone(), state.clock.clone());
    let slots = service.slots_for(service_id, date).await?;

    Ok(Json(slots))
}

#[axum::debug_handler]
pub async fn list_services(
    State(state): State<AvailabilityState>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(state.store.clone());
    let services = service.services().await?;

    Ok(Json(json!({
        "services": services,
        "total": services.len()
    })))
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let service = ScheduleService::new(state.store.clone());
    let schedule = service.schedule().await?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn replace_weekly_rules(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Json(request): Json<ReplaceRulesRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let service = ScheduleService::new(state.store.clone());
    let rules = service.replace_weekly_rules(request.rules).await?;

    Ok(Json(json!({
        "weeklyRules": rules,
        "message": "Weekly schedule updated"
    })))
}

#[axum::debug_handler]
pub async fn add_exception(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Json(request): Json<NewDateException>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_doctor(&user)?;

    let service = ScheduleService::new(state.store.clone());
    let exception = service.add_exception(request).await?;

    Ok((StatusCode::CREATED, Json(json!(exception))))
}

#[axum::debug_handler]
pub async fn delete_exception(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Path(exception_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let service = ScheduleService::new(state.store.clone());
    service.delete_exception(exception_id).await?;

    Ok(Json(json!({
        "message": "Exception removed"
    })))
}
