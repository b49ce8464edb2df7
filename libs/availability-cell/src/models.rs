// libs/availability-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::{AppError, FieldError};
use shared_utils::time_format::{hhmm, hhmm_option};

// ==============================================================================
// SCHEDULE MODELS
// ==============================================================================

/// Recurring opening hours for one weekday. Several rules per day are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyRule {
    pub id: Uuid,
    pub day_of_week: u8, // 0 = Sunday, 1 = Monday, etc.
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWeeklyRule {
    pub day_of_week: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

impl NewWeeklyRule {
    pub fn into_rule(self, id: Uuid) -> WeeklyRule {
        WeeklyRule {
            id,
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Override for one calendar date: a blocked day, or an open day with optional custom hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateException {
    pub id: Uuid,
    pub date: NaiveDate,
    pub is_available: bool,
    #[serde(default, with = "hhmm_option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm_option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl DateException {
    /// Custom hours replace the weekday's rules only when both ends are present.
    pub fn custom_hours(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDateException {
    pub date: NaiveDate,
    pub is_available: bool,
    #[serde(default, with = "hhmm_option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm_option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl NewDateException {
    pub fn into_exception(self, id: Uuid) -> DateException {
        DateException {
            id,
            date: self.date,
            is_available: self.is_available,
            start_time: self.start_time,
            end_time: self.end_time,
            reason: self.reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub weekly_rules: Vec<WeeklyRule>,
    pub exceptions: Vec<DateException>,
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

/// Time range of an appointment that already holds part of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedRange {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_available: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AvailabilityError {
    #[error("Invalid availability input: {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Availability conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<AvailabilityError> for AppError {
    fn from(error: AvailabilityError) -> Self {
        match error {
            AvailabilityError::Validation(fields) => AppError::ValidationError(fields),
            AvailabilityError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            AvailabilityError::Conflict(msg) => AppError::Conflict(msg),
            AvailabilityError::Store(msg) => AppError::Database(msg),
        }
    }
}
