pub mod auth;
pub mod catalog;
pub mod error;

pub use catalog::{AppointmentStatus, ClinicService};
pub use error::{AppError, FieldError};
