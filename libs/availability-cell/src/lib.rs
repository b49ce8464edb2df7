pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::*;
pub use services::{resolve_slots, ScheduleService, ScheduleStore, SlotService};
pub use state::AvailabilityState;
pub use router::availability_routes;
