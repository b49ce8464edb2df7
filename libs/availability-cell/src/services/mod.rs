pub mod schedule;
pub mod slots;
pub mod store;

pub use schedule::ScheduleService;
pub use slots::{resolve_slots, SlotService};
pub use store::ScheduleStore;
