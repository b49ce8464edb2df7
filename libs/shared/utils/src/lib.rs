pub mod clock;
pub mod extractor;
pub mod jwt;
pub mod test_utils;
pub mod time_format;

pub use clock::{ClinicClock, Clock, FixedClock, SystemClock};
