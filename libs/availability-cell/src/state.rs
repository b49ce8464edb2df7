use std::sync::Arc;

use shared_config::AppConfig;
use shared_utils::ClinicClock;

use crate::services::ScheduleStore;

#[derive(Clone)]
pub struct AvailabilityState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ScheduleStore>,
    pub clock: ClinicClock,
}

impl AvailabilityState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn ScheduleStore>, clock: ClinicClock) -> Self {
        Self { config, store, clock }
    }
}
