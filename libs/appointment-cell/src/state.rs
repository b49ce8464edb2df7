use std::sync::Arc;

use availability_cell::ScheduleStore;
use shared_config::AppConfig;
use shared_utils::ClinicClock;

use crate::models::IdentityPolicy;
use crate::services::{
    AdmissionService, ConsoleService, CredentialHasher, LifecycleService, Notifier, PatientPortal, PaymentService,
    TelemedicineProvider,
};
use crate::store::BookingStore;

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub bookings: Arc<dyn BookingStore>,
    pub schedule: Arc<dyn ScheduleStore>,
    pub notifier: Arc<dyn Notifier>,
    pub hasher: CredentialHasher,
    pub clock: ClinicClock,
}

impl AppointmentState {
    pub fn new(
        config: Arc<AppConfig>,
        bookings: Arc<dyn BookingStore>,
        schedule: Arc<dyn ScheduleStore>,
        notifier: Arc<dyn Notifier>,
        clock: ClinicClock,
    ) -> Self {
        Self {
            config,
            bookings,
            schedule,
            notifier,
            hasher: CredentialHasher::default(),
            clock,
        }
    }

    pub fn with_hasher(mut self, hasher: CredentialHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn admission(&self) -> AdmissionService {
        AdmissionService::new(
            self.bookings.clone(),
            self.hasher.clone(),
            IdentityPolicy::from_config(self.config.allow_email_account_claim),
            self.clock.offset(),
        )
    }

    pub fn payments(&self) -> PaymentService {
        PaymentService::new(self.bookings.clone(), self.notifier.clone())
    }

    pub fn lifecycle(&self) -> LifecycleService {
        LifecycleService::new(
            self.bookings.clone(),
            self.notifier.clone(),
            TelemedicineProvider::new(&self.config),
        )
    }

    pub fn portal(&self) -> PatientPortal {
        PatientPortal::new(
            self.bookings.clone(),
            self.schedule.clone(),
            self.hasher.clone(),
            self.config.supabase_jwt_secret.clone(),
        )
    }

    pub fn console(&self) -> ConsoleService {
        ConsoleService::new(self.bookings.clone(), self.schedule.clone())
    }
}
