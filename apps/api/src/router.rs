use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::services::Notifier;
use appointment_cell::{appointment_routes, AppointmentState, BookingStore};
use availability_cell::{availability_routes, AvailabilityState, ScheduleStore};
use shared_config::AppConfig;
use shared_utils::ClinicClock;

pub fn create_router(
    config: Arc<AppConfig>,
    bookings: Arc<dyn BookingStore>,
    schedule: Arc<dyn ScheduleStore>,
    notifier: Arc<dyn Notifier>,
    clock: ClinicClock,
) -> Router {
    let availability = AvailabilityState::new(config.clone(), schedule.clone(), clock.clone());
    let appointments = AppointmentState::new(config, bookings, schedule, notifier, clock);

    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .nest("/availability", availability_routes(availability))
        .nest("/appointments", appointment_routes(appointments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use appointment_cell::services::LogNotifier;
    use appointment_cell::MemoryClinicStore;

    fn app() -> Router {
        let config = Arc::new(AppConfig::default());
        let store = Arc::new(MemoryClinicStore::with_demo_data());
        let clock = ClinicClock::system(config.clinic_offset());
        create_router(config, store.clone(), store, Arc::new(LogNotifier), clock)
    }

    #[tokio::test]
    async fn cells_are_mounted() {
        let services = app()
            .oneshot(Request::builder().uri("/availability/services").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(services.status(), StatusCode::OK);

        let console = app()
            .oneshot(Request::builder().uri("/appointments/summary").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(console.status(), StatusCode::UNAUTHORIZED);
    }
}
