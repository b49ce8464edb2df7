// libs/appointment-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentState;

pub fn appointment_routes(state: AppointmentState) -> Router {
    // Patients book and report payments without an account session
    let public_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}/payment", post(handlers::submit_payment))
        .route("/sign-in", post(handlers::patient_sign_in));

    // Patient portal and doctor console
    let protected_routes = Router::new()
        .route("/mine", get(handlers::my_appointments))
        .route("/", get(handlers::list_appointments))
        .route("/summary", get(handlers::get_summary))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/verify", post(handlers::verify_payment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/meeting-link", put(handlers::set_meeting_link))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
