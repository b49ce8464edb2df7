// libs/availability-cell/src/router.rs
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AvailabilityState;

pub fn availability_routes(state: AvailabilityState) -> Router {
    let public_routes = Router::new()
        .route("/slots", get(handlers::get_slots))
        .route("/services", get(handlers::list_services));

    // Doctor console
    let protected_routes = Router::new()
        .route("/schedule", get(handlers::get_schedule))
        .route("/rules", put(handlers::replace_weekly_rules))
        .route("/exceptions", post(handlers::add_exception))
        .route("/exceptions/{exception_id}", delete(handlers::delete_exception))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
