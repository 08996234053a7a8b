use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn stis_service_routes(state: Arc<AppState>) -> Router {
    // The active catalogue is public
    let public_routes = Router::new()
        .route("/", get(handlers::list_services))
        .route("/{service_id}", get(handlers::get_service));

    let protected_routes = Router::new()
        .route("/all", get(handlers::list_all_services))
        .route("/", post(handlers::create_service))
        .route("/{service_id}", put(handlers::update_service))
        .route("/{service_id}", delete(handlers::deactivate_service))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn stis_booking_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::search_bookings))
        .route("/", post(handlers::create_booking))
        .route("/history", get(handlers::booking_history))
        .route("/check-limit", get(handlers::check_limit))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}", put(handlers::update_booking))
        .route("/{booking_id}", delete(handlers::delete_booking))
        .route("/{booking_id}/mark-confirmed", put(handlers::mark_confirmed))
        .route("/{booking_id}/mark-pending-test-result", put(handlers::mark_pending_test_result))
        .route("/{booking_id}/mark-cancelled", put(handlers::mark_cancelled))
        .route("/{booking_id}/mark-completed", put(handlers::mark_completed))
        .route("/{booking_id}/mark-no-show", put(handlers::mark_no_show))
        .route("/{booking_id}/deny", put(handlers::deny_booking))
        .route("/{booking_id}/feedback", post(handlers::submit_feedback))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

pub fn stis_result_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/return/{booking_id}", post(handlers::return_result))
        .route("/by-booking/{booking_id}", get(handlers::result_by_booking))
        .route("/all", get(handlers::list_results))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

pub fn stis_feedback_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/service/{service_id}", get(handlers::service_feedback))
        .route("/service/{service_id}/summary", get(handlers::service_rating_summary))
        .with_state(state)
}
