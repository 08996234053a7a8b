use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn consultation_routes(state: Arc<AppState>) -> Router {
    // Every consultation operation needs a signed-in account
    let protected_routes = Router::new()
        .route("/", post(handlers::create_booking))
        .route("/history", get(handlers::booking_history))
        .route("/search", get(handlers::search_bookings))
        .route("/schedule/{consultant_id}", get(handlers::consultant_schedule))
        .route("/calendar/{consultant_id}", get(handlers::consultant_calendar))
        .route("/feedback/consultant/{consultant_id}", get(handlers::consultant_feedback))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}", delete(handlers::delete_booking))
        .route("/{booking_id}/confirm", put(handlers::confirm_booking))
        .route("/{booking_id}/cancel", put(handlers::cancel_booking))
        .route("/{booking_id}/deny", put(handlers::deny_booking))
        .route("/{booking_id}/complete", put(handlers::complete_booking))
        .route("/{booking_id}/no-show", put(handlers::mark_no_show))
        .route("/{booking_id}/reschedule", put(handlers::reschedule_booking))
        .route("/{booking_id}/meeting-link", put(handlers::attach_meeting_link))
        .route("/{booking_id}/feedback", post(handlers::submit_feedback))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
