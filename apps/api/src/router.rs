use std::sync::Arc;

use axum::{routing::get, Router};

use booking_cell::consultation_routes;
use consultant_cell::consultant_profile_routes;
use menstrual_cell::menstrual_routes;
use qna_cell::question_routes;
use shared_utils::AppState;
use stis_cell::{stis_booking_routes, stis_feedback_routes, stis_result_routes, stis_service_routes};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Gender Health Care API is running!" }))
        .nest("/api/consultant-bookings", consultation_routes(state.clone()))
        .nest("/api/stis-services", stis_service_routes(state.clone()))
        .nest("/api/stis-bookings", stis_booking_routes(state.clone()))
        .nest("/api/stis-results", stis_result_routes(state.clone()))
        .nest("/api/stis-feedback", stis_feedback_routes(state.clone()))
        .nest("/api/consultant/profile", consultant_profile_routes(state.clone()))
        .nest("/api/menstrual", menstrual_routes(state.clone()))
        .nest("/api/questions", question_routes(state))
}
