use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn consultant_profile_routes(state: Arc<AppState>) -> Router {
    // Directory lookups need no account
    let public_routes = Router::new()
        .route("/search", get(handlers::search_profiles))
        .route("/{consultant_id}", get(handlers::get_profile));

    let protected_routes = Router::new()
        .route(
            "/",
            get(handlers::get_own_profile)
                .post(handlers::create_own_profile)
                .put(handlers::update_own_profile)
                .delete(handlers::delete_own_profile),
        )
        .route("/all", get(handlers::list_profiles))
        .route(
            "/{consultant_id}/employment-status",
            put(handlers::update_employment_status),
        )
        .route("/{consultant_id}/hourly-rate", put(handlers::update_hourly_rate))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
