use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn menstrual_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route(
            "/cycles",
            get(handlers::list_own_cycles).post(handlers::create_cycle),
        )
        .route("/cycles/latest", get(handlers::latest_cycle))
        .route(
            "/cycles/{cycle_id}",
            get(handlers::get_cycle)
                .put(handlers::update_cycle)
                .delete(handlers::delete_cycle),
        )
        .route("/calendar/me", get(handlers::my_calendar))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
