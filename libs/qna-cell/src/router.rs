use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn question_routes(state: Arc<AppState>) -> Router {
    // Answered questions are readable without an account
    let public_routes = Router::new()
        .route("/", get(handlers::list_questions))
        .route("/{question_id}", get(handlers::get_question));

    let protected_routes = Router::new()
        .route("/", post(handlers::ask_question))
        .route("/mine", get(handlers::my_questions))
        .route("/{question_id}", delete(handlers::delete_question))
        .route("/{question_id}/answer", put(handlers::answer_question))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
