use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn user_routes(state: Arc<AppConfig>) -> Router {
    // All user operations require authentication; role checks live in the handlers
    let protected_routes = Router::new()
        .route("/", post(handlers::create_user))
        .route("/", get(handlers::list_users))
        .route("/profile", get(handlers::get_profile))
        .route("/profile", patch(handlers::update_profile))
        .route("/{user_id}", get(handlers::get_user))
        .route("/{user_id}", patch(handlers::update_user))
        .route("/{user_id}", delete(handlers::delete_user))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
