use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Directory reads are public; browsing doctors requires no account
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/specializations", get(handlers::get_specializations))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots));

    // Directory writes are admin-only; the handlers enforce the role
    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/{doctor_id}", patch(handlers::update_doctor))
        .route("/{doctor_id}", delete(handlers::delete_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
