use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use doctor_cell::router::doctor_routes;
use shared_config::AppConfig;
use user_cell::router::user_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/users", user_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state));

    Router::new()
        .route("/", get(|| async { "Medibook API is running!" }))
        .nest("/api/v1", api)
}
