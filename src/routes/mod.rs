pub mod auth;
pub mod carpools;
pub mod ride_requests;

use axum::Router;
use tower_http::services::ServeDir;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/ride-requests", ride_requests::router())
        .nest("/api/carpools", carpools::router())
        .fallback_service(ServeDir::new(state.config.spa_root.clone()))
        .with_state(state)
}
