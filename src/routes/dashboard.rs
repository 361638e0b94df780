use axum::{routing::get, Router};
use crate::state::AppState;
use crate::handlers::dashboard::get_dashboard;
use crate::middleware::auth::require_auth;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route_layer(axum::middleware::from_fn(require_auth))
}
