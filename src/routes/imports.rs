use axum::{routing::{get, post}, Router};
use crate::state::AppState;
use crate::handlers::import::{export_batches, import_batches};
use crate::middleware::auth::require_auth;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/import", post(import_batches))
        .route("/export", get(export_batches))
        .route_layer(axum::middleware::from_fn(require_auth))
}
