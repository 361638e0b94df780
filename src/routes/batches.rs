use axum::{
    routing::{get, post, put},
    Router,
};
use crate::state::AppState;
use crate::handlers::batch::{create_batch, delete_batch, get_batch, list_batches, update_batch};
use crate::handlers::returns::{add_return, delete_return, update_return};
use crate::middleware::auth::require_auth;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/batches", get(list_batches).post(create_batch))
        .route(
            "/batches/{id}",
            get(get_batch).put(update_batch).delete(delete_batch),
        )
        .route("/batches/{id}/returns", post(add_return))
        .route(
            "/batches/{id}/returns/{index}",
            put(update_return).delete(delete_return),
        )
        .route_layer(axum::middleware::from_fn(require_auth))
}
