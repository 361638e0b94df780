pub mod batches;
pub mod dashboard;
pub mod imports;
pub mod users;

use axum::Router;
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(users::routes())
        .merge(batches::routes())
        .merge(dashboard::routes())
        .merge(imports::routes())
}
