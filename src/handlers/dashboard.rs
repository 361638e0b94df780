use axum::extract::{Extension, Query, State};
use axum::Json;

use crate::dates::today;
use crate::dtos::dashboard::{DashboardQuery, DashboardResponse};
use crate::error::AppError;
use crate::handlers::batch::fetch_all_owned;
use crate::middleware::auth::AuthContext;
use crate::models::dashboard::{aggregate, rank_workshops, resolve_bounds, Filters};
use crate::state::AppState;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn get_dashboard(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    if !auth.is_admin {
        return Err(AppError::forbidden("Dashboard is restricted to the administrator"));
    }

    let batches = fetch_all_owned(&db_pool, auth.user_id).await?;
    let now = today();
    let (start, end) = resolve_bounds(params.period, now, params.start, params.end);
    let filters = Filters {
        collection: non_empty(params.collection),
        fabric: non_empty(params.fabric),
        workshop: non_empty(params.workshop),
    };

    let (totals, workshops) = aggregate(&batches, &filters, start, end, now);
    let ranking = rank_workshops(workshops, &params.search, params.sort);

    Ok(Json(DashboardResponse { totals, ranking }))
}
