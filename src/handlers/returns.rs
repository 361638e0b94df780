use axum::extract::{Extension, Path, State};
use axum::Json;
use chrono::Utc;
use sqlx::PgPool;

use crate::dates::{parse_date_value, today};
use crate::dtos::batch::{BatchResponse, ReturnPayload};
use crate::error::AppError;
use crate::handlers::batch::fetch_owned_batch;
use crate::middleware::auth::AuthContext;
use crate::models::batch::{recompute, Batch, BatchStatus, ReturnEntry};
use crate::state::AppState;

fn validated_fields(payload: &ReturnPayload) -> Result<(i32, i32), AppError> {
    let quantity = payload.quantity.unwrap_or(0);
    let waste = payload.waste.unwrap_or(0);
    if quantity < 0 || waste < 0 {
        return Err(AppError::validation("quantity and waste must be non-negative"));
    }
    Ok((quantity, waste))
}

/// Writes the next full derived state (ledger + totals + status) as one
/// atomic update, guarded by the revision the ledger was read at.
async fn write_ledger(
    db_pool: &PgPool,
    mut batch: Batch,
    returns: Vec<ReturnEntry>,
) -> Result<Batch, AppError> {
    let totals = recompute(batch.quantity_sent, &returns);
    let ledger_json = serde_json::to_value(&returns)
        .map_err(|e| AppError::internal(format!("Ledger serialization failed: {e}")))?;

    let result = sqlx::query(
        r#"UPDATE production_batches
           SET returns = $1, total_received = $2, total_waste = $3,
               status = $4, revision = revision + 1
           WHERE id = $5 AND owner_id = $6 AND revision = $7"#,
    )
    .bind(&ledger_json)
    .bind(totals.total_received)
    .bind(totals.total_waste)
    .bind(totals.status.as_str())
    .bind(batch.id)
    .bind(batch.owner_id)
    .bind(batch.revision)
    .execute(db_pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::conflict("Batch was modified concurrently"));
    }

    batch.returns = returns;
    batch.total_received = totals.total_received;
    batch.total_waste = totals.total_waste;
    batch.status = totals.status;
    batch.revision += 1;
    Ok(batch)
}

/// Records one delivery against a batch. Rejected once the batch is
/// Completed.
pub async fn add_return(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(payload): Json<ReturnPayload>,
) -> Result<Json<BatchResponse>, AppError> {
    let batch = fetch_owned_batch(&db_pool, auth.user_id, id).await?;
    if batch.status == BatchStatus::Completed {
        return Err(AppError::conflict("Batch is already completed"));
    }

    let (quantity, waste) = validated_fields(&payload)?;
    let mut returns = batch.returns.clone();
    returns.push(ReturnEntry {
        id: format!("{}-{}", Utc::now().timestamp_millis(), returns.len()),
        quantity,
        waste,
        date: parse_date_value(payload.date.as_ref()),
        notes: payload.notes.as_deref().unwrap_or("").trim().to_uppercase(),
    });

    let batch = write_ledger(&db_pool, batch, returns).await?;
    Ok(Json(BatchResponse::from_batch(batch, today())))
}

/// Replaces the delivery at a ledger position, keeping its identity.
pub async fn update_return(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, index)): Path<(i64, usize)>,
    Json(payload): Json<ReturnPayload>,
) -> Result<Json<BatchResponse>, AppError> {
    let batch = fetch_owned_batch(&db_pool, auth.user_id, id).await?;
    let mut returns = batch.returns.clone();
    let entry = returns
        .get_mut(index)
        .ok_or_else(|| AppError::not_found("No return at this position"))?;

    let (quantity, waste) = validated_fields(&payload)?;
    entry.quantity = quantity;
    entry.waste = waste;
    entry.date = parse_date_value(payload.date.as_ref());
    entry.notes = payload.notes.as_deref().unwrap_or("").trim().to_uppercase();

    let batch = write_ledger(&db_pool, batch, returns).await?;
    Ok(Json(BatchResponse::from_batch(batch, today())))
}

/// Removes the delivery at a ledger position. May drive the status backward
/// from Completed; the recompute handles that.
pub async fn delete_return(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, index)): Path<(i64, usize)>,
) -> Result<Json<BatchResponse>, AppError> {
    let batch = fetch_owned_batch(&db_pool, auth.user_id, id).await?;
    if index >= batch.returns.len() {
        return Err(AppError::not_found("No return at this position"));
    }
    let mut returns = batch.returns.clone();
    returns.remove(index);

    let batch = write_ledger(&db_pool, batch, returns).await?;
    Ok(Json(BatchResponse::from_batch(batch, today())))
}
