use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::dates::{parse_date_value, today};
use crate::dtos::batch::{BatchListQuery, BatchPayload, BatchResponse, ProductionSort};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::batch::{normalize_price, recompute, Batch, BatchStatus, ReturnEntry};
use crate::state::AppState;

/// Maps a `production_batches` row, including the JSONB returns ledger.
pub(crate) fn batch_from_row(row: &PgRow) -> Result<Batch, AppError> {
    let status_str: String = row.get("status");
    let status = BatchStatus::parse(&status_str)
        .ok_or_else(|| AppError::internal(format!("Unknown stored status '{status_str}'")))?;
    let returns: Vec<ReturnEntry> = serde_json::from_value(row.get("returns"))
        .map_err(|e| AppError::internal(format!("Corrupt returns ledger: {e}")))?;

    Ok(Batch {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        collection_name: row.get("collection_name"),
        workshop: row.get("workshop"),
        ref_code: row.get("ref_code"),
        price: row.get("price"),
        fabric_type: row.get("fabric_type"),
        quantity_sent: row.get("quantity_sent"),
        date_sent: row.get("date_sent"),
        date_expected: row.get("date_expected"),
        status,
        total_received: row.get("total_received"),
        total_waste: row.get("total_waste"),
        returns,
        revision: row.get("revision"),
        created_at: row.get("created_at"),
    })
}

pub(crate) async fn fetch_owned_batch(
    db_pool: &PgPool,
    owner_id: i64,
    id: i64,
) -> Result<Batch, AppError> {
    let row = sqlx::query("SELECT * FROM production_batches WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Batch not found"))?;
    batch_from_row(&row)
}

pub(crate) async fn fetch_all_owned(
    db_pool: &PgPool,
    owner_id: i64,
) -> Result<Vec<Batch>, AppError> {
    let rows = sqlx::query(
        "SELECT * FROM production_batches WHERE owner_id = $1 ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(db_pool)
    .await?;
    rows.iter().map(batch_from_row).collect()
}

fn normalized_payload(payload: &BatchPayload) -> Result<BatchPayload, AppError> {
    if payload.quantity_sent < 0 {
        return Err(AppError::validation("quantity_sent must be non-negative"));
    }
    if payload.collection_name.trim().is_empty()
        || payload.workshop.trim().is_empty()
        || payload.ref_code.trim().is_empty()
    {
        return Err(AppError::validation(
            "collection_name, workshop and ref_code are required",
        ));
    }
    Ok(BatchPayload {
        collection_name: payload.collection_name.trim().to_uppercase(),
        workshop: payload.workshop.trim().to_uppercase(),
        ref_code: payload.ref_code.trim().to_uppercase(),
        price: normalize_price(payload.price),
        fabric_type: Some(
            payload
                .fabric_type
                .as_deref()
                .filter(|f| !f.trim().is_empty())
                .unwrap_or("OUTRO")
                .trim()
                .to_uppercase(),
        ),
        quantity_sent: payload.quantity_sent,
        date_sent: payload.date_sent.clone(),
        date_expected: payload.date_expected.clone(),
    })
}

pub async fn list_batches(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<BatchListQuery>,
) -> Result<Json<Vec<BatchResponse>>, AppError> {
    let batches = fetch_all_owned(&db_pool, auth.user_id).await?;
    let now = today();
    let search = params.search.as_deref().map(str::to_uppercase);

    let mut filtered: Vec<Batch> = batches
        .into_iter()
        .filter(|b| {
            params.collection.as_deref().map_or(true, |c| b.collection_name == c)
                && params.workshop.as_deref().map_or(true, |w| b.workshop == w)
                && params.date_sent.map_or(true, |d| b.date_sent == d)
                && params.date_expected.map_or(true, |d| b.date_expected == d)
                && search.as_deref().map_or(true, |s| {
                    b.ref_code.contains(s) || b.workshop.contains(s)
                })
                && (!params.only_late || b.is_late(now))
        })
        .collect();

    match params.sort {
        ProductionSort::CreatedDesc => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        ProductionSort::SentAsc => filtered.sort_by(|a, b| a.date_sent.cmp(&b.date_sent)),
        ProductionSort::SentDesc => filtered.sort_by(|a, b| b.date_sent.cmp(&a.date_sent)),
        ProductionSort::ExpectedAsc => {
            filtered.sort_by(|a, b| a.date_expected.cmp(&b.date_expected))
        }
        ProductionSort::ExpectedDesc => {
            filtered.sort_by(|a, b| b.date_expected.cmp(&a.date_expected))
        }
    }

    Ok(Json(
        filtered
            .into_iter()
            .map(|b| BatchResponse::from_batch(b, now))
            .collect(),
    ))
}

pub async fn get_batch(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<BatchResponse>, AppError> {
    let batch = fetch_owned_batch(&db_pool, auth.user_id, id).await?;
    Ok(Json(BatchResponse::from_batch(batch, today())))
}

pub async fn create_batch(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<BatchPayload>,
) -> Result<(StatusCode, Json<BatchResponse>), AppError> {
    let payload = normalized_payload(&payload)?;
    let date_sent = parse_date_value(payload.date_sent.as_ref());
    let date_expected = parse_date_value(payload.date_expected.as_ref());

    let row = sqlx::query(
        r#"INSERT INTO production_batches
            (owner_id, collection_name, workshop, ref_code, price, fabric_type,
             quantity_sent, date_sent, date_expected, status, total_received,
             total_waste, returns)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'Pending', 0, 0, '[]'::jsonb)
           RETURNING *"#,
    )
    .bind(auth.user_id)
    .bind(&payload.collection_name)
    .bind(&payload.workshop)
    .bind(&payload.ref_code)
    .bind(payload.price)
    .bind(payload.fabric_type.as_deref().unwrap_or("OUTRO"))
    .bind(payload.quantity_sent)
    .bind(date_sent)
    .bind(date_expected)
    .fetch_one(&db_pool)
    .await?;

    let batch = batch_from_row(&row)?;
    Ok((StatusCode::CREATED, Json(BatchResponse::from_batch(batch, today()))))
}

/// Edits a batch's scalar fields. The ledger is untouched, but the derived
/// fields are recomputed over it since `quantity_sent` may have changed.
pub async fn update_batch(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(payload): Json<BatchPayload>,
) -> Result<Json<BatchResponse>, AppError> {
    let payload = normalized_payload(&payload)?;
    let mut batch = fetch_owned_batch(&db_pool, auth.user_id, id).await?;

    let date_sent = parse_date_value(payload.date_sent.as_ref());
    let date_expected = parse_date_value(payload.date_expected.as_ref());
    let totals = recompute(payload.quantity_sent, &batch.returns);

    let result = sqlx::query(
        r#"UPDATE production_batches
           SET collection_name = $1, workshop = $2, ref_code = $3, price = $4,
               fabric_type = $5, quantity_sent = $6, date_sent = $7,
               date_expected = $8, status = $9, total_received = $10,
               total_waste = $11, revision = revision + 1
           WHERE id = $12 AND owner_id = $13 AND revision = $14"#,
    )
    .bind(&payload.collection_name)
    .bind(&payload.workshop)
    .bind(&payload.ref_code)
    .bind(payload.price)
    .bind(payload.fabric_type.as_deref().unwrap_or("OUTRO"))
    .bind(payload.quantity_sent)
    .bind(date_sent)
    .bind(date_expected)
    .bind(totals.status.as_str())
    .bind(totals.total_received)
    .bind(totals.total_waste)
    .bind(id)
    .bind(auth.user_id)
    .bind(batch.revision)
    .execute(&db_pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::conflict("Batch was modified concurrently"));
    }

    batch.collection_name = payload.collection_name;
    batch.workshop = payload.workshop;
    batch.ref_code = payload.ref_code;
    batch.price = payload.price;
    batch.fabric_type = payload.fabric_type.unwrap_or_else(|| "OUTRO".to_string());
    batch.quantity_sent = payload.quantity_sent;
    batch.date_sent = date_sent;
    batch.date_expected = date_expected;
    batch.status = totals.status;
    batch.total_received = totals.total_received;
    batch.total_waste = totals.total_waste;
    batch.revision += 1;

    Ok(Json(BatchResponse::from_batch(batch, today())))
}

/// Deletes a batch; its ledger goes with the row.
pub async fn delete_batch(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM production_batches WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(auth.user_id)
        .execute(&db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Batch not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
