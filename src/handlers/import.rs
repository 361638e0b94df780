use axum::extract::{Extension, State};
use axum::Json;

use crate::dtos::import::{ExportRow, ImportRequest, ImportSummary};
use crate::error::AppError;
use crate::handlers::batch::fetch_all_owned;
use crate::middleware::auth::AuthContext;
use crate::models::import::reconcile_row;
use crate::state::AppState;

/// Imports already-parsed spreadsheet rows as new, independent batches.
/// Rows are written strictly one at a time; a malformed or rejected row is
/// counted and skipped, never aborting the rest of the run.
pub async fn import_batches(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<ImportRequest>,
) -> Result<Json<ImportSummary>, AppError> {
    let mut imported = 0usize;
    let mut failed = 0usize;

    for row in &payload.rows {
        let batch = match reconcile_row(row) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(reason = %e.reason, "Skipping import row");
                failed += 1;
                continue;
            }
        };

        let ledger_json = match serde_json::to_value(&batch.returns) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping import row: ledger serialization failed");
                failed += 1;
                continue;
            }
        };

        let result = sqlx::query(
            r#"INSERT INTO production_batches
                (owner_id, collection_name, workshop, ref_code, price, fabric_type,
                 quantity_sent, date_sent, date_expected, status, total_received,
                 total_waste, returns)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(auth.user_id)
        .bind(&batch.collection_name)
        .bind(&batch.workshop)
        .bind(&batch.ref_code)
        .bind(batch.price)
        .bind(&batch.fabric_type)
        .bind(batch.quantity_sent)
        .bind(batch.date_sent)
        .bind(batch.date_expected)
        .bind(batch.status.as_str())
        .bind(batch.total_received)
        .bind(batch.total_waste)
        .bind(&ledger_json)
        .execute(&db_pool)
        .await;

        match result {
            Ok(_) => imported += 1,
            Err(e) => {
                tracing::error!(error = %e, ref_code = %batch.ref_code, "Import row write failed");
                failed += 1;
            }
        }
    }

    tracing::info!(imported, failed, "Import finished");
    Ok(Json(ImportSummary { imported, failed }))
}

/// Flat rows in the legacy spreadsheet layout, ready for the export
/// collaborator to write out.
pub async fn export_batches(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ExportRow>>, AppError> {
    let batches = fetch_all_owned(&db_pool, auth.user_id).await?;

    let rows = batches
        .into_iter()
        .map(|b| ExportRow {
            missing: b.pending_pieces(),
            last_delivery_date: b
                .last_delivery_date()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            collection: b.collection_name,
            workshop: b.workshop,
            ref_code: b.ref_code,
            unit_price: b.price,
            fabric: b.fabric_type,
            quantity_sent: b.quantity_sent,
            date_sent: b.date_sent.format("%Y-%m-%d").to_string(),
            date_expected: b.date_expected.format("%Y-%m-%d").to_string(),
            status: b.status.as_str().to_string(),
            total_received: b.total_received,
            total_waste: b.total_waste,
        })
        .collect();

    Ok(Json(rows))
}
