use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::batch::{Batch, ReturnEntry};

/// Create/update payload for a batch's own scalar fields. Dates arrive as
/// whatever the client form produced (`YYYY-MM-DD`, `DD/MM/YYYY`, a
/// spreadsheet serial) and go through the shared date helper.
#[derive(Debug, Deserialize)]
pub struct BatchPayload {
    pub collection_name: String,
    pub workshop: String,
    pub ref_code: String,
    pub price: f64,
    #[serde(default)]
    pub fabric_type: Option<String>,
    pub quantity_sent: i32,
    #[serde(default)]
    pub date_sent: Option<Value>,
    #[serde(default)]
    pub date_expected: Option<Value>,
}

/// Payload for appending or editing one delivery event.
#[derive(Debug, Deserialize)]
pub struct ReturnPayload {
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub waste: Option<i32>,
    #[serde(default)]
    pub date: Option<Value>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ProductionSort {
    #[serde(rename = "created_desc")]
    CreatedDesc,
    #[serde(rename = "sent_asc")]
    SentAsc,
    #[serde(rename = "sent_desc")]
    SentDesc,
    #[serde(rename = "exp_asc")]
    ExpectedAsc,
    #[serde(rename = "exp_desc")]
    ExpectedDesc,
}

impl Default for ProductionSort {
    fn default() -> Self {
        ProductionSort::CreatedDesc
    }
}

/// Production-view query: exact-match filters, a search term over ref and
/// workshop, a late-only toggle and a sort selector.
#[derive(Debug, Default, Deserialize)]
pub struct BatchListQuery {
    pub collection: Option<String>,
    pub workshop: Option<String>,
    pub date_sent: Option<NaiveDate>,
    pub date_expected: Option<NaiveDate>,
    pub search: Option<String>,
    #[serde(default)]
    pub only_late: bool,
    #[serde(default)]
    pub sort: ProductionSort,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub id: i64,
    pub collection_name: String,
    pub workshop: String,
    pub ref_code: String,
    pub price: f64,
    pub fabric_type: String,
    pub quantity_sent: i32,
    pub date_sent: NaiveDate,
    pub date_expected: NaiveDate,
    pub status: String,
    pub total_received: i32,
    pub total_waste: i32,
    pub pending: i32,
    pub is_late: bool,
    pub returns: Vec<ReturnEntry>,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
}

impl BatchResponse {
    pub fn from_batch(batch: Batch, today: NaiveDate) -> Self {
        BatchResponse {
            pending: batch.pending_pieces(),
            is_late: batch.is_late(today),
            id: batch.id,
            collection_name: batch.collection_name,
            workshop: batch.workshop,
            ref_code: batch.ref_code,
            price: batch.price,
            fabric_type: batch.fabric_type,
            quantity_sent: batch.quantity_sent,
            date_sent: batch.date_sent,
            date_expected: batch.date_expected,
            status: batch.status.as_str().to_string(),
            total_received: batch.total_received,
            total_waste: batch.total_waste,
            returns: batch.returns,
            revision: batch.revision,
            created_at: batch.created_at,
        }
    }
}
