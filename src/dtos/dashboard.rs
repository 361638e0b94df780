use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::dashboard::{Period, RankingSort, Totals, WorkshopRanking};

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub period: Period,
    // Bounds for the custom period; ignored otherwise.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub collection: Option<String>,
    pub fabric: Option<String>,
    pub workshop: Option<String>,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub sort: RankingSort,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub totals: Totals,
    pub ranking: Vec<WorkshopRanking>,
}
