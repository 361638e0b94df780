use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Persisted batch status. Exactly three members — "late" is a display
/// overlay computed from `date_expected`, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Pending,
    Partial,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "Pending",
            BatchStatus::Partial => "Partial",
            BatchStatus::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(BatchStatus::Pending),
            "Partial" => Some(BatchStatus::Partial),
            "Completed" => Some(BatchStatus::Completed),
            _ => None,
        }
    }

    /// Lenient parser for imported rows: accepts the spellings the legacy
    /// spreadsheets carry (Portuguese labels, any case). Anything else is
    /// `None` and the caller derives the status instead.
    pub fn parse_loose(s: &str) -> Option<Self> {
        let norm = s.trim().to_lowercase();
        match norm.as_str() {
            "pending" | "pendente" => Some(BatchStatus::Pending),
            "partial" | "parcial" => Some(BatchStatus::Partial),
            "completed" | "concluido" | "concluído" => Some(BatchStatus::Completed),
            _ => None,
        }
    }
}

/// One delivery event against a batch. Lives inside the batch row's JSONB
/// ledger; `id` is unique within that ledger only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnEntry {
    pub id: String,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub waste: i32,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub id: i64,
    pub owner_id: i64,
    pub collection_name: String,
    pub workshop: String,
    pub ref_code: String,
    pub price: f64,
    pub fabric_type: String,
    pub quantity_sent: i32,
    pub date_sent: NaiveDate,
    pub date_expected: NaiveDate,
    pub status: BatchStatus,
    pub total_received: i32,
    pub total_waste: i32,
    pub returns: Vec<ReturnEntry>,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerTotals {
    pub total_received: i32,
    pub total_waste: i32,
    pub status: BatchStatus,
}

/// Recomputes a batch's derived fields from its ledger. The ledger is the
/// only source of truth for the totals; runs after every ledger mutation and
/// after any edit that changes `quantity_sent`.
pub fn recompute(quantity_sent: i32, returns: &[ReturnEntry]) -> LedgerTotals {
    let total_received: i32 = returns.iter().map(|r| r.quantity).sum();
    let total_waste: i32 = returns.iter().map(|r| r.waste).sum();
    let missing = quantity_sent - total_received - total_waste;
    let status = if missing <= 0 {
        BatchStatus::Completed
    } else if total_received == 0 {
        BatchStatus::Pending
    } else {
        BatchStatus::Partial
    };
    LedgerTotals {
        total_received,
        total_waste,
        status,
    }
}

impl Batch {
    pub fn pending_pieces(&self) -> i32 {
        self.quantity_sent - self.total_received - self.total_waste
    }

    /// Display-only lateness overlay: expected date passed and not Completed.
    pub fn is_late(&self, today: NaiveDate) -> bool {
        self.date_expected < today && self.status != BatchStatus::Completed
    }

    /// Date of the most recent delivery, if any.
    pub fn last_delivery_date(&self) -> Option<NaiveDate> {
        self.returns.iter().map(|r| r.date).max()
    }
}

/// Coerces a price to non-negative, 2-decimal precision.
pub fn normalize_price(price: f64) -> f64 {
    if !price.is_finite() || price < 0.0 {
        return 0.0;
    }
    (price * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ret(quantity: i32, waste: i32) -> ReturnEntry {
        ReturnEntry {
            id: "1".to_string(),
            quantity,
            waste,
            date: NaiveDate::from_ymd_opt(2025, 5, 10).unwrap(),
            notes: String::new(),
        }
    }

    #[test]
    fn empty_ledger_is_pending() {
        let totals = recompute(560, &[]);
        assert_eq!(totals.total_received, 0);
        assert_eq!(totals.total_waste, 0);
        assert_eq!(totals.status, BatchStatus::Pending);
    }

    #[test]
    fn partial_then_completed_then_back() {
        let first = vec![ret(200, 10)];
        let totals = recompute(560, &first);
        assert_eq!(totals.total_received, 200);
        assert_eq!(totals.total_waste, 10);
        assert_eq!(totals.status, BatchStatus::Partial);

        let both = vec![ret(200, 10), ret(350, 0)];
        let totals = recompute(560, &both);
        assert_eq!(totals.total_received, 550);
        assert_eq!(totals.total_waste, 10);
        assert_eq!(totals.status, BatchStatus::Completed);

        // Deleting the second delivery drives the status backward.
        let totals = recompute(560, &first);
        assert_eq!(totals.status, BatchStatus::Partial);
        assert_eq!(totals.total_received, 200);
    }

    #[test]
    fn totals_are_ledger_sums() {
        let ledger = vec![ret(5, 1), ret(7, 0), ret(0, 3)];
        let totals = recompute(100, &ledger);
        assert_eq!(totals.total_received, 12);
        assert_eq!(totals.total_waste, 4);
    }

    #[test]
    fn over_delivery_counts_as_completed() {
        // Tolerant semantics: missing going negative reads the same as zero.
        let totals = recompute(100, &[ret(120, 0)]);
        assert_eq!(totals.status, BatchStatus::Completed);
    }

    #[test]
    fn waste_only_ledger_stays_pending_until_exhausted() {
        let totals = recompute(100, &[ret(0, 30)]);
        assert_eq!(totals.status, BatchStatus::Pending);
        let totals = recompute(100, &[ret(0, 100)]);
        assert_eq!(totals.status, BatchStatus::Completed);
    }

    #[test]
    fn recompute_is_deterministic() {
        let ledger = vec![ret(9, 2), ret(4, 4)];
        assert_eq!(recompute(50, &ledger), recompute(50, &ledger));
    }

    #[test]
    fn lateness_is_an_overlay() {
        let mut batch = Batch {
            id: 1,
            owner_id: 1,
            collection_name: "INVERNO 26".into(),
            workshop: "OFICINA MARIA".into(),
            ref_code: "12345".into(),
            price: 3.5,
            fabric_type: "M".into(),
            quantity_sent: 100,
            date_sent: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            date_expected: NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(),
            status: BatchStatus::Partial,
            total_received: 40,
            total_waste: 0,
            returns: vec![],
            revision: 0,
            created_at: Utc::now(),
        };
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(batch.is_late(today));
        batch.status = BatchStatus::Completed;
        assert!(!batch.is_late(today));
        // Not late while the expected date is still ahead.
        batch.status = BatchStatus::Pending;
        assert!(!batch.is_late(NaiveDate::from_ymd_opt(2025, 5, 10).unwrap()));
    }

    #[test]
    fn loose_status_spellings() {
        assert_eq!(BatchStatus::parse_loose("Concluído"), Some(BatchStatus::Completed));
        assert_eq!(BatchStatus::parse_loose("concluido"), Some(BatchStatus::Completed));
        assert_eq!(BatchStatus::parse_loose("PARCIAL"), Some(BatchStatus::Partial));
        assert_eq!(BatchStatus::parse_loose("pendente"), Some(BatchStatus::Pending));
        assert_eq!(BatchStatus::parse_loose("Atrasado"), None);
    }

    #[test]
    fn price_normalization() {
        assert_eq!(normalize_price(3.456), 3.46);
        assert_eq!(normalize_price(-1.0), 0.0);
        assert_eq!(normalize_price(f64::NAN), 0.0);
    }
}
