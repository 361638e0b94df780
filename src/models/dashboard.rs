use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::dates::in_range;
use crate::models::batch::{Batch, BatchStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Period {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "thisMonth")]
    ThisMonth,
    #[serde(rename = "lastMonth")]
    LastMonth,
    #[serde(rename = "thisYear")]
    ThisYear,
    #[serde(rename = "custom")]
    Custom,
}

impl Default for Period {
    fn default() -> Self {
        Period::All
    }
}

/// Resolves a period selector to inclusive date bounds. `All` (and open
/// `Custom` ends) resolve to no bound.
pub fn resolve_bounds(
    period: Period,
    today: NaiveDate,
    custom_start: Option<NaiveDate>,
    custom_end: Option<NaiveDate>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let (year, month) = (today.year(), today.month());
    match period {
        Period::All => (None, None),
        Period::ThisMonth => (first_of_month(year, month), last_of_month(year, month)),
        Period::LastMonth => {
            let (y, m) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
            (first_of_month(y, m), last_of_month(y, m))
        }
        Period::ThisYear => (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ),
        Period::Custom => (custom_start, custom_end),
    }
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn last_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (y, m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(y, m, 1).map(|d| d - Duration::days(1))
}

/// Categorical dashboard filters; `None` matches everything.
#[derive(Debug, Default, Clone)]
pub struct Filters {
    pub collection: Option<String>,
    pub fabric: Option<String>,
    pub workshop: Option<String>,
}

impl Filters {
    fn matches(&self, batch: &Batch) -> bool {
        fn ok(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| f == value)
        }
        ok(&self.collection, &batch.collection_name)
            && ok(&self.fabric, &batch.fabric_type)
            && ok(&self.workshop, &batch.workshop)
    }
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct Totals {
    pub sent: i64,
    pub received: i64,
    pub waste: i64,
    pub received_batch_count: usize,
    pub pending_pieces: i64,
    pub pending_batch_count: usize,
    pub outstanding_value: f64,
    pub avg_value_per_pending_piece: f64,
    pub late_batch_count: usize,
    pub late_pieces: i64,
}

#[derive(Debug, Default)]
pub struct WorkshopStats {
    pub items: i64,
    pub batches: HashSet<i64>,
    pub deliveries: u32,
    pub total_days: i64,
}

/// One pass over the snapshot. Sent-side and returns-side period matching
/// are independent: a batch shipped in one period still contributes its
/// deliveries to another.
pub fn aggregate(
    batches: &[Batch],
    filters: &Filters,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> (Totals, HashMap<String, WorkshopStats>) {
    let mut totals = Totals::default();
    let mut received_batches: HashSet<i64> = HashSet::new();
    let mut workshops: HashMap<String, WorkshopStats> = HashMap::new();

    for batch in batches {
        if !filters.matches(batch) {
            continue;
        }

        if in_range(batch.date_sent, start, end) {
            totals.sent += batch.quantity_sent as i64;
            let pending = batch.pending_pieces();
            if pending > 0 {
                totals.outstanding_value += pending as f64 * batch.price;
                totals.pending_pieces += pending as i64;
                totals.pending_batch_count += 1;
                if batch.is_late(today) {
                    totals.late_batch_count += 1;
                    totals.late_pieces += pending as i64;
                }
            }
        }

        for ret in &batch.returns {
            if !in_range(ret.date, start, end) {
                continue;
            }
            totals.received += ret.quantity as i64;
            totals.waste += ret.waste as i64;
            received_batches.insert(batch.id);

            let stats = workshops.entry(batch.workshop.clone()).or_default();
            stats.items += ret.quantity as i64;
            stats.batches.insert(batch.id);
            // Turnaround in whole days, clamped to at least one.
            let days = (ret.date - batch.date_sent).num_days().abs().max(1);
            stats.deliveries += 1;
            stats.total_days += days;
        }
    }

    totals.received_batch_count = received_batches.len();
    totals.avg_value_per_pending_piece = if totals.pending_pieces > 0 {
        totals.outstanding_value / totals.pending_pieces as f64
    } else {
        0.0
    };

    (totals, workshops)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RankingSort {
    #[serde(rename = "volume_desc")]
    VolumeDesc,
    #[serde(rename = "batches_desc")]
    BatchesDesc,
    #[serde(rename = "speed_asc")]
    SpeedAsc,
    #[serde(rename = "name_asc")]
    NameAsc,
}

impl Default for RankingSort {
    fn default() -> Self {
        RankingSort::VolumeDesc
    }
}

#[derive(Debug, Serialize)]
pub struct WorkshopRanking {
    pub name: String,
    /// Average turnaround in days; `None` when the workshop has no
    /// qualifying delivery in the period.
    pub avg_days: Option<f64>,
    pub volume: i64,
    pub unique_batches: usize,
}

/// Filters workshops by case-insensitive substring and sorts per selector.
/// Under `SpeedAsc`, workshops with no computed average rank last.
pub fn rank_workshops(
    workshops: HashMap<String, WorkshopStats>,
    search: &str,
    sort: RankingSort,
) -> Vec<WorkshopRanking> {
    let needle = search.to_uppercase();
    let mut ranking: Vec<WorkshopRanking> = workshops
        .into_iter()
        .filter(|(name, _)| name.to_uppercase().contains(&needle))
        .map(|(name, stats)| WorkshopRanking {
            name,
            avg_days: (stats.deliveries > 0)
                .then(|| round1(stats.total_days as f64 / stats.deliveries as f64)),
            volume: stats.items,
            unique_batches: stats.batches.len(),
        })
        .collect();

    match sort {
        RankingSort::VolumeDesc => ranking.sort_by(|a, b| b.volume.cmp(&a.volume)),
        RankingSort::BatchesDesc => {
            ranking.sort_by(|a, b| b.unique_batches.cmp(&a.unique_batches))
        }
        RankingSort::SpeedAsc => ranking.sort_by(|a, b| {
            let key = |r: &WorkshopRanking| r.avg_days.unwrap_or(f64::MAX);
            key(a).total_cmp(&key(b))
        }),
        RankingSort::NameAsc => ranking.sort_by(|a, b| a.name.cmp(&b.name)),
    }
    ranking
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::batch::ReturnEntry;
    use chrono::Utc;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn batch(id: i64, workshop: &str, sent: i32, date_sent: NaiveDate) -> Batch {
        Batch {
            id,
            owner_id: 1,
            collection_name: "INVERNO 26".into(),
            workshop: workshop.into(),
            ref_code: format!("R{id}"),
            price: 2.0,
            fabric_type: "M".into(),
            quantity_sent: sent,
            date_sent,
            date_expected: date_sent + Duration::days(30),
            status: BatchStatus::Pending,
            total_received: 0,
            total_waste: 0,
            returns: vec![],
            revision: 0,
            created_at: Utc::now(),
        }
    }

    fn ret(quantity: i32, waste: i32, date: NaiveDate) -> ReturnEntry {
        ReturnEntry {
            id: date.to_string(),
            quantity,
            waste,
            date,
            notes: String::new(),
        }
    }

    #[test]
    fn period_resolution() {
        let today = d(2025, 3, 15);
        assert_eq!(
            resolve_bounds(Period::ThisMonth, today, None, None),
            (Some(d(2025, 3, 1)), Some(d(2025, 3, 31)))
        );
        assert_eq!(
            resolve_bounds(Period::LastMonth, today, None, None),
            (Some(d(2025, 2, 1)), Some(d(2025, 2, 28)))
        );
        assert_eq!(
            resolve_bounds(Period::ThisYear, today, None, None),
            (Some(d(2025, 1, 1)), Some(d(2025, 12, 31)))
        );
        assert_eq!(resolve_bounds(Period::All, today, None, None), (None, None));
        // January wraps into the previous year.
        assert_eq!(
            resolve_bounds(Period::LastMonth, d(2025, 1, 10), None, None),
            (Some(d(2024, 12, 1)), Some(d(2024, 12, 31)))
        );
        // Custom passes bounds through, either side may be open.
        assert_eq!(
            resolve_bounds(Period::Custom, today, Some(d(2024, 5, 1)), None),
            (Some(d(2024, 5, 1)), None)
        );
    }

    #[test]
    fn sent_and_received_periods_are_independent() {
        // Shipped in February, delivered in March.
        let mut b = batch(1, "OFICINA A", 100, d(2025, 2, 10));
        b.returns.push(ret(40, 0, d(2025, 3, 5)));
        b.total_received = 40;
        b.status = BatchStatus::Partial;

        let today = d(2025, 3, 15);
        let (start, end) = resolve_bounds(Period::ThisMonth, today, None, None);
        let (totals, _) = aggregate(&[b], &Filters::default(), start, end, today);

        // quantity_sent is excluded from this month, the delivery still counts.
        assert_eq!(totals.sent, 0);
        assert_eq!(totals.received, 40);
        assert_eq!(totals.received_batch_count, 1);
        // Pending accumulation follows the sent-side match, so none here.
        assert_eq!(totals.pending_pieces, 0);
    }

    #[test]
    fn pending_value_and_lateness() {
        let mut late = batch(1, "OFICINA A", 100, d(2025, 1, 10));
        late.date_expected = d(2025, 2, 1);
        late.total_received = 30;
        late.status = BatchStatus::Partial;
        late.returns.push(ret(30, 0, d(2025, 1, 20)));

        let mut done = batch(2, "OFICINA B", 50, d(2025, 1, 12));
        done.date_expected = d(2025, 2, 1);
        done.total_received = 50;
        done.status = BatchStatus::Completed;
        done.returns.push(ret(50, 0, d(2025, 1, 30)));

        let today = d(2025, 3, 1);
        let (totals, _) = aggregate(&[late, done], &Filters::default(), None, None, today);

        assert_eq!(totals.sent, 150);
        assert_eq!(totals.pending_pieces, 70);
        assert_eq!(totals.pending_batch_count, 1);
        assert_eq!(totals.outstanding_value, 140.0);
        assert_eq!(totals.avg_value_per_pending_piece, 2.0);
        // Completed past its expected date is not late.
        assert_eq!(totals.late_batch_count, 1);
        assert_eq!(totals.late_pieces, 70);
    }

    #[test]
    fn no_pending_pieces_means_zero_average() {
        let today = d(2025, 3, 1);
        let (totals, _) = aggregate(&[], &Filters::default(), None, None, today);
        assert_eq!(totals.avg_value_per_pending_piece, 0.0);
    }

    #[test]
    fn categorical_filters_gate_both_sides() {
        let mut a = batch(1, "OFICINA A", 100, d(2025, 2, 10));
        a.returns.push(ret(10, 0, d(2025, 2, 20)));
        let mut b = batch(2, "OFICINA B", 200, d(2025, 2, 10));
        b.returns.push(ret(20, 0, d(2025, 2, 20)));

        let filters = Filters {
            workshop: Some("OFICINA B".into()),
            ..Filters::default()
        };
        let (totals, workshops) = aggregate(&[a, b], &filters, None, None, d(2025, 3, 1));
        assert_eq!(totals.sent, 200);
        assert_eq!(totals.received, 20);
        assert!(workshops.contains_key("OFICINA B"));
        assert!(!workshops.contains_key("OFICINA A"));
    }

    #[test]
    fn turnaround_days_clamped_to_one() {
        let mut b = batch(1, "OFICINA A", 100, d(2025, 2, 10));
        // Same-day delivery counts as one day.
        b.returns.push(ret(10, 0, d(2025, 2, 10)));
        b.returns.push(ret(10, 0, d(2025, 2, 13)));

        let (_, workshops) = aggregate(&[b], &Filters::default(), None, None, d(2025, 3, 1));
        let stats = &workshops["OFICINA A"];
        assert_eq!(stats.deliveries, 2);
        assert_eq!(stats.total_days, 4);

        let ranking = rank_workshops(workshops, "", RankingSort::VolumeDesc);
        assert_eq!(ranking[0].avg_days, Some(2.0));
    }

    #[test]
    fn speed_sort_puts_no_average_last() {
        let mut workshops = HashMap::new();
        workshops.insert(
            "AAA SEM ENTREGA".to_string(),
            WorkshopStats {
                items: 500,
                batches: HashSet::from([1]),
                deliveries: 0,
                total_days: 0,
            },
        );
        workshops.insert(
            "ZZZ RAPIDA".to_string(),
            WorkshopStats {
                items: 10,
                batches: HashSet::from([2]),
                deliveries: 2,
                total_days: 6,
            },
        );

        let ranking = rank_workshops(workshops, "", RankingSort::SpeedAsc);
        assert_eq!(ranking[0].name, "ZZZ RAPIDA");
        assert_eq!(ranking[0].avg_days, Some(3.0));
        assert_eq!(ranking[1].name, "AAA SEM ENTREGA");
        assert_eq!(ranking[1].avg_days, None);
    }

    #[test]
    fn ranking_search_is_case_insensitive_substring() {
        let mut workshops = HashMap::new();
        for name in ["OFICINA MARIA", "OFICINA JOSE", "COSTURA EXPRESS"] {
            workshops.insert(name.to_string(), WorkshopStats::default());
        }
        let ranking = rank_workshops(workshops, "oficina", RankingSort::NameAsc);
        let names: Vec<_> = ranking.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["OFICINA JOSE", "OFICINA MARIA"]);
    }
}
