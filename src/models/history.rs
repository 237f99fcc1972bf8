use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accepted scan. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub operator_id: String,
    /// Amount this scan added, not the running total.
    pub delta_quantity: i64,
    pub delta_cartons: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub snapshot: Option<StockAtScan>,
}

/// Context captured alongside a history entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAtScan {
    pub pallet: Option<String>,
    pub receiver_id: Option<String>,
    pub session_id: Option<String>,
    pub scanned_quantity_after: i64,
    pub scanned_cartons_after: i64,
}

/// Totals obtained by replaying deltas recorded after `since`.
pub fn replay_totals(entries: &[HistoryEntry], since: Option<DateTime<Utc>>) -> (i64, i64) {
    entries
        .iter()
        .filter(|e| since.map_or(true, |cutoff| e.timestamp > cutoff))
        .fold((0i64, 0i64), |(q, c), e| {
            (q.saturating_add(e.delta_quantity), c.saturating_add(e.delta_cartons))
        })
}
