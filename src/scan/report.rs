use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::check_line::{CheckLine, CountMode, LineStatus};
use crate::models::snapshot::ScopeSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub shipment_code: String,
    pub material_code: String,
    pub pallet_or_po_key: String,
    pub mode: Option<CountMode>,
    pub expected_quantity: i64,
    pub scanned_quantity: i64,
    pub expected_cartons: i64,
    pub scanned_cartons: i64,
    pub status: LineStatus,
    pub verdict: &'static str,
    pub last_operator: Option<String>,
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl From<&CheckLine> for ReportRow {
    fn from(line: &CheckLine) -> Self {
        let status = line.status();
        Self {
            shipment_code: line.shipment_code.clone(),
            material_code: line.material_code.clone(),
            pallet_or_po_key: line.pallet_or_po_key.clone(),
            mode: line.mode,
            expected_quantity: line.expected_quantity,
            scanned_quantity: line.scanned_quantity,
            expected_cartons: line.expected_cartons,
            scanned_cartons: line.scanned_cartons,
            status,
            verdict: status.verdict(),
            last_operator: line.last_scan_operator_id.clone(),
            last_scan_at: line.last_scan_timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub scope: String,
    pub total_lines: usize,
    pub fulfilled: usize,
    pub pending: usize,
    pub ad_hoc: usize,
    /// "OK" only when the scope has lines and every one of them is OK.
    pub verdict: &'static str,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
}

pub fn build_report(snapshot: &ScopeSnapshot) -> ReconciliationReport {
    let mut rows: Vec<ReportRow> = snapshot.lines.iter().map(ReportRow::from).collect();
    rows.sort_by(|a, b| {
        (&a.material_code, &a.pallet_or_po_key).cmp(&(&b.material_code, &b.pallet_or_po_key))
    });

    let count = |s: LineStatus| rows.iter().filter(|r| r.status == s).count();
    let fulfilled = count(LineStatus::Fulfilled);
    let pending = count(LineStatus::Pending);
    let ad_hoc = count(LineStatus::AdHoc);

    let verdict = if !rows.is_empty() && fulfilled == rows.len() {
        LineStatus::Fulfilled.verdict()
    } else {
        LineStatus::Pending.verdict()
    };

    ReconciliationReport {
        scope: snapshot.scope.clone(),
        total_lines: rows.len(),
        fulfilled,
        pending,
        ad_hoc,
        verdict,
        generated_at: Utc::now(),
        rows,
    }
}
