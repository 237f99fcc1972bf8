use serde::{Deserialize, Serialize};

use crate::models::check_line::CountMode;
use crate::models::history::HistoryEntry;
use crate::scan::manager_override::BadgeScan;
use crate::scan::service::{LineView, ReplayCheck};
use crate::scan::session::ScanFlow;
use crate::store::snapshot::Persistence;

// ==================== Sessions ====================

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub flow: ScanFlow,
    pub mode: CountMode,
    /// Area code, required for stock checks.
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanInputRequest {
    pub raw: String,
}

// ==================== Manifest ====================

#[derive(Debug, Deserialize)]
pub struct ManifestLineRequest {
    pub material_code: String,
    pub po_or_pallet_key: String,
    pub expected_quantity: i64,
    #[serde(default)]
    pub expected_cartons: i64,
}

#[derive(Debug, Deserialize)]
pub struct ImportManifestRequest {
    pub lines: Vec<ManifestLineRequest>,
}

#[derive(Debug, Serialize)]
pub struct ImportManifestResponse {
    pub scope: String,
    pub lines_imported: usize,
    pub lines_created: usize,
    pub persistence: Persistence,
}

// ==================== Lines ====================

#[derive(Debug, Deserialize)]
pub struct BadgeRequest {
    pub badge: BadgeScan,
}

#[derive(Debug, Deserialize, Default)]
pub struct DeleteLineRequest {
    #[serde(default)]
    pub badge: Option<BadgeScan>,
}

#[derive(Debug, Serialize)]
pub struct LineMutationResponse {
    pub line: LineView,
    pub persistence: Persistence,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub scope: String,
    pub persistence: Persistence,
}

#[derive(Debug, Serialize)]
pub struct LineHistoryResponse {
    pub line_key: String,
    pub entries: Vec<HistoryEntry>,
    /// Absent when the line is no longer in the current snapshot.
    pub replay: Option<ReplayCheck>,
}
