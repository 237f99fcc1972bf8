//! Orchestration of scan sessions over the snapshot store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::engine::{self, ScanApplication};
use super::error::{ScanError, ScanResult};
use super::identity::{self, EmployeeId};
use super::manager_override::{BadgeScan, ManagerOverride};
use super::report::{self, ReconciliationReport};
use super::session::{ScanFlow, ScanOperation, ScanSession, SessionReport, Step, StepOutcome};
use crate::models::check_line::{CheckLine, CountMode, LineKey, LineStatus};
use crate::models::history::{replay_totals, HistoryEntry, StockAtScan};
use crate::models::manifest::ExpectedLine;
use crate::store::snapshot::{Persistence, SnapshotStore};
use crate::store::EmployeeDirectory;

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub flow: ScanFlow,
    pub mode: CountMode,
    pub step: Step,
    pub operator: Option<String>,
    pub operator_name: Option<String>,
    pub receiver: Option<String>,
    pub receiver_name: Option<String>,
    pub shipment: Option<String>,
    pub pallet: Option<String>,
    pub scans_applied: usize,
    pub last_error: Option<String>,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineView {
    #[serde(flatten)]
    pub line: CheckLine,
    pub status: LineStatus,
    pub verdict: &'static str,
}

impl From<CheckLine> for LineView {
    fn from(line: CheckLine) -> Self {
        let status = line.status();
        Self {
            line,
            status,
            verdict: status.verdict(),
        }
    }
}

/// What happened to one submitted scan.
#[derive(Debug, Clone, Serialize)]
pub struct InputOutcome {
    pub accepted: bool,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
    pub session: SessionView,
    pub line: Option<LineView>,
    pub persistence: Option<Persistence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayCheck {
    pub line_key: String,
    pub snapshot_quantity: i64,
    pub snapshot_cartons: i64,
    pub replayed_quantity: i64,
    pub replayed_cartons: i64,
    pub consistent: bool,
}

pub struct ScanService {
    store: SnapshotStore,
    directory: Arc<dyn EmployeeDirectory>,
    overrides: ManagerOverride,
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<ScanSession>>>>,
}

impl ScanService {
    pub fn new(
        store: SnapshotStore,
        directory: Arc<dyn EmployeeDirectory>,
        overrides: ManagerOverride,
    ) -> Self {
        Self {
            store,
            directory,
            overrides,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    // ==================== Sessions ====================

    pub async fn open_session(
        &self,
        flow: ScanFlow,
        mode: CountMode,
        scope: Option<&str>,
    ) -> ScanResult<SessionView> {
        let session = ScanSession::open(flow, mode, scope)?;
        let view = self.view(&session).await;
        tracing::info!(session = %session.id(), ?flow, mode = mode.as_str(), "Scan session opened");
        self.sessions
            .write()
            .await
            .insert(session.id(), Arc::new(Mutex::new(session)));
        Ok(view)
    }

    async fn session(&self, id: Uuid) -> ScanResult<Arc<Mutex<ScanSession>>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ScanError::SessionNotFound)
    }

    pub async fn session_view(&self, id: Uuid) -> ScanResult<SessionView> {
        let session = self.session(id).await?;
        let guard = session.lock().await;
        Ok(self.view(&guard).await)
    }

    /// Processes one raw scan. The session mutex is held until the scan is
    /// fully resolved, so scans within a session apply strictly in order.
    /// Operator mistakes come back as a rejected outcome, not an error.
    pub async fn submit(&self, id: Uuid, raw: &str) -> ScanResult<InputOutcome> {
        let session = self.session(id).await?;
        let mut guard = session.lock().await;

        let outcome = match guard.submit(raw) {
            Ok(outcome) => outcome,
            Err(e) => return Ok(self.rejected(&guard, &e).await),
        };

        match outcome {
            StepOutcome::Advanced(_) => Ok(InputOutcome {
                accepted: true,
                error: None,
                error_kind: None,
                session: self.view(&guard).await,
                line: None,
                persistence: None,
            }),
            StepOutcome::Goods { target, goods } => {
                let key = match identity::resolve_line_key(
                    &target.shipment,
                    &goods.material_code,
                    &goods.po_or_pallet,
                ) {
                    Ok(key) => key,
                    Err(e) => {
                        guard.reject(&e);
                        return Ok(self.rejected(&guard, &e).await);
                    }
                };

                let scan = ScanApplication {
                    key,
                    mode: guard.mode(),
                    delta_quantity: goods.quantity,
                    operator_id: target.operator.to_string(),
                    at: Utc::now(),
                };
                let context = StockAtScan {
                    pallet: target.pallet.clone(),
                    receiver_id: target.receiver.as_ref().map(EmployeeId::to_string),
                    session_id: Some(id.to_string()),
                    ..StockAtScan::default()
                };

                match self.store.apply_scan(&scan, context).await {
                    Ok((applied, persistence)) => {
                        guard.record(ScanOperation {
                            line_key: scan.key.clone(),
                            mode: scan.mode,
                            delta_quantity: applied.delta_quantity,
                            delta_cartons: applied.delta_cartons,
                            pallet: target.pallet.clone(),
                            scanned_at: scan.at,
                        });
                        Ok(InputOutcome {
                            accepted: true,
                            error: None,
                            error_kind: None,
                            session: self.view(&guard).await,
                            line: Some(applied.line.into()),
                            persistence: Some(persistence),
                        })
                    }
                    Err(e) if e.is_operator_facing() => {
                        guard.reject(&e);
                        Ok(self.rejected(&guard, &e).await)
                    }
                    Err(e) => {
                        tracing::error!(session = %id, error = %e, "Scan could not be applied");
                        guard.reject(&e);
                        Err(e)
                    }
                }
            }
        }
    }

    async fn rejected(&self, session: &ScanSession, err: &ScanError) -> InputOutcome {
        InputOutcome {
            accepted: false,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            session: self.view(session).await,
            line: None,
            persistence: None,
        }
    }

    pub async fn next_pallet(&self, id: Uuid) -> ScanResult<SessionView> {
        let session = self.session(id).await?;
        let mut guard = session.lock().await;
        guard.next_pallet()?;
        Ok(self.view(&guard).await)
    }

    pub async fn cancel(&self, id: Uuid) -> ScanResult<SessionView> {
        let session = self.session(id).await?;
        let mut guard = session.lock().await;
        guard.cancel();
        self.sessions.write().await.remove(&id);
        tracing::info!(session = %id, "Scan session cancelled");
        Ok(self.view(&guard).await)
    }

    pub async fn complete(&self, id: Uuid) -> ScanResult<SessionReport> {
        let session = self.session(id).await?;
        let mut guard = session.lock().await;
        let report = guard.complete()?;
        self.sessions.write().await.remove(&id);
        tracing::info!(
            session = %id,
            shipment = %report.shipment,
            scans = report.operations.len(),
            "Scan session completed"
        );
        Ok(report)
    }

    async fn view(&self, session: &ScanSession) -> SessionView {
        let (operator, receiver, shipment, pallet) = match session.target() {
            Some(t) => (
                Some(t.operator.clone()),
                t.receiver.clone(),
                Some(t.shipment.clone()),
                t.pallet.clone(),
            ),
            None => {
                let partial = partial_fields(session);
                (session.operator().cloned(), partial.0, partial.1, None)
            }
        };

        SessionView {
            id: session.id(),
            flow: session.flow(),
            mode: session.mode(),
            step: session.step(),
            operator_name: self.display_name(operator.as_ref()).await,
            receiver_name: self.display_name(receiver.as_ref()).await,
            operator: operator.map(|o| o.to_string()),
            receiver: receiver.map(|r| r.to_string()),
            shipment,
            pallet,
            scans_applied: session.operations().len(),
            last_error: session.last_error().map(str::to_string),
            opened_at: session.opened_at(),
        }
    }

    /// Best-effort directory lookup; falls back to the code itself.
    async fn display_name(&self, id: Option<&EmployeeId>) -> Option<String> {
        let id = id?;
        match self.directory.display_name(id.as_str()).await {
            Ok(Some(name)) => Some(name),
            Ok(None) => {
                tracing::debug!(employee = %id, "Employee not in directory");
                Some(id.to_string())
            }
            Err(e) => {
                tracing::debug!(employee = %id, error = %e, "Employee directory lookup failed");
                Some(id.to_string())
            }
        }
    }

    pub async fn register_employee(&self, raw_code: &str, display_name: &str) -> ScanResult<EmployeeId> {
        let code = identity::normalize_employee_id(raw_code)?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ScanError::validation("Display name is required"));
        }
        self.directory.upsert(code.as_str(), display_name).await?;
        Ok(code)
    }

    pub async fn employee_name(&self, raw_code: &str) -> ScanResult<(EmployeeId, String)> {
        let code = identity::normalize_employee_id(raw_code)?;
        let name = self.display_name(Some(&code)).await.unwrap_or_else(|| code.to_string());
        Ok((code, name))
    }

    // ==================== Lines ====================

    pub async fn lines(&self, scope: &str) -> ScanResult<Vec<LineView>> {
        let scope = identity::normalize_shipment_code(scope)?;
        let snapshot = self.store.load_snapshot(&scope).await?;
        Ok(snapshot.lines.into_iter().map(LineView::from).collect())
    }

    pub async fn report(&self, scope: &str) -> ScanResult<ReconciliationReport> {
        let scope = identity::normalize_shipment_code(scope)?;
        let snapshot = self.store.load_snapshot(&scope).await?;
        Ok(report::build_report(&snapshot))
    }

    pub async fn history(&self, key: &LineKey) -> ScanResult<Vec<HistoryEntry>> {
        self.store.history(key).await
    }

    pub async fn replay_check(&self, key: &LineKey) -> ScanResult<ReplayCheck> {
        let snapshot = self.store.load_snapshot(&key.shipment_code).await?;
        let line = snapshot
            .find(key)
            .ok_or_else(|| ScanError::LineNotFound(key.to_string()))?;
        let history = self.store.history(key).await?;
        let (replayed_quantity, replayed_cartons) = replay_totals(&history, snapshot.reset_at);
        Ok(ReplayCheck {
            line_key: key.to_string(),
            snapshot_quantity: line.scanned_quantity,
            snapshot_cartons: line.scanned_cartons,
            replayed_quantity,
            replayed_cartons,
            consistent: replayed_quantity == line.scanned_quantity
                && replayed_cartons == line.scanned_cartons,
        })
    }

    pub async fn lock(&self, key: &LineKey) -> ScanResult<(LineView, Persistence)> {
        let (line, persistence) = self
            .store
            .mutate(&key.shipment_code, |s| engine::set_locked(s, key, true))
            .await?;
        tracing::info!(line = %key, "Check line locked");
        Ok((line.into(), persistence))
    }

    pub async fn unlock(&self, key: &LineKey, badge: &BadgeScan) -> ScanResult<(LineView, Persistence)> {
        let manager = self.overrides.verify(badge)?;
        let (line, persistence) = self
            .store
            .mutate(&key.shipment_code, |s| engine::set_locked(s, key, false))
            .await?;
        tracing::info!(line = %key, manager = %manager, "Check line unlocked");
        Ok((line.into(), persistence))
    }

    pub async fn acknowledge(&self, key: &LineKey) -> ScanResult<(LineView, Persistence)> {
        let (line, persistence) = self
            .store
            .mutate(&key.shipment_code, |s| engine::acknowledge(s, key))
            .await?;
        Ok((line.into(), persistence))
    }

    /// Deletes a line. A locked line needs a valid manager badge scan; the
    /// lock is checked under the same cache write as the removal.
    pub async fn delete_line(
        &self,
        key: &LineKey,
        badge: Option<&BadgeScan>,
    ) -> ScanResult<(CheckLine, Persistence)> {
        let manager = badge.map(|b| self.overrides.verify(b)).transpose()?;

        let (line, persistence) = self
            .store
            .mutate(&key.shipment_code, |s| engine::remove_line(s, key, manager.is_some()))
            .await?;
        tracing::info!(line = %key, locked = line.locked, manager = ?manager, "Check line deleted");
        Ok((line, persistence))
    }

    pub async fn reset(&self, scope: &str) -> ScanResult<Persistence> {
        let scope = identity::normalize_shipment_code(scope)?;
        let persistence = self.store.reset(&scope).await?;
        tracing::info!(scope = %scope, "Scope snapshot reset");
        Ok(persistence)
    }

    pub async fn import_manifest(
        &self,
        scope: &str,
        lines: Vec<ExpectedLine>,
    ) -> ScanResult<(usize, Persistence)> {
        let scope = identity::normalize_shipment_code(scope)?;
        let mut normalized = Vec::with_capacity(lines.len());
        for line in lines {
            if line.expected_quantity < 0 || line.expected_cartons < 0 {
                return Err(ScanError::validation("Expected totals must not be negative"));
            }
            let key = identity::resolve_line_key(&scope, &line.material_code, &line.po_or_pallet_key)?;
            normalized.push(ExpectedLine {
                shipment_code: key.shipment_code,
                material_code: key.material_code,
                po_or_pallet_key: key.pallet_or_po_key,
                expected_quantity: line.expected_quantity,
                expected_cartons: line.expected_cartons,
            });
        }
        let result = self.store.import_manifest(&scope, &normalized).await?;
        tracing::info!(scope = %scope, lines = normalized.len(), created = result.0, "Manifest imported");
        Ok(result)
    }
}

/// Receiver and shipment collected before the goods step.
fn partial_fields(session: &ScanSession) -> (Option<EmployeeId>, Option<String>) {
    use super::session::SessionState;
    match session.state() {
        SessionState::AwaitingShipment { receiver, .. } => (receiver.clone(), None),
        SessionState::AwaitingPallet { receiver, shipment, .. } => (receiver.clone(), Some(shipment.clone())),
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::error::ReconciliationConflict;
    use crate::store::memory::InMemoryStore;
    use crate::store::snapshot::RetentionPolicy;

    fn service_with(backend: Arc<InMemoryStore>) -> ScanService {
        let store = SnapshotStore::new(backend.clone(), backend.clone(), RetentionPolicy::default());
        ScanService::new(store, backend, ManagerOverride::new(["QL001"], 200))
    }

    fn manifest(qty: i64) -> Vec<ExpectedLine> {
        vec![ExpectedLine {
            shipment_code: "0001".into(),
            material_code: "MAT01".into(),
            po_or_pallet_key: "PO1".into(),
            expected_quantity: qty,
            expected_cartons: 0,
        }]
    }

    fn badge(code: &str, elapsed: i64) -> BadgeScan {
        BadgeScan {
            code: code.into(),
            first_keystroke_ms: 0,
            last_keystroke_ms: elapsed,
        }
    }

    async fn fg_session_at_goods(service: &ScanService, mode: CountMode) -> Uuid {
        let id = service.open_session(ScanFlow::FgCheck, mode, None).await.unwrap().id;
        for input in ["ASP0001", "0001", "P01"] {
            assert!(service.submit(id, input).await.unwrap().accepted);
        }
        id
    }

    #[tokio::test]
    async fn end_to_end_quantity_check() {
        let backend = Arc::new(InMemoryStore::new());
        let service = service_with(backend);
        service.import_manifest("0001", manifest(15)).await.unwrap();

        let id = fg_session_at_goods(&service, CountMode::Quantity).await;
        let first = service.submit(id, "MAT01|PO1|10").await.unwrap();
        assert!(first.accepted);
        assert_eq!(first.line.as_ref().unwrap().status, LineStatus::Pending);
        let second = service.submit(id, "MAT01|PO1|5").await.unwrap();
        assert!(second.accepted);
        assert_eq!(second.persistence, Some(Persistence::Saved));

        let lines = service.lines("0001").await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line.scanned_quantity, 15);
        assert_eq!(lines[0].status, LineStatus::Fulfilled);
        assert_eq!(lines[0].verdict, "OK");

        let key = resolve("MAT01", "PO1");
        let history = service.history(&key).await.unwrap();
        let deltas: Vec<i64> = history.iter().map(|h| h.delta_quantity).collect();
        assert_eq!(history.len(), 2);
        assert!(deltas.contains(&10) && deltas.contains(&5));
        assert!(history
            .iter()
            .all(|h| h.snapshot.as_ref().and_then(|s| s.pallet.as_deref()) == Some("P01")));

        let report = service.complete(id).await.unwrap();
        assert_eq!(report.total_quantity, 15);
        assert_eq!(report.operations.len(), 2);
        assert!(matches!(service.session_view(id).await, Err(ScanError::SessionNotFound)));
    }

    fn resolve(material: &str, po: &str) -> LineKey {
        identity::resolve_line_key("0001", material, po).unwrap()
    }

    #[tokio::test]
    async fn rejected_scans_keep_the_session_in_place() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let id = service.open_session(ScanFlow::FgCheck, CountMode::Quantity, None).await.unwrap().id;

        let bad = service.submit(id, "XYZ1234").await.unwrap();
        assert!(!bad.accepted);
        assert_eq!(bad.error_kind, Some("validation"));
        assert_eq!(bad.session.step, Step::AwaitingOperator);

        let id = fg_session_at_goods(&service, CountMode::Quantity).await;
        let zero = service.submit(id, "MAT01|PO1|0").await.unwrap();
        assert!(!zero.accepted);
        assert_eq!(zero.error_kind, Some("reconciliation_conflict"));
        assert_eq!(zero.session.step, Step::AwaitingLine);
        assert!(service.lines("0001").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn carton_mode_counts_each_scan_once() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let id = fg_session_at_goods(&service, CountMode::Carton).await;
        for _ in 0..3 {
            assert!(service.submit(id, "MAT01|PO1|250").await.unwrap().accepted);
        }
        let lines = service.lines("0001").await.unwrap();
        assert_eq!(lines[0].line.scanned_cartons, 3);
        assert_eq!(lines[0].line.scanned_quantity, 0);
        assert!(lines[0].line.is_ad_hoc);
        assert_eq!(lines[0].status, LineStatus::AdHoc);
    }

    #[tokio::test]
    async fn locked_lines_need_a_badge_to_reopen() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        service.import_manifest("0001", manifest(15)).await.unwrap();
        let key = resolve("MAT01", "PO1");
        let id = fg_session_at_goods(&service, CountMode::Quantity).await;
        service.submit(id, "MAT01|PO1|4").await.unwrap();

        service.lock(&key).await.unwrap();
        let rejected = service.submit(id, "MAT01|PO1|4").await.unwrap();
        assert!(!rejected.accepted);
        assert!(rejected.error.unwrap().contains("locked"));
        assert_eq!(service.lines("0001").await.unwrap()[0].line.scanned_quantity, 4);

        let typed = service.unlock(&key, &badge("QL001", 900)).await;
        assert!(matches!(typed, Err(ScanError::Authorization(_))));
        let (line, _) = service.unlock(&key, &badge("ql001", 50)).await.unwrap();
        assert!(!line.line.locked);
        assert!(service.submit(id, "MAT01|PO1|4").await.unwrap().accepted);
    }

    #[tokio::test]
    async fn deleting_a_locked_line_requires_override() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        service.import_manifest("0001", manifest(15)).await.unwrap();
        let key = resolve("MAT01", "PO1");
        service.lock(&key).await.unwrap();

        assert!(matches!(
            service.delete_line(&key, None).await,
            Err(ScanError::Authorization(_))
        ));
        assert!(service.delete_line(&key, Some(&badge("QL404", 10))).await.is_err());
        service.delete_line(&key, Some(&badge("QL001", 10))).await.unwrap();
        assert!(service.lines("0001").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_after_reset_matches_the_manifest() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        service.import_manifest("0001", manifest(15)).await.unwrap();
        let id = fg_session_at_goods(&service, CountMode::Quantity).await;
        service.submit(id, "MAT01|PO1|4").await.unwrap();

        service.reset("0001").await.unwrap();
        let outcome = service.submit(id, "MAT01|PO1|15").await.unwrap();
        assert!(outcome.accepted);
        let line = outcome.line.unwrap();
        assert!(!line.line.is_ad_hoc);
        assert_eq!(line.line.expected_quantity, 15);
        assert_eq!(line.status, LineStatus::Fulfilled);
    }

    #[tokio::test]
    async fn overflowing_quantity_is_rejected_not_fatal() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let id = fg_session_at_goods(&service, CountMode::Quantity).await;
        let max = format!("MAT01|PO1|{}", i64::MAX);
        assert!(service.submit(id, &max).await.unwrap().accepted);

        let outcome = service.submit(id, "MAT01|PO1|1").await.unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.error_kind, Some("reconciliation_conflict"));
        assert_eq!(outcome.session.step, Step::AwaitingLine);
        assert_eq!(service.lines("0001").await.unwrap()[0].line.scanned_quantity, i64::MAX);
    }

    #[tokio::test]
    async fn reimported_manifest_replaces_expectations() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        service.import_manifest("0001", manifest(15)).await.unwrap();
        let mut next = manifest(0);
        next[0].material_code = "MAT02".into();
        next[0].expected_quantity = 3;
        service.import_manifest("0001", next).await.unwrap();

        let report = service.report("0001").await.unwrap();
        assert_eq!(report.total_lines, 1);
        assert_eq!(report.rows[0].material_code, "MAT02");
    }

    #[tokio::test]
    async fn mode_mismatch_across_sessions_is_rejected() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let cartons = fg_session_at_goods(&service, CountMode::Carton).await;
        service.submit(cartons, "MAT01|PO1").await.unwrap();

        let quantities = fg_session_at_goods(&service, CountMode::Quantity).await;
        let outcome = service.submit(quantities, "MAT01|PO1|5").await.unwrap();
        assert!(!outcome.accepted);
        assert!(outcome.error.unwrap().contains("carton"));
        let err = ScanError::from(ReconciliationConflict::NonPositiveQuantity(0));
        assert_eq!(err.kind(), outcome.error_kind.unwrap());
    }

    #[tokio::test]
    async fn cancel_keeps_applied_lines() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let id = fg_session_at_goods(&service, CountMode::Quantity).await;
        service.submit(id, "MAT01|PO1|2").await.unwrap();
        let view = service.cancel(id).await.unwrap();
        assert_eq!(view.step, Step::Cancelled);
        assert_eq!(view.scans_applied, 0);
        assert_eq!(service.lines("0001").await.unwrap()[0].line.scanned_quantity, 2);
        assert!(service.submit(id, "MAT01|PO1|2").await.is_err());
    }

    #[tokio::test]
    async fn persistence_failure_is_a_warning() {
        let backend = Arc::new(InMemoryStore::new());
        let service = service_with(backend.clone());
        let id = fg_session_at_goods(&service, CountMode::Quantity).await;

        backend.set_fail_writes(true);
        let outcome = service.submit(id, "MAT01|PO1|3").await.unwrap();
        assert!(outcome.accepted);
        assert!(outcome.persistence.unwrap().warning().is_some());
        assert_eq!(service.lines("0001").await.unwrap()[0].line.scanned_quantity, 3);
    }

    #[tokio::test]
    async fn directory_names_fall_back_to_codes() {
        let backend = Arc::new(InMemoryStore::new());
        let service = service_with(backend);
        service.register_employee("asp0002", "Tran Thi B").await.unwrap();

        let id = service.open_session(ScanFlow::Delivery, CountMode::Quantity, None).await.unwrap().id;
        let first = service.submit(id, "ASP0001").await.unwrap();
        assert_eq!(first.session.operator_name.as_deref(), Some("ASP0001"));
        let second = service.submit(id, "ASP0002").await.unwrap();
        assert_eq!(second.session.receiver_name.as_deref(), Some("Tran Thi B"));
        assert_eq!(second.session.step, Step::AwaitingShipment);
    }

    #[tokio::test]
    async fn replay_matches_snapshot_after_scans() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let id = fg_session_at_goods(&service, CountMode::Quantity).await;
        for raw in ["MAT01|PO1|2", "MAT02|PO1|7", "MAT01|PO1|9"] {
            service.submit(id, raw).await.unwrap();
        }
        let check = service.replay_check(&resolve("MAT01", "PO1")).await.unwrap();
        assert!(check.consistent);
        assert_eq!(check.replayed_quantity, 11);
    }

    #[tokio::test]
    async fn report_flags_short_lines() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        service.import_manifest("0001", manifest(15)).await.unwrap();
        let id = fg_session_at_goods(&service, CountMode::Quantity).await;
        service.submit(id, "MAT01|PO1|14").await.unwrap();

        let report = service.report("0001").await.unwrap();
        assert_eq!(report.verdict, "Sai");
        assert_eq!(report.rows[0].verdict, "Sai");

        service.submit(id, "MAT01|PO1|1").await.unwrap();
        assert_eq!(service.report("0001").await.unwrap().verdict, "OK");
    }
}
