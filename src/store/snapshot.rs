//! Write-through cache of scope snapshots plus history bookkeeping.
//!
//! Every change is applied to the cached snapshot first and then persisted.
//! A failed write does not roll the cache back; it is reported to the caller
//! as [`Persistence::Failed`] so scanning can carry on.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::{CheckStore, ManifestSource, StoreError};
use crate::models::check_line::LineKey;
use crate::models::history::{HistoryEntry, StockAtScan};
use crate::models::manifest::ExpectedLine;
use crate::models::snapshot::ScopeSnapshot;
use crate::scan::engine::{self, Applied, ScanApplication};
use crate::scan::error::{ScanError, ScanResult};

/// Outcome of writing a change to the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Persistence {
    Saved,
    Failed { error: String },
}

impl Persistence {
    pub fn warning(&self) -> Option<&str> {
        match self {
            Persistence::Saved => None,
            Persistence::Failed { error } => Some(error),
        }
    }

    fn merge(self, other: Persistence) -> Persistence {
        match (self, other) {
            (Persistence::Saved, Persistence::Saved) => Persistence::Saved,
            (Persistence::Failed { error: a }, Persistence::Failed { error: b }) => Persistence::Failed {
                error: format!("{a}; {b}"),
            },
            (failed @ Persistence::Failed { .. }, _) | (_, failed @ Persistence::Failed { .. }) => failed,
        }
    }
}

impl From<Result<(), StoreError>> for Persistence {
    fn from(res: Result<(), StoreError>) -> Self {
        match res {
            Ok(()) => Persistence::Saved,
            Err(e) => Persistence::Failed { error: e.to_string() },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// History size per line above which pruning runs.
    pub prune_threshold: usize,
    pub retention_months: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            prune_threshold: 100,
            retention_months: 12,
        }
    }
}

impl RetentionPolicy {
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(self.retention_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

pub struct SnapshotStore {
    backend: Arc<dyn CheckStore>,
    manifests: Arc<dyn ManifestSource>,
    cache: RwLock<HashMap<String, ScopeSnapshot>>,
    retention: RetentionPolicy,
}

impl SnapshotStore {
    pub fn new(
        backend: Arc<dyn CheckStore>,
        manifests: Arc<dyn ManifestSource>,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            backend,
            manifests,
            cache: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Cached snapshot for `scope`, loading it from the backend on a miss.
    /// A snapshot that could not be seeded from the manifest is returned but
    /// not cached, so the next read tries the manifest again.
    pub async fn load_snapshot(&self, scope: &str) -> ScanResult<ScopeSnapshot> {
        if let Some(snapshot) = self.cache.read().await.get(scope) {
            return Ok(snapshot.clone());
        }
        let (loaded, seeded) = self.read_through(scope).await?;
        if !seeded {
            return Ok(loaded);
        }
        let mut cache = self.cache.write().await;
        Ok(cache.entry(scope.to_string()).or_insert(loaded).clone())
    }

    /// Drops the cached copy and rebuilds it from persisted current state.
    pub async fn reload(&self, scope: &str) -> ScanResult<ScopeSnapshot> {
        let (loaded, seeded) = self.read_through(scope).await?;
        let mut cache = self.cache.write().await;
        if seeded {
            cache.insert(scope.to_string(), loaded.clone());
        } else {
            cache.remove(scope);
        }
        Ok(loaded)
    }

    async fn read_through(&self, scope: &str) -> ScanResult<(ScopeSnapshot, bool)> {
        let mut snapshot = self
            .backend
            .get_current_state(scope)
            .await?
            .unwrap_or_else(|| ScopeSnapshot::empty(scope));

        let merged = engine::coalesce_all(&mut snapshot);
        if merged > 0 {
            tracing::info!(scope = %scope, merged, "Coalesced duplicate check lines");
        }

        let seeded = match self.expected_lines(scope).await {
            Some(expected) => {
                engine::seed_from_manifest(&mut snapshot, &expected);
                true
            }
            None => false,
        };
        Ok((snapshot, seeded))
    }

    async fn expected_lines(&self, scope: &str) -> Option<Vec<ExpectedLine>> {
        match self.manifests.expected_lines(scope).await {
            Ok(expected) => Some(expected),
            Err(e) => {
                tracing::warn!(scope = %scope, error = %e, "Manifest unavailable, continuing without expectations");
                None
            }
        }
    }

    /// Applies `f` to the cached snapshot and persists the result.
    ///
    /// When the scope was not cached (its manifest could not be read), the
    /// mutated copy only stays cached if the write failed; otherwise the next
    /// read rebuilds it from the store and retries the manifest.
    pub async fn mutate<T, F>(&self, scope: &str, f: F) -> ScanResult<(T, Persistence)>
    where
        F: FnOnce(&mut ScopeSnapshot) -> ScanResult<T>,
    {
        let loaded = self.load_snapshot(scope).await?;

        let (value, copy, was_cached) = {
            let mut cache = self.cache.write().await;
            let was_cached = cache.contains_key(scope);
            let snapshot = cache.entry(scope.to_string()).or_insert(loaded);
            let value = match f(snapshot) {
                Ok(value) => value,
                Err(e) => {
                    if !was_cached {
                        cache.remove(scope);
                    }
                    return Err(e);
                }
            };
            snapshot.updated_at = Some(Utc::now());
            (value, snapshot.clone(), was_cached)
        };

        let persistence: Persistence = self.backend.put_current_state(scope, &copy).await.into();
        match persistence.warning() {
            Some(err) => tracing::warn!(scope = %scope, error = %err, "Failed to persist snapshot"),
            None if !was_cached => {
                self.cache.write().await.remove(scope);
            }
            None => {}
        }
        Ok((value, persistence))
    }

    /// Counts a scan, persists the snapshot and appends its history entry.
    pub async fn apply_scan(
        &self,
        scan: &ScanApplication,
        context: StockAtScan,
    ) -> ScanResult<(Applied, Persistence)> {
        let scope = scan.key.shipment_code.clone();
        let current = self.load_snapshot(&scope).await?;
        let expected = match current.find(&scan.key) {
            Some(_) => None,
            None => self
                .expected_lines(&scope)
                .await
                .and_then(|lines| lines.into_iter().find(|l| l.key() == scan.key)),
        };
        let (applied, saved) = self
            .mutate(&scope, |snapshot| engine::apply_scan(snapshot, scan, expected.as_ref()))
            .await?;

        let entry = HistoryEntry {
            operator_id: scan.operator_id.clone(),
            delta_quantity: applied.delta_quantity,
            delta_cartons: applied.delta_cartons,
            timestamp: scan.at,
            snapshot: Some(StockAtScan {
                scanned_quantity_after: applied.line.scanned_quantity,
                scanned_cartons_after: applied.line.scanned_cartons,
                ..context
            }),
        };
        let appended: Persistence = self.record_history(&scan.key, &entry).await.into();
        if let Some(err) = appended.warning() {
            tracing::warn!(line = %scan.key, error = %err, "Failed to append history");
        }

        Ok((applied, saved.merge(appended)))
    }

    async fn record_history(&self, key: &LineKey, entry: &HistoryEntry) -> Result<(), StoreError> {
        let history_key = key.history_key();
        let count = self.backend.append_history(&history_key, entry).await?;
        if count > self.retention.prune_threshold {
            let cutoff = self.retention.cutoff(Utc::now());
            let pruned = self.backend.prune_history(&history_key, cutoff).await?;
            if pruned > 0 {
                tracing::info!(line = %key, pruned, "Pruned expired history entries");
            }
        }
        Ok(())
    }

    /// History for one line, newest first.
    pub async fn history(&self, key: &LineKey) -> ScanResult<Vec<HistoryEntry>> {
        let mut entries = self.backend.get_history(&key.history_key()).await?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    /// Clears the current-state snapshot back to the manifest's expected
    /// lines with nothing counted. History is left untouched.
    pub async fn reset(&self, scope: &str) -> ScanResult<Persistence> {
        let expected = self.expected_lines(scope).await.unwrap_or_default();
        let ((), persistence) = self
            .mutate(scope, |snapshot| {
                snapshot.lines.clear();
                engine::seed_from_manifest(snapshot, &expected);
                snapshot.reset_at = Some(Utc::now());
                Ok(())
            })
            .await?;
        Ok(persistence)
    }

    /// Replaces the scope's manifest and re-seeds the snapshot from it.
    pub async fn import_manifest(
        &self,
        scope: &str,
        lines: &[ExpectedLine],
    ) -> ScanResult<(usize, Persistence)> {
        self.manifests
            .replace_manifest(scope, lines)
            .await
            .map_err(ScanError::from)?;
        self.mutate(scope, |snapshot| Ok(engine::seed_from_manifest(snapshot, lines)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::check_line::{CountMode, LineStatus};
    use crate::models::history::replay_totals;
    use crate::scan::identity::resolve_line_key;
    use crate::store::memory::InMemoryStore;
    use chrono::Duration;

    fn store_with(backend: Arc<InMemoryStore>, retention: RetentionPolicy) -> SnapshotStore {
        SnapshotStore::new(backend.clone(), backend, retention)
    }

    fn scan(key: &LineKey, qty: i64, at: DateTime<Utc>) -> ScanApplication {
        ScanApplication {
            key: key.clone(),
            mode: CountMode::Quantity,
            delta_quantity: qty,
            operator_id: "ASP0001".into(),
            at,
        }
    }

    #[tokio::test]
    async fn scan_is_written_through_and_reloadable() {
        let backend = Arc::new(InMemoryStore::new());
        let store = store_with(backend.clone(), RetentionPolicy::default());
        let key = resolve_line_key("0001", "MAT01", "PO1").unwrap();

        let (applied, persistence) = store
            .apply_scan(&scan(&key, 4, Utc::now()), StockAtScan::default())
            .await
            .unwrap();
        assert_eq!(applied.line.scanned_quantity, 4);
        assert_eq!(persistence, Persistence::Saved);

        let persisted = backend.get_current_state("0001").await.unwrap().unwrap();
        assert_eq!(persisted.find(&key).unwrap().scanned_quantity, 4);

        let fresh = store_with(backend.clone(), RetentionPolicy::default());
        assert_eq!(fresh.load_snapshot("0001").await.unwrap().lines.len(), 1);
    }

    #[tokio::test]
    async fn failed_writes_keep_cache_and_warn() {
        let backend = Arc::new(InMemoryStore::new());
        let store = store_with(backend.clone(), RetentionPolicy::default());
        let key = resolve_line_key("0001", "MAT01", "PO1").unwrap();

        backend.set_fail_writes(true);
        let (applied, persistence) = store
            .apply_scan(&scan(&key, 4, Utc::now()), StockAtScan::default())
            .await
            .unwrap();
        assert_eq!(applied.line.scanned_quantity, 4);
        assert!(persistence.warning().is_some());

        let cached = store.load_snapshot("0001").await.unwrap();
        assert_eq!(cached.find(&key).unwrap().scanned_quantity, 4);

        // The durable store is the source of truth after a reload.
        let reloaded = store.reload("0001").await.unwrap();
        assert!(reloaded.find(&key).is_none());
    }

    #[tokio::test]
    async fn reset_clears_snapshot_but_keeps_history() {
        let backend = Arc::new(InMemoryStore::new());
        let store = store_with(backend.clone(), RetentionPolicy::default());
        let key = resolve_line_key("0001", "MAT01", "PO1").unwrap();

        store.apply_scan(&scan(&key, 4, Utc::now()), StockAtScan::default()).await.unwrap();
        store.reset("0001").await.unwrap();

        let snapshot = store.load_snapshot("0001").await.unwrap();
        assert!(snapshot.lines.is_empty());
        assert!(snapshot.reset_at.is_some());
        assert_eq!(store.history(&key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pruning_runs_above_threshold_and_spares_recent_entries() {
        let backend = Arc::new(InMemoryStore::new());
        let retention = RetentionPolicy {
            prune_threshold: 3,
            retention_months: 12,
        };
        let store = store_with(backend.clone(), retention);
        let key = resolve_line_key("0001", "MAT01", "PO1").unwrap();
        let now = Utc::now();

        for days in [800, 500, 20] {
            store
                .apply_scan(&scan(&key, 1, now - Duration::days(days)), StockAtScan::default())
                .await
                .unwrap();
        }
        assert_eq!(store.history(&key).await.unwrap().len(), 3);

        store.apply_scan(&scan(&key, 1, now), StockAtScan::default()).await.unwrap();
        let history = store.history(&key).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|e| e.timestamp >= retention.cutoff(now)));
        assert!(history[0].timestamp > history[1].timestamp);
    }

    #[tokio::test]
    async fn history_replays_to_snapshot_totals() {
        let backend = Arc::new(InMemoryStore::new());
        let store = store_with(backend, RetentionPolicy::default());
        let key = resolve_line_key("0001", "MAT01", "PO1").unwrap();
        let start = Utc::now();
        for (i, qty) in [3, 9, 1].into_iter().enumerate() {
            let at = start + Duration::seconds(i as i64);
            store.apply_scan(&scan(&key, qty, at), StockAtScan::default()).await.unwrap();
        }

        let snapshot = store.load_snapshot("0001").await.unwrap();
        let line = snapshot.find(&key).unwrap();
        let history = store.history(&key).await.unwrap();
        assert_eq!(
            replay_totals(&history, snapshot.reset_at),
            (line.scanned_quantity, line.scanned_cartons)
        );
        assert_eq!(history[0].snapshot.as_ref().unwrap().scanned_quantity_after, 13);
    }

    #[tokio::test]
    async fn manifest_import_seeds_cached_scope() {
        let backend = Arc::new(InMemoryStore::new());
        let store = store_with(backend, RetentionPolicy::default());
        let expected = vec![ExpectedLine {
            shipment_code: "0001".into(),
            material_code: "MAT01".into(),
            po_or_pallet_key: "PO1".into(),
            expected_quantity: 15,
            expected_cartons: 0,
        }];
        let (created, _) = store.import_manifest("0001", &expected).await.unwrap();
        assert_eq!(created, 1);
        let snapshot = store.load_snapshot("0001").await.unwrap();
        assert_eq!(snapshot.lines[0].expected_quantity, 15);
        assert!(!snapshot.lines[0].is_ad_hoc);
    }

    fn manifest_mat01(qty: i64) -> Vec<ExpectedLine> {
        vec![ExpectedLine {
            shipment_code: "0001".into(),
            material_code: "MAT01".into(),
            po_or_pallet_key: "PO1".into(),
            expected_quantity: qty,
            expected_cartons: 0,
        }]
    }

    #[tokio::test]
    async fn reset_restores_manifest_lines_with_zero_totals() {
        let backend = Arc::new(InMemoryStore::new());
        let store = store_with(backend.clone(), RetentionPolicy::default());
        let key = resolve_line_key("0001", "MAT01", "PO1").unwrap();
        store.import_manifest("0001", &manifest_mat01(15)).await.unwrap();
        store.apply_scan(&scan(&key, 4, Utc::now()), StockAtScan::default()).await.unwrap();

        store.reset("0001").await.unwrap();
        let snapshot = store.load_snapshot("0001").await.unwrap();
        let line = snapshot.find(&key).unwrap();
        assert_eq!(line.scanned_quantity, 0);
        assert_eq!(line.expected_quantity, 15);
        assert!(!line.is_ad_hoc);

        let (applied, _) = store
            .apply_scan(&scan(&key, 15, Utc::now()), StockAtScan::default())
            .await
            .unwrap();
        assert!(!applied.line.is_ad_hoc);
        assert_eq!(applied.line.status(), LineStatus::Fulfilled);

        // A restart rebuilds the same state from the durable store.
        let fresh = store_with(backend, RetentionPolicy::default());
        assert_eq!(fresh.load_snapshot("0001").await.unwrap(), store.load_snapshot("0001").await.unwrap());
    }

    #[tokio::test]
    async fn manifest_outage_does_not_pin_an_unseeded_snapshot() {
        let backend = Arc::new(InMemoryStore::new());
        backend.replace_manifest("0001", &manifest_mat01(15)).await.unwrap();
        let store = store_with(backend.clone(), RetentionPolicy::default());
        let key = resolve_line_key("0001", "MAT01", "PO1").unwrap();

        backend.set_fail_manifest_reads(true);
        assert!(store.load_snapshot("0001").await.unwrap().lines.is_empty());

        // A scan during the outage cannot see the manifest and lands ad-hoc.
        let other = resolve_line_key("0001", "MAT02", "PO1").unwrap();
        store.apply_scan(&scan(&other, 2, Utc::now()), StockAtScan::default()).await.unwrap();

        backend.set_fail_manifest_reads(false);
        let snapshot = store.load_snapshot("0001").await.unwrap();
        assert_eq!(snapshot.find(&key).unwrap().expected_quantity, 15);
        assert_eq!(snapshot.find(&other).unwrap().scanned_quantity, 2);
    }

    #[tokio::test]
    async fn scan_of_unseeded_manifest_key_takes_its_expectation() {
        let backend = Arc::new(InMemoryStore::new());
        let store = store_with(backend.clone(), RetentionPolicy::default());
        let key = resolve_line_key("0001", "MAT01", "PO1").unwrap();
        store.load_snapshot("0001").await.unwrap();

        // Manifest written behind the cache's back.
        backend.replace_manifest("0001", &manifest_mat01(15)).await.unwrap();
        let (applied, _) = store
            .apply_scan(&scan(&key, 15, Utc::now()), StockAtScan::default())
            .await
            .unwrap();
        assert!(applied.created);
        assert!(!applied.line.is_ad_hoc);
        assert_eq!(applied.line.status(), LineStatus::Fulfilled);
    }
}
