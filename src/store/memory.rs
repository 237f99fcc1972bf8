use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CheckStore, EmployeeDirectory, ManifestSource, StoreError, StoreResult};
use crate::models::history::HistoryEntry;
use crate::models::manifest::ExpectedLine;
use crate::models::snapshot::ScopeSnapshot;

/// Process-local backend. Used by the test suite and for running the engine
/// without a database.
#[derive(Default)]
pub struct InMemoryStore {
    snapshots: RwLock<HashMap<String, ScopeSnapshot>>,
    history: RwLock<HashMap<String, Vec<HistoryEntry>>>,
    manifests: RwLock<HashMap<String, Vec<ExpectedLine>>>,
    employees: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
    fail_manifest_reads: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail until switched back off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes manifest reads fail until switched back off.
    pub fn set_fail_manifest_reads(&self, fail: bool) {
        self.fail_manifest_reads.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CheckStore for InMemoryStore {
    async fn get_current_state(&self, scope: &str) -> StoreResult<Option<ScopeSnapshot>> {
        Ok(self.snapshots.read().await.get(scope).cloned())
    }

    async fn put_current_state(&self, scope: &str, snapshot: &ScopeSnapshot) -> StoreResult<()> {
        self.check_writable()?;
        self.snapshots
            .write()
            .await
            .insert(scope.to_string(), snapshot.clone());
        Ok(())
    }

    async fn append_history(&self, line_key: &str, entry: &HistoryEntry) -> StoreResult<usize> {
        self.check_writable()?;
        let mut history = self.history.write().await;
        let entries = history.entry(line_key.to_string()).or_default();
        entries.push(entry.clone());
        Ok(entries.len())
    }

    async fn get_history(&self, line_key: &str) -> StoreResult<Vec<HistoryEntry>> {
        let mut entries = self
            .history
            .read()
            .await
            .get(line_key)
            .cloned()
            .unwrap_or_default();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    async fn prune_history(&self, line_key: &str, older_than: DateTime<Utc>) -> StoreResult<usize> {
        self.check_writable()?;
        let mut history = self.history.write().await;
        let Some(entries) = history.get_mut(line_key) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|e| e.timestamp >= older_than);
        Ok(before - entries.len())
    }
}

#[async_trait]
impl ManifestSource for InMemoryStore {
    async fn expected_lines(&self, shipment_code: &str) -> StoreResult<Vec<ExpectedLine>> {
        if self.fail_manifest_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("manifest source offline".into()));
        }
        Ok(self
            .manifests
            .read()
            .await
            .get(shipment_code)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_manifest(&self, shipment_code: &str, lines: &[ExpectedLine]) -> StoreResult<()> {
        self.check_writable()?;
        self.manifests
            .write()
            .await
            .insert(shipment_code.to_string(), lines.to_vec());
        Ok(())
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryStore {
    async fn display_name(&self, code: &str) -> StoreResult<Option<String>> {
        Ok(self.employees.read().await.get(code).cloned())
    }

    async fn upsert(&self, code: &str, display_name: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.employees
            .write()
            .await
            .insert(code.to_string(), display_name.to_string());
        Ok(())
    }
}
