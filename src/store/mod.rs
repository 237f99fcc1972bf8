//! Data-access contracts the scan engine depends on, with a Postgres and an
//! in-memory implementation.

pub mod memory;
pub mod postgres;
pub mod snapshot;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::history::HistoryEntry;
use crate::models::manifest::ExpectedLine;
use crate::models::snapshot::ScopeSnapshot;
use crate::scan::error::ScanError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for ScanError {
    fn from(err: StoreError) -> Self {
        ScanError::Persistence(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Current-state documents and per-line history.
#[async_trait]
pub trait CheckStore: Send + Sync {
    async fn get_current_state(&self, scope: &str) -> StoreResult<Option<ScopeSnapshot>>;

    /// Replaces the scope's document (last write wins).
    async fn put_current_state(&self, scope: &str, snapshot: &ScopeSnapshot) -> StoreResult<()>;

    /// Appends an entry and returns how many entries the line now has.
    async fn append_history(&self, line_key: &str, entry: &HistoryEntry) -> StoreResult<usize>;

    /// Entries for a line, newest first.
    async fn get_history(&self, line_key: &str) -> StoreResult<Vec<HistoryEntry>>;

    /// Deletes entries strictly older than `older_than`; returns the count removed.
    async fn prune_history(&self, line_key: &str, older_than: DateTime<Utc>) -> StoreResult<usize>;
}

/// Expected quantities per shipment (the PXK data).
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn expected_lines(&self, shipment_code: &str) -> StoreResult<Vec<ExpectedLine>>;

    async fn replace_manifest(&self, shipment_code: &str, lines: &[ExpectedLine]) -> StoreResult<()>;
}

/// Employee code to display name.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn display_name(&self, code: &str) -> StoreResult<Option<String>>;

    async fn upsert(&self, code: &str, display_name: &str) -> StoreResult<()>;
}
