use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::check_line::{CheckLine, LineKey};

/// Current-state document for one scope (a shipment or a stock-check area).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSnapshot {
    pub scope: String,
    pub lines: Vec<CheckLine>,
    /// Set by `reset`; history recorded before this instant no longer
    /// contributes to the current totals.
    pub reset_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScopeSnapshot {
    pub fn empty(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    pub fn find(&self, key: &LineKey) -> Option<&CheckLine> {
        self.lines.iter().find(|l| l.matches(key))
    }
}
