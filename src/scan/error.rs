use thiserror::Error;

/// Rejections raised while reconciling a scan against a check line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationConflict {
    #[error("Line {0} is locked, cannot update")]
    Locked(String),

    #[error("Line {key} is counted in {existing} mode, scan used {attempted} mode")]
    ModeMismatch {
        key: String,
        existing: &'static str,
        attempted: &'static str,
    },

    #[error("Quantity must be positive (got {0})")]
    NonPositiveQuantity(i64),

    #[error("Line {0} is not an ad-hoc line")]
    NotAdHoc(String),

    #[error("Scan would overflow the running total of line {0}")]
    TotalOverflow(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Conflict(#[from] ReconciliationConflict),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("{0}")]
    Authorization(String),

    #[error("Scan session not found")]
    SessionNotFound,

    #[error("Check line {0} not found")]
    LineNotFound(String),
}

impl ScanError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ScanError::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        ScanError::Authorization(msg.into())
    }

    /// Stable identifier clients use to pick a prompt.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Validation(_) => "validation",
            ScanError::Conflict(_) => "reconciliation_conflict",
            ScanError::Persistence(_) => "persistence",
            ScanError::Authorization(_) => "authorization",
            ScanError::SessionNotFound => "session_not_found",
            ScanError::LineNotFound(_) => "line_not_found",
        }
    }

    /// Errors the operator recovers from by rescanning.
    pub fn is_operator_facing(&self) -> bool {
        matches!(
            self,
            ScanError::Validation(_) | ScanError::Conflict(_) | ScanError::Authorization(_)
        )
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
