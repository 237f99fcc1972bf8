use serde::Deserialize;

use super::error::{ScanError, ScanResult};

/// A manager badge as captured by the input field, with the time of the
/// first and last keystroke. Hardware scanners type the whole code in a few
/// milliseconds; a person typing it takes far longer.
#[derive(Debug, Clone, Deserialize)]
pub struct BadgeScan {
    pub code: String,
    pub first_keystroke_ms: i64,
    pub last_keystroke_ms: i64,
}

/// Allow-list of manager badges plus the keystroke window a badge scan has to
/// fit in. An anti-tamper heuristic, not a cryptographic control.
#[derive(Debug, Clone)]
pub struct ManagerOverride {
    badges: Vec<String>,
    window_ms: i64,
}

impl ManagerOverride {
    pub fn new<I, S>(badges: I, window_ms: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            badges: badges
                .into_iter()
                .map(|b| b.as_ref().trim().to_uppercase())
                .filter(|b| !b.is_empty())
                .collect(),
            window_ms,
        }
    }

    /// Returns the accepted badge code.
    pub fn verify(&self, scan: &BadgeScan) -> ScanResult<String> {
        let code = scan.code.trim().to_uppercase();
        if !self.badges.iter().any(|b| *b == code) {
            tracing::warn!("Rejected manager override: unknown badge");
            return Err(ScanError::authorization("Manager code not recognized"));
        }

        let elapsed = scan.last_keystroke_ms - scan.first_keystroke_ms;
        if elapsed < 0 || elapsed >= self.window_ms {
            tracing::warn!(elapsed_ms = elapsed, "Rejected manager override: badge was typed");
            return Err(ScanError::authorization(
                "Manager code must be scanned with the badge reader",
            ));
        }

        Ok(code)
    }
}
