//! Accumulation and matching of scans against check lines.
//!
//! These functions mutate a [`ScopeSnapshot`] in place and never touch
//! storage. Validation happens before any mutation, so a rejected scan leaves
//! the snapshot exactly as it was.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::error::{ReconciliationConflict, ScanError, ScanResult};
use crate::models::check_line::{CheckLine, CountMode, LineKey};
use crate::models::manifest::ExpectedLine;
use crate::models::snapshot::ScopeSnapshot;

/// A fully validated goods scan, ready to be counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanApplication {
    pub key: LineKey,
    pub mode: CountMode,
    /// Ignored in carton mode.
    pub delta_quantity: i64,
    pub operator_id: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub line: CheckLine,
    pub delta_quantity: i64,
    pub delta_cartons: i64,
    /// The scan created the line (ad-hoc).
    pub created: bool,
    /// Legacy duplicate records folded into the line.
    pub merged_duplicates: usize,
}

/// Folds every record matching `key` into the first one and removes the rest.
/// Returns the surviving index and how many records were removed.
pub fn coalesce(snapshot: &mut ScopeSnapshot, key: &LineKey) -> (Option<usize>, usize) {
    let positions: Vec<usize> = snapshot
        .lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.matches(key))
        .map(|(i, _)| i)
        .collect();

    let Some((&first, rest)) = positions.split_first() else {
        return (None, 0);
    };

    // Remove from the back so earlier indices stay valid.
    let duplicates: Vec<CheckLine> = rest.iter().rev().map(|&i| snapshot.lines.remove(i)).collect();
    let removed = duplicates.len();
    let target = &mut snapshot.lines[first];
    for dup in duplicates.into_iter().rev() {
        merge_into(target, dup);
    }
    (Some(first), removed)
}

fn merge_into(target: &mut CheckLine, dup: CheckLine) {
    target.scanned_quantity = target.scanned_quantity.saturating_add(dup.scanned_quantity);
    target.scanned_cartons = target.scanned_cartons.saturating_add(dup.scanned_cartons);
    target.expected_quantity = target.expected_quantity.max(dup.expected_quantity);
    target.expected_cartons = target.expected_cartons.max(dup.expected_cartons);
    target.locked |= dup.locked;
    target.is_ad_hoc &= dup.is_ad_hoc;
    target.acknowledged |= dup.acknowledged;
    if target.mode.is_none() {
        target.mode = dup.mode;
    }
    if dup.last_scan_timestamp > target.last_scan_timestamp {
        target.last_scan_timestamp = dup.last_scan_timestamp;
        target.last_scan_operator_id = dup.last_scan_operator_id;
    }
}

/// Coalesces every duplicated key in the snapshot.
pub fn coalesce_all(snapshot: &mut ScopeSnapshot) -> usize {
    let mut keys: Vec<LineKey> = snapshot.lines.iter().map(CheckLine::key).collect();
    keys.sort();
    keys.dedup();
    keys.iter().map(|k| coalesce(snapshot, k).1).sum()
}

fn deltas(scan: &ScanApplication) -> (i64, i64) {
    match scan.mode {
        CountMode::Carton => (0, 1),
        CountMode::Quantity => (scan.delta_quantity, 0),
    }
}

fn check_applicable(snapshot: &ScopeSnapshot, scan: &ScanApplication) -> ScanResult<()> {
    if scan.mode == CountMode::Quantity && scan.delta_quantity <= 0 {
        return Err(ReconciliationConflict::NonPositiveQuantity(scan.delta_quantity).into());
    }

    let overflow = || ReconciliationConflict::TotalOverflow(scan.key.to_string());
    let (delta_quantity, delta_cartons) = deltas(scan);
    let mut quantity = delta_quantity;
    let mut cartons = delta_cartons;
    let mut mode = None;
    for line in snapshot.lines.iter().filter(|l| l.matches(&scan.key)) {
        if line.locked {
            return Err(ReconciliationConflict::Locked(scan.key.to_string()).into());
        }
        mode = mode.or(line.mode);
        quantity = quantity.checked_add(line.scanned_quantity).ok_or_else(overflow)?;
        cartons = cartons.checked_add(line.scanned_cartons).ok_or_else(overflow)?;
    }
    if let Some(existing) = mode {
        if existing != scan.mode {
            return Err(ReconciliationConflict::ModeMismatch {
                key: scan.key.to_string(),
                existing: existing.as_str(),
                attempted: scan.mode.as_str(),
            }
            .into());
        }
    }
    Ok(())
}

/// Finds or creates the line for `scan.key` and counts the scan. A missing
/// line is created from `expected` when the manifest knows the key, and as an
/// ad-hoc line otherwise.
///
/// Scanning the same label twice counts twice: a rescan of one carton cannot
/// be told apart from a second identical carton.
pub fn apply_scan(
    snapshot: &mut ScopeSnapshot,
    scan: &ScanApplication,
    expected: Option<&ExpectedLine>,
) -> ScanResult<Applied> {
    check_applicable(snapshot, scan)?;

    let (found, merged_duplicates) = coalesce(snapshot, &scan.key);
    let created = found.is_none();
    let idx = match found {
        Some(i) => i,
        None => {
            let line = match expected.filter(|e| e.key() == scan.key) {
                Some(e) => CheckLine::expected(scan.key.clone(), e.expected_quantity, e.expected_cartons),
                None => CheckLine::ad_hoc(scan.key.clone()),
            };
            snapshot.lines.push(line);
            snapshot.lines.len() - 1
        }
    };

    let (delta_quantity, delta_cartons) = deltas(scan);

    // Totals were bounds-checked in check_applicable.
    let line = &mut snapshot.lines[idx];
    line.mode = Some(scan.mode);
    line.scanned_quantity += delta_quantity;
    line.scanned_cartons += delta_cartons;
    line.last_scan_operator_id = Some(scan.operator_id.clone());
    line.last_scan_timestamp = Some(scan.at);
    snapshot.updated_at = Some(scan.at);

    Ok(Applied {
        line: line.clone(),
        delta_quantity,
        delta_cartons,
        created,
        merged_duplicates,
    })
}

/// Aligns the snapshot with a manifest: known lines take the manifest's
/// expectations and stop being ad-hoc, missing ones are pre-created.
/// Manifest lines the new manifest no longer lists are dropped when nothing
/// was counted on them, and turned ad-hoc otherwise.
/// Returns the number of lines created.
pub fn seed_from_manifest(snapshot: &mut ScopeSnapshot, expected: &[ExpectedLine]) -> usize {
    let keys: HashSet<LineKey> = expected.iter().map(ExpectedLine::key).collect();
    snapshot.lines.retain_mut(|line| {
        if line.is_ad_hoc || keys.contains(&line.key()) {
            return true;
        }
        if line.scanned_quantity == 0 && line.scanned_cartons == 0 && !line.locked {
            return false;
        }
        line.is_ad_hoc = true;
        line.acknowledged = false;
        line.expected_quantity = 0;
        line.expected_cartons = 0;
        true
    });

    let mut created = 0;
    for entry in expected {
        let key = entry.key();
        match coalesce(snapshot, &key).0 {
            Some(i) => {
                let line = &mut snapshot.lines[i];
                line.expected_quantity = entry.expected_quantity;
                line.expected_cartons = entry.expected_cartons;
                line.is_ad_hoc = false;
            }
            None => {
                snapshot.lines.push(CheckLine::expected(
                    key,
                    entry.expected_quantity,
                    entry.expected_cartons,
                ));
                created += 1;
            }
        }
    }
    created
}

fn line_mut<'a>(snapshot: &'a mut ScopeSnapshot, key: &LineKey) -> ScanResult<&'a mut CheckLine> {
    let (found, _) = coalesce(snapshot, key);
    let idx = found.ok_or_else(|| ScanError::LineNotFound(key.to_string()))?;
    Ok(&mut snapshot.lines[idx])
}

pub fn set_locked(snapshot: &mut ScopeSnapshot, key: &LineKey, locked: bool) -> ScanResult<CheckLine> {
    let line = line_mut(snapshot, key)?;
    line.locked = locked;
    Ok(line.clone())
}

pub fn acknowledge(snapshot: &mut ScopeSnapshot, key: &LineKey) -> ScanResult<CheckLine> {
    let line = line_mut(snapshot, key)?;
    if !line.is_ad_hoc {
        return Err(ReconciliationConflict::NotAdHoc(key.to_string()).into());
    }
    line.acknowledged = true;
    Ok(line.clone())
}

/// Removes every record for `key`, returning the coalesced line. A locked
/// line is only removed when `badge_verified` is set.
pub fn remove_line(snapshot: &mut ScopeSnapshot, key: &LineKey, badge_verified: bool) -> ScanResult<CheckLine> {
    let (found, _) = coalesce(snapshot, key);
    let idx = found.ok_or_else(|| ScanError::LineNotFound(key.to_string()))?;
    if snapshot.lines[idx].locked && !badge_verified {
        return Err(ScanError::authorization("Line is locked; scan a manager badge to delete it"));
    }
    Ok(snapshot.lines.remove(idx))
}
