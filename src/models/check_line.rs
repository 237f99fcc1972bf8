use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite identity of a check line: shipment (or stock-check scope),
/// material, and pallet or PO. Fields are stored already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineKey {
    pub shipment_code: String,
    pub material_code: String,
    pub pallet_or_po_key: String,
}

/// Separator used in flattened keys. Scanned fields never contain it because
/// it is also the goods payload separator.
pub const KEY_SEPARATOR: char = '|';

impl LineKey {
    pub fn history_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.shipment_code,
            self.material_code,
            self.pallet_or_po_key,
            sep = KEY_SEPARATOR
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// One scan = one carton.
    Carton,
    /// One scan carries an explicit quantity.
    Quantity,
}

impl CountMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CountMode::Carton => "carton",
            CountMode::Quantity => "quantity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Pending,
    Fulfilled,
    /// No manifest counterpart and not yet acknowledged by an operator.
    AdHoc,
}

impl LineStatus {
    /// Report verdict: "OK" when fulfilled, "Sai" otherwise.
    pub fn verdict(self) -> &'static str {
        match self {
            LineStatus::Fulfilled => "OK",
            LineStatus::Pending | LineStatus::AdHoc => "Sai",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckLine {
    pub shipment_code: String,
    pub material_code: String,
    pub pallet_or_po_key: String,
    /// Set by the first scan; fixed for the lifetime of the line.
    #[serde(default)]
    pub mode: Option<CountMode>,
    pub scanned_quantity: i64,
    pub scanned_cartons: i64,
    pub expected_quantity: i64,
    pub expected_cartons: i64,
    pub last_scan_operator_id: Option<String>,
    pub last_scan_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub is_ad_hoc: bool,
    #[serde(default)]
    pub acknowledged: bool,
}

impl CheckLine {
    /// A line with no scans yet, as pre-created from a manifest entry.
    pub fn expected(key: LineKey, expected_quantity: i64, expected_cartons: i64) -> Self {
        Self {
            shipment_code: key.shipment_code,
            material_code: key.material_code,
            pallet_or_po_key: key.pallet_or_po_key,
            mode: None,
            scanned_quantity: 0,
            scanned_cartons: 0,
            expected_quantity,
            expected_cartons,
            last_scan_operator_id: None,
            last_scan_timestamp: None,
            locked: false,
            is_ad_hoc: false,
            acknowledged: false,
        }
    }

    /// A line created by a scan with no manifest counterpart.
    pub fn ad_hoc(key: LineKey) -> Self {
        Self {
            is_ad_hoc: true,
            ..Self::expected(key, 0, 0)
        }
    }

    pub fn key(&self) -> LineKey {
        LineKey {
            shipment_code: self.shipment_code.clone(),
            material_code: self.material_code.clone(),
            pallet_or_po_key: self.pallet_or_po_key.clone(),
        }
    }

    pub fn matches(&self, key: &LineKey) -> bool {
        self.shipment_code == key.shipment_code
            && self.material_code == key.material_code
            && self.pallet_or_po_key == key.pallet_or_po_key
    }

    /// Scanned total against target in the line's counting unit. Lines that
    /// have not been scanned yet compare by quantity.
    pub fn compare_to_target(&self) -> Ordering {
        match self.mode {
            Some(CountMode::Carton) => self.scanned_cartons.cmp(&self.expected_cartons),
            Some(CountMode::Quantity) | None => self.scanned_quantity.cmp(&self.expected_quantity),
        }
    }

    pub fn status(&self) -> LineStatus {
        if self.is_ad_hoc {
            return if self.acknowledged {
                LineStatus::Fulfilled
            } else {
                LineStatus::AdHoc
            };
        }
        match self.compare_to_target() {
            Ordering::Less => LineStatus::Pending,
            Ordering::Equal | Ordering::Greater => LineStatus::Fulfilled,
        }
    }
}
