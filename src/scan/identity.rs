//! Normalization of raw scanner text into canonical codes and line keys.
//!
//! Every function here is pure and reports malformed input as
//! [`ScanError::Validation`] (or a quantity conflict) instead of panicking:
//! bad scans are routine on the warehouse floor.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{ReconciliationConflict, ScanError, ScanResult};
use crate::models::check_line::{CountMode, LineKey, KEY_SEPARATOR};

static EMPLOYEE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ASP\d{4}$").expect("employee id pattern"));

static LSX_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[/\-.](\d+)").expect("lsx pattern"));

const EMPLOYEE_ID_LEN: usize = 7;

/// Validated employee badge code, e.g. `ASP0001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(String);

impl EmployeeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Takes the first seven characters of the scan, uppercases them and checks
/// them against `ASP` followed by four digits.
pub fn normalize_employee_id(raw: &str) -> ScanResult<EmployeeId> {
    let candidate: String = raw
        .trim()
        .chars()
        .take(EMPLOYEE_ID_LEN)
        .collect::<String>()
        .to_uppercase();

    if candidate.is_empty() {
        return Err(ScanError::validation("Employee ID is required"));
    }
    if !EMPLOYEE_ID.is_match(&candidate) {
        return Err(ScanError::validation(format!(
            "Invalid employee ID '{candidate}', expected ASP followed by 4 digits"
        )));
    }
    Ok(EmployeeId(candidate))
}

/// Uppercases, trims and strips embedded whitespace. When the code carries an
/// LSX number (`2024-15`, `2024.15`, `2024/15`) only that number is kept,
/// rendered with `/`.
pub fn normalize_shipment_code(raw: &str) -> ScanResult<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if cleaned.is_empty() {
        return Err(ScanError::validation("Shipment code is required"));
    }
    if cleaned.contains(KEY_SEPARATOR) {
        return Err(ScanError::validation(format!(
            "Shipment code must not contain '{KEY_SEPARATOR}'"
        )));
    }

    Ok(extract_lsx(&cleaned).unwrap_or(cleaned))
}

/// Pulls a `YYYY/N` work-order number out of a scanned code.
pub fn extract_lsx(code: &str) -> Option<String> {
    LSX_NUMBER
        .captures(code)
        .map(|caps| format!("{}/{}", &caps[1], &caps[2]))
}

fn normalize_part(raw: &str, what: &str) -> ScanResult<String> {
    let part = raw.trim().to_uppercase();
    if part.is_empty() {
        return Err(ScanError::validation(format!("{what} is required")));
    }
    if part.contains(KEY_SEPARATOR) {
        return Err(ScanError::validation(format!(
            "{what} must not contain '{KEY_SEPARATOR}'"
        )));
    }
    Ok(part)
}

pub fn normalize_pallet(raw: &str) -> ScanResult<String> {
    normalize_part(raw, "Pallet code")
}

/// Canonical `(material, pallet-or-PO)` pair.
pub fn normalize_line_key(material_code: &str, po_or_pallet: &str) -> ScanResult<(String, String)> {
    Ok((
        normalize_part(material_code, "Material code")?,
        normalize_part(po_or_pallet, "PO or pallet")?,
    ))
}

/// Full composite key for a scope.
pub fn resolve_line_key(shipment_code: &str, material_code: &str, po_or_pallet: &str) -> ScanResult<LineKey> {
    let (material_code, pallet_or_po_key) = normalize_line_key(material_code, po_or_pallet)?;
    Ok(LineKey {
        shipment_code: normalize_part(shipment_code, "Shipment code")?,
        material_code,
        pallet_or_po_key,
    })
}

/// A parsed goods label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsScan {
    pub material_code: String,
    pub po_or_pallet: String,
    /// Units this scan adds. Always 0 in carton mode.
    pub quantity: i64,
}

/// Parses a goods label of the form `MATERIAL|PO|QTY`.
///
/// In quantity mode the third field is required and must be positive. In
/// carton mode it is optional and ignored: each scan counts one carton.
pub fn parse_goods_payload(raw: &str, mode: CountMode) -> ScanResult<GoodsScan> {
    let parts: Vec<&str> = raw.trim().split(KEY_SEPARATOR).collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(ScanError::validation(format!(
            "Unrecognized goods label '{}', expected MATERIAL|PO|QTY",
            raw.trim()
        )));
    }

    let (material_code, po_or_pallet) = normalize_line_key(parts[0], parts[1])?;

    let quantity = match mode {
        CountMode::Carton => 0,
        CountMode::Quantity => {
            let raw_qty = parts
                .get(2)
                .map(|q| q.trim())
                .filter(|q| !q.is_empty())
                .ok_or_else(|| ScanError::validation("Quantity is required in quantity mode"))?;
            let qty: i64 = raw_qty
                .parse()
                .map_err(|_| ScanError::validation(format!("Quantity '{raw_qty}' is not a number")))?;
            if qty <= 0 {
                return Err(ReconciliationConflict::NonPositiveQuantity(qty).into());
            }
            qty
        }
    };

    Ok(GoodsScan {
        material_code,
        po_or_pallet,
        quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_id_accepts_canonical_and_lowercase() {
        assert_eq!(normalize_employee_id("ASP1234").unwrap().as_str(), "ASP1234");
        assert_eq!(normalize_employee_id("asp1234").unwrap().as_str(), "ASP1234");
        assert_eq!(normalize_employee_id("  asp0001\n").unwrap().as_str(), "ASP0001");
    }

    #[test]
    fn employee_id_rejects_malformed() {
        assert!(matches!(normalize_employee_id("ASP123"), Err(ScanError::Validation(_))));
        assert!(matches!(normalize_employee_id("XYZ1234"), Err(ScanError::Validation(_))));
        assert!(matches!(normalize_employee_id(""), Err(ScanError::Validation(_))));
        assert!(normalize_employee_id("ASP12A4").is_err());
    }

    #[test]
    fn employee_id_uses_first_seven_characters() {
        assert_eq!(normalize_employee_id("ASP1234-NGUYEN").unwrap().as_str(), "ASP1234");
    }

    #[test]
    fn shipment_code_is_cleaned() {
        assert_eq!(normalize_shipment_code(" 00 01 ").unwrap(), "0001");
        assert_eq!(normalize_shipment_code("kh-abc").unwrap(), "KH-ABC");
        assert!(normalize_shipment_code("   ").is_err());
    }

    #[test]
    fn shipment_code_extracts_lsx() {
        assert_eq!(normalize_shipment_code("LSX 2024-15").unwrap(), "2024/15");
        assert_eq!(normalize_shipment_code("2024.7").unwrap(), "2024/7");
        assert_eq!(extract_lsx("ABC"), None);
    }

    #[test]
    fn line_key_ignores_case_and_whitespace() {
        let a = resolve_line_key("0001", " mat01 ", "po1").unwrap();
        let b = resolve_line_key("0001", "MAT01", " PO1").unwrap();
        assert_eq!(a, b);
        assert!(normalize_line_key("MAT|01", "PO1").is_err());
    }

    #[test]
    fn goods_payload_in_quantity_mode() {
        let scan = parse_goods_payload("mat01|po1|10", CountMode::Quantity).unwrap();
        assert_eq!(scan.material_code, "MAT01");
        assert_eq!(scan.po_or_pallet, "PO1");
        assert_eq!(scan.quantity, 10);

        assert!(matches!(
            parse_goods_payload("MAT01|PO1|0", CountMode::Quantity),
            Err(ScanError::Conflict(ReconciliationConflict::NonPositiveQuantity(0)))
        ));
        assert!(matches!(
            parse_goods_payload("MAT01|PO1|abc", CountMode::Quantity),
            Err(ScanError::Validation(_))
        ));
        assert!(parse_goods_payload("MAT01|PO1", CountMode::Quantity).is_err());
    }

    #[test]
    fn goods_payload_in_carton_mode_ignores_quantity() {
        let scan = parse_goods_payload("MAT01|PO1|250", CountMode::Carton).unwrap();
        assert_eq!(scan.quantity, 0);
        assert!(parse_goods_payload("MAT01|PO1", CountMode::Carton).is_ok());
        assert!(parse_goods_payload("MAT01", CountMode::Carton).is_err());
    }
}
