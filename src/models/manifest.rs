use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::check_line::LineKey;

/// Expected totals for one line of a shipment manifest (PXK).
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ExpectedLine {
    pub shipment_code: String,
    pub material_code: String,
    pub po_or_pallet_key: String,
    pub expected_quantity: i64,
    pub expected_cartons: i64,
}

impl ExpectedLine {
    pub fn key(&self) -> LineKey {
        LineKey {
            shipment_code: self.shipment_code.clone(),
            material_code: self.material_code.clone(),
            pallet_or_po_key: self.po_or_pallet_key.clone(),
        }
    }
}
