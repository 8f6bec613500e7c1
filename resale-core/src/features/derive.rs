//! Row-local derived features. Each is a pure function of one canonical record.

use crate::data::record::{CanonicalRecord, RowId, YearMonth};
use crate::split::Keyed;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// A canonical record with its row-local features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    pub record: CanonicalRecord,
    /// Years from lease commencement (January) to the transaction month.
    pub flat_age_years: f64,
    pub month_sin: f64,
    pub month_cos: f64,
    /// Resale price per square metre. A function of the label, so exported as a target only.
    pub price_per_sqm: f64,
}

impl DerivedRecord {
    pub fn from_canonical(record: CanonicalRecord) -> Self {
        let commenced = YearMonth {
            year: record.lease_commence_year,
            month: 1,
        };
        let flat_age_years = (record.transaction.months_since(commenced).max(0) as f64) / 12.0;
        let (month_sin, month_cos) = cyclical_month(record.transaction.month);
        let price_per_sqm = record.resale_price / record.floor_area_sqm;
        Self {
            record,
            flat_age_years,
            month_sin,
            month_cos,
            price_per_sqm,
        }
    }
}

impl Keyed for DerivedRecord {
    fn row_id(&self) -> RowId {
        self.record.id
    }

    fn transaction(&self) -> YearMonth {
        self.record.transaction
    }
}

/// Derive features for every record, preserving order.
pub fn derive_all(records: Vec<CanonicalRecord>) -> Vec<DerivedRecord> {
    records.into_iter().map(DerivedRecord::from_canonical).collect()
}

/// Map month 1..=12 onto the unit circle so December and January are neighbours.
pub fn cyclical_month(month: u32) -> (f64, f64) {
    let angle = TAU * f64::from(month - 1) / 12.0;
    (angle.sin(), angle.cos())
}
