//! Shared builders for unit tests.

use crate::data::record::{CanonicalRecord, RowId, StoreyRange};

pub(crate) fn canonical(month: &str, commence: i32, price: f64, area: f64) -> CanonicalRecord {
    CanonicalRecord {
        id: RowId::new(0, 2),
        town: "BEDOK".into(),
        flat_type: "4 ROOM".into(),
        flat_model: "MODEL A".into(),
        storey_range: "04 TO 06".into(),
        storey: StoreyRange { lower: 4, upper: 6 },
        block: "101".into(),
        street_name: "BEDOK NTH AVE 4".into(),
        floor_area_sqm: area,
        lease_commence_year: commence,
        remaining_lease_months: 900,
        transaction: month.parse().unwrap(),
        resale_price: price,
    }
}

/// A record with the given line id, town and transaction month.
pub(crate) fn canonical_at(line: u64, town: &str, month: &str) -> CanonicalRecord {
    let mut record = canonical(month, 1990, 400_000.0, 90.0);
    record.id = RowId::new(0, line);
    record.town = town.to_string();
    record
}
