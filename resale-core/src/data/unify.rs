//! Schema unification: era-specific raw rows to [`CanonicalRecord`]s.

use crate::config::UnitConfig;
use crate::data::era::{AreaUnit, Field, LeaseRule};
use crate::data::record::{CanonicalRecord, RawRecord, StoreyRange, YearMonth};
use crate::data::report::SourceReport;
use crate::data::source::LoadedSource;
use crate::error::PipelineError;
use regex::Regex;
use std::sync::LazyLock;

static YEARS_MONTHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+years?(?:\s+(\d+)\s+months?)?$").expect("valid lease regex")
});

/// Maps raw rows of any era onto the canonical schema.
#[derive(Debug, Clone)]
pub struct SchemaUnifier {
    units: UnitConfig,
}

impl SchemaUnifier {
    pub fn new(units: UnitConfig) -> Self {
        Self { units }
    }

    pub fn total_lease_months(&self) -> i64 {
        i64::from(self.units.lease_years) * 12
    }

    /// Unify one raw row. Any missing or unparsable field is a `MalformedRecord`.
    pub fn unify(&self, raw: &RawRecord) -> Result<CanonicalRecord, PipelineError> {
        let town = upper(required(raw, Field::Town)?);
        let flat_type = normalize_flat_type(required(raw, Field::FlatType)?);
        let resale_price = positive(raw, Field::ResalePrice)?;

        let transaction: YearMonth = required(raw, Field::Month)?
            .parse()
            .map_err(|_| invalid(raw, Field::Month))?;

        let storey_range = upper(required(raw, Field::StoreyRange)?);
        let storey: StoreyRange = storey_range
            .parse()
            .map_err(|reason: String| {
                PipelineError::malformed(raw.id, Field::StoreyRange.name(), reason)
            })?;

        let flat_model = upper(required(raw, Field::FlatModel)?);
        let block = upper(required(raw, Field::Block)?);
        let street_name = upper(required(raw, Field::StreetName)?);

        let floor_area = positive(raw, Field::FloorArea)?;
        let floor_area_sqm = match raw.layout().area_unit {
            AreaUnit::SquareMetres => floor_area,
            AreaUnit::SquareFeet => floor_area / self.units.square_feet_per_square_metre,
        };

        let lease_commence_year = parse_year(required(raw, Field::LeaseCommenceDate)?)
            .ok_or_else(|| invalid(raw, Field::LeaseCommenceDate))?;

        let remaining = match raw.layout().lease_rule() {
            LeaseRule::CommencementYear => None,
            rule => raw
                .field(Field::RemainingLease)
                .and_then(|text| parse_remaining_lease(text, rule)),
        };
        let remaining = remaining.unwrap_or_else(|| {
            remaining_lease_from_commencement(
                self.units.lease_years,
                lease_commence_year,
                transaction,
            )
        });
        let remaining_lease_months = remaining.clamp(0, self.total_lease_months()) as u32;

        Ok(CanonicalRecord {
            id: raw.id,
            town,
            flat_type,
            flat_model,
            storey_range,
            storey,
            block,
            street_name,
            floor_area_sqm,
            lease_commence_year,
            remaining_lease_months,
            transaction,
            resale_price,
        })
    }

    /// Unify every row of a loaded source, dropping and counting malformed rows.
    pub fn unify_source(&self, source: &LoadedSource) -> (Vec<CanonicalRecord>, SourceReport) {
        let mut report = SourceReport::new(source.display_name(), source.era);
        report.rows_read = source.rows_read;
        report.duplicates = source.duplicates;

        let mut records = Vec::with_capacity(source.records.len());
        for raw in &source.records {
            match self.unify(raw) {
                Ok(record) => records.push(record),
                Err(PipelineError::MalformedRecord { row, field, reason }) => {
                    tracing::debug!(%row, field, %reason, "Dropping malformed record");
                    report.record_malformed(field);
                }
                Err(other) => {
                    // unify only yields MalformedRecord; keep the row accounted for regardless
                    tracing::debug!(row = %raw.id, error = %other, "Dropping record");
                    report.record_malformed("unknown");
                }
            }
        }
        report.kept = records.len();

        if report.malformed > 0 {
            tracing::warn!(
                source = %report.source,
                malformed = report.malformed,
                "Dropped malformed records"
            );
        }
        (records, report)
    }
}

/// `total - (transaction - January of commencement year)`, in months. Not clamped.
pub fn remaining_lease_from_commencement(
    lease_years: u32,
    commence_year: i32,
    transaction: YearMonth,
) -> i64 {
    let commenced = YearMonth {
        year: commence_year,
        month: 1,
    };
    i64::from(lease_years) * 12 - transaction.months_since(commenced)
}

/// Parse an era's remaining-lease text into months.
pub fn parse_remaining_lease(text: &str, rule: LeaseRule) -> Option<i64> {
    let text = text.trim();
    match rule {
        LeaseRule::CommencementYear => None,
        LeaseRule::RemainingYears => text
            .parse::<f64>()
            .ok()
            .filter(|y| y.is_finite() && *y >= 0.0)
            .map(|years| (years * 12.0).round())
            .filter(|months| *months < i64::MAX as f64)
            .map(|months| months as i64),
        LeaseRule::RemainingYearsMonths => {
            let lowered = text.to_lowercase();
            let caps = YEARS_MONTHS.captures(&lowered)?;
            let years: i64 = caps.get(1)?.as_str().parse().ok()?;
            let months: i64 = match caps.get(2) {
                Some(m) => m.as_str().parse().ok()?,
                None => 0,
            };
            years.checked_mul(12)?.checked_add(months)
        }
    }
}

fn required<'a>(raw: &'a RawRecord, field: Field) -> Result<&'a str, PipelineError> {
    raw.field(field)
        .ok_or_else(|| PipelineError::malformed(raw.id, field.name(), "is missing"))
}

fn invalid(raw: &RawRecord, field: Field) -> PipelineError {
    let value = raw.field(field).unwrap_or_default();
    PipelineError::malformed(raw.id, field.name(), format!("has invalid value '{value}'"))
}

fn positive(raw: &RawRecord, field: Field) -> Result<f64, PipelineError> {
    required(raw, field)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| invalid(raw, field))
}

/// Accepts `1979` as well as spreadsheet-style `1979.0`.
fn parse_year(text: &str) -> Option<i32> {
    text.parse::<i32>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|y| y.fract() == 0.0 && y.abs() < f64::from(i32::MAX))
            .map(|y| y as i32)
    })
}

fn upper(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

fn normalize_flat_type(text: &str) -> String {
    let flat_type = upper(text);
    if flat_type == "MULTI GENERATION" {
        "MULTI-GENERATION".to_string()
    } else {
        flat_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::era::Era;
    use crate::data::record::RowId;
    use pretty_assertions::assert_eq;

    fn unifier() -> SchemaUnifier {
        SchemaUnifier::new(UnitConfig::default())
    }

    fn base_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("month", "2020-01"),
            ("town", "ang mo kio"),
            ("flat_type", "3 ROOM"),
            ("block", "406"),
            ("street_name", "ANG MO KIO AVE 10"),
            ("storey_range", "10 TO 12"),
            ("floor_area_sqm", "67"),
            ("flat_model", " New Generation "),
            ("lease_commence_date", "1990"),
            ("resale_price", "335000"),
        ]
    }

    fn record(era: Era, pairs: &[(&str, &str)]) -> RawRecord {
        RawRecord::from_pairs(era, RowId::new(0, 2), pairs).unwrap()
    }

    #[test]
    fn test_remaining_lease_from_commencement_reference_case() {
        let ym = YearMonth::new(2020, 1).unwrap();
        assert_eq!(remaining_lease_from_commencement(99, 1990, ym), 828);
    }

    #[test]
    fn test_commencement_eras_compute_remaining_lease() {
        for era in [Era::Y1990To1999, Era::Y2000To2012, Era::Y2012To2014] {
            let out = unifier().unify(&record(era, &base_pairs())).unwrap();
            assert_eq!(out.remaining_lease_months, 828, "era {era}");
            assert_eq!(out.town, "ANG MO KIO");
            assert_eq!(out.flat_model, "NEW GENERATION");
            assert_eq!(out.floor_area_sqm, 67.0);
            assert_eq!(out.storey, StoreyRange { lower: 10, upper: 12 });
            assert_eq!(out.transaction, YearMonth::new(2020, 1).unwrap());
            assert_eq!(out.lease_commence_year, 1990);
            assert_eq!(out.resale_price, 335000.0);
        }
    }

    #[test]
    fn test_era_2015_2016_remaining_years() {
        let mut pairs = base_pairs();
        pairs.push(("remaining_lease", "70"));
        let out = unifier().unify(&record(Era::Y2015To2016, &pairs)).unwrap();
        assert_eq!(out.remaining_lease_months, 840);
    }

    #[test]
    fn test_era_2017_years_and_months() {
        let mut pairs = base_pairs();
        pairs.push(("remaining_lease", "61 years 04 months"));
        let out = unifier().unify(&record(Era::Y2017Onwards, &pairs)).unwrap();
        assert_eq!(out.remaining_lease_months, 61 * 12 + 4);

        let mut pairs = base_pairs();
        pairs.push(("remaining_lease", "63 years"));
        let out = unifier().unify(&record(Era::Y2017Onwards, &pairs)).unwrap();
        assert_eq!(out.remaining_lease_months, 756);
    }

    #[test]
    fn test_blank_remaining_lease_falls_back_to_commencement() {
        let mut pairs = base_pairs();
        pairs.push(("remaining_lease", ""));
        let out = unifier().unify(&record(Era::Y2017Onwards, &pairs)).unwrap();
        assert_eq!(out.remaining_lease_months, 828);
    }

    #[test]
    fn test_remaining_lease_is_capped_at_total() {
        let mut pairs = base_pairs();
        pairs.push(("remaining_lease", "120 years"));
        let out = unifier().unify(&record(Era::Y2017Onwards, &pairs)).unwrap();
        assert_eq!(out.remaining_lease_months, 99 * 12);
    }

    #[test]
    fn test_square_feet_are_converted() {
        let pairs: Vec<(&str, &str)> = base_pairs()
            .into_iter()
            .map(|(c, v)| {
                if c == "floor_area_sqm" {
                    ("floor_area_sqft", "1076.39")
                } else {
                    (c, v)
                }
            })
            .collect();
        let out = unifier().unify(&record(Era::Y1990To1999, &pairs)).unwrap();
        assert!((out.floor_area_sqm - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_resale_price_is_malformed() {
        let pairs: Vec<(&str, &str)> = base_pairs()
            .into_iter()
            .map(|(c, v)| if c == "resale_price" { (c, "") } else { (c, v) })
            .collect();
        let err = unifier().unify(&record(Era::Y2000To2012, &pairs)).unwrap_err();
        match err {
            PipelineError::MalformedRecord { field, .. } => assert_eq!(field, "resale_price"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_storey_range_is_malformed() {
        let pairs: Vec<(&str, &str)> = base_pairs()
            .into_iter()
            .map(|(c, v)| if c == "storey_range" { (c, "HIGH") } else { (c, v) })
            .collect();
        let err = unifier().unify(&record(Era::Y2000To2012, &pairs)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MalformedRecord {
                field: "storey_range",
                ..
            }
        ));
    }

    #[test]
    fn test_flat_type_spelling_is_unified() {
        let pairs: Vec<(&str, &str)> = base_pairs()
            .into_iter()
            .map(|(c, v)| {
                if c == "flat_type" {
                    (c, "MULTI GENERATION")
                } else {
                    (c, v)
                }
            })
            .collect();
        let out = unifier().unify(&record(Era::Y1990To1999, &pairs)).unwrap();
        assert_eq!(out.flat_type, "MULTI-GENERATION");
    }

    #[test]
    fn test_parse_remaining_lease_rules() {
        assert_eq!(parse_remaining_lease("70", LeaseRule::RemainingYears), Some(840));
        assert_eq!(parse_remaining_lease("x", LeaseRule::RemainingYears), None);
        assert_eq!(
            parse_remaining_lease("1 year 1 month", LeaseRule::RemainingYearsMonths),
            Some(13)
        );
        assert_eq!(
            parse_remaining_lease("70", LeaseRule::RemainingYearsMonths),
            None
        );
        assert_eq!(parse_remaining_lease("70", LeaseRule::CommencementYear), None);
    }

    #[test]
    fn test_parse_remaining_lease_rejects_overflowing_counts() {
        assert_eq!(
            parse_remaining_lease("999999999999999999 years", LeaseRule::RemainingYearsMonths),
            None
        );
        assert_eq!(
            parse_remaining_lease(
                "768614336404564650 years 11 months",
                LeaseRule::RemainingYearsMonths
            ),
            None
        );
        assert_eq!(
            parse_remaining_lease("1e300", LeaseRule::RemainingYears),
            None
        );
    }

    #[test]
    fn test_parse_year_accepts_float_text() {
        assert_eq!(parse_year("1979"), Some(1979));
        assert_eq!(parse_year("1979.0"), Some(1979));
        assert_eq!(parse_year("1979.5"), None);
    }
}
