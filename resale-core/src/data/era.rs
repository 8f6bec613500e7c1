//! Fixed schema mapping table for the five raw extract eras.
//!
//! Each era has one explicit [`EraSchema`] naming the source columns accepted for every
//! canonical field and how the remaining lease is encoded. A source header is validated
//! against its era's schema once, at load time, producing a [`SourceLayout`].

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A raw extract era. Each era has its own column schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Era {
    /// Approval-date records, 1990 to 1999.
    Y1990To1999,
    /// Approval-date records, 2000 to February 2012.
    Y2000To2012,
    /// Registration-date records, March 2012 to December 2014.
    Y2012To2014,
    /// Registration-date records with remaining lease in whole years, 2015 to 2016.
    Y2015To2016,
    /// Registration-date records with remaining lease as "NN years MM months", 2017 onwards.
    Y2017Onwards,
}

impl Era {
    pub const ALL: [Era; 5] = [
        Era::Y1990To1999,
        Era::Y2000To2012,
        Era::Y2012To2014,
        Era::Y2015To2016,
        Era::Y2017Onwards,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Era::Y1990To1999 => "1990-1999",
            Era::Y2000To2012 => "2000-2012",
            Era::Y2012To2014 => "2012-2014",
            Era::Y2015To2016 => "2015-2016",
            Era::Y2017Onwards => "2017-onwards",
        }
    }

    pub fn schema(&self) -> &'static EraSchema {
        match self {
            Era::Y1990To1999 => &ERA_1990_1999,
            Era::Y2000To2012 => &ERA_2000_2012,
            Era::Y2012To2014 => &ERA_2012_2014,
            Era::Y2015To2016 => &ERA_2015_2016,
            Era::Y2017Onwards => &ERA_2017_ONWARDS,
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Era {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Era::ALL
            .iter()
            .copied()
            .find(|era| era.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = Era::ALL.iter().map(|e| e.tag()).collect();
                PipelineError::unknown_schema(format!(
                    "era '{s}' is not one of: {}",
                    known.join(", ")
                ))
            })
    }
}

impl TryFrom<String> for Era {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Era> for String {
    fn from(value: Era) -> Self {
        value.tag().to_string()
    }
}

/// Canonical fields a raw column can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Month,
    Town,
    FlatType,
    Block,
    StreetName,
    StoreyRange,
    FloorArea,
    FlatModel,
    LeaseCommenceDate,
    RemainingLease,
    ResalePrice,
}

impl Field {
    pub const COUNT: usize = 11;

    fn slot(self) -> usize {
        self as usize
    }

    /// Canonical column name, used in error reports and drop counters.
    pub fn name(self) -> &'static str {
        match self {
            Field::Month => "month",
            Field::Town => "town",
            Field::FlatType => "flat_type",
            Field::Block => "block",
            Field::StreetName => "street_name",
            Field::StoreyRange => "storey_range",
            Field::FloorArea => "floor_area",
            Field::FlatModel => "flat_model",
            Field::LeaseCommenceDate => "lease_commence_date",
            Field::RemainingLease => "remaining_lease",
            Field::ResalePrice => "resale_price",
        }
    }
}

/// Unit the floor area column is recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    SquareMetres,
    SquareFeet,
}

/// How an era records the lease left at transaction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseRule {
    /// Only the commencement year is given; remaining lease is computed.
    CommencementYear,
    /// `remaining_lease` in whole years, e.g. `70`.
    RemainingYears,
    /// `remaining_lease` as `"61 years 04 months"` or `"61 years"`.
    RemainingYearsMonths,
}

/// A source column accepted for a canonical field.
#[derive(Debug, Clone, Copy)]
pub struct ColumnAlias {
    pub name: &'static str,
    pub unit: Option<AreaUnit>,
}

/// Accepted source columns for one canonical field.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub field: Field,
    pub aliases: &'static [ColumnAlias],
}

/// The fixed schema record for one era.
#[derive(Debug)]
pub struct EraSchema {
    pub era: Era,
    pub description: &'static str,
    pub columns: &'static [ColumnSpec],
    pub lease: LeaseRule,
}

const fn col(name: &'static str) -> ColumnAlias {
    ColumnAlias { name, unit: None }
}

const MONTH: ColumnSpec = ColumnSpec {
    field: Field::Month,
    aliases: &[col("month")],
};
const TOWN: ColumnSpec = ColumnSpec {
    field: Field::Town,
    aliases: &[col("town")],
};
const FLAT_TYPE: ColumnSpec = ColumnSpec {
    field: Field::FlatType,
    aliases: &[col("flat_type")],
};
const BLOCK: ColumnSpec = ColumnSpec {
    field: Field::Block,
    aliases: &[col("block")],
};
const STREET_NAME: ColumnSpec = ColumnSpec {
    field: Field::StreetName,
    aliases: &[col("street_name")],
};
const STOREY_RANGE: ColumnSpec = ColumnSpec {
    field: Field::StoreyRange,
    aliases: &[col("storey_range")],
};
const FLOOR_AREA: ColumnSpec = ColumnSpec {
    field: Field::FloorArea,
    aliases: &[
        ColumnAlias {
            name: "floor_area_sqm",
            unit: Some(AreaUnit::SquareMetres),
        },
        ColumnAlias {
            name: "floor_area_sqft",
            unit: Some(AreaUnit::SquareFeet),
        },
    ],
};
const FLAT_MODEL: ColumnSpec = ColumnSpec {
    field: Field::FlatModel,
    aliases: &[col("flat_model")],
};
const LEASE_COMMENCE_DATE: ColumnSpec = ColumnSpec {
    field: Field::LeaseCommenceDate,
    aliases: &[col("lease_commence_date")],
};
const REMAINING_LEASE: ColumnSpec = ColumnSpec {
    field: Field::RemainingLease,
    aliases: &[col("remaining_lease")],
};
const RESALE_PRICE: ColumnSpec = ColumnSpec {
    field: Field::ResalePrice,
    aliases: &[col("resale_price")],
};

const COMMENCEMENT_COLUMNS: &[ColumnSpec] = &[
    MONTH,
    TOWN,
    FLAT_TYPE,
    BLOCK,
    STREET_NAME,
    STOREY_RANGE,
    FLOOR_AREA,
    FLAT_MODEL,
    LEASE_COMMENCE_DATE,
    RESALE_PRICE,
];

const REMAINING_LEASE_COLUMNS: &[ColumnSpec] = &[
    MONTH,
    TOWN,
    FLAT_TYPE,
    BLOCK,
    STREET_NAME,
    STOREY_RANGE,
    FLOOR_AREA,
    FLAT_MODEL,
    LEASE_COMMENCE_DATE,
    REMAINING_LEASE,
    RESALE_PRICE,
];

static ERA_1990_1999: EraSchema = EraSchema {
    era: Era::Y1990To1999,
    description: "approval date, Jan 1990 to Dec 1999",
    columns: COMMENCEMENT_COLUMNS,
    lease: LeaseRule::CommencementYear,
};

static ERA_2000_2012: EraSchema = EraSchema {
    era: Era::Y2000To2012,
    description: "approval date, Jan 2000 to Feb 2012",
    columns: COMMENCEMENT_COLUMNS,
    lease: LeaseRule::CommencementYear,
};

static ERA_2012_2014: EraSchema = EraSchema {
    era: Era::Y2012To2014,
    description: "registration date, Mar 2012 to Dec 2014",
    columns: COMMENCEMENT_COLUMNS,
    lease: LeaseRule::CommencementYear,
};

static ERA_2015_2016: EraSchema = EraSchema {
    era: Era::Y2015To2016,
    description: "registration date, Jan 2015 to Dec 2016, remaining lease in years",
    columns: REMAINING_LEASE_COLUMNS,
    lease: LeaseRule::RemainingYears,
};

static ERA_2017_ONWARDS: EraSchema = EraSchema {
    era: Era::Y2017Onwards,
    description: "registration date, Jan 2017 onwards, remaining lease in years and months",
    columns: REMAINING_LEASE_COLUMNS,
    lease: LeaseRule::RemainingYearsMonths,
};

impl EraSchema {
    /// Primary column name per field, in schema order.
    pub fn expected_columns(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.aliases[0].name).collect()
    }
}

/// A source header validated against its era schema: column index per canonical field.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLayout {
    pub era: Era,
    pub area_unit: AreaUnit,
    indices: [Option<usize>; Field::COUNT],
}

impl SourceLayout {
    /// Validate `header` against `era`'s schema.
    ///
    /// Fails with `UnknownSchema` naming every required column that has no accepted alias.
    pub fn resolve(era: Era, header: &[String]) -> Result<Self, PipelineError> {
        let schema = era.schema();
        let normalized: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();

        let mut indices = [None; Field::COUNT];
        let mut area_unit = AreaUnit::SquareMetres;
        let mut missing = Vec::new();

        for spec in schema.columns {
            let found = spec.aliases.iter().find_map(|alias| {
                normalized
                    .iter()
                    .position(|h| h == alias.name)
                    .map(|idx| (idx, alias))
            });
            match found {
                Some((idx, alias)) => {
                    indices[spec.field.slot()] = Some(idx);
                    if let Some(unit) = alias.unit {
                        area_unit = unit;
                    }
                }
                None => missing.push(
                    spec.aliases
                        .iter()
                        .map(|a| a.name)
                        .collect::<Vec<_>>()
                        .join("|"),
                ),
            }
        }

        if !missing.is_empty() {
            return Err(PipelineError::unknown_schema(format!(
                "header does not match era {era}: missing column(s) {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            era,
            area_unit,
            indices,
        })
    }

    pub fn index_of(&self, field: Field) -> Option<usize> {
        self.indices[field.slot()]
    }

    pub fn lease_rule(&self) -> LeaseRule {
        self.era.schema().lease
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_era_tags_round_trip() {
        for era in Era::ALL {
            assert_eq!(era.tag().parse::<Era>().unwrap(), era);
            assert_eq!(era.schema().era, era);
        }
    }

    #[test]
    fn test_unknown_era_is_unknown_schema() {
        let err = "1980-1989".parse::<Era>().unwrap_err();
        assert!(matches!(err, PipelineError::UnknownSchema(_)));
    }

    #[test]
    fn test_resolve_full_header() {
        let h = header(&Era::Y2017Onwards.schema().expected_columns());
        let layout = SourceLayout::resolve(Era::Y2017Onwards, &h).unwrap();
        assert_eq!(layout.index_of(Field::Month), Some(0));
        assert_eq!(layout.index_of(Field::RemainingLease), Some(9));
        assert_eq!(layout.area_unit, AreaUnit::SquareMetres);
        assert_eq!(layout.lease_rule(), LeaseRule::RemainingYearsMonths);
    }

    #[test]
    fn test_resolve_accepts_square_feet_alias() {
        let mut cols = Era::Y1990To1999.schema().expected_columns();
        for c in cols.iter_mut() {
            if *c == "floor_area_sqm" {
                *c = "floor_area_sqft";
            }
        }
        let layout = SourceLayout::resolve(Era::Y1990To1999, &header(&cols)).unwrap();
        assert_eq!(layout.area_unit, AreaUnit::SquareFeet);
    }

    #[test]
    fn test_resolve_missing_column_fails() {
        let h = header(&["month", "town", "flat_type"]);
        let err = SourceLayout::resolve(Era::Y2000To2012, &h).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("resale_price"));
        assert!(msg.contains("floor_area_sqm|floor_area_sqft"));
    }

    #[test]
    fn test_remaining_lease_required_only_in_later_eras() {
        let h = header(&Era::Y2012To2014.schema().expected_columns());
        assert!(SourceLayout::resolve(Era::Y2012To2014, &h).is_ok());
        assert!(SourceLayout::resolve(Era::Y2015To2016, &h).is_err());
    }

    #[test]
    fn test_header_match_is_case_and_space_insensitive() {
        let cols: Vec<String> = Era::Y2012To2014
            .schema()
            .expected_columns()
            .iter()
            .map(|c| format!(" {} ", c.to_uppercase()))
            .collect();
        assert!(SourceLayout::resolve(Era::Y2012To2014, &cols).is_ok());
    }
}
