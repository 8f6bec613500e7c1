//! Record types flowing through the pipeline: raw rows, canonical rows and their identity.

use crate::data::era::{Era, Field, SourceLayout};
use crate::error::PipelineError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Stable identity of a raw row: the configured source index and its CSV line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId {
    pub source: u32,
    pub line: u64,
}

impl RowId {
    pub fn new(source: u32, line: u64) -> Self {
        Self { source, line }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

impl FromStr for RowId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, line) = s
            .split_once(':')
            .ok_or_else(|| PipelineError::integrity(format!("invalid row id '{s}'")))?;
        let source = source
            .parse()
            .map_err(|_| PipelineError::integrity(format!("invalid row id '{s}'")))?;
        let line = line
            .parse()
            .map_err(|_| PipelineError::integrity(format!("invalid row id '{s}'")))?;
        Ok(Self { source, line })
    }
}

/// A calendar month, the resolution at which transactions are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, String> {
        if !(1..=12).contains(&month) {
            return Err(format!("month {month} out of range in {year}-{month:02}"));
        }
        Ok(Self { year, month })
    }

    /// Months since year 0, used for month arithmetic.
    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    /// Whole months from `earlier` to `self` (negative if `earlier` is later).
    pub fn months_since(&self, earlier: YearMonth) -> i64 {
        self.ordinal() - earlier.ordinal()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Parses `YYYY-MM`, also accepting a full `YYYY-MM-DD` date.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d"))
            .map_err(|_| format!("invalid month '{s}', expected YYYY-MM"))?;
        Ok(Self {
            year: date.year(),
            month: date.month(),
        })
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Parsed `"<lo> TO <hi>"` storey band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreyRange {
    pub lower: u32,
    pub upper: u32,
}

impl FromStr for StoreyRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lo, hi) = s
            .split_once(" TO ")
            .ok_or_else(|| format!("'{s}' is not of the form '<lo> TO <hi>'"))?;
        let lower: u32 = lo
            .trim()
            .parse()
            .map_err(|_| format!("'{s}' has a non-numeric lower storey"))?;
        let upper: u32 = hi
            .trim()
            .parse()
            .map_err(|_| format!("'{s}' has a non-numeric upper storey"))?;
        if lower > upper {
            return Err(format!("'{s}' has lower storey above upper storey"));
        }
        Ok(Self { lower, upper })
    }
}

/// One resale transaction exactly as read from a source file.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub id: RowId,
    layout: Arc<SourceLayout>,
    values: Vec<String>,
}

impl RawRecord {
    pub fn new(id: RowId, layout: Arc<SourceLayout>, values: Vec<String>) -> Self {
        Self { id, layout, values }
    }

    /// Build a record from `(column, value)` pairs, validating the columns against `era`.
    pub fn from_pairs(era: Era, id: RowId, pairs: &[(&str, &str)]) -> Result<Self, PipelineError> {
        let header: Vec<String> = pairs.iter().map(|(c, _)| c.to_string()).collect();
        let layout = Arc::new(SourceLayout::resolve(era, &header)?);
        let values = pairs.iter().map(|(_, v)| v.to_string()).collect();
        Ok(Self::new(id, layout, values))
    }

    pub fn era(&self) -> Era {
        self.layout.era
    }

    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Trimmed value of a canonical field; `None` when absent from this era, short row, or blank.
    pub fn field(&self, field: Field) -> Option<&str> {
        let idx = self.layout.index_of(field)?;
        self.values
            .get(idx)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// One transaction in the unified schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: RowId,
    pub town: String,
    pub flat_type: String,
    pub flat_model: String,
    pub storey_range: String,
    pub storey: StoreyRange,
    pub block: String,
    pub street_name: String,
    pub floor_area_sqm: f64,
    pub lease_commence_year: i32,
    pub remaining_lease_months: u32,
    pub transaction: YearMonth,
    pub resale_price: f64,
}
