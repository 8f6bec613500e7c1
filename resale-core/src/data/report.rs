//! Per-source ingestion accounting: rows read, dropped and kept.

use crate::data::era::Era;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Drop accounting for one raw extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub era: Era,
    pub rows_read: usize,
    pub duplicates: usize,
    pub malformed: usize,
    /// Malformed rows keyed by the first offending canonical field.
    pub malformed_by_field: BTreeMap<String, usize>,
    pub kept: usize,
}

impl SourceReport {
    pub fn new(source: impl Into<String>, era: Era) -> Self {
        Self {
            source: source.into(),
            era,
            rows_read: 0,
            duplicates: 0,
            malformed: 0,
            malformed_by_field: BTreeMap::new(),
            kept: 0,
        }
    }

    pub fn record_malformed(&mut self, field: &str) {
        self.malformed += 1;
        *self.malformed_by_field.entry(field.to_string()).or_insert(0) += 1;
    }

    pub fn dropped(&self) -> usize {
        self.duplicates + self.malformed
    }
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: read {}, duplicates {}, malformed {}, kept {}",
            self.source, self.era, self.rows_read, self.duplicates, self.malformed, self.kept
        )?;
        if !self.malformed_by_field.is_empty() {
            let detail: Vec<String> = self
                .malformed_by_field
                .iter()
                .map(|(field, n)| format!("{field}={n}"))
                .collect();
            write!(f, " ({})", detail.join(", "))?;
        }
        Ok(())
    }
}
