//! Raw ingestion: reading an era-tagged CSV extract into [`RawRecord`]s.

use crate::data::era::{Era, SourceLayout};
use crate::data::record::{RawRecord, RowId};
use crate::error::{IoContext, PipelineError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An era-tagged CSV extract.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub index: u32,
    pub path: PathBuf,
    pub era_tag: String,
}

/// The rows of one source after header validation and duplicate removal.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub index: u32,
    pub path: PathBuf,
    pub era: Era,
    pub layout: Arc<SourceLayout>,
    pub records: Vec<RawRecord>,
    /// Data rows in the file, duplicates included.
    pub rows_read: usize,
    pub duplicates: usize,
}

impl CsvSource {
    pub fn new(index: u32, path: impl Into<PathBuf>, era_tag: impl Into<String>) -> Self {
        Self {
            index,
            path: path.into(),
            era_tag: era_tag.into(),
        }
    }

    /// Read the whole file.
    ///
    /// Fails with `UnknownSchema` for an unknown era tag or a header lacking the era's
    /// required columns, and with `Io`/`Csv` when the file cannot be read.
    pub fn load(&self, drop_duplicates: bool) -> Result<LoadedSource, PipelineError> {
        let era: Era = self.era_tag.parse().map_err(|e| match e {
            PipelineError::UnknownSchema(msg) => {
                PipelineError::unknown_schema(format!("{}: {msg}", self.path.display()))
            }
            other => other,
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(&self.path)
            .at(&self.path)?;

        let header: Vec<String> = reader
            .headers()
            .at(&self.path)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let layout = SourceLayout::resolve(era, &header).map_err(|e| match e {
            PipelineError::UnknownSchema(msg) => {
                PipelineError::unknown_schema(format!("{}: {msg}", self.path.display()))
            }
            other => other,
        })?;
        let layout = Arc::new(layout);

        let mut records = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut rows_read = 0usize;
        let mut duplicates = 0usize;

        for (offset, result) in reader.records().enumerate() {
            let record = result.at(&self.path)?;
            // all-blank rows are kept so unification drops and counts them
            rows_read += 1;

            // Header is line 1.
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(offset as u64 + 2);
            let values: Vec<String> = record.iter().map(str::to_string).collect();

            if drop_duplicates && !seen.insert(values.join("\u{1f}")) {
                duplicates += 1;
                tracing::trace!(source = %self.path.display(), line, "duplicate row dropped");
                continue;
            }

            records.push(RawRecord::new(
                RowId::new(self.index, line),
                Arc::clone(&layout),
                values,
            ));
        }

        tracing::info!(
            source = %self.path.display(),
            era = %era,
            rows = rows_read,
            duplicates,
            "Loaded raw extract"
        );

        Ok(LoadedSource {
            index: self.index,
            path: self.path.clone(),
            era,
            layout,
            records,
            rows_read,
            duplicates,
        })
    }
}

impl LoadedSource {
    pub fn display_name(&self) -> String {
        file_label(&self.path)
    }
}

/// File name of `path`, or the full path when it has none.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
