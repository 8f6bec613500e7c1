//! Model-ready partitions and their storage shards.

use crate::data::record::RowId;
use crate::error::PipelineError;
use crate::split::SplitLabel;
use serde::{Deserialize, Serialize};

/// One observation: numeric features plus its targets, keyed by the raw row it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub id: RowId,
    pub features: Vec<f64>,
    pub resale_price: f64,
    pub price_per_sqm: f64,
}

/// An ordered set of feature rows sharing one column layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub label: SplitLabel,
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

/// A storage-only slice of a partition. Boundaries carry no meaning.
#[derive(Debug, Clone, Copy)]
pub struct Shard<'a> {
    pub index: usize,
    pub rows: &'a [FeatureRow],
}

impl Partition {
    /// Fails with `Integrity` if any row's width differs from `columns`.
    pub fn new(
        label: SplitLabel,
        columns: Vec<String>,
        rows: Vec<FeatureRow>,
    ) -> Result<Self, PipelineError> {
        if let Some(bad) = rows.iter().find(|r| r.features.len() != columns.len()) {
            return Err(PipelineError::integrity(format!(
                "{label} row {} has {} features, expected {}",
                bad.id,
                bad.features.len(),
                columns.len()
            )));
        }
        Ok(Self {
            label,
            columns,
            rows,
        })
    }

    /// Reassemble a partition from shards given in shard order.
    pub fn from_shards(
        label: SplitLabel,
        columns: Vec<String>,
        shards: impl IntoIterator<Item = Vec<FeatureRow>>,
    ) -> Result<Self, PipelineError> {
        let rows = shards.into_iter().flatten().collect();
        Self::new(label, columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.rows.iter().map(|r| r.id)
    }

    /// Consecutive shards of at most `shard_rows` rows. An empty partition yields one empty
    /// shard so its header is still written.
    pub fn shards(&self, shard_rows: usize) -> Vec<Shard<'_>> {
        let shard_rows = shard_rows.max(1);
        if self.rows.is_empty() {
            return vec![Shard {
                index: 0,
                rows: &[],
            }];
        }
        self.rows
            .chunks(shard_rows)
            .enumerate()
            .map(|(index, rows)| Shard { index, rows })
            .collect()
    }
}
