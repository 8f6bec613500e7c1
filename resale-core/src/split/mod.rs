//! Deterministic train/test partitioning and storage sharding.

pub mod partition;

pub use partition::{FeatureRow, Partition, Shard};

use crate::config::SplitRule;
use crate::data::record::{CanonicalRecord, RowId, YearMonth};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitLabel {
    Train,
    Test,
}

impl SplitLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitLabel::Train => "train",
            SplitLabel::Test => "test",
        }
    }
}

impl fmt::Display for SplitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows the splitter can route: a stable identity and a transaction month.
pub trait Keyed {
    fn row_id(&self) -> RowId;
    fn transaction(&self) -> YearMonth;
}

impl Keyed for CanonicalRecord {
    fn row_id(&self) -> RowId {
        self.id
    }

    fn transaction(&self) -> YearMonth {
        self.transaction
    }
}

/// The two sides of a split, each in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Split<T> {
    pub train: Vec<T>,
    pub test: Vec<T>,
}

impl<T> Split<T> {
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.test.is_empty()
    }
}

/// Applies a [`SplitRule`]. The same input sequence and rule always give the same split.
#[derive(Debug, Clone)]
pub struct Splitter {
    rule: SplitRule,
}

impl Splitter {
    pub fn new(rule: SplitRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &SplitRule {
        &self.rule
    }

    /// Route every row to exactly one side, keeping input order within each side.
    pub fn split<T: Keyed>(&self, rows: Vec<T>) -> Split<T> {
        let to_test: Vec<bool> = match &self.rule {
            SplitRule::Random { seed, test_ratio } => {
                let n = rows.len();
                let test_count = ((n as f64) * test_ratio).round() as usize;
                let mut order: Vec<usize> = (0..n).collect();
                let mut rng = StdRng::seed_from_u64(*seed);
                order.shuffle(&mut rng);

                let mut mask = vec![false; n];
                for idx in order.into_iter().take(test_count) {
                    mask[idx] = true;
                }
                mask
            }
            SplitRule::Chronological { cutoff } => {
                rows.iter().map(|r| r.transaction() >= *cutoff).collect()
            }
        };

        let mut split = Split {
            train: Vec::with_capacity(rows.len()),
            test: Vec::new(),
        };
        for (row, is_test) in rows.into_iter().zip(to_test) {
            if is_test {
                split.test.push(row);
            } else {
                split.train.push(row);
            }
        }

        tracing::info!(
            train = split.train.len(),
            test = split.test.len(),
            "Partitioned rows"
        );
        split
    }
}
