//! On-disk dataset layout: sharded CSV partitions with per-partition manifests.
//!
//! ```text
//! <output_dir>/
//!   train/  features-00000.csv  targets-00000.csv  ...  manifest.json
//!   test/   features-00000.csv  targets-00000.csv  ...  manifest.json
//!   encoding.json
//!   run_report.json
//! ```
//!
//! The whole tree is assembled in a staging sibling and published with one rename.

pub mod exporter;
pub mod reader;

pub use exporter::{DatasetExporter, StagedDataset};
pub use reader::{read_partition, verify_dataset};

use crate::split::SplitLabel;
use serde::{Deserialize, Serialize};

/// Bumped whenever the on-disk layout changes incompatibly.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Header of every targets shard.
pub const TARGET_HEADER: [&str; 3] = ["row_id", "resale_price", "price_per_sqm"];

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ENCODING_FILE: &str = "encoding.json";
pub const RUN_REPORT_FILE: &str = "run_report.json";

pub fn features_file(index: usize) -> String {
    format!("features-{index:05}.csv")
}

pub fn targets_file(index: usize) -> String {
    format!("targets-{index:05}.csv")
}

/// One shard as recorded in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEntry {
    pub index: usize,
    pub rows: usize,
    pub features_file: String,
    pub features_sha256: String,
    pub targets_file: String,
    pub targets_sha256: String,
}

/// Describes one published partition directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub format_version: u32,
    pub partition: SplitLabel,
    /// Identifies the run that produced the partition; both partitions of one dataset
    /// carry the same value.
    pub run_digest: String,
    pub columns: Vec<String>,
    pub rows: usize,
    pub shards: Vec<ShardEntry>,
}
