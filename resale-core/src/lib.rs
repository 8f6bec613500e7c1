//! # resale-core
//!
//! Turns the five historical resale-transaction extracts into one model-ready dataset.
//!
//! Stages, in order:
//! 1. **Ingest** ([`data::CsvSource`]) reads an era-tagged CSV and validates its header.
//! 2. **Unify** ([`data::SchemaUnifier`]) maps each raw row onto [`data::CanonicalRecord`],
//!    reconciling floor-area units and remaining-lease conventions.
//! 3. **Derive** ([`features::derive_all`]) adds row-local features.
//! 4. **Split** ([`split::Splitter`]) routes rows to train or test, reproducibly.
//! 5. **Fit and transform** ([`features::FeatureEngineer`]) learns encoders and scalers on
//!    train only and applies them to both partitions.
//! 6. **Export** ([`export::DatasetExporter`]) writes sharded CSV partitions with manifests
//!    and publishes them atomically.
//!
//! [`Pipeline`] runs all of them from a [`PipelineConfig`].

pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod features;
pub mod persistence;
pub mod pipeline;
pub mod split;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types at the crate root.
pub use config::{
    EncodeMethod, FeatureConfig, NormMethod, PipelineConfig, SourceConfig, SplitRule,
    load_config, workspace_config_path,
};
pub use data::{CanonicalRecord, Era, RawRecord, RowId, SchemaUnifier, SourceReport, YearMonth};
pub use error::PipelineError;
pub use export::{DatasetExporter, PartitionManifest, read_partition, verify_dataset};
pub use features::{DerivedRecord, FeatureEngineer, FittedFeatures};
pub use pipeline::{Pipeline, PreparedDataset, RunSummary};
pub use split::{FeatureRow, Partition, Split, SplitLabel, Splitter};
