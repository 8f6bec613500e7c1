//! Writes partitions as sharded CSV files and publishes them atomically.

use crate::config::ExportConfig;
use crate::error::{IoContext, PipelineError};
use crate::export::{
    EXPORT_FORMAT_VERSION, MANIFEST_FILE, PartitionManifest, ShardEntry, TARGET_HEADER,
    features_file, targets_file,
};
use crate::persistence;
use crate::split::{FeatureRow, Partition, Shard};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Publishes partitions and run artefacts under one output directory.
#[derive(Debug, Clone)]
pub struct DatasetExporter {
    output_dir: PathBuf,
    shard_rows: usize,
}

impl DatasetExporter {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            shard_rows: config.shard_rows,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Start assembling a dataset in a fresh staging directory next to `output_dir`.
    ///
    /// Nothing under `output_dir` changes until [`StagedDataset::publish`]; dropping the
    /// staged dataset leaves the previous publication in place.
    pub fn stage(
        &self,
        run_digest: impl Into<String>,
    ) -> Result<StagedDataset<'_>, PipelineError> {
        let staging = persistence::begin_staging(&self.output_dir).at(&self.output_dir)?;
        Ok(StagedDataset {
            exporter: self,
            staging,
            run_digest: run_digest.into(),
        })
    }
}

/// A dataset being written under a staging directory.
#[derive(Debug)]
pub struct StagedDataset<'a> {
    exporter: &'a DatasetExporter,
    staging: PathBuf,
    run_digest: String,
}

impl StagedDataset<'_> {
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Write every shard of `partition` and its manifest into `<staging>/<label>`.
    pub fn write_partition(
        &self,
        partition: &Partition,
    ) -> Result<PartitionManifest, PipelineError> {
        let dir = self.staging.join(partition.label.as_str());
        std::fs::create_dir_all(&dir).at(&dir)?;

        let mut shards = Vec::new();
        for shard in partition.shards(self.exporter.shard_rows) {
            shards.push(write_shard(&dir, partition.columns(), &shard)?);
        }

        let manifest = PartitionManifest {
            format_version: EXPORT_FORMAT_VERSION,
            partition: partition.label,
            run_digest: self.run_digest.clone(),
            columns: partition.columns().to_vec(),
            rows: partition.len(),
            shards,
        };
        let manifest_path = dir.join(MANIFEST_FILE);
        persistence::atomic_write_json(&manifest_path, &manifest).at(&manifest_path)?;
        tracing::debug!(
            partition = %partition.label,
            rows = manifest.rows,
            shards = manifest.shards.len(),
            "Staged partition"
        );
        Ok(manifest)
    }

    /// Write a JSON artefact at `<staging>/<file_name>`.
    pub fn write_json<T: Serialize>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<PathBuf, PipelineError> {
        let path = self.staging.join(file_name);
        persistence::atomic_write_json(&path, value).at(&path)?;
        tracing::debug!(path = %path.display(), "Staged artefact");
        Ok(path)
    }

    /// Replace `output_dir` with the staged dataset in one rename.
    pub fn publish(self) -> Result<PathBuf, PipelineError> {
        let target = self.exporter.output_dir.clone();
        persistence::publish_dir(&self.staging, &target).at(&target)?;
        tracing::info!(
            run_digest = %self.run_digest,
            path = %target.display(),
            "Published dataset"
        );
        Ok(target)
    }
}

fn write_shard(
    dir: &Path,
    columns: &[String],
    shard: &Shard<'_>,
) -> Result<ShardEntry, PipelineError> {
    let features_name = features_file(shard.index);
    let features_path = dir.join(&features_name);
    let features = render_csv(&features_path, columns, shard.rows, |row| {
        row.features.iter().map(f64::to_string).collect()
    })?;
    std::fs::write(&features_path, &features).at(&features_path)?;

    let targets_name = targets_file(shard.index);
    let targets_path = dir.join(&targets_name);
    let targets = render_csv(&targets_path, &TARGET_HEADER, shard.rows, |row| {
        vec![
            row.id.to_string(),
            row.resale_price.to_string(),
            row.price_per_sqm.to_string(),
        ]
    })?;
    std::fs::write(&targets_path, &targets).at(&targets_path)?;

    Ok(ShardEntry {
        index: shard.index,
        rows: shard.rows.len(),
        features_file: features_name,
        features_sha256: persistence::hash_bytes(&features),
        targets_file: targets_name,
        targets_sha256: persistence::hash_bytes(&targets),
    })
}

fn render_csv<H: AsRef<[u8]>>(
    path: &Path,
    header: &[H],
    rows: &[FeatureRow],
    fields: impl Fn(&FeatureRow) -> Vec<String>,
) -> Result<Vec<u8>, PipelineError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header).at(path)?;
    for row in rows {
        writer.write_record(fields(row)).at(path)?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::io(path, e.into_error()))
}
