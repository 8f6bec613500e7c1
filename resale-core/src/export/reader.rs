//! Reads published partitions back and checks them against their manifests.

use crate::data::record::RowId;
use crate::error::{IoContext, PipelineError};
use crate::export::{
    EXPORT_FORMAT_VERSION, MANIFEST_FILE, PartitionManifest, RUN_REPORT_FILE, TARGET_HEADER,
};
use crate::persistence;
use crate::pipeline::RunSummary;
use crate::split::{FeatureRow, Partition, SplitLabel};
use std::collections::HashSet;
use std::path::Path;

/// Load the manifest of a partition directory.
pub fn read_manifest(dir: &Path) -> Result<PartitionManifest, PipelineError> {
    let path = dir.join(MANIFEST_FILE);
    let manifest: PartitionManifest = persistence::load_json(&path)
        .at(&path)?
        .ok_or_else(|| PipelineError::integrity(format!("{} is missing", path.display())))?;
    if manifest.format_version != EXPORT_FORMAT_VERSION {
        return Err(PipelineError::integrity(format!(
            "{}: format version {} is not supported (expected {EXPORT_FORMAT_VERSION})",
            path.display(),
            manifest.format_version
        )));
    }
    Ok(manifest)
}

/// Read a published partition, concatenating shards in manifest order.
///
/// Every shard's hash, header and row count must match the manifest.
pub fn read_partition(dir: &Path) -> Result<Partition, PipelineError> {
    let manifest = read_manifest(dir)?;
    let mut shards = Vec::with_capacity(manifest.shards.len());

    for entry in &manifest.shards {
        let features_path = dir.join(&entry.features_file);
        let targets_path = dir.join(&entry.targets_file);
        check_hash(&features_path, &entry.features_sha256)?;
        check_hash(&targets_path, &entry.targets_sha256)?;

        let features = read_features(&features_path, &manifest.columns)?;
        let targets = read_targets(&targets_path)?;
        if features.len() != entry.rows || targets.len() != entry.rows {
            return Err(PipelineError::integrity(format!(
                "shard {} of {}: manifest lists {} rows, found {} features and {} targets",
                entry.index,
                dir.display(),
                entry.rows,
                features.len(),
                targets.len()
            )));
        }

        let rows: Vec<FeatureRow> = features
            .into_iter()
            .zip(targets)
            .map(|(features, (id, resale_price, price_per_sqm))| FeatureRow {
                id,
                features,
                resale_price,
                price_per_sqm,
            })
            .collect();
        shards.push(rows);
    }

    let partition = Partition::from_shards(manifest.partition, manifest.columns, shards)?;
    if partition.len() != manifest.rows {
        return Err(PipelineError::integrity(format!(
            "{}: manifest lists {} rows, shards hold {}",
            dir.display(),
            manifest.rows,
            partition.len()
        )));
    }
    Ok(partition)
}

/// Read both partitions under `output_dir` and check they belong to one run.
///
/// The manifests (and `run_report.json`, when present) must carry the same run digest,
/// the partitions must share one column layout, and no row may appear in both.
pub fn verify_dataset(output_dir: &Path) -> Result<Vec<Partition>, PipelineError> {
    let train_dir = output_dir.join(SplitLabel::Train.as_str());
    let test_dir = output_dir.join(SplitLabel::Test.as_str());
    let digest = read_manifest(&train_dir)?.run_digest;
    let test_digest = read_manifest(&test_dir)?.run_digest;
    if digest != test_digest {
        return Err(PipelineError::integrity(format!(
            "train was produced by run {digest}, test by run {test_digest}"
        )));
    }

    let report_path = output_dir.join(RUN_REPORT_FILE);
    if let Some(report) = persistence::load_json::<RunSummary>(&report_path).at(&report_path)? {
        if report.run_digest != digest {
            return Err(PipelineError::integrity(format!(
                "{} belongs to run {}, partitions to run {digest}",
                report_path.display(),
                report.run_digest
            )));
        }
    }

    let train = read_partition(&train_dir)?;
    let test = read_partition(&test_dir)?;
    if train.columns() != test.columns() {
        return Err(PipelineError::integrity(
            "train and test partitions have different feature columns",
        ));
    }
    let train_ids: HashSet<RowId> = train.row_ids().collect();
    let shared = test.row_ids().filter(|id| train_ids.contains(id)).count();
    if shared > 0 {
        return Err(PipelineError::integrity(format!(
            "{shared} row(s) appear in both train and test"
        )));
    }
    Ok(vec![train, test])
}

fn check_hash(path: &Path, expected: &str) -> Result<(), PipelineError> {
    let actual = persistence::hash_file(path).at(path)?;
    if actual != expected {
        return Err(PipelineError::integrity(format!(
            "{}: sha256 {actual} does not match manifest {expected}",
            path.display()
        )));
    }
    Ok(())
}

fn open(
    path: &Path,
    expected_header: &[&str],
) -> Result<csv::Reader<std::fs::File>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new().from_path(path).at(path)?;
    let header = reader.headers().at(path)?;
    if !header.iter().eq(expected_header.iter().copied()) {
        return Err(PipelineError::integrity(format!(
            "{}: header does not match manifest columns",
            path.display()
        )));
    }
    Ok(reader)
}

fn parse_f64(path: &Path, line: u64, text: &str) -> Result<f64, PipelineError> {
    text.parse().map_err(|_| {
        PipelineError::integrity(format!(
            "{}:{line}: '{text}' is not a number",
            path.display()
        ))
    })
}

fn read_features(path: &Path, columns: &[String]) -> Result<Vec<Vec<f64>>, PipelineError> {
    let expected: Vec<&str> = columns.iter().map(String::as_str).collect();
    let mut reader = open(path, &expected)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.at(path)?;
        let line = record.position().map_or(0, |p| p.line());
        let row = record
            .iter()
            .map(|v| parse_f64(path, line, v))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }
    Ok(rows)
}

fn read_targets(path: &Path) -> Result<Vec<(RowId, f64, f64)>, PipelineError> {
    let mut reader = open(path, &TARGET_HEADER)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.at(path)?;
        let line = record.position().map_or(0, |p| p.line());
        rows.push((
            record[0].parse()?,
            parse_f64(path, line, &record[1])?,
            parse_f64(path, line, &record[2])?,
        ));
    }
    Ok(rows)
}
