//! End-to-end tests: five era extracts in, published train/test dataset out.

use pretty_assertions::assert_eq;
use resale_core::config::{EncodeMethod, SourceConfig};
use resale_core::export::{ENCODING_FILE, RUN_REPORT_FILE, read_partition, verify_dataset};
use resale_core::{Pipeline, PipelineConfig, PipelineError, RowId, SplitRule, YearMonth};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const COMMENCEMENT_HEADER: &str = "month,town,flat_type,block,street_name,storey_range,\
                                   floor_area_sqm,flat_model,lease_commence_date,resale_price";
const SQFT_HEADER: &str = "month,town,flat_type,block,street_name,storey_range,\
                           floor_area_sqft,flat_model,lease_commence_date,resale_price";
const REMAINING_HEADER: &str = "month,town,flat_type,block,street_name,storey_range,\
                                floor_area_sqm,flat_model,lease_commence_date,\
                                remaining_lease,resale_price";

const TOWNS: [&str; 3] = ["BEDOK", "ANG MO KIO", "TAMPINES"];

fn commencement_rows(year: i32, rows: usize, area: &str) -> String {
    (0..rows)
        .map(|i| {
            format!(
                "{year}-{:02},{},3 ROOM,{},NEW UPP CHANGI RD,{:02} TO {:02},{area},\
                 New Generation,1978,{}\n",
                i % 12 + 1,
                TOWNS[i % TOWNS.len()],
                100 + i % 4,
                1 + 3 * (i % 4),
                3 + 3 * (i % 4),
                150_000 + i * 2_500
            )
        })
        .collect()
}

fn remaining_rows(year: i32, rows: usize, town: &str, remaining: &str) -> String {
    (0..rows)
        .map(|i| {
            format!(
                "{year}-{:02},{town},4 ROOM,{},PUNGGOL FIELD,07 TO 09,93,Model A,1998,\
                 {remaining},{}\n",
                i % 12 + 1,
                200 + i % 3,
                400_000 + i * 1_000
            )
        })
        .collect()
}

/// Writes one extract per era into `dir` and returns a config reading them.
fn write_sources(dir: &Path) -> PipelineConfig {
    let raw = dir.join("raw");
    std::fs::create_dir_all(&raw).unwrap();

    // one row in the oldest extract is missing its price
    let mut oldest = format!("{COMMENCEMENT_HEADER}\n{}", commencement_rows(1995, 12, "67"));
    oldest.push_str("1995-06,BEDOK,3 ROOM,999,NEW UPP CHANGI RD,01 TO 03,67,New Generation,1978,\n");
    std::fs::write(raw.join("1990.csv"), oldest).unwrap();

    std::fs::write(
        raw.join("2000.csv"),
        format!("{SQFT_HEADER}\n{}", commencement_rows(2005, 12, "721.18")),
    )
    .unwrap();

    let mut mid = format!("{COMMENCEMENT_HEADER}\n{}", commencement_rows(2013, 10, "90"));
    mid = mid.replacen("3 ROOM", "MULTI GENERATION", 1);
    std::fs::write(raw.join("2012.csv"), mid).unwrap();

    std::fs::write(
        raw.join("2015.csv"),
        format!(
            "{REMAINING_HEADER}\n{}",
            remaining_rows(2016, 8, "BEDOK", "81")
        ),
    )
    .unwrap();

    // PUNGGOL only ever appears after 2017
    std::fs::write(
        raw.join("2017.csv"),
        format!(
            "{REMAINING_HEADER}\n{}",
            remaining_rows(2018, 9, "PUNGGOL", "78 years 05 months")
        ),
    )
    .unwrap();

    let mut config = PipelineConfig::default();
    config.sources = vec![
        SourceConfig::new("1990.csv", "1990-1999"),
        SourceConfig::new("2000.csv", "2000-2012"),
        SourceConfig::new("2012.csv", "2012-2014"),
        SourceConfig::new("2015.csv", "2015-2016"),
        SourceConfig::new("2017.csv", "2017-onwards"),
    ];
    config.ingest.input_dir = raw;
    config.export.output_dir = dir.join("out");
    config.export.shard_rows = 7;
    config
}

/// Relative path -> bytes for every file under `root`.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                files.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    files
}

#[test]
fn test_all_eras_unify_and_drop_exactly_the_priceless_row() {
    let dir = TempDir::new().unwrap();
    let config = write_sources(dir.path());
    let summary = Pipeline::new(config).unwrap().run().unwrap();

    assert_eq!(summary.sources.len(), 5);
    let oldest = &summary.sources[0];
    assert_eq!(oldest.rows_read, 13);
    assert_eq!(oldest.malformed, 1);
    assert_eq!(oldest.malformed_by_field.get("resale_price"), Some(&1));
    assert_eq!(oldest.kept, 12);
    for report in &summary.sources[1..] {
        assert_eq!(report.malformed, 0, "{report}");
    }
    assert_eq!(summary.rows_dropped(), 1);
    assert_eq!(summary.train_rows + summary.test_rows, 12 + 12 + 10 + 8 + 9);
}

#[test]
fn test_reruns_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    let mut config = write_sources(dir.path());
    let pipeline = Pipeline::new(config.clone()).unwrap();

    pipeline.run().unwrap();
    let first = snapshot(&dir.path().join("out"));
    pipeline.run().unwrap();
    let second = snapshot(&dir.path().join("out"));
    assert_eq!(first, second);

    config.export.output_dir = dir.path().join("elsewhere");
    Pipeline::new(config).unwrap().run().unwrap();
    assert_eq!(snapshot(&dir.path().join("elsewhere")), first);

    assert!(first.contains_key(Path::new(ENCODING_FILE)));
    assert!(first.contains_key(Path::new(RUN_REPORT_FILE)));
    assert!(!first.keys().any(|p| p.to_string_lossy().contains("staging")));
}

#[test]
fn test_partitions_are_disjoint_and_complete() {
    let dir = TempDir::new().unwrap();
    let config = write_sources(dir.path());
    let out = config.export.output_dir.clone();
    let summary = Pipeline::new(config).unwrap().run().unwrap();

    let train = read_partition(&out.join("train")).unwrap();
    let test = read_partition(&out.join("test")).unwrap();
    assert_eq!(train.columns(), test.columns());

    let train_ids: HashSet<RowId> = train.row_ids().collect();
    let test_ids: HashSet<RowId> = test.row_ids().collect();
    assert!(train_ids.is_disjoint(&test_ids));
    let kept: usize = summary.sources.iter().map(|s| s.kept).sum();
    assert_eq!(train_ids.len() + test_ids.len(), kept);
    // default ratio 0.2 over 51 rows
    assert_eq!(test.len(), 10);
}

#[test]
fn test_test_only_town_encodes_to_unseen_bucket() {
    let dir = TempDir::new().unwrap();
    let mut config = write_sources(dir.path());
    config.split = SplitRule::Chronological {
        cutoff: YearMonth::new(2017, 1).unwrap(),
    };
    config.features.encoding = EncodeMethod::Label;
    let prepared = Pipeline::new(config).unwrap().prepare().unwrap();

    assert_eq!(prepared.test.len(), 9);
    assert_eq!(prepared.unseen_in_test.get("town"), Some(&9));

    let town = prepared
        .test
        .columns()
        .iter()
        .position(|c| c == "town_code")
        .unwrap();
    assert!(prepared.test.rows().iter().all(|r| r.features[town] == 0.0));
    assert!(prepared.train.rows().iter().all(|r| r.features[town] > 0.0));
}

#[test]
fn test_shards_read_back_as_the_prepared_partition() {
    let dir = TempDir::new().unwrap();
    let config = write_sources(dir.path());
    let out = config.export.output_dir.clone();
    let pipeline = Pipeline::new(config).unwrap();

    let prepared = pipeline.prepare().unwrap();
    let summary = pipeline.run().unwrap();
    assert_eq!(summary.train_shards, prepared.train.len().div_ceil(7));

    assert_eq!(read_partition(&out.join("train")).unwrap(), prepared.train);
    assert_eq!(read_partition(&out.join("test")).unwrap(), prepared.test);
}

#[test]
fn test_square_feet_source_is_converted() {
    let dir = TempDir::new().unwrap();
    let config = write_sources(dir.path());
    let prepared = Pipeline::new(config).unwrap().prepare().unwrap();

    let area = prepared
        .train
        .columns()
        .iter()
        .position(|c| c == "floor_area_sqm")
        .unwrap();
    let converted: Vec<f64> = prepared
        .train
        .rows()
        .iter()
        .chain(prepared.test.rows())
        .filter(|r| r.id.source == 1)
        .map(|r| r.features[area])
        .collect();
    assert_eq!(converted.len(), 12);
    assert!(converted.iter().all(|a| (a - 67.0).abs() < 0.01));
}

#[test]
fn test_missing_source_file_is_retryable_io() {
    let dir = TempDir::new().unwrap();
    let mut config = write_sources(dir.path());
    config.sources.push(SourceConfig::new("absent.csv", "2017-onwards"));
    let err = Pipeline::new(config).unwrap().run().unwrap_err();
    assert!(err.is_retryable(), "{err}");
}

fn with_seed(mut config: PipelineConfig, seed: u64) -> PipelineConfig {
    config.split = SplitRule::Random {
        seed,
        test_ratio: 0.2,
    };
    config
}

#[test]
fn test_failed_rerun_leaves_previous_dataset_published() {
    let dir = TempDir::new().unwrap();
    let config = write_sources(dir.path());
    let out = config.export.output_dir.clone();
    Pipeline::new(with_seed(config.clone(), 42)).unwrap().run().unwrap();
    let before = snapshot(&out);

    // a file squatting on the staging path makes the next run fail while exporting
    std::fs::write(dir.path().join(".out.staging"), "in the way").unwrap();
    let err = Pipeline::new(with_seed(config, 999)).unwrap().run().unwrap_err();
    assert!(err.is_retryable(), "{err}");

    assert_eq!(snapshot(&out), before);
    let partitions = verify_dataset(&out).unwrap();
    let train_ids: HashSet<RowId> = partitions[0].row_ids().collect();
    assert!(partitions[1].row_ids().all(|id| !train_ids.contains(&id)));
}

#[test]
fn test_verify_rejects_a_test_partition_from_another_run() {
    let dir = TempDir::new().unwrap();
    let mut config = write_sources(dir.path());
    let out = config.export.output_dir.clone();
    Pipeline::new(with_seed(config.clone(), 42)).unwrap().run().unwrap();
    config.export.output_dir = dir.path().join("other");
    Pipeline::new(with_seed(config, 999)).unwrap().run().unwrap();
    verify_dataset(&out).unwrap();

    let test_dir = out.join("test");
    std::fs::remove_dir_all(&test_dir).unwrap();
    std::fs::create_dir_all(&test_dir).unwrap();
    for entry in std::fs::read_dir(dir.path().join("other").join("test")).unwrap() {
        let path = entry.unwrap().path();
        std::fs::copy(&path, test_dir.join(path.file_name().unwrap())).unwrap();
    }

    // the foreign partition is internally consistent, the pair is not
    read_partition(&test_dir).unwrap();
    let err = verify_dataset(&out).unwrap_err();
    assert!(matches!(err, PipelineError::Integrity(_)), "{err}");
}
