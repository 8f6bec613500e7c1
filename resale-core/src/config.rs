//! Configuration system for the resale pipeline.
//!
//! Uses `figment` for layered configuration: defaults -> user file -> workspace file ->
//! environment -> explicit `--config` file.
//! Configuration is loaded from the user config directory and/or `.resale/config.toml`
//! in the workspace directory.

use crate::data::record::YearMonth;
use crate::error::PipelineError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raw extracts to ingest, in order. The index of an entry is its source id.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub units: UnitConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub split: SplitRule,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            ingest: IngestConfig::default(),
            units: UnitConfig::default(),
            features: FeatureConfig::default(),
            split: SplitRule::default(),
            export: ExportConfig::default(),
        }
    }
}

/// One raw extract and the era tag that selects its schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path of the CSV file, relative to `ingest.input_dir` unless absolute.
    pub path: PathBuf,
    /// Era tag, e.g. `2017-onwards`. Validated when the file is ingested.
    pub era: String,
}

impl SourceConfig {
    pub fn new(path: impl Into<PathBuf>, era: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            era: era.into(),
        }
    }
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("ResaleFlatPricesBasedonApprovalDate19901999.csv", "1990-1999"),
        SourceConfig::new("ResaleFlatPricesBasedonApprovalDate2000Feb2012.csv", "2000-2012"),
        SourceConfig::new(
            "ResaleFlatPricesBasedonRegistrationDateFromMar2012toDec2014.csv",
            "2012-2014",
        ),
        SourceConfig::new(
            "ResaleFlatPricesBasedonRegistrationDateFromJan2015toDec2016.csv",
            "2015-2016",
        ),
        SourceConfig::new(
            "ResaleflatpricesbasedonregistrationdatefromJan2017onwards.csv",
            "2017-onwards",
        ),
    ]
}

/// Raw ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Base directory for relative source paths.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    /// Drop exact duplicate data rows within a file.
    #[serde(default = "default_true")]
    pub drop_duplicates: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            drop_duplicates: true,
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_true() -> bool {
    true
}

/// Unit-conversion constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Square feet in one square metre, for eras recording floor area in square feet.
    #[serde(default = "default_sqft_per_sqm")]
    pub square_feet_per_square_metre: f64,
    /// Total lease length granted at commencement, in years.
    #[serde(default = "default_lease_years")]
    pub lease_years: u32,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            square_feet_per_square_metre: default_sqft_per_sqm(),
            lease_years: default_lease_years(),
        }
    }
}

fn default_sqft_per_sqm() -> f64 {
    10.7639
}

fn default_lease_years() -> u32 {
    99
}

/// Categorical encoding method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeMethod {
    /// One column per field: 0 for the unseen bucket, 1..=n for the sorted training vocabulary.
    #[default]
    Label,
    /// One indicator column per training value plus one unseen-bucket column.
    OneHot,
}

/// Numeric scaling method, fit on the training partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormMethod {
    #[default]
    None,
    MinMax,
    ZScore,
}

/// Feature engineering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub encoding: EncodeMethod,
    /// Token naming the bucket for categorical values absent from the training vocabulary.
    #[serde(default = "default_unseen_token")]
    pub unseen_token: String,
    #[serde(default)]
    pub scaling: NormMethod,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            encoding: EncodeMethod::default(),
            unseen_token: default_unseen_token(),
            scaling: NormMethod::default(),
        }
    }
}

fn default_unseen_token() -> String {
    "__UNSEEN__".to_string()
}

/// Rule assigning rows to the train or test partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SplitRule {
    /// Seeded shuffle; `round(n * test_ratio)` rows go to test.
    Random { seed: u64, test_ratio: f64 },
    /// Transactions in or after `cutoff` go to test.
    Chronological { cutoff: YearMonth },
}

impl Default for SplitRule {
    fn default() -> Self {
        Self::Random {
            seed: 42,
            test_ratio: 0.2,
        }
    }
}

/// Dataset export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Maximum rows per shard file.
    #[serde(default = "default_shard_rows")]
    pub shard_rows: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            shard_rows: default_shard_rows(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

fn default_shard_rows() -> usize {
    100_000
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sources.is_empty() {
            return Err(PipelineError::config("no sources configured"));
        }
        if !(self.units.square_feet_per_square_metre.is_finite()
            && self.units.square_feet_per_square_metre > 0.0)
        {
            return Err(PipelineError::config(
                "units.square_feet_per_square_metre must be a positive number",
            ));
        }
        if self.units.lease_years == 0 {
            return Err(PipelineError::config("units.lease_years must be positive"));
        }
        if self.features.unseen_token.trim().is_empty() {
            return Err(PipelineError::config("features.unseen_token must not be empty"));
        }
        if let SplitRule::Random { test_ratio, .. } = self.split {
            if !(test_ratio > 0.0 && test_ratio < 1.0) {
                return Err(PipelineError::config(format!(
                    "split.test_ratio must be in (0, 1), got {test_ratio}"
                )));
            }
        }
        if self.export.shard_rows == 0 {
            return Err(PipelineError::config("export.shard_rows must be positive"));
        }
        Ok(())
    }

    /// Resolve a source path against `ingest.input_dir`.
    pub fn source_path(&self, source: &SourceConfig) -> PathBuf {
        if source.path.is_absolute() {
            source.path.clone()
        } else {
            self.ingest.input_dir.join(&source.path)
        }
    }

    /// Anchor relative input and output directories at `workspace`.
    pub fn anchor_to(&mut self, workspace: &Path) {
        if self.ingest.input_dir.is_relative() {
            self.ingest.input_dir = workspace.join(&self.ingest.input_dir);
        }
        if self.export.output_dir.is_relative() {
            self.export.output_dir = workspace.join(&self.export.output_dir);
        }
    }
}

/// Workspace-local configuration file path.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".resale").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit config file (`--config`)
/// 2. Environment variables (prefixed with `RESALE_`, `__` for nesting)
/// 3. Workspace-local config (`.resale/config.toml`)
/// 4. User config (`~/.config/resale/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<PipelineConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "resale", "resale") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // RESALE_EXPORT__SHARD_ROWS, RESALE_FEATURES__ENCODING, etc.
    figment = figment.merge(Env::prefixed("RESALE_").split("__"));

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    figment.extract().map_err(Box::new)
}
