//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use resale_core::data::CsvSource;
use resale_core::export::{RUN_REPORT_FILE, reader};
use resale_core::{Era, Pipeline, PipelineConfig, RunSummary, SchemaUnifier, SplitRule};
use std::path::Path;

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            output,
            seed,
            dry_run,
        } => {
            let mut config = load(workspace, config_path)?;
            if let Some(output) = output {
                config.export.output_dir = workspace.join(output);
            }
            if let Some(new_seed) = seed {
                match &mut config.split {
                    SplitRule::Random { seed, .. } => *seed = new_seed,
                    SplitRule::Chronological { .. } => {
                        anyhow::bail!("--seed only applies to the random split rule")
                    }
                }
            }
            handle_run(config, dry_run)
        }
        Commands::Eras => {
            handle_eras();
            Ok(())
        }
        Commands::Inspect { path, era, limit } => {
            let config = load(workspace, config_path)?;
            handle_inspect(&config, &workspace.join(path), &era, limit)
        }
        Commands::Verify { dir } => {
            let config = load(workspace, config_path)?;
            let dir = match dir {
                Some(dir) => workspace.join(dir),
                None => config.export.output_dir,
            };
            handle_verify(&dir)
        }
        Commands::Config { action } => handle_config(action, workspace, config_path),
    }
}

fn load(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let mut config = resale_core::load_config(Some(workspace), config_path)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    config.anchor_to(workspace);
    tracing::debug!(
        workspace = %workspace.display(),
        sources = config.sources.len(),
        "Loaded configuration"
    );
    Ok(config)
}

fn handle_run(config: PipelineConfig, dry_run: bool) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config)?;

    if dry_run {
        let prepared = pipeline.prepare()?;
        for report in &prepared.reports {
            println!("{report}");
        }
        println!(
            "Dry run: {} train rows, {} test rows, {} feature columns (nothing written)",
            prepared.train.len(),
            prepared.test.len(),
            prepared.train.columns().len()
        );
        return Ok(());
    }

    let summary = pipeline.run()?;
    print_summary(&summary);
    println!(
        "Dataset written to {}",
        pipeline.config().export.output_dir.display()
    );
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Run {}", summary.run_digest);
    for report in &summary.sources {
        println!("{report}");
    }
    println!(
        "Read {} rows, dropped {}",
        summary.rows_read(),
        summary.rows_dropped()
    );
    println!(
        "train: {} rows in {} shard(s); test: {} rows in {} shard(s); {} feature columns",
        summary.train_rows,
        summary.train_shards,
        summary.test_rows,
        summary.test_shards,
        summary.feature_columns
    );
    if !summary.unseen_in_test.is_empty() {
        let unseen: Vec<String> = summary
            .unseen_in_test
            .iter()
            .map(|(field, n)| format!("{field}={n}"))
            .collect();
        println!("Unseen categories in test: {}", unseen.join(", "));
    }
}

fn handle_eras() {
    for era in Era::ALL {
        let schema = era.schema();
        println!("{} ({})", era.tag(), schema.description);
        println!("  lease: {:?}", schema.lease);
        let columns: Vec<String> = schema
            .columns
            .iter()
            .map(|c| {
                c.aliases
                    .iter()
                    .map(|a| a.name)
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .collect();
        println!("  columns: {}", columns.join(", "));
    }
}

fn handle_inspect(
    config: &PipelineConfig,
    path: &Path,
    era: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let loaded = CsvSource::new(0, path, era).load(config.ingest.drop_duplicates)?;
    let (records, report) = SchemaUnifier::new(config.units).unify_source(&loaded);
    println!("{report}");
    println!("area unit: {:?}", loaded.layout.area_unit);
    for record in records.iter().take(limit) {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

fn handle_verify(dir: &Path) -> anyhow::Result<()> {
    let partitions = reader::verify_dataset(dir)?;
    for partition in &partitions {
        println!(
            "{}: {} rows, {} columns, OK",
            partition.label,
            partition.len(),
            partition.columns().len()
        );
    }

    let report_path = dir.join(RUN_REPORT_FILE);
    if let Some(summary) = resale_core::persistence::load_json::<RunSummary>(&report_path)? {
        if summary.train_rows != partitions[0].len() || summary.test_rows != partitions[1].len() {
            anyhow::bail!(
                "{} does not match the published partitions",
                report_path.display()
            );
        }
    }
    println!("Dataset at {} verified", dir.display());
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = resale_core::workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&PipelineConfig::default())?;
            resale_core::persistence::atomic_write(&config_path, toml_str.as_bytes())?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = resale_core::load_config(Some(workspace), config_path)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
