//! `platedig`: command-line driver for the plate digitizer.
//!
//! ```text
//! platedig derive OBJECT="HD 45677" OBSERVAT=oalp DATE-OBS=1962-11-03 UT=02:10:00
//! platedig list /data/plates
//! platedig export --plate /data/plates/B1021.tif --annotations b1021.json
//! platedig export-cached --plate /data/plates/B1021.tif
//! platedig cache show B1021.tif
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use plate_digitizer::config::DigitizerConfig;
use plate_digitizer::{Annotation, ObservationMetadata, PlateId, PlateMetadata, PlateService};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "platedig")]
#[command(about = "Archival plate digitization: metadata derivation and FITS export")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides DIGITIZER_CONFIG and ./digitizer.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Derive header fields from KEY=VALUE operator input
    Derive {
        /// Operator fields, e.g. OBJECT=Sirius DATE-OBS=1950-01-15
        #[arg(value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },

    /// List plate images in a directory with their cache state
    List {
        directory: PathBuf,
    },

    /// Export a plate from an annotation file and mark it saved
    Export {
        /// Plate scan
        #[arg(long)]
        plate: PathBuf,
        /// JSON file with `plate_metadata` and `annotations`
        #[arg(long)]
        annotations: PathBuf,
        #[command(flatten)]
        invert: InvertFlags,
    },

    /// Export a plate from its working cache record
    ExportCached {
        #[arg(long)]
        plate: PathBuf,
        #[command(flatten)]
        invert: InvertFlags,
    },

    /// Inspect or edit the annotation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show or replace the workspace settings object
    Settings {
        /// New settings as a JSON object; omit to print the current ones
        #[arg(long, value_name = "JSON")]
        set: Option<String>,
    },

    /// Validate and print the effective configuration
    Config,
}

/// Crop polarity. Without either flag the `[export] invert` setting applies.
#[derive(clap::Args, Debug, Clone, Copy)]
struct InvertFlags {
    /// Write negative crops
    #[arg(long, overrides_with = "no_invert")]
    invert: bool,
    /// Write positive crops
    #[arg(long, overrides_with = "invert")]
    no_invert: bool,
}

impl InvertFlags {
    const fn choice(self) -> Option<bool> {
        match (self.invert, self.no_invert) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum CacheAction {
    /// Print the cache entry for a plate
    Show { plate: String },
    /// Store an annotation file as the working record
    Save {
        #[arg(long)]
        plate: String,
        #[arg(long)]
        annotations: PathBuf,
    },
    /// Drop the working record of a plate
    Delete { plate: String },
}

/// On-disk annotation batch used by `export` and `cache save`.
#[derive(Debug, Serialize, Deserialize)]
struct AnnotationFile {
    #[serde(default)]
    plate_metadata: PlateMetadata,
    annotations: Vec<Annotation>,
}

fn read_annotation_file(path: &Path) -> Result<AnnotationFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading annotations from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn parse_fields(pairs: &[String]) -> Result<ObservationMetadata> {
    let mut fields = ObservationMetadata::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("expected KEY=VALUE, got '{pair}'");
        };
        fields.set(key.trim(), value.trim());
    }
    Ok(fields)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<DigitizerConfig> {
    match path {
        Some(path) => DigitizerConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => {
            let config = DigitizerConfig::load();
            config.validate()?;
            Ok(config)
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let config = load_config(args.config.as_deref())?;

    if matches!(args.command, SubCommand::Config) {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let service = PlateService::from_config(config).context("starting plate service")?;

    // Ctrl+C cancels a running export before its swap.
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, cancelling");
        shutdown.cancel();
    });

    match args.command {
        SubCommand::Derive { fields } => {
            let outcome = service.derive_metadata(parse_fields(&fields)?).await?;
            print_json(&outcome)?;
        }
        SubCommand::List { directory } => {
            print_json(&service.list_plates(&directory).await?)?;
        }
        SubCommand::Export {
            plate,
            annotations,
            invert,
        } => {
            let batch = read_annotation_file(&annotations)?;
            let request =
                service.export_request(&plate, batch.plate_metadata, batch.annotations, invert.choice())?;
            let report = service.export_plate(request, cancel).await?;
            print_json(&report)?;
        }
        SubCommand::ExportCached { plate, invert } => {
            let report = service.export_from_cache(&plate, invert.choice(), cancel).await?;
            print_json(&report)?;
        }
        SubCommand::Cache { action } => match action {
            CacheAction::Show { plate } => {
                print_json(&service.load_annotations(&PlateId::parse(&plate)?).await?)?;
            }
            CacheAction::Save { plate, annotations } => {
                let batch = read_annotation_file(&annotations)?;
                let record = service
                    .save_annotations(&PlateId::parse(&plate)?, batch.plate_metadata, batch.annotations)
                    .await?;
                info!(plate = %record.plate, objects = record.annotations.len(), "working record stored");
            }
            CacheAction::Delete { plate } => {
                let plate = PlateId::parse(&plate)?;
                if !service.delete_annotations(&plate).await? {
                    info!(plate = %plate, "no working record to delete");
                }
            }
        },
        SubCommand::Settings { set } => match set {
            Some(json) => {
                let value: serde_json::Value =
                    serde_json::from_str(&json).context("settings must be valid JSON")?;
                print_json(&service.save_settings(value).await?)?;
            }
            None => print_json(&service.load_settings().await?)?,
        },
        SubCommand::Config => {}
    }

    Ok(())
}
