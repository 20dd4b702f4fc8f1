//! parcelmerge CLI - merge cadastral parcels in a layer document

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use parcelmerge_algorithms::interface::{Interface, Notice, NoticeLevel};
use parcelmerge_algorithms::merge::{merge_selected, MergeParams, MergeReport, SessionOutcome};
use parcelmerge_core::{EditableLayer, Ellipsoid, FeatureId, VectorLayer};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "parcelmerge")]
#[command(author, version, about = "Merge cadastral parcels with parcel id concatenation", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a layer document
    Info {
        /// Input layer document
        input: PathBuf,
    },
    /// Merge features into one, concatenating parcel ids and recomputing the area
    Merge {
        /// Layer document, rewritten in place
        input: PathBuf,
        /// Ids of the features to merge (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        ids: Vec<u64>,
        /// Reference ellipsoid: WGS84, GRS80, bessel, krass, intl, clrk66,
        /// an EPSG ellipsoid code or PARAMETER:<a>:<b>
        #[arg(short, long, env = "PARCELMERGE_ELLIPSOID", default_value = "WGS84")]
        ellipsoid: String,
        /// Parcel identifier field
        #[arg(long, default_value = "nr_dzialki")]
        parcel_field: String,
        /// Area field name to look for (repeatable; replaces the defaults)
        #[arg(long = "area-field")]
        area_fields: Vec<String>,
        /// Open the editing session before merging, as an interactive user would
        #[arg(long)]
        pre_edit: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set up logging")?;
    Ok(())
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_layer(path: &Path) -> Result<VectorLayer> {
    let pb = spinner("Reading layer...");
    let layer = VectorLayer::open(path)
        .with_context(|| format!("Failed to read layer {}", path.display()))?;
    pb.finish_and_clear();
    info!(
        "Layer '{}': {} features, {}",
        layer.name(),
        layer.feature_count(),
        layer.crs()
    );
    Ok(layer)
}

/// Prints notifications to the terminal
struct ConsoleInterface;

impl Interface for ConsoleInterface {
    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => println!("{}: {}", notice.title, notice.message),
            NoticeLevel::Warning => eprintln!("Warning ({}): {}", notice.title, notice.message),
            NoticeLevel::Critical => eprintln!("Error ({}): {}", notice.title, notice.message),
        }
    }

    fn refresh_map(&mut self) {
        debug!("Map refresh requested");
    }
}

/// Feature ids from the command line, repeats dropped
fn requested_ids(raw: Vec<u64>) -> Vec<FeatureId> {
    let mut seen = BTreeSet::new();
    raw.into_iter()
        .map(FeatureId)
        .filter(|id| seen.insert(*id))
        .collect()
}

fn missing_ids(requested: &[FeatureId], selected: &[FeatureId]) -> Vec<FeatureId> {
    requested
        .iter()
        .copied()
        .filter(|id| !selected.contains(id))
        .collect()
}

fn print_report(report: &MergeReport, path: &Path, elapsed: std::time::Duration) {
    println!("Layer: {} ({})", report.layer, path.display());
    let merged: Vec<String> = report.merged_ids.iter().map(|id| id.to_string()).collect();
    println!("  Merged features: {}", merged.join(", "));
    println!("  New feature: {}", report.new_feature_id);
    if let Some(id) = report.representative {
        println!("  Attributes from: {}", id);
    }
    if let Some(parcels) = &report.parcel_ids {
        println!("  Parcel ids: {}", parcels);
    }
    if let Some(area) = &report.area {
        println!(
            "  {}: {} ha ({:.2} m²)",
            area.field, area.hectares, area.square_meters
        );
    }
    if report.repaired_geometries > 0 {
        println!("  Repaired geometries: {}", report.repaired_geometries);
    }
    if report.skipped > 0 {
        println!("  Features without usable geometry: {}", report.skipped);
    }
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let layer = read_layer(&input)?;

            println!("File: {}", input.display());
            println!("Layer: {}", layer.name());
            println!("Provider: {}", layer.provider().name());
            println!("CRS: {}", layer.crs());
            match layer.crs().projection() {
                Ok(_) => println!("Area measurement: supported"),
                Err(e) => println!("Area measurement: unavailable ({})", e),
            }
            println!("Features: {}", layer.feature_count());
            if layer.is_read_only() {
                println!("Read-only: yes");
            }
            println!("\nFields:");
            for field in layer.fields().iter() {
                if field.length > 0 {
                    println!("  {} ({}, {})", field.name, field.field_type.name(), field.length);
                } else {
                    println!("  {} ({})", field.name, field.field_type.name());
                }
            }
        }

        // ── Merge ────────────────────────────────────────────────────
        Commands::Merge {
            input,
            ids,
            ellipsoid,
            parcel_field,
            area_fields,
            pre_edit,
        } => {
            let ellipsoid: Ellipsoid = ellipsoid.parse().context("Invalid ellipsoid")?;
            let mut params = MergeParams {
                parcel_field,
                ..MergeParams::default()
            }
            .with_ellipsoid(ellipsoid);
            if !area_fields.is_empty() {
                params.area_fields = area_fields.iter().map(|f| f.to_lowercase()).collect();
            }

            let mut layer = read_layer(&input)?;
            let ids = requested_ids(ids);
            layer.select(&ids);
            let missing = missing_ids(&ids, &layer.selected_ids());
            if !missing.is_empty() {
                warn!(
                    "Features not in the layer, ignored: {}",
                    missing.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
                );
            }
            if pre_edit {
                layer
                    .start_editing()
                    .context("Failed to start editing the layer")?;
            }

            let mut console = ConsoleInterface;
            let start = Instant::now();
            let pb = spinner("Merging features...");
            let result = merge_selected(Some(&mut layer), &mut console, &params);
            pb.finish_and_clear();

            let report = match result {
                Ok(report) => report,
                Err(failure) => {
                    if pre_edit && layer.is_editable() {
                        layer
                            .roll_back()
                            .context("Failed to discard the editing session")?;
                    }
                    return Err(failure).context("Merge with concatenation failed");
                }
            };
            if report.session == SessionOutcome::LeftOpen {
                let pb = spinner("Saving edits...");
                layer
                    .commit_changes()
                    .context("Failed to save the layer edits")?;
                pb.finish_and_clear();
            }
            let elapsed = start.elapsed();

            print_report(&report, &input, elapsed);
        }
    }

    Ok(())
}
