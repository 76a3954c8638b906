//! Définition et implémentation des commandes CLI
//!
//! - `run` : run complet décrit par un fichier JSON
//! - `sum` : un seul lot décrit par les options
//! - `inspect` : description d'un raster

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use popzonal::config::{BatchSpec, Coverage, OnFailure, RunConfig};

#[derive(Subcommand)]
pub enum Commands {
    /// Run described by a JSON configuration file
    Run {
        /// Path to the run configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Sum one batch of rasters over the boundaries
    Sum {
        /// Boundaries file (GeoJSON FeatureCollection)
        #[arg(short, long)]
        boundaries: PathBuf,

        /// Raster file, directory or glob pattern (repeatable)
        #[arg(short, long = "raster", required = true)]
        rasters: Vec<String>,

        /// Global column prefix (e.g. wp_)
        #[arg(long, default_value = "")]
        prefix: String,

        /// Explicit label per raster, in raster order (repeatable)
        #[arg(long = "label", conflicts_with = "label_pattern")]
        labels: Vec<String>,

        /// Regex whose first capture group on the file name becomes the label
        #[arg(long)]
        label_pattern: Option<String>,

        /// Boundary property used as zone id
        #[arg(long)]
        id_field: Option<String>,

        /// Boundary attributes copied to the output (comma-separated)
        #[arg(long, value_delimiter = ',')]
        keep: Vec<String>,

        /// Sort columns (comma-separated, ascending, stable)
        #[arg(long, value_delimiter = ',')]
        sort_by: Vec<String>,

        /// Keep fractional sums instead of rounding to counts
        #[arg(long)]
        no_rounding: bool,

        /// Add the <prefix>sum_total column
        #[arg(long)]
        total: bool,

        /// Band read in each raster (1-based, multi-band GeoTIFF)
        #[arg(long, default_value_t = 1)]
        band: usize,

        /// Pixel coverage rule
        #[arg(long, value_enum, default_value_t = Coverage::Center)]
        coverage: Coverage,

        /// Failure policy: abort, skip or fill=<value>
        #[arg(long, default_value = "abort")]
        on_failure: OnFailure,

        /// Maximum number of rasters processed concurrently
        #[arg(long, alias = "threads")]
        jobs: Option<usize>,

        /// Output CSV table
        #[arg(short, long)]
        output: PathBuf,

        /// Output GeoJSON table (with geometries)
        #[arg(long)]
        geojson: Option<PathBuf>,

        /// Run report (JSON)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print a raster's shape, transform, nodata and valid pixel total
    Inspect {
        /// ESRI ASCII Grid or GeoTIFF file
        path: PathBuf,

        /// Band to inspect (1-based)
        #[arg(long, default_value_t = 1)]
        band: usize,
    },
}

/// Exécute la commande run
pub fn cmd_run(config_path: &Path) -> Result<()> {
    let config = RunConfig::load(config_path)?;
    info!(
        config = %config_path.display(),
        batches = config.batches.len(),
        "Starting run"
    );
    execute(&config)
}

/// Exécute la commande sum (configuration construite à partir des options)
pub fn cmd_sum(config: RunConfig) -> Result<()> {
    config.validate()?;
    info!(
        boundaries = %config.boundaries.display(),
        rasters = config.batches[0].rasters.len(),
        "Starting sum"
    );
    execute(&config)
}

fn execute(config: &RunConfig) -> Result<()> {
    println!("=== Zonal sums ===");
    println!("Boundaries: {}", config.boundaries.display());
    println!("Batches: {}", config.batches.len());
    println!("Coverage: {:?}", config.coverage);
    println!("On failure: {:?}", config.on_failure);
    println!(
        "Jobs: {}",
        config
            .jobs
            .map_or_else(|| "auto".to_string(), |n| n.to_string())
    );

    let report = popzonal::run(config)?;
    report.display();
    Ok(())
}

/// Assemble une configuration à un lot depuis les options de `sum`
#[allow(clippy::too_many_arguments)]
pub fn sum_config(
    boundaries: PathBuf,
    rasters: Vec<String>,
    prefix: String,
    labels: Vec<String>,
    label_pattern: Option<String>,
    id_field: Option<String>,
    keep: Vec<String>,
    sort_by: Vec<String>,
    rounding: bool,
    add_total: bool,
    band: usize,
    coverage: Coverage,
    on_failure: OnFailure,
    jobs: Option<usize>,
    output: PathBuf,
    geojson_output: Option<PathBuf>,
    report: Option<PathBuf>,
) -> RunConfig {
    RunConfig {
        boundaries,
        id_field,
        keep,
        sort_by,
        output,
        geojson_output,
        report,
        coverage,
        on_failure,
        jobs,
        batches: vec![BatchSpec {
            rasters,
            prefix,
            labels: (!labels.is_empty()).then_some(labels),
            label_pattern,
            rounding,
            add_total,
            band,
        }],
    }
}

/// Exécute la commande inspect
pub fn cmd_inspect(path: &Path, band: usize) -> Result<()> {
    let grid = zonal::loader::read_grid(path, band)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;

    let (valid, total) = grid.valid_summary();
    let bounds = grid.bounds();

    println!("Raster: {} (band {})", path.display(), band);
    println!("Size: {} x {} ({} pixels)", grid.width(), grid.height(), grid.width() * grid.height());
    println!("Transform: {:?}", grid.transform().coefficients());
    println!(
        "Bounds: ({}, {}) - ({}, {})",
        bounds.min().x,
        bounds.min().y,
        bounds.max().x,
        bounds.max().y
    );
    match grid.nodata() {
        Some(nodata) => println!("Nodata: {}", nodata),
        None => println!("Nodata: none"),
    }
    println!("Valid pixels: {}", valid);
    println!("Total: {}", total);

    Ok(())
}
