//! Point d'entrée CLI pour popzonal

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Sommes zonales de rasters de population par unité administrative
#[derive(Parser)]
#[command(name = "popzonal")]
#[command(author, version)]
#[command(about = "Population counts per administrative unit from raster grids")]
#[command(long_about = "Sums raster grids (ESRI ASCII Grid or GeoTIFF) over polygon boundaries (GeoJSON).\n\nEach batch of rasters produces one column per raster, optionally with a total; batches are merged into one CSV table (and optionally GeoJSON).")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run { config } => {
            info!(config = %config.display(), "Run from configuration");
            cli::cmd_run(&config)?;
        }
        Commands::Sum {
            boundaries,
            rasters,
            prefix,
            labels,
            label_pattern,
            id_field,
            keep,
            sort_by,
            no_rounding,
            total,
            band,
            coverage,
            on_failure,
            jobs,
            output,
            geojson,
            report,
        } => {
            let config = cli::sum_config(
                boundaries,
                rasters,
                prefix,
                labels,
                label_pattern,
                id_field,
                keep,
                sort_by,
                !no_rounding,
                total,
                band,
                coverage,
                on_failure,
                jobs,
                output,
                geojson,
                report,
            );
            cli::cmd_sum(config)?;
        }
        Commands::Inspect { path, band } => {
            cli::cmd_inspect(&path, band)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
