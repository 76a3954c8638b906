//! Enchaînement d'un run : limites, lots, fusion, exports

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{error, info, warn};

use zonal::batch::BatchTable;
use zonal::{merge, BatchAggregator, FinalTable, ZoneSet};

use crate::config::RunConfig;
use crate::export::{self, StagedWrites};
use crate::report::{RunReport, RunStatus};
use crate::sources::{self, file_checksum};

/// Table finale et rapport d'un run, avant export
#[derive(Debug)]
pub struct RunOutput {
    pub table: FinalTable,
    pub report: RunReport,
}

/// Calcule la table finale sans rien écrire
pub fn execute(config: &RunConfig) -> Result<RunOutput> {
    let started_at = Instant::now();

    let zones = load_zones(config)?;
    info!(
        path = %config.boundaries.display(),
        zones = zones.len(),
        "Boundaries loaded"
    );

    let mut report = RunReport::new(zones.len());
    let mut inputs: Vec<PathBuf> = vec![config.boundaries.clone()];
    let mut tables: Vec<BatchTable> = Vec::with_capacity(config.batches.len());

    for (index, batch) in config.batches.iter().enumerate() {
        let collected = sources::collect(batch)
            .with_context(|| format!("Failed to collect rasters of batch #{} ({})", index, batch.prefix))?;
        inputs.extend(collected.paths().map(Path::to_path_buf));

        let batch_config = config.batch_config(batch, collected.labels.clone());
        let outcome = BatchAggregator::new(batch_config)
            .aggregate(&collected.files, &zones)
            .with_context(|| format!("Batch #{} ({}) failed", index, batch.prefix))?;

        report.record_batch(&batch.prefix, collected.files.len(), &outcome);
        tables.push(outcome.table);
    }

    let table = merge(&zones, &tables, &config.keep[..], &config.sort_by[..])
        .context("Failed to merge batch tables")?;

    record_checksums(&mut report, &inputs);
    report.set_duration(started_at.elapsed());
    report.finalize();

    Ok(RunOutput { table, report })
}

/// Exécute le run et écrit les sorties configurées
///
/// Les sorties ne sont écrites qu'une fois la table entièrement calculée, et
/// seulement si au moins une source a été agrégée. Elles sont préparées en
/// fichiers temporaires puis publiées ensemble : un échec d'écriture ne
/// laisse aucune sortie partielle.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    let started_at = Instant::now();
    let RunOutput { table, mut report } = execute(config)?;

    if report.status == RunStatus::Failed {
        for failure in &report.failures {
            error!(
                batch = %failure.batch,
                source = %failure.source,
                reason = %failure.reason,
                "Source failed"
            );
        }
        anyhow::bail!("No raster source could be aggregated ({})", report.summary());
    }

    let mut staged = StagedWrites::new();
    export::csv::stage_table(&table, &config.output, &mut staged)?;
    report.record_output(&config.output);

    if let Some(path) = &config.geojson_output {
        export::geojson::stage_table(&table, path, &mut staged)?;
        report.record_output(path);
    }

    report.set_duration(started_at.elapsed());

    if let Some(path) = &config.report {
        report.stage_to_file(path, &mut staged)?;
    }

    for path in staged.commit()? {
        info!(path = %path.display(), "Output written");
    }

    Ok(report)
}

/// Checksums blake3 des fichiers d'entrée présents, calculés en parallèle
fn record_checksums(report: &mut RunReport, inputs: &[PathBuf]) {
    let checksums: Vec<(&PathBuf, Option<String>)> = inputs
        .par_iter()
        .map(|path| (path, file_checksum(path).ok()))
        .collect();

    for (path, checksum) in checksums {
        match checksum {
            Some(checksum) => report.record_input(path, checksum),
            None => warn!(path = %path.display(), "Input not readable, no checksum"),
        }
    }
}

pub fn load_zones(config: &RunConfig) -> Result<ZoneSet> {
    zonal::loader::read_zones(&config.boundaries, config.id_field.as_deref())
        .with_context(|| format!("Failed to load boundaries {}", config.boundaries.display()))
}
