//! Agrégation d'une liste de sources raster sur un même ensemble de zones
//!
//! Chaque source produit une colonne ; les sources sont indépendantes et
//! traitées en parallèle (rayon), puis remises dans l'ordre d'origine.

pub mod naming;
pub mod table;

pub use naming::{ColumnNames, ColumnNaming};
pub use table::{BatchTable, Column, ColumnValues};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::rasterize::CoverageRule;
use crate::source::GridSource;
use crate::summer::{ZonalResult, ZonalSummer};
use crate::types::ZoneSet;
use crate::ZonalError;

/// Comportement quand une source échoue (lecture ou agrégation)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum FailurePolicy {
    /// Le lot entier échoue
    #[default]
    Abort,
    /// La colonne de la source est omise
    Skip,
    /// La colonne est conservée, remplie avec cette valeur (hors total)
    Fill(f64),
}

/// Paramètres d'un lot
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    pub naming: ColumnNaming,
    /// Arrondi à l'entier le plus proche et colonnes entières
    pub rounding: bool,
    /// Ajoute la colonne `<préfixe>sum_total`
    pub add_total: bool,
    pub coverage: CoverageRule,
    pub on_failure: FailurePolicy,
    /// `None` : pool rayon global, `Some(1)` : séquentiel, `Some(n)` : pool dédié
    pub jobs: Option<usize>,
}

/// Échec d'une source, conservé dans le résultat du lot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Rang de la source dans le lot
    pub index: usize,
    pub name: String,
    pub reason: String,
}

/// Table produite et échecs non fatals
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub table: BatchTable,
    pub failures: Vec<SourceFailure>,
}

/// Applique le `ZonalSummer` à chaque source d'un lot
#[derive(Debug, Clone, Default)]
pub struct BatchAggregator {
    config: BatchConfig,
}

impl BatchAggregator {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Agrège toutes les sources ; colonnes dans l'ordre des sources, total en dernier
    pub fn aggregate<S: GridSource>(
        &self,
        sources: &[S],
        zones: &ZoneSet,
    ) -> Result<BatchOutcome, ZonalError> {
        let source_names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        let names = self
            .config
            .naming
            .resolve(&source_names, self.config.add_total)?;

        info!(
            sources = sources.len(),
            zones = zones.len(),
            prefix = self.config.naming.global_prefix(),
            rounding = self.config.rounding,
            "Aggregating batch"
        );
        let started_at = Instant::now();

        let results = self.run_sources(sources, zones)?;

        let mut table = BatchTable::new(zones.len());
        let mut failures = Vec::new();
        let mut produced: Vec<usize> = Vec::new();

        for (index, (result, column)) in results.into_iter().zip(names.sources).enumerate() {
            let name = source_names[index];
            match result {
                Ok(zonal) => {
                    produced.push(table.columns().len());
                    table.push(Column {
                        name: column,
                        values: self.finish_values(zonal.sums),
                    })?;
                }
                Err(e) => {
                    let reason = e.to_string();
                    match self.config.on_failure {
                        FailurePolicy::Abort => {
                            return Err(ZonalError::SourceFailed {
                                index,
                                name: name.to_string(),
                                reason,
                            });
                        }
                        FailurePolicy::Skip => {
                            warn!(source = name, error = %reason, "Source failed, column skipped");
                        }
                        FailurePolicy::Fill(fill) => {
                            warn!(source = name, error = %reason, fill = fill, "Source failed, column filled");
                            table.push(Column {
                                name: column,
                                values: self.finish_values(vec![fill; zones.len()]),
                            })?;
                        }
                    }
                    failures.push(SourceFailure {
                        index,
                        name: name.to_string(),
                        reason,
                    });
                }
            }
        }

        if let Some(total_name) = names.total {
            let addends: Vec<&Column> = produced.iter().map(|&i| &table.columns()[i]).collect();
            let values = total_values(&addends, zones.len(), self.config.rounding)
                .map_err(|row| ZonalError::TotalOverflow {
                    column: total_name.clone(),
                    row,
                })?;
            table.push(Column {
                name: total_name,
                values,
            })?;
        }

        info!(
            columns = table.columns().len(),
            failed = failures.len(),
            duration = ?started_at.elapsed(),
            "Batch aggregated"
        );

        Ok(BatchOutcome { table, failures })
    }

    /// Somme chaque source ; le résultat `i` correspond toujours à la source `i`
    ///
    /// Avec `FailurePolicy::Abort`, les sources de rang supérieur à un échec ne
    /// sont plus chargées et le résultat s'arrête juste après le premier échec.
    fn run_sources<S: GridSource>(
        &self,
        sources: &[S],
        zones: &ZoneSet,
    ) -> Result<Vec<Result<ZonalResult, ZonalError>>, ZonalError> {
        let summer = ZonalSummer::new(self.config.coverage);
        let abort = self.config.on_failure == FailurePolicy::Abort;
        let first_failure = AtomicUsize::new(usize::MAX);

        let task = |(index, source): (usize, &S)| -> Option<Result<ZonalResult, ZonalError>> {
            if abort && index > first_failure.load(Ordering::Relaxed) {
                debug!(source = source.name(), "Source not loaded, batch aborted");
                return None;
            }

            let started_at = Instant::now();
            let result = source.load().map(|grid| summer.sum(&grid, zones));
            match &result {
                Ok(zonal) => debug!(
                    source = source.name(),
                    degenerate = zonal.degenerate_count(),
                    duration = ?started_at.elapsed(),
                    "Source summed"
                ),
                Err(_) => {
                    first_failure.fetch_min(index, Ordering::Relaxed);
                }
            }
            Some(result)
        };

        let results: Vec<Option<Result<ZonalResult, ZonalError>>> = match self.config.jobs {
            Some(1) => sources.iter().enumerate().map(task).collect(),
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| ZonalError::ThreadPool(e.to_string()))?;
                pool.install(|| sources.par_iter().enumerate().map(task).collect())
            }
            None => sources.par_iter().enumerate().map(task).collect(),
        };

        // Une source n'est écartée que si un échec de rang inférieur existe :
        // ce premier échec précède toujours la première source écartée.
        Ok(results.into_iter().map_while(|r| r).collect())
    }

    fn finish_values(&self, sums: Vec<f64>) -> ColumnValues {
        if self.config.rounding {
            ColumnValues::Integer(sums.into_iter().map(round_count).collect())
        } else {
            ColumnValues::Float(sums)
        }
    }
}

/// Arrondi au plus proche, égalités vers le pair ; valeur manquante → 0
pub fn round_count(value: f64) -> i64 {
    if value.is_finite() {
        value.round_ties_even() as i64
    } else {
        0
    }
}

/// Somme ligne à ligne des colonnes ; entière si le lot est arrondi
///
/// En mode entier, renvoie la ligne du premier dépassement de capacité.
fn total_values(columns: &[&Column], rows: usize, rounding: bool) -> Result<ColumnValues, usize> {
    if rounding {
        let mut acc = vec![0i64; rows];
        for column in columns {
            for (row, a) in acc.iter_mut().enumerate() {
                let x = match &column.values {
                    ColumnValues::Integer(v) => v[row],
                    ColumnValues::Float(v) => round_count(v[row]),
                };
                *a = a.checked_add(x).ok_or(row)?;
            }
        }
        Ok(ColumnValues::Integer(acc))
    } else {
        let mut acc = vec![0.0f64; rows];
        for column in columns {
            match &column.values {
                ColumnValues::Integer(v) => acc.iter_mut().zip(v).for_each(|(a, x)| *a += *x as f64),
                ColumnValues::Float(v) => acc.iter_mut().zip(v).for_each(|(a, x)| *a += x),
            }
        }
        Ok(ColumnValues::Float(acc))
    }
}
