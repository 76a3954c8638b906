//! Rapport de run
//!
//! Collecte les lots traités, les sources en échec (politiques `skip` et
//! `fill`) et les checksums des fichiers d'entrée.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use zonal::BatchOutcome;

use crate::export::StagedWrites;

/// Statut global du run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Toutes les sources ont été agrégées
    Success,
    /// Certaines sources ont échoué, la table a été produite
    PartialSuccess,
    /// Aucune source n'a pu être agrégée
    Failed,
}

/// Statistiques d'un lot
#[derive(Debug, Clone, Serialize)]
pub struct BatchStats {
    pub prefix: String,
    pub sources: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Colonnes produites, total compris
    pub columns: Vec<String>,
}

/// Source en échec
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    /// Préfixe du lot
    pub batch: String,
    /// Rang de la source dans son lot
    pub index: usize,
    pub source: String,
    pub reason: String,
}

/// Checksum d'un fichier d'entrée
#[derive(Debug, Clone, Serialize)]
pub struct InputChecksum {
    pub path: String,
    pub blake3: String,
}

/// Rapport complet d'un run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub duration_secs: f64,
    pub zones: usize,
    pub batches: Vec<BatchStats>,
    pub failures: Vec<RunFailure>,
    pub inputs: Vec<InputChecksum>,
    /// Fichiers écrits
    pub outputs: Vec<String>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            status: RunStatus::Success,
            duration_secs: 0.0,
            zones: 0,
            batches: Vec::new(),
            failures: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl RunReport {
    pub fn new(zones: usize) -> Self {
        Self {
            zones,
            ..Default::default()
        }
    }

    /// Enregistre le résultat d'un lot
    pub fn record_batch(&mut self, prefix: &str, sources: usize, outcome: &BatchOutcome) {
        self.batches.push(BatchStats {
            prefix: prefix.to_string(),
            sources,
            succeeded: sources - outcome.failures.len(),
            failed: outcome.failures.len(),
            columns: outcome.table.column_names().map(str::to_string).collect(),
        });

        self.failures
            .extend(outcome.failures.iter().map(|f| RunFailure {
                batch: prefix.to_string(),
                index: f.index,
                source: f.name.clone(),
                reason: f.reason.clone(),
            }));
    }

    pub fn record_input(&mut self, path: &Path, checksum: String) {
        self.inputs.push(InputChecksum {
            path: path.display().to_string(),
            blake3: checksum,
        });
    }

    pub fn record_output(&mut self, path: &Path) {
        self.outputs.push(path.display().to_string());
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        let succeeded: usize = self.batches.iter().map(|b| b.succeeded).sum();

        self.status = if self.failures.is_empty() {
            RunStatus::Success
        } else if succeeded > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Failed
        };
    }

    pub fn total_sources(&self) -> usize {
        self.batches.iter().map(|b| b.sources).sum()
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("ZONAL RUN REPORT");
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!("Zones: {}", self.zones);
        println!(
            "Sources: {} in {} batches, {} failed",
            self.total_sources(),
            self.batches.len(),
            self.failures.len()
        );

        if !self.batches.is_empty() {
            println!("\n--- BY BATCH ---");
            for batch in &self.batches {
                println!(
                    "  {}: {} sources, {} failed, {} columns",
                    if batch.prefix.is_empty() { "(no prefix)" } else { batch.prefix.as_str() },
                    batch.sources,
                    batch.failed,
                    batch.columns.len()
                );
            }
        }

        if !self.failures.is_empty() {
            println!("\n--- FAILURES ({}) ---", self.failures.len());
            for f in self.failures.iter().take(20) {
                println!("  [{}#{}] {}: {}", f.batch, f.index, f.source, f.reason);
            }
            if self.failures.len() > 20 {
                println!("  ... and {} more", self.failures.len() - 20);
            }
        }

        if !self.outputs.is_empty() {
            println!("\n--- OUTPUTS ---");
            for output in &self.outputs {
                println!("  {}", output);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let mut staged = StagedWrites::new();
        self.stage_to_file(path, &mut staged)?;
        staged.commit()?;
        Ok(())
    }

    /// Prépare l'écriture du rapport avec les autres sorties du run
    pub fn stage_to_file(&self, path: &Path, staged: &mut StagedWrites) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        staged
            .stage(path, |w| Ok(w.write_all(json.as_bytes())?))
            .with_context(|| format!("Failed to write report {}", path.display()))
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{:?}: {} zones, {} sources, {} failed",
            self.status,
            self.zones,
            self.total_sources(),
            self.failures.len()
        )
    }
}
