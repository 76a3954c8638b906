//! Configuration d'un run (fichier JSON)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use zonal::batch::{BatchConfig, ColumnNaming};
use zonal::{CoverageRule, FailurePolicy};

/// Configuration principale d'un run
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Fichier GeoJSON des limites
    pub boundaries: PathBuf,

    /// Propriété servant d'identifiant de zone
    #[serde(default)]
    pub id_field: Option<String>,

    /// Attributs des zones recopiés dans la table finale
    #[serde(default)]
    pub keep: Vec<String>,

    /// Colonnes de tri (ordre croissant, stable)
    #[serde(default)]
    pub sort_by: Vec<String>,

    /// Table CSV produite
    pub output: PathBuf,

    /// Table GeoJSON produite (géométries incluses)
    #[serde(default)]
    pub geojson_output: Option<PathBuf>,

    /// Rapport JSON du run
    #[serde(default)]
    pub report: Option<PathBuf>,

    #[serde(default)]
    pub coverage: Coverage,

    #[serde(default)]
    pub on_failure: OnFailure,

    /// Nombre de threads par lot (défaut : tous les coeurs)
    #[serde(default)]
    pub jobs: Option<usize>,

    pub batches: Vec<BatchSpec>,
}

/// Un lot de rasters partageant un préfixe
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BatchSpec {
    /// Fichiers, répertoires ou motifs glob
    pub rasters: Vec<String>,

    /// Préfixe global des colonnes (`wp_`, `gpw_`...)
    #[serde(default)]
    pub prefix: String,

    /// Labels explicites, un par raster
    #[serde(default)]
    pub labels: Option<Vec<String>>,

    /// Regex dont le premier groupe capturé sur le nom de fichier donne le label
    #[serde(default)]
    pub label_pattern: Option<String>,

    #[serde(default = "default_rounding")]
    pub rounding: bool,

    #[serde(default)]
    pub add_total: bool,

    /// Bande lue dans chaque raster (à partir de 1, GeoTIFF multi-bandes)
    #[serde(default = "default_band")]
    pub band: usize,
}

/// Règle de couverture des pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// Centre du pixel dans la zone
    #[default]
    Center,
    /// Tout pixel touché par la zone
    AllTouched,
}

/// Politique d'échec d'une source : `"abort"`, `"skip"` ou `{ "fill": 0 }`
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    #[default]
    Abort,
    Skip,
    Fill(f64),
}

fn default_rounding() -> bool {
    true
}

fn default_band() -> usize {
    1
}

impl From<Coverage> for CoverageRule {
    fn from(value: Coverage) -> Self {
        match value {
            Coverage::Center => CoverageRule::PixelCenter,
            Coverage::AllTouched => CoverageRule::AllTouched,
        }
    }
}

impl From<OnFailure> for FailurePolicy {
    fn from(value: OnFailure) -> Self {
        match value {
            OnFailure::Abort => FailurePolicy::Abort,
            OnFailure::Skip => FailurePolicy::Skip,
            OnFailure::Fill(v) => FailurePolicy::Fill(v),
        }
    }
}

impl std::str::FromStr for OnFailure {
    type Err = String;

    /// Forme ligne de commande : `abort`, `skip` ou `fill=<valeur>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(OnFailure::Abort),
            "skip" => Ok(OnFailure::Skip),
            _ => match s.strip_prefix("fill=") {
                Some(value) => value
                    .parse()
                    .map(OnFailure::Fill)
                    .map_err(|_| format!("invalid fill value: {}", value)),
                None => Err(format!(
                    "unknown failure policy: {} (use abort, skip or fill=<value>)",
                    s
                )),
            },
        }
    }
}

impl RunConfig {
    /// Charge une configuration ; les chemins relatifs partent du répertoire du fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let mut config: RunConfig = serde_json::from_str(&content)
            .context(format!("Failed to parse config JSON: {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Rend les chemins relatifs à `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &Path| -> PathBuf {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };

        self.boundaries = join(&self.boundaries);
        self.output = join(&self.output);
        self.geojson_output = self.geojson_output.as_deref().map(join);
        self.report = self.report.as_deref().map(join);

        for batch in &mut self.batches {
            for raster in &mut batch.rasters {
                *raster = join(Path::new(raster.as_str())).to_string_lossy().into_owned();
            }
        }
    }

    /// Vérifications ne nécessitant pas de lire les données
    pub fn validate(&self) -> Result<()> {
        if self.batches.is_empty() {
            anyhow::bail!("No batch configured: add at least one entry to \"batches\"");
        }
        if self.jobs == Some(0) {
            anyhow::bail!("\"jobs\" must be at least 1");
        }

        for (index, batch) in self.batches.iter().enumerate() {
            if batch.rasters.is_empty() {
                anyhow::bail!("Batch #{} ({}) has no raster", index, batch.prefix);
            }
            if batch.band == 0 {
                anyhow::bail!("Batch #{} ({}): \"band\" starts at 1", index, batch.prefix);
            }
            if batch.labels.is_some() && batch.label_pattern.is_some() {
                anyhow::bail!(
                    "Batch #{} ({}): \"labels\" and \"label_pattern\" are mutually exclusive",
                    index,
                    batch.prefix
                );
            }
        }
        Ok(())
    }

    /// Paramètres moteur d'un lot ; les labels sont fournis une fois les rasters énumérés
    pub fn batch_config(&self, batch: &BatchSpec, labels: Option<Vec<String>>) -> BatchConfig {
        let mut naming = ColumnNaming::new(batch.prefix.as_str());
        if let Some(labels) = labels {
            naming = naming.with_labels(labels);
        }

        BatchConfig {
            naming,
            rounding: batch.rounding,
            add_total: batch.add_total,
            coverage: self.coverage.into(),
            on_failure: self.on_failure.into(),
            jobs: self.jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "boundaries": "zones.geojson",
        "output": "out/table.csv",
        "batches": [{ "rasters": ["wp/*.asc"], "prefix": "wp_" }]
    }"#;

    #[test]
    fn test_defaults() {
        let config: RunConfig = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(config.coverage, Coverage::Center);
        assert_eq!(config.on_failure, OnFailure::Abort);
        assert!(config.keep.is_empty());
        assert!(config.batches[0].rounding);
        assert!(!config.batches[0].add_total);
        assert_eq!(config.batches[0].band, 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_policies_from_json() {
        let doc = r#"{
            "boundaries": "z.geojson", "output": "o.csv",
            "coverage": "all_touched", "on_failure": { "fill": -1 },
            "batches": [{ "rasters": ["a.asc"] }]
        }"#;
        let config: RunConfig = serde_json::from_str(doc).unwrap();
        assert_eq!(config.coverage, Coverage::AllTouched);
        assert_eq!(config.on_failure, OnFailure::Fill(-1.0));

        let skip: OnFailure = serde_json::from_str(r#""skip""#).unwrap();
        assert_eq!(FailurePolicy::from(skip), FailurePolicy::Skip);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let doc = r#"{ "boundaries": "z", "output": "o", "batches": [], "sortBy": [] }"#;
        assert!(serde_json::from_str::<RunConfig>(doc).is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let mut config: RunConfig = serde_json::from_str(MINIMAL).unwrap();
        config.resolve_paths(Path::new("/data/run"));
        assert_eq!(config.boundaries, PathBuf::from("/data/run/zones.geojson"));
        assert_eq!(config.output, PathBuf::from("/data/run/out/table.csv"));
        assert_eq!(config.batches[0].rasters[0], "/data/run/wp/*.asc");
    }

    #[test]
    fn test_validate() {
        let mut config: RunConfig = serde_json::from_str(MINIMAL).unwrap();
        config.batches[0].labels = Some(vec!["a".into()]);
        config.batches[0].label_pattern = Some("(.*)".into());
        assert!(config.validate().is_err());

        config.batches[0].label_pattern = None;
        config.batches[0].band = 0;
        assert!(config.validate().is_err());

        config.batches.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_on_failure_from_str() {
        assert_eq!("skip".parse::<OnFailure>().unwrap(), OnFailure::Skip);
        assert_eq!("fill=0".parse::<OnFailure>().unwrap(), OnFailure::Fill(0.0));
        assert!("fill=x".parse::<OnFailure>().is_err());
        assert!("retry".parse::<OnFailure>().is_err());
    }

    #[test]
    fn test_batch_config() {
        let config: RunConfig = serde_json::from_str(MINIMAL).unwrap();
        let batch = config.batch_config(&config.batches[0], None);
        assert_eq!(batch.naming.global_prefix(), "wp_");
        assert!(batch.rounding);
        assert_eq!(batch.coverage, CoverageRule::PixelCenter);
    }
}
