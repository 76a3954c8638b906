//! Énumération des rasters d'un lot et calcul des labels

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use zonal::loader::RasterFormat;
use zonal::source::source_stem;
use zonal::GridFile;

use crate::config::BatchSpec;

/// Rasters d'un lot prêts pour l'agrégation, avec leurs labels éventuels
#[derive(Debug)]
pub struct BatchSources {
    pub files: Vec<GridFile>,
    pub labels: Option<Vec<String>>,
}

impl BatchSources {
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path())
    }
}

/// Énumère les rasters d'un lot et calcule les labels
pub fn collect(batch: &BatchSpec) -> Result<BatchSources> {
    let paths = expand_rasters(&batch.rasters)?;

    let labels = match (&batch.labels, &batch.label_pattern) {
        (Some(labels), _) => Some(labels.clone()),
        (None, Some(pattern)) => {
            let regex = Regex::new(pattern)
                .with_context(|| format!("Invalid label_pattern: {}", pattern))?;
            Some(labels_from_pattern(&paths, &regex)?)
        }
        (None, None) => None,
    };

    debug!(prefix = %batch.prefix, rasters = paths.len(), "Collected batch sources");

    Ok(BatchSources {
        files: paths
            .into_iter()
            .map(|path| GridFile::new(path).with_band(batch.band))
            .collect(),
        labels,
    })
}

/// Développe fichiers, répertoires et motifs glob
///
/// L'ordre des entrées est conservé ; chaque répertoire ou motif est trié.
/// Un fichier absent est gardé tel quel : son échec relève de la politique
/// d'échec du lot.
pub fn expand_rasters(entries: &[String]) -> Result<Vec<PathBuf>> {
    let mut rasters = Vec::new();

    for entry in entries {
        if is_glob_pattern(entry) {
            let mut matches = glob::glob(entry)
                .with_context(|| format!("Invalid glob pattern: {}", entry))?
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Cannot read matches of {}", entry))?;
            if matches.is_empty() {
                anyhow::bail!("No raster matches {}", entry);
            }
            matches.sort();
            rasters.extend(matches);
            continue;
        }

        let path = Path::new(entry);
        if path.is_dir() {
            let found = collect_directory(path)?;
            if found.is_empty() {
                anyhow::bail!(
                    "No raster ({}) found in {}",
                    RasterFormat::EXTENSIONS.join(", "),
                    path.display()
                );
            }
            rasters.extend(found);
        } else {
            rasters.push(path.to_path_buf());
        }
    }

    Ok(rasters)
}

fn is_glob_pattern(entry: &str) -> bool {
    entry.contains(['*', '?', '['])
}

fn collect_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("Cannot walk {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().map_or(false, |ext| {
                RasterFormat::EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
        {
            found.push(path.to_path_buf());
        }
    }
    found.sort();
    Ok(found)
}

/// Premier groupe capturé sur le nom de fichier (sans extension)
pub fn labels_from_pattern(paths: &[PathBuf], pattern: &Regex) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|path| {
            let stem = source_stem(path);
            pattern
                .captures(&stem)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .with_context(|| {
                    format!(
                        "label_pattern {} does not capture a label from {}",
                        pattern.as_str(),
                        path.display()
                    )
                })
        })
        .collect()
}

/// Calcule le checksum blake3 d'un fichier
pub fn file_checksum(path: &Path) -> Result<String> {
    use std::fs::File;
    use std::io::Read;

    let mut file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
