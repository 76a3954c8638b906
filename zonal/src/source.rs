//! Sources de grilles pour l'agrégation par lot

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::grid::Grid;
use crate::loader;
use crate::ZonalError;

/// Une source raster nommée, chargée à la demande
///
/// Le chargement a lieu dans la tâche d'agrégation de la source : un échec
/// reste local à cette source.
pub trait GridSource: Sync {
    /// Nom court de la source (sert de label de colonne par défaut)
    fn name(&self) -> &str;

    /// Charge la grille
    fn load(&self) -> Result<Cow<'_, Grid>, ZonalError>;
}

/// Grille déjà en mémoire
#[derive(Debug, Clone)]
pub struct NamedGrid {
    name: String,
    grid: Grid,
}

impl NamedGrid {
    pub fn new(name: impl Into<String>, grid: Grid) -> Self {
        Self {
            name: name.into(),
            grid,
        }
    }
}

impl GridSource for NamedGrid {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Cow<'_, Grid>, ZonalError> {
        Ok(Cow::Borrowed(&self.grid))
    }
}

/// Fichier raster (ASCII Grid ou GeoTIFF) lu au moment de l'agrégation
#[derive(Debug, Clone)]
pub struct GridFile {
    path: PathBuf,
    name: String,
    band: usize,
}

impl GridFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = source_stem(&path);
        Self {
            path,
            name,
            band: 1,
        }
    }

    /// Bande lue (à partir de 1)
    pub fn with_band(mut self, band: usize) -> Self {
        self.band = band;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn band(&self) -> usize {
        self.band
    }
}

impl GridSource for GridFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Cow<'_, Grid>, ZonalError> {
        loader::read_grid(&self.path, self.band).map(Cow::Owned)
    }
}

/// Nom de fichier jusqu'au premier `.` (`ppp_2020_1km.tif.asc` → `ppp_2020_1km`)
pub fn source_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    match name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}
