//! Types d'erreurs pour le crate zonal

use std::path::PathBuf;

use thiserror::Error;

/// Erreurs pouvant survenir lors du chargement ou de l'agrégation
///
/// Toutes les variantes sont fatales pour l'opération en cours. Les zones sans
/// pixel couvert ne sont jamais des erreurs : leur somme vaut 0.
#[derive(Debug, Error)]
pub enum ZonalError {
    /// Erreur d'I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fichier source introuvable
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Raster illisible ou mal formé
    #[error("Invalid raster {path}: {reason}")]
    InvalidRaster { path: String, reason: String },

    /// Fichier de limites illisible ou mal formé
    #[error("Invalid boundaries {path}: {reason}")]
    InvalidBoundaries { path: String, reason: String },

    /// Géométrie non surfacique ou non convertible
    #[error("Invalid geometry for {zone}: {reason}")]
    InvalidGeometry { zone: String, reason: String },

    /// Grille incohérente (dimensions, nombre de valeurs)
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Transformation affine non inversible
    #[error("Invalid geotransform {0:?}: linear part is not invertible")]
    InvalidTransform([f64; 6]),

    /// Identifiant de zone dupliqué dans un même ensemble
    #[error("Duplicate zone id: {0}")]
    DuplicateZoneId(String),

    /// Table dont le nombre de lignes ne correspond pas aux zones
    #[error("Row count mismatch for table #{table}: expected {expected} rows (one per zone), got {actual}")]
    RowCountMismatch {
        table: usize,
        expected: usize,
        actual: usize,
    },

    /// Colonne dont la longueur diffère de celle de sa table
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Collision de noms de colonnes
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// Label de source vide
    #[error("Empty label for source #{0}")]
    EmptyLabel(usize),

    /// Nombre de labels différent du nombre de sources
    #[error("Label count mismatch: {expected} raster sources but {actual} labels")]
    LabelCountMismatch { expected: usize, actual: usize },

    /// Attribut absent de toutes les zones
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Colonne de tri inconnue
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Échec d'une source dans un batch configuré pour s'arrêter
    #[error("Source #{index} ({name}) failed: {reason}")]
    SourceFailed {
        index: usize,
        name: String,
        reason: String,
    },

    /// Total entier hors de la plage `i64`
    #[error("Integer overflow in column '{column}' at row {row}")]
    TotalOverflow { column: String, row: usize },

    /// Impossible de construire le pool de threads
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl ZonalError {
    /// Crée une erreur de raster avec contexte
    pub fn invalid_raster(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRaster {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de fichier de limites avec contexte
    pub fn invalid_boundaries(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBoundaries {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(zone: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            zone: zone.into(),
            reason: reason.into(),
        }
    }
}
