//! # zonal
//!
//! Sommes zonales de grilles raster sur des polygones de limites, typiquement
//! des comptes de population par unité administrative.
//!
//! ## Features
//!
//! - Rasterisation par balayage de lignes (centres de pixels) ou `all touched`
//! - Agrégation par lot de plusieurs rasters, en parallèle avec `rayon`
//! - Nommage déterministe des colonnes (`<préfixe><label>_sum`, `<préfixe>sum_total`)
//! - Fusion des lots en une table finale triée, géométries conservées
//! - Lecture ESRI ASCII Grid optimisée avec `memchr`, `simdutf8` et `fast-float`
//! - Lecture GeoTIFF (bande au choix) avec `tiff`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonal::batch::{BatchAggregator, BatchConfig, ColumnNaming};
//! use zonal::loader::read_zones;
//! use zonal::source::GridFile;
//! use std::path::Path;
//!
//! let zones = read_zones(Path::new("communes.geojson"), Some("code"))?;
//! let sources = vec![GridFile::new("wp_2020.asc"), GridFile::new("wp_2021.tif")];
//!
//! let config = BatchConfig {
//!     naming: ColumnNaming::new("wp_"),
//!     rounding: true,
//!     add_total: true,
//!     ..Default::default()
//! };
//! let outcome = BatchAggregator::new(config).aggregate(&sources, &zones)?;
//! let table = zonal::merge(&zones, &[outcome.table], &["name"], &["name"])?;
//! ```

pub mod batch;
pub mod error;
pub mod grid;
pub mod loader;
pub mod merge;
pub mod rasterize;
pub mod source;
pub mod summer;
pub mod types;

pub use batch::{BatchAggregator, BatchConfig, BatchOutcome, FailurePolicy, SourceFailure};
pub use error::ZonalError;
pub use grid::{GeoTransform, Grid};
pub use merge::{merge, FinalTable};
pub use rasterize::CoverageRule;
pub use source::{GridFile, GridSource, NamedGrid};
pub use summer::{ZonalResult, ZonalSummer};
pub use types::{Value, Zone, ZoneSet};
