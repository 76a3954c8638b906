//! Lecteurs de fichiers d'entrée (rasters ESRI ASCII Grid et GeoTIFF, limites GeoJSON)

pub mod ascii;
pub mod geojson;
pub mod geotiff;

use std::path::Path;

use crate::grid::Grid;
use crate::ZonalError;

pub use ascii::read_ascii_grid;
pub use self::geojson::read_zones;
pub use self::geotiff::read_geotiff;

/// Format raster déduit de l'extension du fichier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    AsciiGrid,
    GeoTiff,
}

impl RasterFormat {
    /// Extensions reconnues (comparaison insensible à la casse)
    pub const EXTENSIONS: &'static [&'static str] = &["asc", "tif", "tiff"];

    /// `.tif`/`.tiff` → GeoTIFF, tout le reste est lu comme ASCII Grid
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff") => {
                RasterFormat::GeoTiff
            }
            _ => RasterFormat::AsciiGrid,
        }
    }
}

/// Lit la bande `band` (à partir de 1) d'un raster, quel que soit son format
pub fn read_grid(path: &Path, band: usize) -> Result<Grid, ZonalError> {
    match RasterFormat::from_path(path) {
        RasterFormat::GeoTiff => read_geotiff(path, band),
        RasterFormat::AsciiGrid if band == 1 => read_ascii_grid(path),
        RasterFormat::AsciiGrid => Err(ZonalError::invalid_raster(
            path.display().to_string(),
            format!("band {} out of range, ASCII grids have a single band", band),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(RasterFormat::from_path(Path::new("a/ppp_2020.tif")), RasterFormat::GeoTiff);
        assert_eq!(RasterFormat::from_path(Path::new("b.TIFF")), RasterFormat::GeoTiff);
        assert_eq!(RasterFormat::from_path(Path::new("c.asc")), RasterFormat::AsciiGrid);
        assert_eq!(RasterFormat::from_path(Path::new("noext")), RasterFormat::AsciiGrid);
    }

    #[test]
    fn test_ascii_has_single_band() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.asc");
        std::fs::write(&path, "ncols 1\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n5\n").unwrap();

        assert_eq!(read_grid(&path, 1).unwrap().get(0, 0), Some(5.0));
        assert!(matches!(read_grid(&path, 2), Err(ZonalError::InvalidRaster { .. })));
    }
}
