//! Lecteur ESRI ASCII Grid (`.asc`)
//!
//! ```text
//! ncols         4
//! nrows         3
//! xllcorner     0.0
//! yllcorner     0.0
//! cellsize      1.0
//! NODATA_value  -9999
//! 1 2 3 4
//! ...
//! ```

use std::path::Path;

use tracing::{debug, warn};

use crate::grid::{GeoTransform, Grid};
use crate::ZonalError;

/// Lit une grille ASCII depuis le disque
pub fn read_ascii_grid(path: &Path) -> Result<Grid, ZonalError> {
    if !path.is_file() {
        return Err(ZonalError::SourceNotFound(path.to_path_buf()));
    }

    let data = std::fs::read(path)?;
    let grid = parse(&data, &path.display().to_string())?;

    debug!(
        path = %path.display(),
        width = grid.width(),
        height = grid.height(),
        nodata = ?grid.nodata(),
        "Loaded ASCII grid"
    );

    Ok(grid)
}

const HEADER_KEYS: &[&str] = &[
    "ncols",
    "nrows",
    "xllcorner",
    "xllcenter",
    "yllcorner",
    "yllcenter",
    "cellsize",
    "dx",
    "dy",
    "nodata_value",
];

/// En-tête de la grille (clés insensibles à la casse)
#[derive(Debug, Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    dx: Option<f64>,
    dy: Option<f64>,
    nodata: Option<f64>,
}

/// Parse le contenu d'une grille ASCII ; `label` identifie la source dans les erreurs
pub fn parse(data: &[u8], label: &str) -> Result<Grid, ZonalError> {
    let content = simdutf8::basic::from_utf8(data)
        .map_err(|_| ZonalError::invalid_raster(label, "not valid UTF-8 text"))?;

    let (header, body) = parse_header(content, label)?;

    let require = |value: Option<usize>, key: &str| {
        value.ok_or_else(|| ZonalError::invalid_raster(label, format!("missing header '{}'", key)))
    };
    let ncols = require(header.ncols, "ncols")?;
    let nrows = require(header.nrows, "nrows")?;

    let cell_x = header.dx.or(header.cellsize);
    let cell_y = header.dy.or(header.cellsize);
    let (Some(cell_x), Some(cell_y)) = (cell_x, cell_y) else {
        return Err(ZonalError::invalid_raster(label, "missing header 'cellsize'"));
    };
    if !(cell_x > 0.0 && cell_y > 0.0) {
        return Err(ZonalError::invalid_raster(
            label,
            format!("cell size must be positive, got {}x{}", cell_x, cell_y),
        ));
    }

    let (Some((xll, x_center)), Some((yll, y_center))) = (header.xll, header.yll) else {
        return Err(ZonalError::invalid_raster(
            label,
            "missing header 'xllcorner'/'yllcorner'",
        ));
    };
    let x_min = if x_center { xll - cell_x / 2.0 } else { xll };
    let y_min = if y_center { yll - cell_y / 2.0 } else { yll };
    let y_max = y_min + nrows as f64 * cell_y;

    let expected = ncols.checked_mul(nrows).ok_or_else(|| {
        ZonalError::invalid_raster(label, format!("grid size {}x{} overflows", ncols, nrows))
    })?;
    // Capacité bornée par le corps : un en-tête corrompu ne doit pas réserver la mémoire
    let mut values = Vec::with_capacity(expected.min(body.len() / 2 + 1));
    for token in body.split_ascii_whitespace() {
        let value: f64 = fast_float::parse(token).map_err(|_| {
            ZonalError::invalid_raster(label, format!("invalid cell value '{}'", token))
        })?;
        if values.len() == expected {
            return Err(ZonalError::invalid_raster(
                label,
                format!("more than {} cell values ({}x{})", expected, ncols, nrows),
            ));
        }
        values.push(value);
    }
    if values.len() != expected {
        return Err(ZonalError::invalid_raster(
            label,
            format!(
                "expected {} cell values ({}x{}), found {}",
                expected,
                ncols,
                nrows,
                values.len()
            ),
        ));
    }

    let transform = GeoTransform::new([x_min, cell_x, 0.0, y_max, 0.0, -cell_y])?;
    Grid::new(values, ncols, nrows, transform, header.nodata)
}

/// Lit les lignes `clé valeur` jusqu'à la première ligne numérique
fn parse_header<'a>(content: &'a str, label: &str) -> Result<(Header, &'a str), ZonalError> {
    let mut header = Header::default();
    let mut rest = content;

    loop {
        let line_end = memchr::memchr(b'\n', rest.as_bytes()).unwrap_or(rest.len());
        let line = rest[..line_end].trim();

        let mut tokens = line.split_ascii_whitespace();
        let Some(key) = tokens.next() else {
            if line_end == rest.len() {
                return Ok((header, ""));
            }
            rest = &rest[line_end + 1..];
            continue;
        };

        let key_lower = key.to_ascii_lowercase();
        if !HEADER_KEYS.contains(&key_lower.as_str())
            && fast_float::parse::<f64, _>(key).is_ok()
        {
            // Début du corps
            return Ok((header, rest));
        }

        let raw = tokens.next().ok_or_else(|| {
            ZonalError::invalid_raster(label, format!("header '{}' has no value", key))
        })?;

        match key_lower.as_str() {
            "ncols" => header.ncols = Some(parse_count(raw, key, label)?),
            "nrows" => header.nrows = Some(parse_count(raw, key, label)?),
            "xllcorner" => header.xll = Some((parse_number(raw, key, label)?, false)),
            "xllcenter" => header.xll = Some((parse_number(raw, key, label)?, true)),
            "yllcorner" => header.yll = Some((parse_number(raw, key, label)?, false)),
            "yllcenter" => header.yll = Some((parse_number(raw, key, label)?, true)),
            "cellsize" => header.cellsize = Some(parse_number(raw, key, label)?),
            "dx" => header.dx = Some(parse_number(raw, key, label)?),
            "dy" => header.dy = Some(parse_number(raw, key, label)?),
            "nodata_value" => header.nodata = Some(parse_number(raw, key, label)?),
            _ => warn!(source = label, key = key, "Ignoring unknown ASCII grid header"),
        }

        if line_end == rest.len() {
            return Ok((header, ""));
        }
        rest = &rest[line_end + 1..];
    }
}

fn parse_count(raw: &str, key: &str, label: &str) -> Result<usize, ZonalError> {
    raw.parse::<usize>().map_err(|_| {
        ZonalError::invalid_raster(label, format!("header '{}' is not a count: '{}'", key, raw))
    })
}

fn parse_number(raw: &str, key: &str, label: &str) -> Result<f64, ZonalError> {
    fast_float::parse(raw).map_err(|_| {
        ZonalError::invalid_raster(label, format!("header '{}' is not a number: '{}'", key, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    const SAMPLE: &str = "ncols 3\r\nnrows 2\r\nxllcorner 10.0\r\nyllcorner 20.0\r\ncellsize 0.5\r\nNODATA_value -9999\r\n1 2 3\r\n4 -9999 6\r\n";

    #[test]
    fn test_parse_sample() {
        let grid = parse(SAMPLE.as_bytes(), "sample").unwrap();
        assert_eq!((grid.width(), grid.height()), (3, 2));
        assert_eq!(grid.nodata(), Some(-9999.0));
        assert_eq!(grid.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(grid.get(1, 1), Some(-9999.0));
        assert_eq!(
            grid.transform().coefficients(),
            [10.0, 0.5, 0.0, 21.0, 0.0, -0.5]
        );
        assert_eq!(grid.valid_summary(), (5, 16.0));
    }

    #[test]
    fn test_parse_center_registration() {
        let data = "NCOLS 2\nNROWS 2\nXLLCENTER 0.5\nYLLCENTER 0.5\nCELLSIZE 1\n1 1\n1 1";
        let grid = parse(data.as_bytes(), "center").unwrap();
        assert_eq!(grid.transform().pixel_to_geo(0.0, 0.0), Coord { x: 0.0, y: 2.0 });
        assert_eq!(grid.nodata(), None);
    }

    #[test]
    fn test_parse_dx_dy() {
        let data = "ncols 1\nnrows 2\nxllcorner 0\nyllcorner 0\ndx 2\ndy 3\n7\n8\n";
        let grid = parse(data.as_bytes(), "dxdy").unwrap();
        assert_eq!(grid.transform().coefficients(), [0.0, 2.0, 0.0, 6.0, 0.0, -3.0]);
    }

    #[test]
    fn test_parse_body_starting_with_nan() {
        let data = "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\nnan 3\n";
        let grid = parse(data.as_bytes(), "nan").unwrap();
        assert!(grid.get(0, 0).unwrap().is_nan());
        assert_eq!(grid.valid_summary(), (1, 3.0));
    }

    #[test]
    fn test_parse_wrong_value_count() {
        let data = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n";
        match parse(data.as_bytes(), "short") {
            Err(ZonalError::InvalidRaster { path, reason }) => {
                assert_eq!(path, "short");
                assert!(reason.contains("expected 4"));
            }
            other => panic!("Expected InvalidRaster, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_overflowing_header() {
        let data = "ncols 4294967296\nnrows 4294967296\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2\n";
        match parse(data.as_bytes(), "overflow") {
            Err(ZonalError::InvalidRaster { reason, .. }) => assert!(reason.contains("overflows")),
            other => panic!("Expected InvalidRaster, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_huge_header_small_body() {
        let data = "ncols 1000000000\nnrows 1000000000\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n";
        match parse(data.as_bytes(), "huge") {
            Err(ZonalError::InvalidRaster { reason, .. }) => {
                assert!(reason.contains("found 3"), "{}", reason)
            }
            other => panic!("Expected InvalidRaster, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_too_many_values() {
        let data = "ncols 1\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2\n";
        assert!(matches!(
            parse(data.as_bytes(), "long"),
            Err(ZonalError::InvalidRaster { .. })
        ));
    }

    #[test]
    fn test_parse_missing_header() {
        let data = "ncols 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2\n";
        assert!(matches!(
            parse(data.as_bytes(), "nohdr"),
            Err(ZonalError::InvalidRaster { .. })
        ));
    }

    #[test]
    fn test_parse_bad_cell() {
        let data = "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 abc\n";
        assert!(parse(data.as_bytes(), "bad").is_err());
    }

    #[test]
    fn test_parse_not_utf8() {
        assert!(parse(&[0xff, 0xfe, 0x00], "bin").is_err());
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_ascii_grid(Path::new("nonexistent.asc"));
        assert!(matches!(result, Err(ZonalError::SourceNotFound(_))));
    }
}
