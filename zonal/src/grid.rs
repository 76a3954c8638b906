//! Grille raster mono-bande en mémoire

use geo::{Coord, Rect};

use crate::ZonalError;

/// Transformation affine pixel → coordonnées géographiques (ordre GDAL)
///
/// `x = c[0] + col * c[1] + row * c[2]` et `y = c[3] + col * c[4] + row * c[5]`,
/// où `(row, col)` désigne le coin supérieur gauche du pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    coeffs: [f64; 6],
    inverse: [f64; 4],
}

impl GeoTransform {
    /// Construit une transformation à partir des 6 coefficients GDAL
    pub fn new(coeffs: [f64; 6]) -> Result<Self, ZonalError> {
        let det = coeffs[1] * coeffs[5] - coeffs[2] * coeffs[4];
        if !det.is_finite() || det == 0.0 || coeffs.iter().any(|c| !c.is_finite()) {
            return Err(ZonalError::InvalidTransform(coeffs));
        }

        Ok(Self {
            coeffs,
            inverse: [
                coeffs[5] / det,
                -coeffs[2] / det,
                -coeffs[4] / det,
                coeffs[1] / det,
            ],
        })
    }

    /// Grille nord en haut : origine au coin supérieur gauche, pixels carrés
    pub fn north_up(x_min: f64, y_max: f64, cell_size: f64) -> Result<Self, ZonalError> {
        Self::new([x_min, cell_size, 0.0, y_max, 0.0, -cell_size])
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.coeffs
    }

    /// Coordonnée géographique du coin `(row, col)` (valeurs fractionnaires acceptées)
    pub fn pixel_to_geo(&self, row: f64, col: f64) -> Coord<f64> {
        let c = &self.coeffs;
        Coord {
            x: c[0] + col * c[1] + row * c[2],
            y: c[3] + col * c[4] + row * c[5],
        }
    }

    /// Position fractionnaire dans la grille, `x` = colonne, `y` = ligne
    pub fn geo_to_pixel(&self, coord: Coord<f64>) -> Coord<f64> {
        let dx = coord.x - self.coeffs[0];
        let dy = coord.y - self.coeffs[3];
        let inv = &self.inverse;
        Coord {
            x: inv[0] * dx + inv[1] * dy,
            y: inv[2] * dx + inv[3] * dy,
        }
    }

    /// Vrai si la grille n'a ni rotation ni cisaillement
    pub fn is_axis_aligned(&self) -> bool {
        self.coeffs[2] == 0.0 && self.coeffs[4] == 0.0
    }
}

/// Une bande raster : valeurs, transformation affine et valeur nodata
#[derive(Debug, Clone)]
pub struct Grid {
    values: Vec<f64>,
    width: usize,
    height: usize,
    transform: GeoTransform,
    nodata: Option<f64>,
}

impl Grid {
    /// Construit une grille à partir de valeurs en ordre ligne par ligne
    pub fn new(
        values: Vec<f64>,
        width: usize,
        height: usize,
        transform: GeoTransform,
        nodata: Option<f64>,
    ) -> Result<Self, ZonalError> {
        if width == 0 || height == 0 {
            return Err(ZonalError::InvalidGrid(format!(
                "dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        let expected = width.checked_mul(height).ok_or_else(|| {
            ZonalError::InvalidGrid(format!("grid size {}x{} overflows", width, height))
        })?;
        if values.len() != expected {
            return Err(ZonalError::InvalidGrid(format!(
                "expected {} values for {}x{}, got {}",
                expected,
                width,
                height,
                values.len()
            )));
        }

        Ok(Self {
            values,
            width,
            height,
            transform,
            nodata,
        })
    }

    /// Construit une grille à partir de lignes (première ligne = haut de la grille)
    pub fn from_rows(
        rows: Vec<Vec<f64>>,
        transform: GeoTransform,
        nodata: Option<f64>,
    ) -> Result<Self, ZonalError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(ZonalError::InvalidGrid(format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                width
            )));
        }
        let values = rows.into_iter().flatten().collect();
        Self::new(values, width, height, transform, nodata)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.height && col < self.width {
            Some(self.values[row * self.width + col])
        } else {
            None
        }
    }

    /// Une ligne complète de la grille
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.width;
        &self.values[start..start + self.width]
    }

    /// Vrai si la valeur doit être exclue de toute agrégation
    ///
    /// Un NaN n'est jamais agrégé, qu'il soit ou non la valeur nodata déclarée.
    pub fn is_nodata(&self, value: f64) -> bool {
        if value.is_nan() {
            return true;
        }
        match self.nodata {
            Some(nd) => value == nd,
            None => false,
        }
    }

    /// Emprise géographique (boîte englobante des quatre coins)
    pub fn bounds(&self) -> Rect<f64> {
        let h = self.height as f64;
        let w = self.width as f64;
        let corners = [
            self.transform.pixel_to_geo(0.0, 0.0),
            self.transform.pixel_to_geo(0.0, w),
            self.transform.pixel_to_geo(h, 0.0),
            self.transform.pixel_to_geo(h, w),
        ];
        let (mut min, mut max) = (corners[0], corners[0]);
        for c in &corners[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        Rect::new(min, max)
    }

    /// Nombre de pixels valides et somme de leurs valeurs
    pub fn valid_summary(&self) -> (usize, f64) {
        self.values
            .iter()
            .filter(|v| !self.is_nodata(**v))
            .fold((0, 0.0), |(n, s), v| (n + 1, s + v))
    }
}
