//! Somme zonale d'une grille sur un ensemble de zones

use geo::MultiPolygon;
use tracing::debug;

use crate::grid::Grid;
use crate::rasterize::{covered_spans, CoverageRule};
use crate::types::ZoneSet;

/// Sommes par zone, dans l'ordre du `ZoneSet`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZonalResult {
    /// Somme des pixels valides couverts par chaque zone
    pub sums: Vec<f64>,

    /// Nombre de pixels valides (non nodata) couverts par chaque zone
    pub valid_pixels: Vec<usize>,
}

impl ZonalResult {
    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Zones sans aucun pixel valide (somme nulle par construction)
    pub fn degenerate_count(&self) -> usize {
        self.valid_pixels.iter().filter(|&&n| n == 0).count()
    }
}

/// Rasterise chaque zone et somme les pixels couverts
#[derive(Debug, Clone, Copy, Default)]
pub struct ZonalSummer {
    rule: CoverageRule,
}

impl ZonalSummer {
    pub fn new(rule: CoverageRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> CoverageRule {
        self.rule
    }

    /// Somme de la grille pour chaque zone
    pub fn sum(&self, grid: &Grid, zones: &ZoneSet) -> ZonalResult {
        let mut result = ZonalResult {
            sums: Vec::with_capacity(zones.len()),
            valid_pixels: Vec::with_capacity(zones.len()),
        };

        for zone in zones {
            let (sum, count) = self.sum_geometry(grid, &zone.geometry);
            result.sums.push(sum);
            result.valid_pixels.push(count);
        }

        let degenerate = result.degenerate_count();
        if degenerate > 0 {
            debug!(
                zones = zones.len(),
                degenerate = degenerate,
                "Zones without valid pixels summed to 0"
            );
        }

        result
    }

    /// Somme et nombre de pixels valides pour une géométrie
    pub fn sum_geometry(&self, grid: &Grid, geometry: &MultiPolygon<f64>) -> (f64, usize) {
        let mut sum = 0.0;
        let mut count = 0;

        for span in covered_spans(geometry, grid, self.rule) {
            for &value in &grid.row(span.row)[span.col_start..span.col_end] {
                if !grid.is_nodata(value) {
                    sum += value;
                    count += 1;
                }
            }
        }

        (sum, count)
    }
}
