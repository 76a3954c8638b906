//! Rasterisation des zones sur la grille
//!
//! Les géométries sont d'abord ramenées dans l'espace pixel (x = colonne,
//! y = ligne) par la transformation affine inverse ; les grilles tournées ou
//! cisaillées sont donc traitées comme les autres.

pub mod scanline;
pub mod touched;

use std::collections::BTreeMap;

use geo::{Coord, MapCoords, MultiPolygon};

use crate::grid::{GeoTransform, Grid};

/// Règle d'inclusion d'un pixel dans une zone
///
/// La règle par défaut, `PixelCenter`, est plus stricte qu'une inclusion
/// « dès qu'une partie du pixel est dans la zone » : un pixel à cheval sur une
/// limite n'est compté que dans la zone qui contient son centre. C'est ce qui
/// garantit qu'une partition de l'emprise compte chaque pixel une seule fois.
/// `AllTouched` applique l'inclusion au sens large.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoverageRule {
    /// Le centre du pixel est dans la zone (une seule zone par pixel dans une partition)
    #[default]
    PixelCenter,
    /// Toute intersection d'aire non nulle entre le pixel et la zone
    AllTouched,
}

/// Suite de pixels couverts sur une ligne, colonnes `[col_start, col_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSpan {
    pub row: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl PixelSpan {
    pub fn len(&self) -> usize {
        self.col_end - self.col_start
    }

    pub fn is_empty(&self) -> bool {
        self.col_end <= self.col_start
    }
}

/// Pixels de la grille couverts par la géométrie, triés par ligne puis colonne
///
/// Les spans ne se chevauchent pas : un pixel couvert par plusieurs parties
/// d'un multipolygone n'apparaît qu'une fois.
pub fn covered_spans(
    geometry: &MultiPolygon<f64>,
    grid: &Grid,
    rule: CoverageRule,
) -> Vec<PixelSpan> {
    if geometry.0.is_empty() {
        return Vec::new();
    }

    let pixel_geometry = to_pixel_space(geometry, grid.transform());
    let (width, height) = (grid.width(), grid.height());

    match rule {
        CoverageRule::PixelCenter => scanline::center_spans(&pixel_geometry, width, height),
        CoverageRule::AllTouched => touched::touched_spans(&pixel_geometry, width, height),
    }
}

/// Projette une géométrie dans l'espace pixel de la grille
pub fn to_pixel_space(geometry: &MultiPolygon<f64>, transform: &GeoTransform) -> MultiPolygon<f64> {
    geometry.map_coords(|c: Coord<f64>| transform.geo_to_pixel(c))
}

/// Fusionne des intervalles de colonnes par ligne en spans disjoints
pub(crate) fn merge_intervals(by_row: BTreeMap<usize, Vec<(usize, usize)>>) -> Vec<PixelSpan> {
    let mut spans = Vec::new();

    for (row, mut intervals) in by_row {
        intervals.sort_unstable();
        let mut current: Option<(usize, usize)> = None;

        for (start, end) in intervals {
            if start >= end {
                continue;
            }
            current = match current {
                Some((cs, ce)) if start <= ce => Some((cs, ce.max(end))),
                Some((cs, ce)) => {
                    spans.push(PixelSpan {
                        row,
                        col_start: cs,
                        col_end: ce,
                    });
                    Some((start, end))
                }
                None => Some((start, end)),
            };
        }

        if let Some((cs, ce)) = current {
            spans.push(PixelSpan {
                row,
                col_start: cs,
                col_end: ce,
            });
        }
    }

    spans
}

/// Lignes `[first, last)` à examiner, bornées à la grille
///
/// `None` si la plage est vide ou si les coordonnées ne sont pas finies.
pub(crate) fn clamp_range(min: f64, max: f64, limit: usize) -> Option<(usize, usize)> {
    if !min.is_finite() || !max.is_finite() {
        return None;
    }
    let first = min.max(0.0);
    let last = max.min(limit as f64);
    if first >= last {
        return None;
    }
    Some((first as usize, last as usize))
}
