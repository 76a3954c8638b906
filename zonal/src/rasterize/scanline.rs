//! Scanline sur les centres de pixels
//!
//! Pour chaque ligne, on intersecte la droite `y = row + 0.5` avec toutes les
//! arêtes (extérieur et trous) et on remplit entre les croisements pairs.
//! Les croisements sont semi-ouverts sur les deux axes : un centre posé
//! exactement sur une arête partagée n'est attribué qu'à une seule zone.

use std::collections::BTreeMap;

use geo::{BoundingRect, LineString, MultiPolygon, Polygon};

use super::{clamp_range, merge_intervals, PixelSpan};

/// Spans des pixels dont le centre est dans la géométrie (espace pixel)
pub fn center_spans(geometry: &MultiPolygon<f64>, width: usize, height: usize) -> Vec<PixelSpan> {
    let mut by_row: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
    let mut crossings: Vec<f64> = Vec::new();

    for part in &geometry.0 {
        let Some(rect) = part.bounding_rect() else {
            continue;
        };

        let first = (rect.min().y - 0.5).ceil();
        let last = (rect.max().y - 0.5).floor() + 1.0;
        let Some((row_start, row_end)) = clamp_range(first, last, height) else {
            continue;
        };

        for row in row_start..row_end {
            let yc = row as f64 + 0.5;
            crossings.clear();
            collect_crossings(part, yc, &mut crossings);
            crossings.sort_unstable_by(f64::total_cmp);

            for pair in crossings.chunks_exact(2) {
                let col_start = center_column(pair[0], width);
                let col_end = center_column(pair[1], width);
                if col_end > col_start {
                    by_row.entry(row).or_default().push((col_start, col_end));
                }
            }
        }
    }

    merge_intervals(by_row)
}

/// Abscisses des croisements de la droite `y = yc` avec les anneaux du polygone
fn collect_crossings(polygon: &Polygon<f64>, yc: f64, out: &mut Vec<f64>) {
    ring_crossings(polygon.exterior(), yc, out);
    for interior in polygon.interiors() {
        ring_crossings(interior, yc, out);
    }
}

fn ring_crossings(ring: &LineString<f64>, yc: f64, out: &mut Vec<f64>) {
    for line in ring.lines() {
        // Extrémités ordonnées : même abscisse quel que soit le sens de parcours
        let (a, b) = if line.start.y <= line.end.y {
            (line.start, line.end)
        } else {
            (line.end, line.start)
        };
        if (a.y > yc) != (b.y > yc) {
            out.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
        }
    }
}

/// Première colonne dont le centre est à droite de `x` (inclus), bornée à la grille
fn center_column(x: f64, width: usize) -> usize {
    (x - 0.5).ceil().max(0.0).min(width as f64) as usize
}
