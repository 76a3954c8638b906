//! Inclusion « all touched » : tout pixel dont l'empreinte recoupe la zone

use std::collections::BTreeMap;

use geo::{BoundingRect, Coord, Intersects, MultiPolygon, Rect};

use super::{clamp_range, merge_intervals, PixelSpan};

/// Marge retirée de chaque côté du pixel : un simple contact de bord ne compte pas
const EDGE_EPSILON: f64 = 1e-9;

/// Spans des pixels dont l'empreinte intersecte la géométrie (espace pixel)
pub fn touched_spans(geometry: &MultiPolygon<f64>, width: usize, height: usize) -> Vec<PixelSpan> {
    let mut by_row: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();

    for part in &geometry.0 {
        let Some(rect) = part.bounding_rect() else {
            continue;
        };
        let Some((row_start, row_end)) =
            clamp_range(rect.min().y.floor(), rect.max().y.ceil(), height)
        else {
            continue;
        };
        let Some((col_start, col_end)) =
            clamp_range(rect.min().x.floor(), rect.max().x.ceil(), width)
        else {
            continue;
        };

        for row in row_start..row_end {
            let mut run: Option<usize> = None;
            for col in col_start..col_end {
                let cell = Rect::new(
                    Coord {
                        x: col as f64 + EDGE_EPSILON,
                        y: row as f64 + EDGE_EPSILON,
                    },
                    Coord {
                        x: (col + 1) as f64 - EDGE_EPSILON,
                        y: (row + 1) as f64 - EDGE_EPSILON,
                    },
                )
                .to_polygon();

                match (part.intersects(&cell), run) {
                    (true, None) => run = Some(col),
                    (false, Some(start)) => {
                        by_row.entry(row).or_default().push((start, col));
                        run = None;
                    }
                    _ => {}
                }
            }
            if let Some(start) = run {
                by_row.entry(row).or_default().push((start, col_end));
            }
        }
    }

    merge_intervals(by_row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_edge_contact_is_not_touch() {
        // Carré exactement aligné sur les pixels (1..3) : les voisins ne font que toucher le bord
        let geom: MultiPolygon<f64> =
            polygon![(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)].into();
        let spans = touched_spans(&geom, 5, 5);
        assert_eq!(
            spans,
            vec![
                PixelSpan { row: 1, col_start: 1, col_end: 3 },
                PixelSpan { row: 2, col_start: 1, col_end: 3 },
            ]
        );
    }

    #[test]
    fn test_thin_sliver_touches_row() {
        // Bande fine qui ne contient aucun centre de pixel
        let geom: MultiPolygon<f64> = polygon![
            (x: 0.0, y: 1.1), (x: 4.0, y: 1.1), (x: 4.0, y: 1.2), (x: 0.0, y: 1.2)
        ]
        .into();
        let spans = touched_spans(&geom, 4, 4);
        assert_eq!(spans, vec![PixelSpan { row: 1, col_start: 0, col_end: 4 }]);
    }

    #[test]
    fn test_hole_interior_excluded() {
        let geom: MultiPolygon<f64> = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 6.0, y: 0.0), (x: 6.0, y: 6.0), (x: 0.0, y: 6.0)],
            interiors: [[(x: 1.5, y: 1.5), (x: 4.5, y: 1.5), (x: 4.5, y: 4.5), (x: 1.5, y: 4.5)]],
        )
        .into();
        let spans = touched_spans(&geom, 6, 6);
        let total: usize = spans.iter().map(PixelSpan::len).sum();
        // Seuls les pixels (2..4)x(2..4) sont entièrement dans le trou
        assert_eq!(total, 36 - 4);
    }
}
