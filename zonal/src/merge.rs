//! Fusion des tables de lots avec les zones en une table finale

use std::collections::HashMap;

use geo::MultiPolygon;
use tracing::debug;

use crate::batch::BatchTable;
use crate::types::{Value, ZoneSet};
use crate::ZonalError;

/// Table finale : une ligne par zone, géométrie et identifiant conservés
///
/// Colonnes : attributs conservés, puis les colonnes de chaque lot dans
/// l'ordre des lots.
#[derive(Debug, Clone)]
pub struct FinalTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Ligne de la table finale
#[derive(Debug, Clone)]
pub struct Row {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    pub values: Vec<Value>,
}

impl FinalTable {
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Valeurs d'une colonne, dans l'ordre des lignes
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r.values[index]).collect())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.id.as_str())
    }
}

/// Assemble zones et tables, puis trie de façon stable selon `sort_by`
///
/// Chaque table doit avoir exactement une ligne par zone, alignée sur l'ordre
/// du `ZoneSet`. Un attribut absent d'une zone vaut `Null` ; absent de toutes,
/// c'est une erreur.
pub fn merge<S: AsRef<str>>(
    zones: &ZoneSet,
    tables: &[BatchTable],
    attributes: &[S],
    sort_by: &[S],
) -> Result<FinalTable, ZonalError> {
    for (index, table) in tables.iter().enumerate() {
        if table.row_count() != zones.len() {
            return Err(ZonalError::RowCountMismatch {
                table: index,
                expected: zones.len(),
                actual: table.row_count(),
            });
        }
    }

    let mut columns: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut declare = |name: &str| -> Result<(), ZonalError> {
        if positions.contains_key(name) {
            return Err(ZonalError::DuplicateColumn(name.to_string()));
        }
        positions.insert(name.to_string(), columns.len());
        columns.push(name.to_string());
        Ok(())
    };

    for attribute in attributes {
        let attribute = attribute.as_ref();
        if !zones.is_empty() && !zones.has_attribute(attribute) {
            return Err(ZonalError::UnknownAttribute(attribute.to_string()));
        }
        declare(attribute)?;
    }
    for table in tables {
        for name in table.column_names() {
            declare(name)?;
        }
    }

    let sort_keys = sort_by
        .iter()
        .map(|name| {
            positions
                .get(name.as_ref())
                .copied()
                .ok_or_else(|| ZonalError::UnknownColumn(name.as_ref().to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows: Vec<Row> = zones
        .iter()
        .enumerate()
        .map(|(row, zone)| {
            let mut values = Vec::with_capacity(columns.len());
            for attribute in attributes {
                values.push(
                    zone.attribute(attribute.as_ref())
                        .cloned()
                        .unwrap_or(Value::Null),
                );
            }
            for table in tables {
                for column in table.columns() {
                    values.push(column.values.get(row).unwrap_or(Value::Null));
                }
            }
            Row {
                id: zone.id.clone(),
                geometry: zone.geometry.clone(),
                values,
            }
        })
        .collect();

    if !sort_keys.is_empty() {
        rows.sort_by(|a, b| {
            sort_keys
                .iter()
                .map(|&k| a.values[k].sort_cmp(&b.values[k]))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    debug!(
        rows = rows.len(),
        columns = columns.len(),
        tables = tables.len(),
        "Merged final table"
    );

    Ok(FinalTable { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{Column, ColumnValues};
    use crate::types::Zone;
    use geo::polygon;

    fn zone(id: &str, region: &str) -> Zone {
        Zone::new(
            id,
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)],
        )
        .with_attribute("region", region)
        .with_attribute("name", format!("zone {}", id))
    }

    fn zones() -> ZoneSet {
        ZoneSet::new(vec![zone("a", "south"), zone("b", "north"), zone("c", "south")]).unwrap()
    }

    fn table(name: &str, values: Vec<i64>) -> BatchTable {
        let mut table = BatchTable::new(values.len());
        table
            .push(Column {
                name: name.to_string(),
                values: ColumnValues::Integer(values),
            })
            .unwrap();
        table
    }

    #[test]
    fn test_column_order_and_alignment() {
        let tables = vec![table("wp_a_sum", vec![1, 2, 3]), table("gpw_a_sum", vec![4, 5, 6])];
        let merged = merge(&zones(), &tables, &["name"], &[]).unwrap();

        assert_eq!(merged.column_names(), &["name", "wp_a_sum", "gpw_a_sum"]);
        assert_eq!(merged.ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(merged.rows()[1].values[0], Value::from("zone b"));
        assert_eq!(merged.rows()[1].values[2], Value::Integer(5));
    }

    #[test]
    fn test_stable_sort() {
        let tables = vec![table("pop", vec![30, 10, 20])];
        let merged = merge(&zones(), &tables, &["region"], &["region"]).unwrap();

        // north < south ; a et c gardent leur ordre relatif
        assert_eq!(merged.ids().collect::<Vec<_>>(), vec!["b", "a", "c"]);

        let by_pop = merge(&zones(), &tables, &["region"], &["pop"]).unwrap();
        assert_eq!(by_pop.ids().collect::<Vec<_>>(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sort_keeps_geometry_with_row() {
        let mut shifted = zones().iter().cloned().collect::<Vec<_>>();
        shifted[1].geometry = MultiPolygon::new(vec![]);
        let zones = ZoneSet::new(shifted).unwrap();

        let merged = merge(&zones, &[table("pop", vec![3, 1, 2])], &[] as &[&str], &["pop"]).unwrap();
        assert_eq!(merged.rows()[0].id, "b");
        assert!(merged.rows()[0].geometry.0.is_empty());
    }

    #[test]
    fn test_row_count_mismatch() {
        let tables = vec![table("ok", vec![1, 2, 3]), table("short", vec![1, 2])];
        match merge(&zones(), &tables, &[] as &[&str], &[]) {
            Err(ZonalError::RowCountMismatch { table, expected, actual }) => {
                assert_eq!((table, expected, actual), (1, 3, 2));
            }
            other => panic!("Expected RowCountMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_column_collision() {
        let tables = vec![table("wp_a_sum", vec![1, 2, 3]), table("wp_a_sum", vec![1, 2, 3])];
        assert!(matches!(
            merge(&zones(), &tables, &[] as &[&str], &[]),
            Err(ZonalError::DuplicateColumn(name)) if name == "wp_a_sum"
        ));

        let clash = vec![table("region", vec![1, 2, 3])];
        assert!(matches!(
            merge(&zones(), &clash, &["region"], &[]),
            Err(ZonalError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn test_unknown_attribute_and_sort_column() {
        assert!(matches!(
            merge(&zones(), &[], &["population"], &[]),
            Err(ZonalError::UnknownAttribute(name)) if name == "population"
        ));
        assert!(matches!(
            merge(&zones(), &[], &["region"], &["missing"]),
            Err(ZonalError::UnknownColumn(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_partially_missing_attribute_is_null() {
        let set = ZoneSet::new(vec![
            zone("a", "south").with_attribute("code", 1i64),
            zone("b", "north"),
        ])
        .unwrap();
        let merged = merge(&set, &[], &["code"], &["code"]).unwrap();
        assert_eq!(merged.ids().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(merged.column("code").unwrap(), vec![&Value::Null, &Value::Integer(1)]);
    }
}
