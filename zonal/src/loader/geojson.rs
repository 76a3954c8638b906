//! Lecteur de limites GeoJSON (FeatureCollection de polygones)

use std::collections::HashMap;
use std::path::Path;

use geo::MultiPolygon;
use geojson::feature::Id;
use geojson::{Feature, GeoJson};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::types::{Value, Zone, ZoneSet};
use crate::ZonalError;

/// Lit un fichier GeoJSON en `ZoneSet`, dans l'ordre des features
///
/// L'identifiant de zone est la propriété `id_field` si elle est fournie,
/// sinon l'`id` de la feature, sinon son rang dans la collection.
pub fn read_zones(path: &Path, id_field: Option<&str>) -> Result<ZoneSet, ZonalError> {
    if !path.is_file() {
        return Err(ZonalError::SourceNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let zones = parse(&content, id_field, &path.display().to_string())?;

    debug!(path = %path.display(), zones = zones.len(), "Loaded boundaries");
    Ok(zones)
}

/// Parse un document GeoJSON ; `label` identifie la source dans les erreurs
pub fn parse(content: &str, id_field: Option<&str>, label: &str) -> Result<ZoneSet, ZonalError> {
    let geojson: GeoJson = content
        .parse()
        .map_err(|e: geojson::Error| ZonalError::invalid_boundaries(label, e.to_string()))?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err(ZonalError::invalid_boundaries(
                label,
                "expected a FeatureCollection, got a bare geometry",
            ))
        }
    };

    let zones = features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| feature_to_zone(index, feature, id_field, label))
        .collect::<Result<Vec<_>, _>>()?;

    ZoneSet::new(zones)
}

fn feature_to_zone(
    index: usize,
    feature: Feature,
    id_field: Option<&str>,
    label: &str,
) -> Result<Zone, ZonalError> {
    let attributes: HashMap<String, Value> = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, json_to_value(v)))
        .collect();

    let id = match id_field {
        Some(field) => match attributes.get(field) {
            Some(value) if !value.is_null() => value.to_string(),
            _ => {
                return Err(ZonalError::invalid_boundaries(
                    label,
                    format!("feature #{} has no '{}' property", index, field),
                ))
            }
        },
        None => match feature.id {
            Some(Id::String(s)) => s,
            Some(Id::Number(n)) => n.to_string(),
            None => index.to_string(),
        },
    };

    let geometry = match feature.geometry {
        None => {
            warn!(zone = %id, "Feature without geometry, its sums will be 0");
            MultiPolygon::new(vec![])
        }
        Some(geometry) => to_multipolygon(geometry.value, &id)?,
    };

    Ok(Zone {
        id,
        geometry,
        attributes,
    })
}

fn to_multipolygon(value: geojson::Value, zone: &str) -> Result<MultiPolygon<f64>, ZonalError> {
    let converted = match value {
        geojson::Value::Polygon(_) => geo::Polygon::<f64>::try_from(value).map(MultiPolygon::from),
        geojson::Value::MultiPolygon(_) => MultiPolygon::<f64>::try_from(value),
        other => {
            return Err(ZonalError::invalid_geometry(
                zone,
                format!("expected Polygon or MultiPolygon, got {}", geometry_type(&other)),
            ))
        }
    };

    converted.map_err(|e| ZonalError::invalid_geometry(zone, e.to_string()))
}

fn geometry_type(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Convertit une propriété JSON en valeur d'attribut
fn json_to_value(value: JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Text(b.to_string()),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        JsonValue::String(s) => Value::Text(s),
        other => Value::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "z1",
                "properties": { "name": "Nord", "code": 12, "area": 1.5, "note": null },
                "geometry": { "type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]] }
            },
            {
                "type": "Feature",
                "properties": { "name": "Sud", "code": 13 },
                "geometry": { "type": "MultiPolygon", "coordinates": [
                    [[[0,-2],[1,-2],[1,-1],[0,-1],[0,-2]]],
                    [[[3,-2],[4,-2],[4,-1],[3,-1],[3,-2]]]
                ] }
            },
            {
                "type": "Feature",
                "properties": { "name": "Vide", "code": 14 },
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn test_parse_collection() {
        let zones = parse(COLLECTION, None, "test").unwrap();
        assert_eq!(zones.len(), 3);

        let first = zones.get(0).unwrap();
        assert_eq!(first.id, "z1");
        assert_eq!(first.geometry.0.len(), 1);
        assert_eq!(first.attribute("name"), Some(&Value::from("Nord")));
        assert_eq!(first.attribute("code"), Some(&Value::Integer(12)));
        assert_eq!(first.attribute("area"), Some(&Value::Float(1.5)));
        assert_eq!(first.attribute("note"), Some(&Value::Null));

        let second = zones.get(1).unwrap();
        assert_eq!(second.id, "1");
        assert_eq!(second.geometry.0.len(), 2);

        assert!(zones.get(2).unwrap().geometry.0.is_empty());
    }

    #[test]
    fn test_parse_with_id_field() {
        let zones = parse(COLLECTION, Some("code"), "test").unwrap();
        let ids: Vec<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["12", "13", "14"]);
    }

    #[test]
    fn test_missing_id_field() {
        let result = parse(COLLECTION, Some("gid"), "test");
        assert!(matches!(result, Err(ZonalError::InvalidBoundaries { .. })));
    }

    #[test]
    fn test_rejects_points() {
        let doc = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1,2]}}
        ]}"#;
        match parse(doc, None, "pts") {
            Err(ZonalError::InvalidGeometry { zone, reason }) => {
                assert_eq!(zone, "0");
                assert!(reason.contains("Point"));
            }
            other => panic!("Expected InvalidGeometry, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse("{ not json", None, "broken"),
            Err(ZonalError::InvalidBoundaries { .. })
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_zones(Path::new("nonexistent.geojson"), None);
        assert!(matches!(result, Err(ZonalError::SourceNotFound(_))));
    }
}
