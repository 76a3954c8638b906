//! Types de données pour le crate zonal

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use geo::MultiPolygon;

use crate::ZonalError;

/// Valeur scalaire d'un attribut ou d'une cellule de table
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Ordre de tri : `Null` < nombres < texte, nombres comparés numériquement
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Text(_), _) => Ordering::Greater,
            (_, Value::Text(_)) => Ordering::Less,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(a), Value::Float(b)) => cmp_integer_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) => cmp_integer_float(*b, *a).reverse(),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Comparaison exacte, sans passer l'entier en `f64` (perte au-delà de 2^53)
fn cmp_integer_float(i: i64, f: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }

    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&f).unwrap_or(Ordering::Equal),
        other => other,
    }
}

/// Rendu indépendant de la locale (point décimal, pas de séparateur de milliers)
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

/// Une zone (polygone de limite administrative) avec ses attributs
#[derive(Debug, Clone)]
pub struct Zone {
    /// Identifiant unique dans son `ZoneSet`
    pub id: String,

    /// Géométrie ; un polygone simple est un multipolygone à une partie
    pub geometry: MultiPolygon<f64>,

    /// Attributs transmis tels quels jusqu'à la table finale
    pub attributes: HashMap<String, Value>,
}

impl Zone {
    pub fn new(id: impl Into<String>, geometry: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            id: id.into(),
            geometry: geometry.into(),
            attributes: HashMap::new(),
        }
    }

    /// Ajoute un attribut (builder)
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Ensemble ordonné de zones ; l'ordre d'insertion est l'ordre des lignes
#[derive(Debug, Clone, Default)]
pub struct ZoneSet {
    zones: Vec<Zone>,
}

impl ZoneSet {
    /// Construit l'ensemble en vérifiant l'unicité des identifiants
    pub fn new(zones: Vec<Zone>) -> Result<Self, ZonalError> {
        let mut seen = HashSet::with_capacity(zones.len());
        for zone in &zones {
            if !seen.insert(zone.id.as_str()) {
                return Err(ZonalError::DuplicateZoneId(zone.id.clone()));
            }
        }
        Ok(Self { zones })
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Zone> {
        self.zones.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }

    /// Vrai si au moins une zone porte cet attribut
    pub fn has_attribute(&self, name: &str) -> bool {
        self.zones.iter().any(|z| z.attributes.contains_key(name))
    }
}

impl<'a> IntoIterator for &'a ZoneSet {
    type Item = &'a Zone;
    type IntoIter = std::slice::Iter<'a, Zone>;

    fn into_iter(self) -> Self::IntoIter {
        self.zones.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(id: &str) -> Zone {
        Zone::new(
            id,
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)],
        )
    }

    #[test]
    fn test_zoneset_rejects_duplicate_ids() {
        let result = ZoneSet::new(vec![square("a"), square("b"), square("a")]);
        match result {
            Err(ZonalError::DuplicateZoneId(id)) => assert_eq!(id, "a"),
            other => panic!("Expected DuplicateZoneId, got {:?}", other),
        }
    }

    #[test]
    fn test_zoneset_keeps_order() {
        let set = ZoneSet::new(vec![square("c"), square("a"), square("b")]).unwrap();
        let ids: Vec<&str> = set.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_value_sort_order() {
        let mut values = vec![
            Value::from("b"),
            Value::Float(2.5),
            Value::Null,
            Value::Integer(3),
            Value::from("a"),
            Value::Integer(-1),
        ];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Integer(-1),
                Value::Float(2.5),
                Value::Integer(3),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn test_value_sort_integer_float_exact() {
        let big = 1i64 << 53;
        assert_eq!(
            Value::Integer(big + 1).sort_cmp(&Value::Float(big as f64)),
            Ordering::Greater
        );
        assert_eq!(
            Value::Float(big as f64).sort_cmp(&Value::Integer(big + 1)),
            Ordering::Less
        );
        assert_eq!(Value::Integer(2).sort_cmp(&Value::Float(2.0)), Ordering::Equal);
        assert_eq!(Value::Integer(2).sort_cmp(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Integer(-2).sort_cmp(&Value::Float(-2.5)), Ordering::Greater);
        assert_eq!(
            Value::Integer(i64::MAX).sort_cmp(&Value::Float(9.3e18)),
            Ordering::Less
        );
        assert_eq!(
            Value::Integer(i64::MIN).sort_cmp(&Value::Float(-1e19)),
            Ordering::Greater
        );
        assert_eq!(
            Value::Integer(i64::MAX).sort_cmp(&Value::Float(f64::NAN)),
            Ordering::Less
        );
    }

    #[test]
    fn test_value_display_is_plain() {
        assert_eq!(Value::Integer(1234567).to_string(), "1234567");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from("Île-de-France").to_string(), "Île-de-France");
    }
}
