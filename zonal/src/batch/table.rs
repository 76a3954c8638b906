//! Table de résultats d'un lot (une colonne par source raster)

use crate::types::Value;
use crate::ZonalError;

/// Valeurs d'une colonne : entières après arrondi, flottantes sinon
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Integer(Vec<i64>),
    Float(Vec<f64>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Integer(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, row: usize) -> Option<Value> {
        match self {
            ColumnValues::Integer(v) => v.get(row).map(|x| Value::Integer(*x)),
            ColumnValues::Float(v) => v.get(row).map(|x| Value::Float(*x)),
        }
    }
}

/// Une colonne nommée
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

/// Colonnes d'un lot, toutes de la même longueur (une ligne par zone)
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTable {
    row_count: usize,
    columns: Vec<Column>,
}

impl BatchTable {
    pub fn new(row_count: usize) -> Self {
        Self {
            row_count,
            columns: Vec::new(),
        }
    }

    /// Ajoute une colonne en fin de table
    pub fn push(&mut self, column: Column) -> Result<(), ZonalError> {
        if column.values.len() != self.row_count {
            return Err(ZonalError::ColumnLength {
                expected: self.row_count,
                actual: column.values.len(),
                column: column.name,
            });
        }
        if self.column(&column.name).is_some() {
            return Err(ZonalError::DuplicateColumn(column.name));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}
