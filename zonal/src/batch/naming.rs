//! Politique de nommage des colonnes d'un lot

use std::collections::HashSet;

use crate::ZonalError;

/// Statistique calculée (suffixe des noms de colonnes)
pub const STATISTIC: &str = "sum";

/// Nom du total, après le préfixe global
pub const TOTAL_SUFFIX: &str = "sum_total";

/// Construction des noms de colonnes d'un lot
///
/// Préfixe de source = `préfixe global + label + "_"`, colonne = préfixe de
/// source + `sum` (`wp_` + `ppp_2020` → `wp_ppp_2020_sum`). Le label est
/// celui fourni explicitement, sinon le nom court de la source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnNaming {
    global_prefix: String,
    labels: Option<Vec<String>>,
}

/// Noms validés pour un lot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    /// Une colonne par source, dans l'ordre des sources
    pub sources: Vec<String>,
    /// Colonne de total, si demandée
    pub total: Option<String>,
}

impl ColumnNaming {
    pub fn new(global_prefix: impl Into<String>) -> Self {
        Self {
            global_prefix: global_prefix.into(),
            labels: None,
        }
    }

    /// Labels explicites, un par source
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn global_prefix(&self) -> &str {
        &self.global_prefix
    }

    pub fn total_column(&self) -> String {
        format!("{}{}", self.global_prefix, TOTAL_SUFFIX)
    }

    /// Valide et construit les noms pour les sources données
    pub fn resolve<S: AsRef<str>>(
        &self,
        source_names: &[S],
        add_total: bool,
    ) -> Result<ColumnNames, ZonalError> {
        if let Some(labels) = &self.labels {
            if labels.len() != source_names.len() {
                return Err(ZonalError::LabelCountMismatch {
                    expected: source_names.len(),
                    actual: labels.len(),
                });
            }
        }

        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(source_names.len());

        for (index, name) in source_names.iter().enumerate() {
            let label = match &self.labels {
                Some(labels) => labels[index].trim(),
                None => name.as_ref().trim(),
            };
            if label.is_empty() {
                return Err(ZonalError::EmptyLabel(index));
            }

            let column = format!("{}{}_{}", self.global_prefix, label, STATISTIC);
            if !seen.insert(column.clone()) {
                return Err(ZonalError::DuplicateColumn(column));
            }
            sources.push(column);
        }

        let total = if add_total {
            let column = self.total_column();
            if !seen.insert(column.clone()) {
                return Err(ZonalError::DuplicateColumn(column));
            }
            Some(column)
        } else {
            None
        };

        Ok(ColumnNames { sources, total })
    }
}
