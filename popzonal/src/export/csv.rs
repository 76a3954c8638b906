//! Export CSV de la table finale

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use zonal::{FinalTable, Value};

use super::StagedWrites;

/// Écrit la table : en-tête puis une ligne par zone
///
/// Séparateur `,`, guillemets uniquement si nécessaire, `Null` en champ vide.
pub fn write_table(table: &FinalTable, path: &Path) -> Result<()> {
    let mut staged = StagedWrites::new();
    stage_table(table, path, &mut staged)?;
    staged.commit()?;

    info!(path = %path.display(), rows = table.len(), "CSV table written");
    Ok(())
}

/// Prépare l'écriture ; le fichier n'est publié qu'au `commit`
pub fn stage_table(table: &FinalTable, path: &Path, staged: &mut StagedWrites) -> Result<()> {
    staged
        .stage(path, |writer| write_rows(writer, table))
        .with_context(|| format!("Failed to export CSV {}", path.display()))
}

fn write_rows<W: Write>(writer: &mut W, table: &FinalTable) -> Result<()> {
    write_record(writer, table.column_names().iter().map(|c| Cow::Borrowed(c.as_str())))?;

    for row in table.rows() {
        write_record(writer, row.values.iter().map(format_value))?;
    }
    Ok(())
}

fn write_record<'a, W, I>(writer: &mut W, fields: I) -> Result<()>
where
    W: Write,
    I: Iterator<Item = Cow<'a, str>>,
{
    for (i, field) in fields.enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        writer.write_all(quote(&field).as_bytes())?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

fn format_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::Text(s) => Cow::Borrowed(s.as_str()),
        Value::Float(v) if !v.is_finite() => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

/// Guillemets RFC 4180 si le champ contient un séparateur, un guillemet ou un saut de ligne
fn quote(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("Saint-Denis, Réunion"), "\"Saint-Denis, Réunion\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::Null), "");
        assert_eq!(format_value(&Value::Integer(-42)), "-42");
        assert_eq!(format_value(&Value::Float(1234.5)), "1234.5");
        assert_eq!(format_value(&Value::Float(f64::NAN)), "");
        assert_eq!(format_value(&Value::from("x")), "x");
    }

    #[test]
    fn test_write_record() {
        let mut buffer = Vec::new();
        let fields = ["a", "b,c", ""].into_iter().map(Cow::Borrowed);
        write_record(&mut buffer, fields).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "a,\"b,c\",\n");
    }
}
