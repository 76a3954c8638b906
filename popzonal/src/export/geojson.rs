//! Export GeoJSON de la table finale avec geozero (géométries des zones conservées)

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use tracing::info;

use zonal::merge::Row;
use zonal::{FinalTable, Value};

use super::StagedWrites;

/// Écrit une FeatureCollection, une feature par ligne, dans l'ordre de la table
pub fn write_table(table: &FinalTable, path: &Path) -> Result<()> {
    let mut staged = StagedWrites::new();
    stage_table(table, path, &mut staged)?;
    staged.commit()?;

    info!(path = %path.display(), features = table.len(), "GeoJSON table written");
    Ok(())
}

/// Prépare l'écriture ; le fichier n'est publié qu'au `commit`
pub fn stage_table(table: &FinalTable, path: &Path, staged: &mut StagedWrites) -> Result<()> {
    staged
        .stage(path, |writer| write_collection(writer, table))
        .with_context(|| format!("Failed to export GeoJSON {}", path.display()))
}

fn write_collection<W: Write>(writer: &mut W, table: &FinalTable) -> Result<()> {
    write!(writer, r#"{{"type":"FeatureCollection","features":["#)?;

    for (i, row) in table.rows().iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, table.column_names(), row)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

/// Écrit une feature en GeoJSON
fn write_feature<W: Write>(writer: &mut W, columns: &[String], row: &Row) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","id":"{}","#, escape_json(&row.id))?;

    // Zone sans géométrie : null
    write!(writer, r#""geometry":"#)?;
    if row.geometry.0.is_empty() {
        write!(writer, "null")?;
    } else {
        let mut geom_buf = Vec::new();
        let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
        Geometry::MultiPolygon(row.geometry.clone()).process_geom(&mut geom_writer)?;
        writer.write_all(&geom_buf)?;
    }

    write!(writer, r#","properties":{{"#)?;
    for (i, (name, value)) in columns.iter().zip(&row.values).enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write!(writer, r#""{}":"#, escape_json(name))?;
        write_value(writer, value)?;
    }
    write!(writer, "}}}}")?;

    Ok(())
}

fn write_value<W: Write>(writer: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Null => write!(writer, "null")?,
        Value::Integer(v) => write!(writer, "{}", v)?,
        Value::Float(v) if v.is_finite() => write!(writer, "{}", v)?,
        Value::Float(_) => write!(writer, "null")?,
        Value::Text(s) => write!(writer, r#""{}""#, escape_json(s))?,
    }
    Ok(())
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}
