//! Table writers.

use crate::{input::Attributes, SamplerError, Table};
use geojson::JsonValue;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
};

/// Writes `table` as CSV with columns `id,x,y`, every attribute name
/// seen in any row (sorted), then the sampled columns.
///
/// Missing cells are left empty.
pub fn write_csv<W: Write>(table: &Table<'_, Attributes>, wtr: W) -> Result<(), SamplerError> {
    let attribute_names = attribute_names(table);
    let mut wtr = csv::Writer::from_writer(wtr);

    let header = ["id", "x", "y"]
        .into_iter()
        .chain(attribute_names.iter().map(String::as_str))
        .chain(table.columns.iter().map(|c| c.name.as_str()));
    wtr.write_record(header)?;

    for row in &table.rows {
        let point = row.point;
        let mut record = vec![
            point.id().0.to_string(),
            point.coord().x.to_string(),
            point.coord().y.to_string(),
        ];
        record.extend(
            attribute_names
                .iter()
                .map(|name| point.attributes().get(name).map_or_else(String::new, cell)),
        );
        record.extend(
            row.values
                .iter()
                .map(|v| v.map_or_else(String::new, |v| v.to_string())),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `table` as a JSON array with one object per row.
///
/// Attributes and sampled columns share the object; a sampled column
/// wins if names collide. Missing cells and NaNs are `null`.
pub fn write_json<W: Write>(table: &Table<'_, Attributes>, mut wtr: W) -> Result<(), SamplerError> {
    #[derive(Serialize)]
    struct JsonRow<'a> {
        id: u64,
        x: f64,
        y: f64,
        #[serde(flatten)]
        fields: BTreeMap<&'a str, JsonValue>,
    }

    let rows: Vec<JsonRow<'_>> = table
        .rows
        .iter()
        .map(|row| {
            let mut fields: BTreeMap<&str, JsonValue> = row
                .point
                .attributes()
                .iter()
                .map(|(k, v)| (k.as_str(), v.clone()))
                .collect();
            for (column, value) in table.columns.iter().zip(&row.values) {
                let value = value
                    .and_then(serde_json::Number::from_f64)
                    .map_or(JsonValue::Null, JsonValue::Number);
                fields.insert(column.name.as_str(), value);
            }
            JsonRow {
                id: row.point.id().0,
                x: row.point.coord().x,
                y: row.point.coord().y,
                fields,
            }
        })
        .collect();
    serde_json::to_writer(&mut wtr, &rows)?;
    wtr.flush()?;
    Ok(())
}

fn attribute_names(table: &Table<'_, Attributes>) -> BTreeSet<String> {
    table
        .rows
        .iter()
        .flat_map(|row| row.point.attributes().keys().cloned())
        .collect()
}

fn cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
