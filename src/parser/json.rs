//! JSON records loader

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::model::{CellValue, Column, Table};

use super::{parse_temporal, Parser};

/// Parser for JSON files holding an array of records, a single record, or
/// one record per line (`.jsonl` / `.ndjson`)
pub struct JsonParser;

impl JsonParser {
    fn read_records(path: &Path) -> Result<Vec<Value>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to open JSON file: {}", path.display()))?;

        let line_delimited = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_lowercase().as_str(), "jsonl" | "ndjson"));

        if line_delimited {
            return text
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(n, line)| {
                    serde_json::from_str(line)
                        .with_context(|| format!("Invalid JSON on line {}", n + 1))
                })
                .collect();
        }

        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON file: {}", path.display()))?;
        match value {
            Value::Array(records) => Ok(records),
            Value::Object(_) => Ok(vec![value]),
            _ => bail!("JSON must be an array of objects or an object"),
        }
    }
}

impl Parser for JsonParser {
    fn parse(&self, path: &Path) -> Result<Table> {
        let records = Self::read_records(path)?;

        let objects: Vec<&Map<String, Value>> = records
            .iter()
            .enumerate()
            .map(|(n, record)| match record {
                Value::Object(obj) => Ok(obj),
                _ => bail!("record {} is not a JSON object", n + 1),
            })
            .collect::<Result<_>>()?;

        // Column order is first appearance across records
        let mut names: IndexSet<&str> = IndexSet::new();
        for obj in &objects {
            names.extend(obj.keys().map(String::as_str));
        }

        let columns: Vec<Column> = names
            .iter()
            .enumerate()
            .map(|(i, name)| Column::new(*name, i))
            .collect();
        let mut table = Table::new(columns);

        for (n, obj) in objects.iter().enumerate() {
            let cells = names.iter().map(|name| json_to_cell(obj.get(*name))).collect();
            table.add_row(cells, n + 1);
        }

        table.infer_column_types();
        Ok(table)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "json" | "jsonl" | "ndjson")
    }
}

fn json_to_cell(value: Option<&Value>) -> CellValue {
    match value {
        None | Some(Value::Null) => CellValue::Null,
        Some(Value::Bool(b)) => CellValue::Bool(*b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => CellValue::Int(i),
            None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Null),
        },
        Some(Value::String(s)) => {
            parse_temporal(s).unwrap_or_else(|| CellValue::String(Cow::Owned(s.clone())))
        }
        // Nested values compare by their JSON text
        Some(nested) => CellValue::String(Cow::Owned(nested.to_string())),
    }
}
