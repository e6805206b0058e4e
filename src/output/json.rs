//! JSON output format

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use termcolor::WriteColor;

use crate::diff::{
    DiffResult, DiffStats, DiffTable, Metadata, LEFT_MISSING_COLUMNS, RIGHT_MISSING_COLUMNS,
    ROWS_PRESENT_COLUMN,
};

use super::OutputFormatter;

/// JSON output formatter
#[derive(Debug, Clone)]
pub struct JsonOutput {
    pretty: bool,
    stats_only: bool,
}

impl JsonOutput {
    pub fn new() -> Self {
        Self {
            pretty: true,
            stats_only: false,
        }
    }

    pub fn compact() -> Self {
        Self {
            pretty: false,
            ..Self::new()
        }
    }

    /// Leave out records and metadata
    pub fn with_stats_only(mut self, stats_only: bool) -> Self {
        self.stats_only = stats_only;
        self
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct JsonDiffOutput<'a> {
    left_file: String,
    right_file: String,
    identical: bool,
    stats: &'a DiffStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_columns: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    records: Option<Vec<IndexMap<String, Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Metadata>,
}

/// One object per diff row, keyed by the flattened column names
fn records(table: &DiffTable) -> Result<Vec<IndexMap<String, Value>>> {
    let mut records = Vec::with_capacity(table.row_count());

    for i in 0..table.row_count() {
        let mut record = IndexMap::new();
        for (name, value) in table.key_columns.iter().zip(table.keys[i].values()) {
            record.insert(name.clone(), serde_json::to_value(value)?);
        }
        for column in &table.columns {
            record.insert(
                column.spec.left_column.clone(),
                serde_json::to_value(&column.left[i])?,
            );
            record.insert(
                column.spec.right_column.clone(),
                serde_json::to_value(&column.right[i])?,
            );
            record.insert(
                column.spec.diff_column.clone(),
                serde_json::to_value(&column.diff[i])?,
            );
        }
        if !table.left_missing_columns.is_empty() {
            record.insert(
                LEFT_MISSING_COLUMNS.to_string(),
                serde_json::to_value(&table.left_missing_columns)?,
            );
        }
        if !table.right_missing_columns.is_empty() {
            record.insert(
                RIGHT_MISSING_COLUMNS.to_string(),
                serde_json::to_value(&table.right_missing_columns)?,
            );
        }
        record.insert(
            ROWS_PRESENT_COLUMN.to_string(),
            serde_json::to_value(table.presence[i])?,
        );
        records.push(record);
    }

    Ok(records)
}

impl OutputFormatter for JsonOutput {
    fn render(
        &self,
        diff: &DiffResult,
        left_path: &Path,
        right_path: &Path,
        writer: &mut dyn WriteColor,
    ) -> Result<()> {
        let detail = if self.stats_only { None } else { diff.table.as_ref() };

        let output = JsonDiffOutput {
            left_file: left_path.display().to_string(),
            right_file: right_path.display().to_string(),
            identical: diff.is_identical(),
            stats: &diff.stats,
            key_columns: detail.map(|t| t.key_columns.as_slice()),
            records: detail.map(records).transpose()?,
            metadata: (!self.stats_only).then_some(&diff.metadata),
        };

        if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, &output)?;
        } else {
            serde_json::to_writer(&mut *writer, &output)?;
        }
        writeln!(writer)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::diff::compute_diff;
    use crate::model::{CellValue, Table};
    use termcolor::Buffer;

    fn render(diff: &DiffResult, output: JsonOutput) -> Value {
        let mut buffer = Buffer::no_color();
        output
            .render(diff, Path::new("l.json"), Path::new("r.json"), &mut buffer)
            .unwrap();
        serde_json::from_slice(buffer.as_slice()).unwrap()
    }

    fn sample() -> DiffResult {
        let left = Table::from_records(
            ["k", "v"],
            vec![
                vec![CellValue::Int(1), CellValue::Int(10)],
                vec![CellValue::Int(2), CellValue::Int(20)],
            ],
        );
        let right = Table::from_records(
            ["k", "v"],
            vec![
                vec![CellValue::Int(1), CellValue::Int(10)],
                vec![CellValue::Int(2), CellValue::Int(21)],
                vec![CellValue::Int(3), CellValue::Int(5)],
            ],
        );
        compute_diff(&left, &right, &Config::new(vec!["k".into()])).unwrap()
    }

    #[test]
    fn test_records() {
        let json = render(&sample(), JsonOutput::compact());

        assert_eq!(json["identical"], false);
        assert_eq!(json["stats"]["rows_right_only"], 1);
        let records = json["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["k"], 2);
        assert_eq!(records[0]["v_diff"], -1);
        assert_eq!(records[0]["rows_present"], "both");
        assert_eq!(records[1]["v_left"], Value::Null);
        assert_eq!(records[1]["v_diff"], "changed:row");
        assert_eq!(json["metadata"]["v"]["diff_count"], 2);
        assert_eq!(json["metadata"]["v"]["column_present"], "both");
    }

    #[test]
    fn test_stats_only() {
        let json = render(&sample(), JsonOutput::new().with_stats_only(true));
        assert!(json.get("records").is_none());
        assert!(json.get("metadata").is_none());
        assert_eq!(json["stats"]["rows_modified"], 1);
    }

    #[test]
    fn test_identical() {
        let json = render(&DiffResult::default(), JsonOutput::new());
        assert_eq!(json["identical"], true);
        assert!(json.get("records").is_none());
    }
}
