//! CSV / TSV loader

use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{CellValue, Column, Table};

use super::{parse_temporal, Parser};

/// Parser for delimited text files
///
/// The delimiter follows the extension (`.tsv` is tab separated) unless set
/// explicitly.
#[derive(Debug, Clone, Default)]
pub struct CsvParser {
    delimiter: Option<u8>,
}

impl CsvParser {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter: Some(delimiter),
        }
    }

    fn delimiter_for(&self, path: &Path) -> u8 {
        self.delimiter.unwrap_or_else(|| {
            let is_tsv = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
            if is_tsv {
                b'\t'
            } else {
                b','
            }
        })
    }
}

impl Parser for CsvParser {
    fn parse(&self, path: &Path) -> Result<Table> {
        let file =
            File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter_for(path))
            .from_reader(BufReader::new(file));

        let headers = csv_reader
            .headers()
            .with_context(|| format!("Failed to read headers of {}", path.display()))?
            .clone();

        let columns: Vec<Column> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| Column::new(name.trim(), i))
            .collect();
        let mut table = Table::new(columns);

        for (n, record) in csv_reader.records().enumerate() {
            // +2: 1-based lines and the header row
            let line = n + 2;
            let record = record.with_context(|| format!("Failed to read CSV row {}", line))?;

            let mut cells: Vec<CellValue> = record.iter().map(parse_cell_value).collect();
            cells.resize(table.column_count(), CellValue::Null);
            table.add_row(cells, line);
        }

        table.infer_column_types();
        Ok(table)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "csv" | "tsv" | "txt")
    }
}

/// Parse a field with type inference. Type detection ignores surrounding
/// whitespace, but strings keep it.
fn parse_cell_value(s: &str) -> CellValue {
    let trimmed = s.trim();

    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed == "NA"
        || trimmed == "NaN"
    {
        return CellValue::Null;
    }

    if trimmed.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return CellValue::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return CellValue::Float(f);
    }

    parse_temporal(trimmed).unwrap_or_else(|| CellValue::String(Cow::Owned(s.to_string())))
}
