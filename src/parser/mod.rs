//! Loaders that turn data files into tables

mod csv;
mod json;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Result};
use chrono::{NaiveDate, NaiveDateTime};

use crate::model::{CellValue, Table};

pub use self::csv::CsvParser;
pub use self::json::JsonParser;

/// Trait for parsing tabular data files
pub trait Parser: Send + Sync {
    /// Parse a file and return a Table with inferred column types
    fn parse(&self, path: &Path) -> Result<Table>;

    /// Check if this parser can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool;
}

/// Factory for creating parsers based on file extension
pub struct ParserFactory {
    parsers: Vec<Box<dyn Parser>>,
}

impl Default for ParserFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserFactory {
    pub fn new() -> Self {
        Self {
            parsers: vec![Box::new(CsvParser::default()), Box::new(JsonParser)],
        }
    }

    /// Get a parser for the given file path, sniffing content when the
    /// extension is missing
    pub fn get_parser(&self, path: &Path) -> Result<&dyn Parser> {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => detect_format(path).unwrap_or("csv").to_string(),
        };

        match self.parsers.iter().find(|p| p.supports_extension(&ext)) {
            Some(parser) => Ok(parser.as_ref()),
            None => bail!("Unsupported file format: {}", ext),
        }
    }

    /// Parse a file using the appropriate parser
    pub fn parse(&self, path: &Path) -> Result<Table> {
        self.get_parser(path)?.parse(path)
    }
}

/// Guess the format of a file without an extension from its first line
pub fn detect_format(path: &Path) -> Option<&'static str> {
    let file = File::open(path).ok()?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line).ok()?;

    let trimmed = line.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        Some("json")
    } else {
        Some("csv")
    }
}

/// ISO dates and datetimes, with or without the `T` separator
pub(crate) fn parse_temporal(s: &str) -> Option<CellValue> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(CellValue::Date(date));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(CellValue::DateTime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_temporal() {
        assert_eq!(
            parse_temporal("2015-07-06"),
            Some(CellValue::Date(NaiveDate::from_ymd_opt(2015, 7, 6).unwrap()))
        );
        assert!(matches!(
            parse_temporal("2015-07-03 06:32:00"),
            Some(CellValue::DateTime(_))
        ));
        assert!(matches!(
            parse_temporal("2015-07-03T06:32:00.250"),
            Some(CellValue::DateTime(_))
        ));
        assert_eq!(parse_temporal("July 6th"), None);
    }

    #[test]
    fn test_factory_by_extension() {
        let factory = ParserFactory::new();
        assert!(factory.get_parser(Path::new("a.csv")).is_ok());
        assert!(factory.get_parser(Path::new("a.TSV")).is_ok());
        assert!(factory.get_parser(Path::new("a.json")).is_ok());
        assert!(factory.get_parser(Path::new("a.xlsx")).is_err());
    }

    #[test]
    fn test_detect_json_without_extension() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[{{\"k\": 1}}]").unwrap();
        assert_eq!(detect_format(file.path()), Some("json"));

        let table = ParserFactory::new().parse(file.path()).unwrap();
        assert_eq!(table.row_count(), 1);
    }
}
