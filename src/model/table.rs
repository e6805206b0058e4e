//! Table, Row, and Cell data structures

use std::borrow::Cow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::schema::{CellType, Column};

static NULL_CELL: CellValue = CellValue::Null;

/// A cell value with type information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Cow<'static, str>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::Int(a), CellValue::Int(b)) => a == b,
            (CellValue::Float(a), CellValue::Float(b)) => {
                // Handle NaN comparison
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (CellValue::String(a), CellValue::String(b)) => a == b,
            (CellValue::Date(a), CellValue::Date(b)) => a == b,
            (CellValue::DateTime(a), CellValue::DateTime(b)) => a == b,
            // Cross-type numeric comparison
            (CellValue::Int(a), CellValue::Float(b)) => cmp_int_float(*a, *b) == Ordering::Equal,
            (CellValue::Float(a), CellValue::Int(b)) => cmp_int_float(*b, *a) == Ordering::Equal,
            // NaN and Null are both missing
            (CellValue::Null, CellValue::Float(f)) | (CellValue::Float(f), CellValue::Null) => {
                f.is_nan()
            }
            _ => false,
        }
    }
}

impl CellValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Null or NaN
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Convert to a display string
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            CellValue::Null => Cow::Borrowed("NULL"),
            CellValue::Bool(b) => Cow::Owned(b.to_string()),
            CellValue::Int(i) => Cow::Owned(i.to_string()),
            CellValue::Float(f) => Cow::Owned(f.to_string()),
            CellValue::String(s) => Cow::Borrowed(s.as_ref()),
            CellValue::Date(d) => Cow::Owned(d.to_string()),
            CellValue::DateTime(dt) => Cow::Owned(dt.to_string()),
        }
    }

    /// Numeric view of Int/Float cells. Missing values yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Lenient numeric coercion used for object columns.
    ///
    /// Strings are parsed after trimming, booleans map to 1/0. Nulls and
    /// temporal values never coerce.
    pub fn coerce_f64(&self) -> Option<f64> {
        match self {
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => self.as_f64(),
        }
    }

    /// Temporal view; dates are promoted to midnight.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(d) => d.and_hms_opt(0, 0, 0),
            CellValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            CellValue::Null => 0,
            CellValue::Float(f) if f.is_nan() => 0,
            CellValue::Bool(_) => 1,
            CellValue::Int(_) | CellValue::Float(_) => 2,
            CellValue::Date(_) | CellValue::DateTime(_) => 3,
            CellValue::String(_) => 4,
        }
    }

    /// Total order over cells, used to sort keys.
    ///
    /// Missing < Bool < numbers < temporal < strings. Ints and floats
    /// compare by value.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal || self.type_rank() == 0 {
            return rank;
        }

        match (self, other) {
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::Int(a), CellValue::Int(b)) => a.cmp(b),
            (CellValue::Float(a), CellValue::Float(b)) => {
                unsigned_zero(*a).total_cmp(&unsigned_zero(*b))
            }
            (CellValue::Int(a), CellValue::Float(b)) => cmp_int_float(*a, *b),
            (CellValue::Float(a), CellValue::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (CellValue::String(a), CellValue::String(b)) => a.cmp(b),
            (a, b) if a.type_rank() == 3 => a.as_datetime().cmp(&b.as_datetime()),
            _ => Ordering::Equal,
        }
    }

    /// Hash consistent with [`CellValue::total_cmp`] equality.
    pub(crate) fn hash_ordered<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            CellValue::Bool(b) => b.hash(state),
            CellValue::Int(i) => (*i as f64).to_bits().hash(state),
            CellValue::Float(f) if !f.is_nan() => unsigned_zero(*f).to_bits().hash(state),
            CellValue::String(s) => s.hash(state),
            CellValue::Date(_) | CellValue::DateTime(_) => self.as_datetime().hash(state),
            _ => {}
        }
    }
}

fn cmp_int_float(a: i64, b: f64) -> Ordering {
    let b = unsigned_zero(b);
    match (a as f64).total_cmp(&b) {
        Ordering::Equal if b.fract() == 0.0 => a.cmp(&(b as i64)),
        other => other,
    }
}

/// `-0.0` and `0.0` are one value
fn unsigned_zero(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else {
        f
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(Cow::Owned(s.to_string()))
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(Cow::Owned(s))
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(dt)
    }
}

impl<T> From<Option<T>> for CellValue
where
    T: Into<CellValue>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => CellValue::Null,
        }
    }
}

/// A row in the table
#[derive(Debug, Clone)]
pub struct Row {
    /// Cell values in column order
    pub cells: Vec<CellValue>,
    /// Original line/row number in source file (1-indexed)
    pub source_line: usize,
}

impl Row {
    pub fn new(cells: Vec<CellValue>, source_line: usize) -> Self {
        Self { cells, source_line }
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }

    /// Cell at `index`, or Null when the row is short.
    pub fn cell(&self, index: usize) -> &CellValue {
        self.cells.get(index).unwrap_or(&NULL_CELL)
    }

    /// Whole-row equality, Null padding included.
    pub fn same_cells(&self, other: &Row) -> bool {
        let width = self.cells.len().max(other.cells.len());
        (0..width).all(|i| self.cell(i) == other.cell(i))
    }
}

/// A table containing columns and rows
#[derive(Debug, Clone)]
pub struct Table {
    /// Column definitions
    pub columns: Vec<Column>,
    /// All rows in the table
    pub rows: Vec<Row>,
}

impl Table {
    /// Create a new empty table with column definitions
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from column names and row values, inferring column types.
    pub fn from_records<I, S>(names: I, records: Vec<Vec<CellValue>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column::new(name, i))
            .collect();
        let mut table = Table::new(columns);
        for (i, cells) in records.into_iter().enumerate() {
            table.add_row(cells, i + 1);
        }
        table.infer_column_types();
        table
    }

    /// Add a row to the table
    pub fn add_row(&mut self, cells: Vec<CellValue>, source_line: usize) {
        self.rows.push(Row::new(cells, source_line));
    }

    /// Infer column types from data
    pub fn infer_column_types(&mut self) {
        for col_idx in 0..self.columns.len() {
            let inferred = self
                .rows
                .iter()
                .map(|row| CellType::of(row.cell(col_idx)))
                .fold(CellType::Null, CellType::widen);

            self.columns[col_idx].inferred_type = inferred;
        }
    }

    /// Get column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Get column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Names that occur more than once in the header, in first-seen order.
    pub fn duplicate_column_names(&self) -> Vec<&str> {
        let mut seen = FxHashSet::default();
        let mut dupes = Vec::new();
        for name in self.column_names() {
            if !seen.insert(name) && !dupes.contains(&name) {
                dupes.push(name);
            }
        }
        dupes
    }

    /// Cell at (row, column), Null when out of range.
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        self.rows
            .get(row)
            .map(|r| r.cell(column))
            .unwrap_or(&NULL_CELL)
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// A table with no columns or no rows
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    /// Same header in the same order and the same cells row by row.
    pub fn content_equals(&self, other: &Table) -> bool {
        self.column_count() == other.column_count()
            && self.row_count() == other.row_count()
            && self.column_names().eq(other.column_names())
            && self
                .rows
                .iter()
                .zip(&other.rows)
                .all(|(a, b)| a.same_cells(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_cmp_orders_types() {
        let mut values = vec![
            CellValue::from("b"),
            CellValue::Int(3),
            CellValue::Null,
            CellValue::Float(2.5),
            CellValue::Bool(true),
            CellValue::from("a"),
        ];
        values.sort_by(|a, b| a.total_cmp(b));

        assert_eq!(
            values,
            vec![
                CellValue::Null,
                CellValue::Bool(true),
                CellValue::Float(2.5),
                CellValue::Int(3),
                CellValue::from("a"),
                CellValue::from("b"),
            ]
        );
    }

    #[test]
    fn test_int_float_compare_by_value() {
        assert_eq!(CellValue::Int(2).total_cmp(&CellValue::Float(2.0)), Ordering::Equal);
        assert_eq!(CellValue::Float(1.5).total_cmp(&CellValue::Int(2)), Ordering::Less);
    }

    #[test]
    fn test_int_float_equality_is_exact() {
        let big = CellValue::Int(9_007_199_254_740_993);
        let rounded = CellValue::Float(9_007_199_254_740_992.0);
        assert_ne!(big, rounded);
        assert_ne!(rounded, big);
        assert_eq!(big.total_cmp(&rounded), Ordering::Greater);
        assert_eq!(CellValue::Int(3), CellValue::Float(3.0));
    }

    #[test]
    fn test_signed_zero_is_one_value() {
        let neg = CellValue::Float(-0.0);
        assert_eq!(neg, CellValue::Float(0.0));
        assert_eq!(neg.total_cmp(&CellValue::Float(0.0)), Ordering::Equal);
        assert_eq!(neg.total_cmp(&CellValue::Int(0)), Ordering::Equal);
        assert_eq!(CellValue::Int(0).total_cmp(&neg), Ordering::Equal);
        assert_eq!(neg.total_cmp(&CellValue::Float(-1e-300)), Ordering::Greater);
    }

    #[test]
    fn test_coerce_f64() {
        assert_eq!(CellValue::from(" 1.5").coerce_f64(), Some(1.5));
        assert_eq!(CellValue::from("abc").coerce_f64(), None);
        assert_eq!(CellValue::from("").coerce_f64(), None);
        assert_eq!(CellValue::Bool(true).coerce_f64(), Some(1.0));
        assert_eq!(CellValue::Null.coerce_f64(), None);
    }

    #[test]
    fn test_nan_is_missing() {
        assert!(CellValue::Float(f64::NAN).is_missing());
        assert_eq!(CellValue::Float(f64::NAN), CellValue::Null);
        assert!(!CellValue::Int(0).is_missing());
    }

    #[test]
    fn test_from_records_infers_types() {
        let table = Table::from_records(
            ["id", "score", "name"],
            vec![
                vec![CellValue::Int(1), CellValue::Float(1.5), CellValue::from("a")],
                vec![CellValue::Int(2), CellValue::Int(2), CellValue::Null],
            ],
        );

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("id").map(|c| c.inferred_type), Some(CellType::Int));
        assert_eq!(table.column("score").map(|c| c.inferred_type), Some(CellType::Float));
        assert_eq!(table.column("name").map(|c| c.inferred_type), Some(CellType::String));
        assert_eq!(table.rows[1].source_line, 2);
    }

    #[test]
    fn test_content_equals_and_duplicates() {
        let a = Table::from_records(["k", "k"], vec![vec![CellValue::Int(1), CellValue::Int(2)]]);
        let b = a.clone();
        assert!(a.content_equals(&b));
        assert_eq!(a.duplicate_column_names(), vec!["k"]);

        let c = Table::from_records(["k", "v"], vec![vec![CellValue::Int(1), CellValue::Int(2)]]);
        assert!(!a.content_equals(&c));
    }
}
