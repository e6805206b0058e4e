//! Diff aggregation: assemble per-column diffs into the result table

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::{CellValue, RowKey, Table};

use super::align::{AlignedRow, Alignment, RowPresence};
use super::column_diff::{ChangeKind, ColumnDiffSpec, ColumnKind, DiffValue};
use super::columns::{ColumnLayout, ColumnPresence, SharedColumn};
use super::duplicates::{DuplicateReport, KeyedRows};

/// Header name used for row-position keys
pub const INDEX_COLUMN: &str = "index";
/// Header of the row presence marker
pub const ROWS_PRESENT_COLUMN: &str = "rows_present";
pub const LEFT_MISSING_COLUMNS: &str = "left_missing_columns";
pub const RIGHT_MISSING_COLUMNS: &str = "right_missing_columns";

/// Diff of one shared column over the matched rows
#[derive(Debug, Clone)]
pub struct ColumnOutcome {
    pub shared: SharedColumn,
    /// `None` when the column could not be compared
    pub spec: Option<ColumnDiffSpec>,
    /// `None` when every matched row is equal
    pub diffs: Option<Vec<Option<DiffValue>>>,
}

impl ColumnOutcome {
    fn diff_at(&self, row: usize, matched: usize) -> Option<DiffValue> {
        if row >= matched {
            return Some(DiffValue::Changed(ChangeKind::MissingRow));
        }
        self.diffs.as_ref().and_then(|d| d[row].clone())
    }
}

/// Left value, right value and diff of one column, row-aligned with the table
#[derive(Debug, Clone)]
pub struct ColumnDiff {
    pub spec: ColumnDiffSpec,
    pub left: Vec<CellValue>,
    pub right: Vec<CellValue>,
    pub diff: Vec<Option<DiffValue>>,
}

impl ColumnDiff {
    pub fn diff_count(&self) -> usize {
        self.diff.iter().filter(|d| d.is_some()).count()
    }
}

/// Rows with differences, column-oriented
#[derive(Debug, Clone, Default)]
pub struct DiffTable {
    pub key_columns: Vec<String>,
    pub keys: Vec<RowKey>,
    pub presence: Vec<RowPresence>,
    pub columns: Vec<ColumnDiff>,
    /// Columns present only in the left table
    pub left_missing_columns: Vec<String>,
    /// Columns present only in the right table
    pub right_missing_columns: Vec<String>,
}

impl DiffTable {
    pub fn row_count(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDiff> {
        self.columns.iter().find(|c| c.spec.column == name)
    }

    /// Position of the row with `key`
    pub fn find_row(&self, key: &RowKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Flattened header: keys, then left/right/diff per column, then markers
    pub fn header(&self) -> Vec<String> {
        let mut header = self.key_columns.clone();
        for column in &self.columns {
            header.push(column.spec.left_column.clone());
            header.push(column.spec.right_column.clone());
            header.push(column.spec.diff_column.clone());
        }
        if !self.left_missing_columns.is_empty() {
            header.push(LEFT_MISSING_COLUMNS.to_string());
        }
        if !self.right_missing_columns.is_empty() {
            header.push(RIGHT_MISSING_COLUMNS.to_string());
        }
        header.push(ROWS_PRESENT_COLUMN.to_string());
        header
    }

    /// Display strings for row `i`, matching [`DiffTable::header`]
    pub fn row_strings(&self, i: usize) -> Vec<String> {
        let mut cells: Vec<String> = self.keys[i]
            .values()
            .iter()
            .take(self.key_columns.len())
            .map(|v| v.display().into_owned())
            .collect();
        for column in &self.columns {
            cells.push(column.left[i].display().into_owned());
            cells.push(column.right[i].display().into_owned());
            cells.push(column.diff[i].as_ref().map(|d| d.display()).unwrap_or_default());
        }
        if !self.left_missing_columns.is_empty() {
            cells.push(self.left_missing_columns.join(", "));
        }
        if !self.right_missing_columns.is_empty() {
            cells.push(self.right_missing_columns.join(", "));
        }
        cells.push(self.presence[i].as_str().to_string());
        cells
    }
}

/// Per-column summary entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMetadata {
    pub column: String,
    pub column_present: ColumnPresence,
    /// Comparator used; `None` for one-sided or uncomparable columns
    pub kind: Option<ColumnKind>,
    pub left_column: Option<String>,
    pub left_count: usize,
    pub right_column: Option<String>,
    pub right_count: usize,
    pub diff_column: Option<String>,
    pub diff_count: usize,
}

/// Column summaries keyed by column name, in report order
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Metadata {
    columns: IndexMap<String, ColumnMetadata>,
}

impl Metadata {
    pub fn insert(&mut self, entry: ColumnMetadata) {
        self.columns.insert(entry.column.clone(), entry);
    }

    pub fn get(&self, column: &str) -> Option<&ColumnMetadata> {
        self.columns.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.values()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns found in only one table
    pub fn one_sided(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.iter()
            .filter(|m| m.column_present != ColumnPresence::Both)
    }
}

/// Statistics about the diff
#[derive(Debug, Default, Clone, Serialize)]
pub struct DiffStats {
    pub left_row_count: usize,
    pub right_row_count: usize,
    pub rows_left_only: usize,
    pub rows_right_only: usize,
    pub rows_modified: usize,
    pub rows_unchanged: usize,
    pub cells_changed: usize,
    /// Repeated key occurrences found before resolution
    pub duplicate_keys: usize,
    /// Exact duplicate rows skipped
    pub duplicate_rows_dropped: usize,
}

impl DiffStats {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.rows_left_only > 0 || self.rows_right_only > 0 || self.rows_modified > 0
    }
}

/// Everything the aggregator needs from the earlier pipeline stages
pub struct AggregateInput<'a> {
    pub left: &'a Table,
    pub right: &'a Table,
    pub left_rows: &'a KeyedRows,
    pub right_rows: &'a KeyedRows,
    pub alignment: &'a Alignment,
    pub layout: &'a ColumnLayout,
    pub outcomes: Vec<ColumnOutcome>,
    pub key_columns: Vec<String>,
    pub keep_only_diffs: bool,
    pub ignore_extra_columns: bool,
    pub duplicates: DuplicateReport,
    pub duplicate_rows_dropped: usize,
}

/// Build the diff table, metadata and statistics.
///
/// Row order is matched rows in key order followed by one-sided rows in
/// key order. Row and column filtering happen before any value is copied.
pub fn aggregate(input: AggregateInput<'_>) -> (DiffTable, Metadata, DiffStats) {
    let alignment = input.alignment;
    let matched = alignment.matched.len();
    let total = alignment.len();

    let compared: Vec<&ColumnOutcome> = input.outcomes.iter().filter(|o| o.spec.is_some()).collect();

    let row_differs: Vec<bool> = (0..total)
        .map(|i| i >= matched || compared.iter().any(|o| o.diff_at(i, matched).is_some()))
        .collect();

    let kept_rows: Vec<usize> = (0..total)
        .filter(|&i| !input.keep_only_diffs || row_differs[i])
        .collect();

    let diff_counts: Vec<usize> = compared
        .iter()
        .map(|o| {
            let in_matched = o
                .diffs
                .as_ref()
                .map(|d| d.iter().filter(|v| v.is_some()).count())
                .unwrap_or(0);
            in_matched + alignment.missing.len()
        })
        .collect();

    let stats = DiffStats {
        left_row_count: input.left.row_count(),
        right_row_count: input.right.row_count(),
        rows_left_only: alignment.left_only().count(),
        rows_right_only: alignment.right_only().count(),
        rows_modified: row_differs[..matched].iter().filter(|d| **d).count(),
        rows_unchanged: row_differs[..matched].iter().filter(|d| !**d).count(),
        cells_changed: diff_counts
            .iter()
            .map(|c| c - alignment.missing.len())
            .sum(),
        duplicate_keys: input.duplicates.total(),
        duplicate_rows_dropped: input.duplicate_rows_dropped,
    };

    let mut columns = Vec::new();
    for (outcome, &count) in compared.iter().zip(&diff_counts) {
        let Some(spec) = outcome.spec.as_ref() else {
            continue;
        };
        if input.keep_only_diffs && count == 0 {
            continue;
        }

        let shared = &outcome.shared;
        let mut left = Vec::with_capacity(kept_rows.len());
        let mut right = Vec::with_capacity(kept_rows.len());
        let mut diff = Vec::with_capacity(kept_rows.len());
        for &i in &kept_rows {
            let row = aligned_row(alignment, i);
            left.push(
                row.left
                    .map(|r| input.left.cell(r, shared.left_index).clone())
                    .unwrap_or(CellValue::Null),
            );
            right.push(
                row.right
                    .map(|r| input.right.cell(r, shared.right_index).clone())
                    .unwrap_or(CellValue::Null),
            );
            diff.push(outcome.diff_at(i, matched));
        }
        columns.push(ColumnDiff {
            spec: spec.clone(),
            left,
            right,
            diff,
        });
    }

    let (left_missing_columns, right_missing_columns) = if input.ignore_extra_columns {
        (Vec::new(), Vec::new())
    } else {
        (input.layout.left_only.clone(), input.layout.right_only.clone())
    };

    let table = DiffTable {
        key_columns: input.key_columns.clone(),
        keys: kept_rows.iter().map(|&i| aligned_row(alignment, i).key.clone()).collect(),
        presence: kept_rows.iter().map(|&i| aligned_row(alignment, i).presence()).collect(),
        columns,
        left_missing_columns,
        right_missing_columns,
    };

    let metadata = build_metadata(&input, &diff_counts);
    (table, metadata, stats)
}

/// Matched rows first, then one-sided rows
fn aligned_row(alignment: &Alignment, i: usize) -> &AlignedRow {
    let matched = alignment.matched.len();
    if i < matched {
        &alignment.matched[i]
    } else {
        &alignment.missing[i - matched]
    }
}

fn non_null_count(table: &Table, rows: &KeyedRows, column: usize) -> usize {
    rows.rows
        .iter()
        .filter(|&&r| !table.cell(r, column).is_missing())
        .count()
}

fn build_metadata(input: &AggregateInput<'_>, diff_counts: &[usize]) -> Metadata {
    let mut metadata = Metadata::default();
    let mut counts = diff_counts.iter();

    for outcome in &input.outcomes {
        let shared = &outcome.shared;
        let diff_count = match outcome.spec {
            Some(_) => counts.next().copied().unwrap_or(0),
            None => 0,
        };
        metadata.insert(ColumnMetadata {
            column: shared.name.clone(),
            column_present: ColumnPresence::Both,
            kind: outcome.spec.as_ref().map(|s| s.kind),
            left_column: outcome.spec.as_ref().map(|s| s.left_column.clone()),
            left_count: non_null_count(input.left, input.left_rows, shared.left_index),
            right_column: outcome.spec.as_ref().map(|s| s.right_column.clone()),
            right_count: non_null_count(input.right, input.right_rows, shared.right_index),
            diff_column: outcome.spec.as_ref().map(|s| s.diff_column.clone()),
            diff_count,
        });
    }

    if input.ignore_extra_columns {
        return metadata;
    }

    for name in &input.layout.left_only {
        let left_count = input
            .left
            .column_index(name)
            .map(|idx| non_null_count(input.left, input.left_rows, idx))
            .unwrap_or(0);
        metadata.insert(one_sided_entry(name, ColumnPresence::LeftOnly, left_count));
    }
    for name in &input.layout.right_only {
        let right_count = input
            .right
            .column_index(name)
            .map(|idx| non_null_count(input.right, input.right_rows, idx))
            .unwrap_or(0);
        metadata.insert(one_sided_entry(name, ColumnPresence::RightOnly, right_count));
    }

    metadata
}

fn one_sided_entry(name: &str, presence: ColumnPresence, count: usize) -> ColumnMetadata {
    let (left_column, left_count, right_column, right_count) = match presence {
        ColumnPresence::LeftOnly => (Some(name.to_string()), count, None, 0),
        _ => (None, 0, Some(name.to_string()), count),
    };
    ColumnMetadata {
        column: name.to_string(),
        column_present: presence,
        kind: None,
        left_column,
        left_count,
        right_column,
        right_count,
        diff_column: None,
        diff_count: 0,
    }
}
