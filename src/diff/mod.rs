//! Diff engine for comparing tables
//!
//! A comparison is a single pass: validate, resolve duplicate keys, align
//! rows, diff each shared column, then aggregate.

mod aggregate;
mod align;
mod column_diff;
mod columns;
mod duplicates;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::Config;
use crate::error::{CompareError, Result};
use crate::model::{CellValue, KeyBuilder, KeySpec, Table};

pub use aggregate::{
    ColumnDiff, ColumnMetadata, DiffStats, DiffTable, Metadata, INDEX_COLUMN,
    LEFT_MISSING_COLUMNS, RIGHT_MISSING_COLUMNS, ROWS_PRESENT_COLUMN,
};
pub use align::{align, AlignedRow, Alignment, RowPresence};
pub use column_diff::{
    format_duration, ChangeKind, ColumnComparator, ColumnDiffSpec, ColumnKind, DiffValue,
    Tolerance,
};
pub use columns::{ColumnLayout, ColumnPresence, SharedColumn};
pub use duplicates::{resolve_pair, DuplicatePolicy, DuplicateReport, KeyedRows};

use aggregate::{AggregateInput, ColumnOutcome};

/// Result of comparing two tables
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// Differing rows; `None` when the inputs hold no differences
    pub table: Option<DiffTable>,
    /// Per-column summary
    pub metadata: Metadata,
    /// Statistics
    pub stats: DiffStats,
}

impl DiffResult {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.table.is_some()
    }

    pub fn is_identical(&self) -> bool {
        !self.has_changes()
    }

    fn identical(left: &Table, right: &Table) -> Self {
        let rows = left.row_count();
        Self {
            table: None,
            metadata: Metadata::default(),
            stats: DiffStats {
                left_row_count: rows,
                right_row_count: right.row_count(),
                rows_unchanged: rows,
                ..DiffStats::default()
            },
        }
    }
}

/// Main diff engine
pub struct DiffEngine {
    config: Config,
    comparator: ColumnComparator,
    key_spec: KeySpec,
}

impl DiffEngine {
    /// Create a new diff engine; fails if the configuration is invalid
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let key_spec = config.key_spec()?;
        let comparator = ColumnComparator::new(
            config.tolerance(),
            config.ignore_case,
            config.ignore_whitespace,
        );
        Ok(Self {
            config,
            comparator,
            key_spec,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compare two tables
    pub fn diff(&self, left: &Table, right: &Table) -> Result<DiffResult> {
        Self::validate_table(left, "left")?;
        Self::validate_table(right, "right")?;
        let left_keys = KeyBuilder::for_table(left, &self.key_spec, "left")?;
        let right_keys = KeyBuilder::for_table(right, &self.key_spec, "right")?;

        if left.content_equals(right) {
            info!("tables are identical, nothing to compare");
            return Ok(DiffResult::identical(left, right));
        }

        let (left_rows, left_dropped) =
            KeyedRows::build(left, &left_keys, self.config.drop_duplicate_rows);
        let (right_rows, right_dropped) =
            KeyedRows::build(right, &right_keys, self.config.drop_duplicate_rows);
        if left_dropped + right_dropped > 0 {
            debug!(
                "dropped {} duplicate rows (left: {}, right: {})",
                left_dropped + right_dropped,
                left_dropped,
                right_dropped
            );
        }

        let (left_rows, right_rows, duplicates) =
            resolve_pair(left_rows, right_rows, self.config.duplicate_policy)?;

        let alignment = align(&left_rows, &right_rows);
        debug!(
            "aligned {} rows ({} matched, {} one-sided)",
            alignment.len(),
            alignment.matched.len(),
            alignment.missing.len()
        );

        let key_columns = self.key_spec.column_names().to_vec();
        let layout = ColumnLayout::compare(left, right, &key_columns);
        let outcomes = self.diff_columns(left, right, &alignment, &layout)?;

        let (table, metadata, stats) = aggregate::aggregate(AggregateInput {
            left,
            right,
            left_rows: &left_rows,
            right_rows: &right_rows,
            alignment: &alignment,
            layout: &layout,
            outcomes,
            key_columns: match self.key_spec {
                KeySpec::Index => vec![INDEX_COLUMN.to_string()],
                KeySpec::Columns(_) => key_columns,
            },
            keep_only_diffs: self.config.keep_only_diffs,
            ignore_extra_columns: self.config.ignore_extra_columns,
            duplicates,
            duplicate_rows_dropped: left_dropped + right_dropped,
        });

        let has_diffs = !table.is_empty()
            && (table.presence.iter().any(|p| *p != RowPresence::Both)
                || table.columns.iter().any(|c| c.diff_count() > 0));
        let has_extra_columns =
            !table.left_missing_columns.is_empty() || !table.right_missing_columns.is_empty();

        Ok(DiffResult {
            table: (has_diffs || has_extra_columns).then_some(table),
            metadata,
            stats,
        })
    }

    fn validate_table(table: &Table, side: &str) -> Result<()> {
        if table.is_empty() {
            return Err(CompareError::validation(format!("{} table is empty", side)));
        }
        let dupes = table.duplicate_column_names();
        if !dupes.is_empty() {
            return Err(CompareError::validation(format!(
                "{} table has duplicate column names: {}",
                side,
                dupes.join(", ")
            )));
        }
        Ok(())
    }

    /// Pick a comparator per shared column and diff the matched rows
    fn diff_columns(
        &self,
        left: &Table,
        right: &Table,
        alignment: &Alignment,
        layout: &ColumnLayout,
    ) -> Result<Vec<ColumnOutcome>> {
        let plans: Vec<(SharedColumn, Option<ColumnDiffSpec>)> = layout
            .common
            .iter()
            .map(|shared| {
                let left_type = left.columns[shared.left_index].inferred_type;
                let right_type = right.columns[shared.right_index].inferred_type;
                let spec = match ColumnKind::resolve(&shared.name, left_type, right_type) {
                    Ok(kind) => Some(ColumnDiffSpec::new(&shared.name, kind, &self.config)),
                    Err(e) => {
                        warn!("skipping column: {}", e);
                        None
                    }
                };
                (shared.clone(), spec)
            })
            .collect();

        let pairs: Vec<(usize, usize)> = alignment
            .matched
            .iter()
            .filter_map(|row| Some((row.left?, row.right?)))
            .collect();

        let partitions = if self.config.workers > 1 && pairs.len() > 1 {
            let chunk = pairs.len().div_ceil(self.config.workers);
            debug!(
                "diffing {} rows in partitions of {} on {} workers",
                pairs.len(),
                chunk,
                self.config.workers
            );
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.workers)
                .build()
                .map_err(|e| {
                    CompareError::configuration(format!("cannot start worker pool: {}", e))
                })?
                .install(|| {
                    pairs
                        .par_chunks(chunk)
                        .map(|part| self.diff_partition(left, right, part, &plans))
                        .collect::<Vec<_>>()
                })
        } else {
            vec![self.diff_partition(left, right, &pairs, &plans)]
        };

        let outcomes = plans
            .into_iter()
            .enumerate()
            .map(|(i, (shared, spec))| {
                let diffs = spec
                    .as_ref()
                    .and_then(|_| merge_partitions(partitions.iter().map(|p| &p[i])));
                if spec.is_some() && diffs.is_none() {
                    info!("{} column equals", shared.name);
                }
                ColumnOutcome {
                    shared,
                    spec,
                    diffs,
                }
            })
            .collect();
        Ok(outcomes)
    }

    /// Diff one row range for every planned column
    fn diff_partition(
        &self,
        left: &Table,
        right: &Table,
        pairs: &[(usize, usize)],
        plans: &[(SharedColumn, Option<ColumnDiffSpec>)],
    ) -> Vec<PartialDiff> {
        plans
            .iter()
            .map(|(shared, spec)| {
                let Some(spec) = spec else {
                    return PartialDiff::Skipped;
                };
                let left_values: Vec<&CellValue> = pairs
                    .iter()
                    .map(|&(l, _)| left.cell(l, shared.left_index))
                    .collect();
                let right_values: Vec<&CellValue> = pairs
                    .iter()
                    .map(|&(_, r)| right.cell(r, shared.right_index))
                    .collect();
                match self
                    .comparator
                    .compare_column(spec.kind, &left_values, &right_values)
                {
                    Some(diffs) => PartialDiff::Diffs(diffs),
                    None => PartialDiff::Equal(pairs.len()),
                }
            })
            .collect()
    }
}

/// One column's diffs over one row range
enum PartialDiff {
    Skipped,
    Equal(usize),
    Diffs(Vec<Option<DiffValue>>),
}

/// Concatenate partition results in order; `None` if every part is equal
fn merge_partitions<'a>(
    parts: impl Iterator<Item = &'a PartialDiff> + Clone,
) -> Option<Vec<Option<DiffValue>>> {
    if !parts.clone().any(|p| matches!(p, PartialDiff::Diffs(_))) {
        return None;
    }

    let mut merged = Vec::new();
    for part in parts {
        match part {
            PartialDiff::Diffs(diffs) => merged.extend(diffs.iter().cloned()),
            PartialDiff::Equal(len) => merged.extend(std::iter::repeat(None).take(*len)),
            PartialDiff::Skipped => {}
        }
    }
    Some(merged)
}

/// Convenience function to compute diff
pub fn compute_diff(left: &Table, right: &Table, config: &Config) -> Result<DiffResult> {
    let engine = DiffEngine::new(config.clone())?;
    engine.diff(left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn int(v: i64) -> CellValue {
        CellValue::Int(v)
    }

    fn kv(rows: &[(i64, i64)]) -> Table {
        Table::from_records(
            ["k", "v"],
            rows.iter().map(|&(k, v)| vec![int(k), int(v)]).collect(),
        )
    }

    fn config() -> Config {
        Config::new(vec!["k".into()])
    }

    #[test]
    fn test_changed_and_missing_rows() {
        let left = kv(&[(1, 10), (2, 20)]);
        let right = kv(&[(1, 10), (2, 21), (3, 5)]);

        let result = compute_diff(&left, &right, &config()).unwrap();
        let table = result.table.as_ref().unwrap();

        assert_eq!(table.row_count(), 2);
        let v = table.column("v").unwrap();
        assert_eq!(table.keys[0].to_string(), "2");
        assert_eq!(table.presence[0], RowPresence::Both);
        assert_eq!(v.diff[0], Some(DiffValue::Int(-1)));
        assert_eq!(v.left[0], int(20));
        assert_eq!(v.right[0], int(21));

        assert_eq!(table.keys[1].to_string(), "3");
        assert_eq!(table.presence[1], RowPresence::RightOnly);
        assert_eq!(v.diff[1], Some(DiffValue::Changed(ChangeKind::MissingRow)));
        assert_eq!(v.left[1], CellValue::Null);

        assert_eq!(result.stats.rows_modified, 1);
        assert_eq!(result.stats.rows_unchanged, 1);
        assert_eq!(result.stats.rows_right_only, 1);
        assert_eq!(result.stats.cells_changed, 1);

        let meta = result.metadata.get("v").unwrap();
        assert_eq!(meta.left_count, 2);
        assert_eq!(meta.right_count, 3);
        assert_eq!(meta.diff_count, 2);
        assert_eq!(meta.kind, Some(ColumnKind::Numeric));
    }

    #[test]
    fn test_large_integers_beyond_float_precision() {
        let left = kv(&[(1, 9_007_199_254_740_993)]);
        let right = kv(&[(1, 9_007_199_254_740_992)]);

        let result = compute_diff(&left, &right, &config()).unwrap();
        assert!(result.has_changes());
        let table = result.table.as_ref().unwrap();
        assert_eq!(table.column("v").unwrap().diff[0], Some(DiffValue::Int(1)));
        assert_eq!(result.metadata.get("v").unwrap().diff_count, 1);
    }

    #[test]
    fn test_self_compare_is_absent() {
        let table = kv(&[(1, 10), (2, 20)]);
        let result = compute_diff(&table, &table, &config()).unwrap();
        assert!(result.table.is_none());
        assert!(result.is_identical());
        assert_eq!(result.stats.rows_unchanged, 2);
    }

    #[test]
    fn test_reordered_rows_have_no_diff() {
        let left = kv(&[(1, 10), (2, 20)]);
        let right = kv(&[(2, 20), (1, 10)]);
        let result = compute_diff(&left, &right, &config()).unwrap();
        assert!(result.table.is_none());
        assert_eq!(result.metadata.get("v").unwrap().diff_count, 0);
    }

    #[test]
    fn test_keep_all_rows_and_columns() {
        let left = Table::from_records(
            ["k", "a", "b"],
            vec![vec![int(1), int(1), int(1)], vec![int(2), int(2), int(2)]],
        );
        let right = Table::from_records(
            ["k", "a", "b"],
            vec![vec![int(1), int(1), int(1)], vec![int(2), int(2), int(3)]],
        );

        let filtered = compute_diff(&left, &right, &config()).unwrap();
        let table = filtered.table.unwrap();
        assert_eq!(table.row_count(), 1);
        assert!(table.column("a").is_none());
        assert_eq!(
            table.header(),
            vec!["k", "b_left", "b_right", "b_diff", "rows_present"]
        );

        let all = compute_diff(&left, &right, &config().with_keep_only_diffs(false)).unwrap();
        let table = all.table.unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("a").unwrap().diff, vec![None, None]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let left = kv(&(0..50).map(|i| (i, i * 2)).collect::<Vec<_>>());
        let right = kv(&(0..50)
            .map(|i| (i, if i % 7 == 0 { i * 2 + 1 } else { i * 2 }))
            .collect::<Vec<_>>());

        let sequential = compute_diff(&left, &right, &config()).unwrap();
        let parallel = compute_diff(&left, &right, &config().with_workers(4)).unwrap();

        let (s, p) = (sequential.table.unwrap(), parallel.table.unwrap());
        assert_eq!(s.keys, p.keys);
        assert_eq!(s.column("v").unwrap().diff, p.column("v").unwrap().diff);
        assert_eq!(s.row_count(), 8);
    }

    #[test]
    fn test_one_sided_columns() {
        let left = Table::from_records(["k", "v", "old"], vec![vec![int(1), int(1), int(9)]]);
        let right = Table::from_records(["k", "v", "new"], vec![vec![int(1), int(2), int(9)]]);

        let result = compute_diff(&left, &right, &config()).unwrap();
        let table = result.table.as_ref().unwrap();
        assert_eq!(table.left_missing_columns, vec!["old".to_string()]);
        assert_eq!(table.right_missing_columns, vec!["new".to_string()]);
        assert_eq!(
            result.metadata.get("old").unwrap().column_present,
            ColumnPresence::LeftOnly
        );
        assert_eq!(result.metadata.one_sided().count(), 2);

        let ignored = compute_diff(&left, &right, &config().with_ignore_extra_columns(true)).unwrap();
        let table = ignored.table.as_ref().unwrap();
        assert!(table.left_missing_columns.is_empty());
        assert!(ignored.metadata.get("old").is_none());
    }

    #[test]
    fn test_one_sided_columns_only() {
        let left = Table::from_records(["k", "v"], vec![vec![int(1), int(1)]]);
        let right = Table::from_records(["k", "v", "w"], vec![vec![int(1), int(1), int(3)]]);
        let result = compute_diff(&left, &right, &config()).unwrap();
        let table = result.table.unwrap();
        assert!(table.columns.is_empty());
        assert_eq!(table.right_missing_columns, vec!["w".to_string()]);
    }

    #[test]
    fn test_datetime_column() {
        let d = |day| CellValue::Date(NaiveDate::from_ymd_opt(2015, 7, day).unwrap());
        let left = Table::from_records(["k", "when"], vec![vec![int(1), d(6)]]);
        let right = Table::from_records(["k", "when"], vec![vec![int(1), d(8)]]);

        let result = compute_diff(&left, &right, &config()).unwrap();
        let table = result.table.unwrap();
        let when = table.column("when").unwrap();
        assert_eq!(when.spec.kind, ColumnKind::Datetime);
        assert_eq!(when.diff[0].as_ref().unwrap().display(), "-2 days");
    }

    #[test]
    fn test_uncomparable_column_is_skipped() {
        let d = CellValue::Date(NaiveDate::from_ymd_opt(2015, 7, 6).unwrap());
        let left = Table::from_records(["k", "when", "v"], vec![vec![int(1), d, int(1)]]);
        let right = Table::from_records(["k", "when", "v"], vec![vec![int(1), int(5), int(2)]]);

        let result = compute_diff(&left, &right, &config()).unwrap();
        assert_eq!(result.metadata.get("when").unwrap().kind, None);
        let table = result.table.unwrap();
        assert!(table.column("when").is_none());
        assert!(table.column("v").is_some());
    }

    #[test]
    fn test_validation_errors() {
        let table = kv(&[(1, 1)]);
        let empty = Table::from_records(["k", "v"], Vec::new());
        assert!(matches!(
            compute_diff(&table, &empty, &config()),
            Err(CompareError::Validation { .. })
        ));

        let missing_key = Config::new(vec!["id".into()]);
        let err = compute_diff(&table, &table, &missing_key).unwrap_err();
        assert!(err.to_string().contains("key column 'id' not found"));

        let dupe_header = Table::from_records(["k", "v", "v"], vec![vec![int(1), int(1), int(1)]]);
        assert!(matches!(
            compute_diff(&dupe_header, &table, &config()),
            Err(CompareError::Validation { .. })
        ));

        let aggregate = config().with_duplicate_policy(DuplicatePolicy::Aggregate);
        assert!(matches!(
            DiffEngine::new(aggregate),
            Err(CompareError::Configuration { .. })
        ));
    }

    #[test]
    fn test_duplicate_drop_keeps_first() {
        let left = kv(&[(1, 10), (1, 99), (2, 20)]);
        let right = kv(&[(1, 10), (2, 20)]);
        let result = compute_diff(&left, &right, &config()).unwrap();
        assert!(result.table.is_none());
        assert_eq!(result.stats.duplicate_keys, 1);
    }

    #[test]
    fn test_duplicate_sort_pairs_by_position() {
        let left = kv(&[(1, 10), (1, 11)]);
        let right = kv(&[(1, 10), (1, 12)]);
        let result = compute_diff(
            &left,
            &right,
            &config().with_duplicate_policy(DuplicatePolicy::Sort),
        )
        .unwrap();
        let table = result.table.unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.keys[0].to_string(), "1|1");
        assert_eq!(table.column("v").unwrap().diff[0], Some(DiffValue::Int(-1)));
    }

    #[test]
    fn test_align_on_index() {
        let left = Table::from_records(["v"], vec![vec![int(1)], vec![int(2)]]);
        let right = Table::from_records(["v"], vec![vec![int(1)], vec![int(5)], vec![int(3)]]);
        let config = Config::default().with_on_index(true);

        let result = compute_diff(&left, &right, &config).unwrap();
        let table = result.table.unwrap();
        assert_eq!(table.key_columns, vec![INDEX_COLUMN.to_string()]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("v").unwrap().diff[0], Some(DiffValue::Int(-3)));
        assert_eq!(table.presence[1], RowPresence::RightOnly);
    }
}
