//! Duplicate key detection and resolution

use std::str::FromStr;

use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{CompareError, Result};
use crate::model::{KeyBuilder, RowKey, Table};

/// Policy applied when a key occurs more than once in a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the first occurrence of each key, discard the rest
    #[default]
    Drop,
    /// Append an occurrence ordinal to every key
    Sort,
    /// Reserved; rejected at validation
    Aggregate,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::Drop => "drop",
            DuplicatePolicy::Sort => "sort",
            DuplicatePolicy::Aggregate => "aggregate",
        }
    }

    pub fn ensure_supported(&self) -> Result<()> {
        match self {
            DuplicatePolicy::Aggregate => Err(CompareError::configuration(
                "duplicate key policy 'aggregate' is not implemented",
            )),
            _ => Ok(()),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = CompareError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(DuplicatePolicy::Drop),
            "sort" => Ok(DuplicatePolicy::Sort),
            "aggregate" => Ok(DuplicatePolicy::Aggregate),
            _ => Err(CompareError::configuration(format!(
                "unknown duplicate key policy '{}' (expected drop, sort or aggregate)",
                s
            ))),
        }
    }
}

impl TryFrom<String> for DuplicatePolicy {
    type Error = CompareError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys of one table paired with the row each one addresses
///
/// The source table is never modified; resolution only rewrites this view.
#[derive(Debug, Clone, Default)]
pub struct KeyedRows {
    pub keys: Vec<RowKey>,
    pub rows: Vec<usize>,
}

impl KeyedRows {
    /// Key every row of `table`, optionally skipping exact repeats of an
    /// earlier row. Returns the view and the number of rows skipped.
    pub fn build(table: &Table, builder: &KeyBuilder, drop_duplicate_rows: bool) -> (Self, usize) {
        let mut keyed = KeyedRows::default();
        let mut seen_rows: FxHashSet<RowKey> = FxHashSet::default();
        let mut skipped = 0;

        for (pos, row) in table.rows.iter().enumerate() {
            if drop_duplicate_rows {
                let mut cells = row.cells.clone();
                cells.resize(table.column_count(), crate::model::CellValue::Null);
                if !seen_rows.insert(RowKey::new(cells)) {
                    skipped += 1;
                    continue;
                }
            }
            keyed.keys.push(builder.build_key(row, pos));
            keyed.rows.push(pos);
        }

        (keyed, skipped)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RowKey, usize)> {
        self.keys.iter().zip(self.rows.iter().copied())
    }

    /// Positions (within this view) of every repeated key occurrence
    pub fn duplicate_positions(&self) -> Vec<usize> {
        let mut seen = FxHashSet::default();
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, key)| !seen.insert(*key))
            .map(|(pos, _)| pos)
            .collect()
    }

    pub fn has_duplicates(&self) -> bool {
        let mut seen = FxHashSet::default();
        !self.keys.iter().all(|key| seen.insert(key))
    }

    /// Apply `policy`. Input order is preserved, so `Drop` keeps the first
    /// occurrence and `Sort` numbers occurrences in table order.
    pub fn resolve(self, policy: DuplicatePolicy) -> Result<Self> {
        match policy {
            DuplicatePolicy::Drop => {
                let mut seen = FxHashSet::default();
                let mut kept = KeyedRows::default();
                for (key, row) in self.keys.into_iter().zip(self.rows) {
                    if seen.insert(key.clone()) {
                        kept.keys.push(key);
                        kept.rows.push(row);
                    }
                }
                Ok(kept)
            }
            DuplicatePolicy::Sort => {
                let mut ordinals: FxHashMap<RowKey, usize> = FxHashMap::default();
                let keys = self
                    .keys
                    .into_iter()
                    .map(|key| {
                        let next = ordinals.entry(key.clone()).or_insert(0);
                        let ordinal = *next;
                        *next += 1;
                        key.with_ordinal(ordinal)
                    })
                    .collect();
                Ok(KeyedRows {
                    keys,
                    rows: self.rows,
                })
            }
            DuplicatePolicy::Aggregate => {
                policy.ensure_supported()?;
                Ok(self)
            }
        }
    }
}

/// Duplicate keys found on each side before resolution
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateReport {
    pub left: usize,
    pub right: usize,
}

impl DuplicateReport {
    pub fn total(&self) -> usize {
        self.left + self.right
    }
}

/// Resolve duplicate keys in both tables.
///
/// Nothing is rewritten unless at least one side has a repeated key; when
/// one does, the policy is applied to each side independently so that keys
/// stay comparable across tables.
pub fn resolve_pair(
    left: KeyedRows,
    right: KeyedRows,
    policy: DuplicatePolicy,
) -> Result<(KeyedRows, KeyedRows, DuplicateReport)> {
    let report = DuplicateReport {
        left: left.duplicate_positions().len(),
        right: right.duplicate_positions().len(),
    };

    if report.total() == 0 {
        debug!("no duplicate keys found");
        return Ok((left, right, report));
    }

    warn!(
        "duplicate keys found (left: {}, right: {}), applying '{}' policy",
        report.left, report.right, policy
    );
    Ok((left.resolve(policy)?, right.resolve(policy)?, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, KeySpec};

    fn keyed(table: &Table, drop_rows: bool) -> KeyedRows {
        let spec = KeySpec::Columns(vec!["k".into()]);
        let builder = KeyBuilder::for_table(table, &spec, "left").unwrap();
        KeyedRows::build(table, &builder, drop_rows).0
    }

    fn dup_table() -> Table {
        Table::from_records(
            ["k", "v"],
            vec![
                vec![CellValue::Int(1), CellValue::Int(10)],
                vec![CellValue::Int(2), CellValue::Int(20)],
                vec![CellValue::Int(1), CellValue::Int(11)],
                vec![CellValue::Int(1), CellValue::Int(12)],
            ],
        )
    }

    #[test]
    fn test_detect_duplicates() {
        let rows = keyed(&dup_table(), false);
        assert!(rows.has_duplicates());
        assert_eq!(rows.duplicate_positions(), vec![2, 3]);
    }

    #[test]
    fn test_drop_keeps_first_occurrence() {
        let rows = keyed(&dup_table(), false)
            .resolve(DuplicatePolicy::Drop)
            .unwrap();
        assert_eq!(rows.rows, vec![0, 1]);
        assert!(!rows.has_duplicates());
    }

    #[test]
    fn test_sort_appends_ordinals() {
        let rows = keyed(&dup_table(), false)
            .resolve(DuplicatePolicy::Sort)
            .unwrap();
        let keys: Vec<String> = rows.keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["1|0", "2|0", "1|1", "1|2"]);
        assert_eq!(rows.rows, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_aggregate_is_rejected() {
        let err = keyed(&dup_table(), false)
            .resolve(DuplicatePolicy::Aggregate)
            .unwrap_err();
        assert!(matches!(err, CompareError::Configuration { .. }));
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("SORT".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Sort);
        let err = "first".parse::<DuplicatePolicy>().unwrap_err();
        assert!(matches!(err, CompareError::Configuration { .. }));
    }

    #[test]
    fn test_drop_duplicate_rows() {
        let table = Table::from_records(
            ["k", "v"],
            vec![
                vec![CellValue::Int(1), CellValue::Int(10)],
                vec![CellValue::Int(1), CellValue::Int(10)],
                vec![CellValue::Int(1), CellValue::Int(11)],
            ],
        );
        let spec = KeySpec::Columns(vec!["k".into()]);
        let builder = KeyBuilder::for_table(&table, &spec, "left").unwrap();
        let (rows, skipped) = KeyedRows::build(&table, &builder, true);
        assert_eq!(skipped, 1);
        assert_eq!(rows.rows, vec![0, 2]);
    }

    #[test]
    fn test_resolve_pair_untouched_without_duplicates() {
        let table = Table::from_records(
            ["k", "v"],
            vec![vec![CellValue::Int(1), CellValue::Int(10)]],
        );
        let left = keyed(&table, false);
        let right = keyed(&dup_table(), false);

        let (l, r, report) =
            resolve_pair(left.clone(), keyed(&table, false), DuplicatePolicy::Sort).unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(l.keys, left.keys);
        assert_eq!(r.len(), 1);

        let (l, r, report) = resolve_pair(left, right, DuplicatePolicy::Sort).unwrap();
        assert_eq!(report, DuplicateReport { left: 0, right: 2 });
        assert_eq!(l.keys[0].to_string(), "1|0");
        assert_eq!(r.len(), 4);
    }
}
