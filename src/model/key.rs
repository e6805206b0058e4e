//! Primary key handling utilities

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

use super::table::{CellValue, Row, Table};
use crate::error::{CompareError, Result};

/// How rows are identified across the two tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    /// One or more named key columns
    Columns(Vec<String>),
    /// Row position within each table
    Index,
}

impl KeySpec {
    /// Key column names; empty for index alignment
    pub fn column_names(&self) -> &[String] {
        match self {
            KeySpec::Columns(names) => names,
            KeySpec::Index => &[],
        }
    }
}

/// Composite key value for one row
///
/// Equality, ordering and hashing all follow [`CellValue::total_cmp`], so
/// `Int(1)` and `Float(1.0)` address the same row.
#[derive(Debug, Clone)]
pub struct RowKey(pub Vec<CellValue>);

impl RowKey {
    pub fn new(values: Vec<CellValue>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[CellValue] {
        &self.0
    }

    /// Extend the key with a tie-break ordinal
    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.0.push(CellValue::Int(ordinal as i64));
        self
    }
}

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RowKey {}

impl PartialOrd for RowKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RowKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(&other.0) {
            match a.total_cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl Hash for RowKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            value.hash_ordered(state);
        }
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.display().into_owned()).collect();
        write!(f, "{}", parts.join("|"))
    }
}

impl Serialize for RowKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Builder for computing composite keys
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    column_indices: Vec<usize>,
    by_index: bool,
}

impl KeyBuilder {
    /// Resolve a key spec against a table.
    ///
    /// Fails with a validation error when a key column is absent.
    pub fn for_table(table: &Table, spec: &KeySpec, side: &str) -> Result<Self> {
        match spec {
            KeySpec::Index => Ok(Self {
                column_indices: Vec::new(),
                by_index: true,
            }),
            KeySpec::Columns(names) => {
                let column_indices = names
                    .iter()
                    .map(|name| {
                        table.column_index(name).ok_or_else(|| {
                            CompareError::validation(format!(
                                "key column '{}' not found in {} table",
                                name, side
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self {
                    column_indices,
                    by_index: false,
                })
            }
        }
    }

    /// Build the key of a row found at `position` in its table
    pub fn build_key(&self, row: &Row, position: usize) -> RowKey {
        if self.by_index {
            RowKey(vec![CellValue::Int(position as i64)])
        } else {
            RowKey(
                self.column_indices
                    .iter()
                    .map(|&i| row.cell(i).clone())
                    .collect(),
            )
        }
    }

    /// Keys for every row, in table order
    pub fn build_keys(&self, table: &Table) -> Vec<RowKey> {
        table
            .rows
            .iter()
            .enumerate()
            .map(|(pos, row)| self.build_key(row, pos))
            .collect()
    }

    /// Get the column indices
    pub fn column_indices(&self) -> &[usize] {
        &self.column_indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    fn table() -> Table {
        Table::from_records(
            ["a", "b", "v"],
            vec![
                vec![CellValue::Int(2), CellValue::from("x"), CellValue::Int(10)],
                vec![CellValue::Int(1), CellValue::from("y"), CellValue::Int(20)],
            ],
        )
    }

    #[test]
    fn test_composite_keys() {
        let t = table();
        let spec = KeySpec::Columns(vec!["b".into(), "a".into()]);
        let builder = KeyBuilder::for_table(&t, &spec, "left").unwrap();

        assert_eq!(builder.column_indices(), &[1, 0]);
        let keys = builder.build_keys(&t);
        assert_eq!(keys[0].to_string(), "x|2");
        assert_eq!(keys[1].to_string(), "y|1");
    }

    #[test]
    fn test_missing_key_column() {
        let t = table();
        let spec = KeySpec::Columns(vec!["nope".into()]);
        let err = KeyBuilder::for_table(&t, &spec, "right").unwrap_err();
        assert!(matches!(err, CompareError::Validation { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_index_keys() {
        let t = table();
        let builder = KeyBuilder::for_table(&t, &KeySpec::Index, "left").unwrap();
        let keys = builder.build_keys(&t);
        assert_eq!(keys[1], RowKey::new(vec![CellValue::Int(1)]));
    }

    #[test]
    fn test_numeric_keys_unify() {
        let a = RowKey::new(vec![CellValue::Int(1)]);
        let b = RowKey::new(vec![CellValue::Float(1.0)]);
        assert_eq!(a, b);

        let mut set = FxHashSet::default();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_signed_zero_keys_unify() {
        let neg = RowKey::new(vec![CellValue::Float(-0.0)]);
        let pos = RowKey::new(vec![CellValue::Float(0.0)]);
        let int = RowKey::new(vec![CellValue::Int(0)]);
        assert_eq!(neg, pos);
        assert_eq!(neg, int);

        let mut set = FxHashSet::default();
        set.insert(neg);
        assert!(set.contains(&pos));
        assert!(set.contains(&int));
    }

    #[test]
    fn test_ordinal_breaks_ties() {
        let base = RowKey::new(vec![CellValue::from("k")]);
        let first = base.clone().with_ordinal(0);
        let second = base.with_ordinal(1);
        assert!(first < second);
    }
}
