//! Row alignment: full outer join on key

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::RowKey;

use super::duplicates::KeyedRows;

/// Which tables a row was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPresence {
    Both,
    LeftOnly,
    RightOnly,
}

impl RowPresence {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowPresence::Both => "both",
            RowPresence::LeftOnly => "left_only",
            RowPresence::RightOnly => "right_only",
        }
    }
}

/// A key mapped to its row on each side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRow {
    pub key: RowKey,
    /// Row index in the left table
    pub left: Option<usize>,
    /// Row index in the right table
    pub right: Option<usize>,
}

impl AlignedRow {
    pub fn presence(&self) -> RowPresence {
        match (self.left, self.right) {
            (Some(_), Some(_)) => RowPresence::Both,
            (Some(_), None) => RowPresence::LeftOnly,
            (None, Some(_)) => RowPresence::RightOnly,
            (None, None) => unreachable!("aligned row without a side"),
        }
    }
}

/// Outcome of aligning two keyed tables
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    /// Rows present on both sides, in key order
    pub matched: Vec<AlignedRow>,
    /// Rows present on one side only, in key order
    pub missing: Vec<AlignedRow>,
}

impl Alignment {
    pub fn left_only(&self) -> impl Iterator<Item = &AlignedRow> {
        self.missing.iter().filter(|r| r.left.is_some())
    }

    pub fn right_only(&self) -> impl Iterator<Item = &AlignedRow> {
        self.missing.iter().filter(|r| r.right.is_some())
    }

    pub fn len(&self) -> usize {
        self.matched.len() + self.missing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outer-join two keyed views on their keys.
///
/// Keys are expected to be unique per side (duplicates resolved); if a key
/// still repeats, its first occurrence wins.
pub fn align(left: &KeyedRows, right: &KeyedRows) -> Alignment {
    let mut joined: BTreeMap<&RowKey, (Option<usize>, Option<usize>)> = BTreeMap::new();

    for (key, row) in left.iter() {
        let slot = joined.entry(key).or_insert((None, None));
        slot.0.get_or_insert(row);
    }
    for (key, row) in right.iter() {
        let slot = joined.entry(key).or_insert((None, None));
        slot.1.get_or_insert(row);
    }

    let mut alignment = Alignment::default();
    for (key, (l, r)) in joined {
        let row = AlignedRow {
            key: key.clone(),
            left: l,
            right: r,
        };
        if row.presence() == RowPresence::Both {
            alignment.matched.push(row);
        } else {
            alignment.missing.push(row);
        }
    }

    alignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    fn keyed(keys: &[i64]) -> KeyedRows {
        KeyedRows {
            keys: keys
                .iter()
                .map(|&k| RowKey::new(vec![CellValue::Int(k)]))
                .collect(),
            rows: (0..keys.len()).collect(),
        }
    }

    #[test]
    fn test_outer_join_sorted() {
        let left = keyed(&[3, 1, 2]);
        let right = keyed(&[2, 4, 1]);
        let alignment = align(&left, &right);

        let matched: Vec<_> = alignment
            .matched
            .iter()
            .map(|r| (r.key.to_string(), r.left, r.right))
            .collect();
        assert_eq!(
            matched,
            vec![
                ("1".to_string(), Some(1), Some(2)),
                ("2".to_string(), Some(2), Some(0)),
            ]
        );

        let missing: Vec<_> = alignment
            .missing
            .iter()
            .map(|r| (r.key.to_string(), r.presence()))
            .collect();
        assert_eq!(
            missing,
            vec![
                ("3".to_string(), RowPresence::LeftOnly),
                ("4".to_string(), RowPresence::RightOnly),
            ]
        );
        assert_eq!(alignment.left_only().count(), 1);
        assert_eq!(alignment.right_only().count(), 1);
        assert_eq!(alignment.len(), 4);
    }

    #[test]
    fn test_disjoint_tables() {
        let alignment = align(&keyed(&[1]), &keyed(&[2]));
        assert!(alignment.matched.is_empty());
        assert_eq!(alignment.missing.len(), 2);
    }
}
