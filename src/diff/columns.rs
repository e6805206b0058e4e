//! Column layout comparison between the two tables

use serde::Serialize;

use crate::model::Table;

/// Which tables a column exists in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnPresence {
    Both,
    LeftOnly,
    RightOnly,
}

impl std::fmt::Display for ColumnPresence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnPresence::Both => write!(f, "both"),
            ColumnPresence::LeftOnly => write!(f, "left_only"),
            ColumnPresence::RightOnly => write!(f, "right_only"),
        }
    }
}

/// A column shared by both tables, with its position on each side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedColumn {
    pub name: String,
    pub left_index: usize,
    pub right_index: usize,
}

/// Split of the non-key columns into shared and one-sided sets
#[derive(Debug, Clone, Default)]
pub struct ColumnLayout {
    /// Shared columns, in left-table order
    pub common: Vec<SharedColumn>,
    /// Columns only in the left table, in left-table order
    pub left_only: Vec<String>,
    /// Columns only in the right table, in right-table order
    pub right_only: Vec<String>,
}

impl ColumnLayout {
    /// Compare the headers of two tables, ignoring key columns
    pub fn compare(left: &Table, right: &Table, key_columns: &[String]) -> Self {
        let mut layout = ColumnLayout::default();
        let is_key = |name: &str| key_columns.iter().any(|k| k == name);

        for (left_index, column) in left.columns.iter().enumerate() {
            if is_key(&column.name) {
                continue;
            }
            match right.column_index(&column.name) {
                Some(right_index) => layout.common.push(SharedColumn {
                    name: column.name.clone(),
                    left_index,
                    right_index,
                }),
                None => layout.left_only.push(column.name.clone()),
            }
        }

        for column in &right.columns {
            if !is_key(&column.name) && left.column_index(&column.name).is_none() {
                layout.right_only.push(column.name.clone());
            }
        }

        layout
    }

    pub fn has_one_sided(&self) -> bool {
        !self.left_only.is_empty() || !self.right_only.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    #[test]
    fn test_layout() {
        let left = Table::from_records(
            ["id", "a", "b", "c"],
            vec![vec![CellValue::Int(1); 4]],
        );
        let right = Table::from_records(["d", "c", "id", "a"], vec![vec![CellValue::Int(1); 4]]);

        let layout = ColumnLayout::compare(&left, &right, &["id".to_string()]);
        assert_eq!(
            layout.common,
            vec![
                SharedColumn {
                    name: "a".into(),
                    left_index: 1,
                    right_index: 3
                },
                SharedColumn {
                    name: "c".into(),
                    left_index: 3,
                    right_index: 1
                },
            ]
        );
        assert_eq!(layout.left_only, vec!["b".to_string()]);
        assert_eq!(layout.right_only, vec!["d".to_string()]);
        assert!(layout.has_one_sided());
    }
}
