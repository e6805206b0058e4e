//! framediff - Key-aligned diff for tabular data
//!
//! Compares two tables row by row on key columns (or row position) and
//! reports per-cell differences within numeric tolerances, per-column
//! summaries and rows found on only one side.
//!
//! ```no_run
//! use framediff::{compute_diff, Config, Table};
//! use framediff::model::CellValue;
//!
//! let left = Table::from_records(["k", "v"], vec![vec![CellValue::Int(1), CellValue::Int(10)]]);
//! let right = Table::from_records(["k", "v"], vec![vec![CellValue::Int(1), CellValue::Int(11)]]);
//! let result = compute_diff(&left, &right, &Config::new(vec!["k".into()])).unwrap();
//! assert!(result.has_changes());
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod output;
pub mod parser;

pub use config::Config;
pub use diff::{compute_diff, DiffEngine, DiffResult};
pub use error::{CompareError, Result};
pub use model::Table;
