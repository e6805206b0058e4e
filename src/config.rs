//! Configuration handling for framediff

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diff::{DuplicatePolicy, Tolerance};
use crate::error::{CompareError, Result};
use crate::model::KeySpec;

/// Output format for diff results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

/// Configuration for a comparison run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Columns to use as primary key for row matching
    pub key_columns: Vec<String>,
    /// Align rows by position instead of key columns
    pub on_index: bool,
    /// Absolute tolerance for numeric comparisons
    pub atol: f64,
    /// Relative tolerance for numeric comparisons
    pub rtol: f64,
    /// Suffix for left-side value columns
    pub lsuffix: String,
    /// Suffix for right-side value columns
    pub rsuffix: String,
    /// Suffix for diff columns
    pub dsuffix: String,
    /// What to do when a key occurs more than once in a table
    pub duplicate_policy: DuplicatePolicy,
    /// Drop rows that repeat an earlier row cell for cell
    pub drop_duplicate_rows: bool,
    /// Skip columns that exist on only one side
    pub ignore_extra_columns: bool,
    /// Keep only rows and columns that differ
    pub keep_only_diffs: bool,
    /// Ignore case when comparing string values
    pub ignore_case: bool,
    /// Ignore leading/trailing whitespace in string values
    pub ignore_whitespace: bool,
    /// Worker threads for partitioned diffing; 1 runs inline
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_columns: Vec::new(),
            on_index: false,
            atol: 0.0,
            rtol: 0.0,
            lsuffix: "_left".to_string(),
            rsuffix: "_right".to_string(),
            dsuffix: "_diff".to_string(),
            duplicate_policy: DuplicatePolicy::default(),
            drop_duplicate_rows: false,
            ignore_extra_columns: false,
            keep_only_diffs: true,
            ignore_case: false,
            ignore_whitespace: false,
            workers: 1,
        }
    }
}

impl Config {
    /// Create a config keyed on the given columns
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            key_columns: keys,
            ..Default::default()
        }
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }

    /// Set key columns for row matching
    pub fn with_key_columns(mut self, keys: Vec<String>) -> Self {
        self.key_columns = keys;
        self
    }

    /// Align on row position
    pub fn with_on_index(mut self, on_index: bool) -> Self {
        self.on_index = on_index;
        self
    }

    /// Set absolute and relative tolerance
    pub fn with_tolerance(mut self, atol: f64, rtol: f64) -> Self {
        self.atol = atol;
        self.rtol = rtol;
        self
    }

    /// Set left/right/diff column suffixes
    pub fn with_suffixes(
        mut self,
        lsuffix: impl Into<String>,
        rsuffix: impl Into<String>,
        dsuffix: impl Into<String>,
    ) -> Self {
        self.lsuffix = lsuffix.into();
        self.rsuffix = rsuffix.into();
        self.dsuffix = dsuffix.into();
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_drop_duplicate_rows(mut self, drop: bool) -> Self {
        self.drop_duplicate_rows = drop;
        self
    }

    pub fn with_ignore_extra_columns(mut self, ignore: bool) -> Self {
        self.ignore_extra_columns = ignore;
        self
    }

    pub fn with_keep_only_diffs(mut self, keep: bool) -> Self {
        self.keep_only_diffs = keep;
        self
    }

    /// Enable case-insensitive comparison
    pub fn with_ignore_case(mut self, ignore: bool) -> Self {
        self.ignore_case = ignore;
        self
    }

    /// Enable whitespace-insensitive comparison
    pub fn with_ignore_whitespace(mut self, ignore: bool) -> Self {
        self.ignore_whitespace = ignore;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.atol, self.rtol)
    }

    /// How rows are keyed for this run
    pub fn key_spec(&self) -> Result<KeySpec> {
        if self.on_index {
            Ok(KeySpec::Index)
        } else if self.key_columns.is_empty() {
            Err(CompareError::validation(
                "provide key columns, or align on index",
            ))
        } else {
            Ok(KeySpec::Columns(self.key_columns.clone()))
        }
    }

    /// Check option values before any table is touched
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("atol", self.atol), ("rtol", self.rtol)] {
            if !value.is_finite() || value < 0.0 {
                return Err(CompareError::configuration(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }

        let suffixes = [&self.lsuffix, &self.rsuffix, &self.dsuffix];
        if suffixes.iter().any(|s| s.is_empty()) {
            return Err(CompareError::configuration("column suffixes must not be empty"));
        }
        if self.lsuffix == self.rsuffix
            || self.lsuffix == self.dsuffix
            || self.rsuffix == self.dsuffix
        {
            return Err(CompareError::configuration(format!(
                "column suffixes must be distinct (got '{}', '{}', '{}')",
                self.lsuffix, self.rsuffix, self.dsuffix
            )));
        }

        if self.workers == 0 {
            return Err(CompareError::configuration("workers must be at least 1"));
        }

        self.duplicate_policy.ensure_supported()?;
        self.key_spec()?;
        Ok(())
    }
}
