//! Column-level comparison logic

use chrono::Duration;
use serde::{Serialize, Serializer};

use crate::config::Config;
use crate::error::{CompareError, Result};
use crate::model::{CellType, CellValue};

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Comparator family for a column, chosen once from both sides' types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Datetime,
    Object,
}

impl ColumnKind {
    /// Pick the comparator for a column typed `left` on one side and
    /// `right` on the other.
    pub fn resolve(column: &str, left: CellType, right: CellType) -> Result<ColumnKind> {
        use CellType::*;

        match (left, right) {
            (l, r) if (l.is_numeric() || l == Null) && (r.is_numeric() || r == Null) => {
                Ok(ColumnKind::Numeric)
            }
            (l, r) if (l.is_temporal() || l == Null) && (r.is_temporal() || r == Null) => {
                Ok(ColumnKind::Datetime)
            }
            (l, r) if l == String || l == Mixed || l == Bool || r == String || r == Mixed || r == Bool => {
                Ok(ColumnKind::Object)
            }
            (l, r) => Err(CompareError::comparison(
                column,
                format!("cannot compare {} values with {} values", l, r),
            )),
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Datetime => write!(f, "datetime"),
            ColumnKind::Object => write!(f, "object"),
        }
    }
}

/// Why a sentinel was emitted instead of a delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Exactly one side is null
    OneSidedNull,
    /// Values differ and have no numeric delta
    NonNumeric,
    /// The row exists in only one table
    MissingRow,
}

impl ChangeKind {
    pub fn marker(&self) -> &'static str {
        match self {
            ChangeKind::OneSidedNull => "changed:null",
            ChangeKind::NonNumeric => "changed:value",
            ChangeKind::MissingRow => "changed:row",
        }
    }
}

/// Per-cell diff. Cells without a difference are `None`, never a value.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffValue {
    Int(i64),
    Float(f64),
    Duration(Duration),
    /// Sentinel diff
    Changed(ChangeKind),
}

impl DiffValue {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, DiffValue::Changed(_))
    }

    pub fn display(&self) -> String {
        match self {
            DiffValue::Int(i) => i.to_string(),
            DiffValue::Float(f) => f.to_string(),
            DiffValue::Duration(d) => format_duration(d),
            DiffValue::Changed(kind) => kind.marker().to_string(),
        }
    }
}

impl std::fmt::Display for DiffValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

impl Serialize for DiffValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DiffValue::Int(i) => serializer.serialize_i64(*i),
            DiffValue::Float(f) => serializer.serialize_f64(*f),
            DiffValue::Duration(d) => serializer.serialize_str(&format_duration(d)),
            DiffValue::Changed(kind) => serializer.serialize_str(kind.marker()),
        }
    }
}

/// Render a signed duration as `-1 days +23:28:00`.
///
/// Days are floored, so the clock part is always non-negative.
pub fn format_duration(d: &Duration) -> String {
    let micros = d
        .num_microseconds()
        .unwrap_or_else(|| d.num_seconds().saturating_mul(1_000_000));
    let days = micros.div_euclid(MICROS_PER_DAY);
    let rem = micros.rem_euclid(MICROS_PER_DAY);
    if rem == 0 {
        return format!("{} days", days);
    }

    let secs = rem / 1_000_000;
    let frac = rem % 1_000_000;
    let sign = if days < 0 { "+" } else { "" };
    let mut out = format!(
        "{} days {}{:02}:{:02}:{:02}",
        days,
        sign,
        secs / 3600,
        secs % 3600 / 60,
        secs % 60
    );
    if frac != 0 {
        out.push_str(&format!(".{:06}", frac));
    }
    out
}

/// Absolute and relative numeric tolerance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tolerance {
    pub atol: f64,
    pub rtol: f64,
}

impl Tolerance {
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self { atol, rtol }
    }

    /// `|a - b| <= atol + rtol * |b|`. An infinity is only close to itself.
    pub fn is_close(&self, a: f64, b: f64) -> bool {
        if !a.is_finite() || !b.is_finite() {
            return a == b;
        }
        a == b || (a - b).abs() <= self.atol + self.rtol * b.abs()
    }

    /// No slack on either bound
    pub fn is_exact(&self) -> bool {
        self.atol == 0.0 && self.rtol == 0.0
    }
}

/// Naming and comparison settings for one shared column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDiffSpec {
    pub column: String,
    pub left_column: String,
    pub right_column: String,
    pub diff_column: String,
    pub kind: ColumnKind,
    #[serde(skip)]
    pub tolerance: Tolerance,
}

impl ColumnDiffSpec {
    pub fn new(column: &str, kind: ColumnKind, config: &Config) -> Self {
        Self {
            column: column.to_string(),
            left_column: format!("{}{}", column, config.lsuffix),
            right_column: format!("{}{}", column, config.rsuffix),
            diff_column: format!("{}{}", column, config.dsuffix),
            kind,
            tolerance: config.tolerance(),
        }
    }
}

/// Column comparator with configurable options
#[derive(Debug, Clone, Default)]
pub struct ColumnComparator {
    tolerance: Tolerance,
    ignore_case: bool,
    ignore_whitespace: bool,
}

impl ColumnComparator {
    pub fn new(tolerance: Tolerance, ignore_case: bool, ignore_whitespace: bool) -> Self {
        Self {
            tolerance,
            ignore_case,
            ignore_whitespace,
        }
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Diff two aligned columns.
    ///
    /// Returns `None` when every pair is directly equal, skipping per-cell
    /// work; otherwise one entry per row.
    pub fn compare_column(
        &self,
        kind: ColumnKind,
        left: &[&CellValue],
        right: &[&CellValue],
    ) -> Option<Vec<Option<DiffValue>>> {
        debug_assert_eq!(left.len(), right.len());

        if left.iter().zip(right).all(|(a, b)| a == b) {
            return None;
        }

        let diffs = left
            .iter()
            .zip(right)
            .map(|(a, b)| match kind {
                ColumnKind::Numeric => self.compare_numeric(a, b),
                ColumnKind::Datetime => self.compare_datetime(a, b),
                ColumnKind::Object => self.compare_object(a, b),
            })
            .collect();
        Some(diffs)
    }

    /// Tolerance-based numeric comparison
    pub fn compare_numeric(&self, a: &CellValue, b: &CellValue) -> Option<DiffValue> {
        match (a.is_missing(), b.is_missing()) {
            (true, true) => return None,
            (true, false) | (false, true) => {
                return Some(DiffValue::Changed(ChangeKind::OneSidedNull))
            }
            (false, false) => {}
        }

        if let (CellValue::Int(i), CellValue::Int(j)) = (a, b) {
            return self.compare_int(*i, *j);
        }

        let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
            return Some(DiffValue::Changed(ChangeKind::NonNumeric));
        };
        let close = if self.tolerance.is_exact() {
            a == b
        } else {
            self.tolerance.is_close(x, y)
        };
        if close {
            return None;
        }
        Some(DiffValue::Float(mixed_int_delta(a, b).unwrap_or(x - y)))
    }

    /// Integer difference in `i128`, so values past 2^53 stay distinct
    fn compare_int(&self, i: i64, j: i64) -> Option<DiffValue> {
        let delta = i128::from(i) - i128::from(j);
        if delta == 0 {
            return None;
        }
        if !self.tolerance.is_exact() {
            let bound = self.tolerance.atol + self.tolerance.rtol * (j as f64).abs();
            if (delta.unsigned_abs() as f64) <= bound {
                return None;
            }
        }
        Some(
            i64::try_from(delta)
                .map(DiffValue::Int)
                .unwrap_or(DiffValue::Float(delta as f64)),
        )
    }

    /// Signed duration `a - b`, no tolerance
    pub fn compare_datetime(&self, a: &CellValue, b: &CellValue) -> Option<DiffValue> {
        match (a.is_missing(), b.is_missing()) {
            (true, true) => None,
            (true, false) | (false, true) => Some(DiffValue::Changed(ChangeKind::OneSidedNull)),
            (false, false) => match (a.as_datetime(), b.as_datetime()) {
                (Some(x), Some(y)) => {
                    let delta = x.signed_duration_since(y);
                    if delta == Duration::zero() {
                        None
                    } else {
                        Some(DiffValue::Duration(delta))
                    }
                }
                _ => Some(DiffValue::Changed(ChangeKind::NonNumeric)),
            },
        }
    }

    /// Equality first, then a numeric delta if both sides coerce
    pub fn compare_object(&self, a: &CellValue, b: &CellValue) -> Option<DiffValue> {
        if self.objects_equal(a, b) {
            return None;
        }

        match (a.coerce_f64(), b.coerce_f64()) {
            (Some(x), Some(y)) => {
                if self.tolerance.is_close(x, y) {
                    None
                } else {
                    Some(DiffValue::Float(x - y))
                }
            }
            _ if a.is_missing() || b.is_missing() => {
                Some(DiffValue::Changed(ChangeKind::OneSidedNull))
            }
            _ => Some(DiffValue::Changed(ChangeKind::NonNumeric)),
        }
    }

    fn objects_equal(&self, a: &CellValue, b: &CellValue) -> bool {
        if a == b {
            return true;
        }

        match (a, b) {
            (CellValue::String(x), CellValue::String(y)) => {
                let (x, y) = if self.ignore_whitespace {
                    (x.trim(), y.trim())
                } else {
                    (x.as_ref(), y.as_ref())
                };
                if self.ignore_case {
                    x.to_lowercase() == y.to_lowercase()
                } else {
                    x == y
                }
            }
            _ => false,
        }
    }
}

/// `a - b` for an int against a whole float in `i64` range, without
/// rounding the int first
fn mixed_int_delta(a: &CellValue, b: &CellValue) -> Option<f64> {
    fn whole(f: f64) -> Option<i64> {
        (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
    }

    let (i, j) = match (a, b) {
        (CellValue::Int(i), CellValue::Float(f)) => (*i, whole(*f)?),
        (CellValue::Float(f), CellValue::Int(j)) => (whole(*f)?, *j),
        _ => return None,
    };
    Some((i128::from(i) - i128::from(j)) as f64)
}
