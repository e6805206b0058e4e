//! Colored terminal output

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::diff::{DiffResult, DiffStats, DiffTable, Metadata};

use super::OutputFormatter;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Terminal output with colors
#[derive(Debug, Clone, Default)]
pub struct TerminalOutput {
    stats_only: bool,
}

impl TerminalOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print the summary and skip the row and column tables
    pub fn with_stats_only(mut self, stats_only: bool) -> Self {
        self.stats_only = stats_only;
        self
    }

    fn write_header(
        &self,
        writer: &mut dyn WriteColor,
        left_path: &Path,
        right_path: &Path,
    ) -> Result<()> {
        writeln!(writer, "{}", RULE)?;
        writer.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(
            writer,
            " framediff: {} → {}",
            left_path.display(),
            right_path.display()
        )?;
        writer.reset()?;
        writeln!(writer, "{}", RULE)?;
        writeln!(writer)?;
        Ok(())
    }

    fn write_summary(&self, stats: &DiffStats, writer: &mut dyn WriteColor) -> Result<()> {
        write!(writer, "Summary: ")?;
        write_count(writer, stats.rows_modified, "modified", Color::Yellow)?;
        write!(writer, ", ")?;
        write_count(writer, stats.rows_left_only, "left only", Color::Red)?;
        write!(writer, ", ")?;
        write_count(writer, stats.rows_right_only, "right only", Color::Green)?;
        writeln!(
            writer,
            " ({} cells changed, {} → {} rows)",
            stats.cells_changed, stats.left_row_count, stats.right_row_count
        )?;

        if stats.duplicate_keys > 0 {
            writeln!(
                writer,
                "Duplicate keys resolved: {}",
                stats.duplicate_keys
            )?;
        }
        if stats.duplicate_rows_dropped > 0 {
            writeln!(
                writer,
                "Duplicate rows dropped: {}",
                stats.duplicate_rows_dropped
            )?;
        }
        writeln!(writer)?;
        Ok(())
    }

    fn write_missing_columns(&self, table: &DiffTable, writer: &mut dyn WriteColor) -> Result<()> {
        let sides = [
            ("left", &table.left_missing_columns, Color::Red),
            ("right", &table.right_missing_columns, Color::Green),
        ];
        let mut wrote = false;
        for (side, names, color) in sides {
            if names.is_empty() {
                continue;
            }
            write_heading(writer, &format!("Columns only in {}:", side))?;
            writer.set_color(ColorSpec::new().set_fg(Some(color)))?;
            writeln!(writer, "  {}", names.join(", "))?;
            writer.reset()?;
            wrote = true;
        }
        if wrote {
            writeln!(writer)?;
        }
        Ok(())
    }

    fn write_differences(&self, table: &DiffTable, writer: &mut dyn WriteColor) -> Result<()> {
        if table.is_empty() {
            return Ok(());
        }

        write_heading(writer, &format!("Differences ({} rows):", table.row_count()))?;
        let mut data = Vec::with_capacity(table.row_count() + 1);
        data.push(table.header());
        data.extend((0..table.row_count()).map(|i| table.row_strings(i)));
        writeln!(writer, "{}", build_table(&data))?;
        Ok(())
    }

    fn write_metadata(&self, metadata: &Metadata, writer: &mut dyn WriteColor) -> Result<()> {
        if metadata.is_empty() {
            return Ok(());
        }

        write_heading(writer, "Columns:")?;
        let mut data = vec![[
            "column",
            "present",
            "kind",
            "left_count",
            "right_count",
            "diff_count",
        ]
        .map(String::from)
        .to_vec()];
        for entry in metadata.iter() {
            data.push(vec![
                entry.column.clone(),
                entry.column_present.to_string(),
                entry.kind.map(|k| k.to_string()).unwrap_or_else(|| "-".into()),
                entry.left_count.to_string(),
                entry.right_count.to_string(),
                entry.diff_count.to_string(),
            ]);
        }
        writeln!(writer, "{}", build_table(&data))?;
        Ok(())
    }
}

impl OutputFormatter for TerminalOutput {
    fn render(
        &self,
        diff: &DiffResult,
        left_path: &Path,
        right_path: &Path,
        writer: &mut dyn WriteColor,
    ) -> Result<()> {
        self.write_header(writer, left_path, right_path)?;

        let Some(table) = diff.table.as_ref() else {
            writer.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
            writeln!(writer, "No differences found.")?;
            writer.reset()?;
            return Ok(());
        };

        self.write_summary(&diff.stats, writer)?;
        if self.stats_only {
            return Ok(());
        }

        self.write_missing_columns(table, writer)?;
        self.write_differences(table, writer)?;
        self.write_metadata(&diff.metadata, writer)?;
        Ok(())
    }
}

fn write_heading(writer: &mut dyn WriteColor, text: &str) -> Result<()> {
    writer.set_color(ColorSpec::new().set_bold(true).set_underline(true))?;
    write!(writer, "{}", text)?;
    writer.reset()?;
    writeln!(writer)?;
    Ok(())
}

fn write_count(writer: &mut dyn WriteColor, count: usize, label: &str, color: Color) -> Result<()> {
    if count > 0 {
        writer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    }
    write!(writer, "{} {}", count, label)?;
    writer.reset()?;
    Ok(())
}

/// Box-drawn table; the first row is the header
fn build_table(data: &[Vec<String>]) -> String {
    let Some(header) = data.first() else {
        return String::new();
    };
    if header.is_empty() {
        return String::new();
    }

    let mut widths = vec![0; header.len()];
    for row in data {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule = |left: char, mid: char, right: char| {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}\n", left, segments.join(&mid.to_string()), right)
    };
    let line = |row: &[String]| {
        let mut out = String::from("│");
        for (cell, width) in row.iter().zip(&widths) {
            out.push_str(&format!(" {:width$} │", cell, width = *width));
        }
        out.push('\n');
        out
    };

    let mut output = rule('┌', '┬', '┐');
    output.push_str(&line(header));
    output.push_str(&rule('├', '┼', '┤'));
    for row in &data[1..] {
        output.push_str(&line(row));
    }
    output.push_str(&rule('└', '┴', '┘'));
    output
}
