//! Output formatting for diff results

mod json;
mod terminal;

use std::path::Path;

use anyhow::Result;
use termcolor::{ColorChoice, StandardStream, WriteColor};

use crate::config::OutputFormat;
use crate::diff::DiffResult;

pub use json::JsonOutput;
pub use terminal::TerminalOutput;

/// Trait for output formatters
pub trait OutputFormatter {
    /// Render diff result to a writer
    fn render(
        &self,
        diff: &DiffResult,
        left_path: &Path,
        right_path: &Path,
        writer: &mut dyn WriteColor,
    ) -> Result<()>;
}

/// Factory for creating output formatters
pub struct OutputFactory;

impl OutputFactory {
    /// Create an output formatter based on format type
    pub fn create(format: OutputFormat, stats_only: bool) -> Box<dyn OutputFormatter> {
        match format {
            OutputFormat::Terminal => Box::new(TerminalOutput::new().with_stats_only(stats_only)),
            OutputFormat::Json => Box::new(JsonOutput::new().with_stats_only(stats_only)),
        }
    }
}

/// Render diff result to stdout
pub fn render_to_stdout(
    diff: &DiffResult,
    left_path: &Path,
    right_path: &Path,
    format: OutputFormat,
    stats_only: bool,
    color: ColorChoice,
) -> Result<()> {
    let formatter = OutputFactory::create(format, stats_only);
    let mut stdout = StandardStream::stdout(color);
    formatter.render(diff, left_path, right_path, &mut stdout)
}
