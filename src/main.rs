//! framediff - Key-aligned diff for tabular data

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};
use termcolor::{ColorChoice, NoColor};

use framediff::config::{Config, OutputFormat};
use framediff::diff::{DiffEngine, DuplicatePolicy};
use framediff::output::{render_to_stdout, JsonOutput, OutputFormatter};
use framediff::parser::ParserFactory;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    Terminal,
    Json,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(f: CliOutputFormat) -> Self {
        match f {
            CliOutputFormat::Terminal => OutputFormat::Terminal,
            CliOutputFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDuplicatePolicy {
    Drop,
    Sort,
    Aggregate,
}

impl From<CliDuplicatePolicy> for DuplicatePolicy {
    fn from(p: CliDuplicatePolicy) -> Self {
        match p {
            CliDuplicatePolicy::Drop => DuplicatePolicy::Drop,
            CliDuplicatePolicy::Sort => DuplicatePolicy::Sort,
            CliDuplicatePolicy::Aggregate => DuplicatePolicy::Aggregate,
        }
    }
}

/// Key-aligned, tolerance-aware diff for tabular data (CSV, TSV, JSON)
#[derive(Parser, Debug)]
#[command(name = "framediff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare two files and print the differences
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Left (original) file
    left_file: PathBuf,

    /// Right (new) file
    right_file: PathBuf,

    /// Key column(s) for row alignment (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    key: Vec<String>,

    /// Align rows by position instead of key columns
    #[arg(long, conflicts_with = "key")]
    on_index: bool,

    /// Absolute tolerance for numeric comparisons
    #[arg(long)]
    atol: Option<f64>,

    /// Relative tolerance for numeric comparisons
    #[arg(long)]
    rtol: Option<f64>,

    /// Suffix for left-side value columns
    #[arg(long)]
    lsuffix: Option<String>,

    /// Suffix for right-side value columns
    #[arg(long)]
    rsuffix: Option<String>,

    /// Suffix for diff columns
    #[arg(long)]
    dsuffix: Option<String>,

    /// What to do with repeated keys
    #[arg(long, value_enum)]
    if_duplicate_key: Option<CliDuplicatePolicy>,

    /// Drop rows that repeat an earlier row exactly
    #[arg(long)]
    drop_duplicate_rows: bool,

    /// Skip columns present in only one file
    #[arg(long)]
    ignore_extra_columns: bool,

    /// Keep unchanged rows and columns in the report
    #[arg(long)]
    keep_all: bool,

    /// Ignore case when comparing string values
    #[arg(long)]
    ignore_case: bool,

    /// Ignore leading/trailing whitespace in string values
    #[arg(long)]
    ignore_whitespace: bool,

    /// Worker threads for diffing
    #[arg(short, long)]
    workers: Option<usize>,

    /// JSON config file; command-line options override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "terminal")]
    format: CliOutputFormat,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only show statistics, not detailed changes
    #[arg(long)]
    stats_only: bool,
}

impl CompareArgs {
    /// Layer command-line options over the config file or defaults
    fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => Config::default(),
        };

        if !self.key.is_empty() {
            config.key_columns = self.key.clone();
        }
        config.on_index |= self.on_index;
        if let Some(atol) = self.atol {
            config.atol = atol;
        }
        if let Some(rtol) = self.rtol {
            config.rtol = rtol;
        }
        if let Some(suffix) = &self.lsuffix {
            config.lsuffix = suffix.clone();
        }
        if let Some(suffix) = &self.rsuffix {
            config.rsuffix = suffix.clone();
        }
        if let Some(suffix) = &self.dsuffix {
            config.dsuffix = suffix.clone();
        }
        if let Some(policy) = self.if_duplicate_key {
            config.duplicate_policy = policy.into();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.drop_duplicate_rows |= self.drop_duplicate_rows;
        config.ignore_extra_columns |= self.ignore_extra_columns;
        config.ignore_case |= self.ignore_case;
        config.ignore_whitespace |= self.ignore_whitespace;
        if self.keep_all {
            config.keep_only_diffs = false;
        }

        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let result = match &cli.command {
        Command::Compare(args) => compare(args),
    };

    match result {
        Ok(true) => ExitCode::from(1), // Differences found
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Run a comparison; returns whether differences were found
fn compare(args: &CompareArgs) -> Result<bool> {
    let config = args.to_config()?;
    let engine = DiffEngine::new(config)?;

    let factory = ParserFactory::new();
    let left = factory
        .parse(&args.left_file)
        .with_context(|| format!("Failed to parse left file: {}", args.left_file.display()))?;
    let right = factory
        .parse(&args.right_file)
        .with_context(|| format!("Failed to parse right file: {}", args.right_file.display()))?;
    debug!(
        "loaded {} rows x {} columns (left), {} rows x {} columns (right)",
        left.row_count(),
        left.column_count(),
        right.row_count(),
        right.column_count()
    );

    let diff = engine.diff(&left, &right)?;

    render_to_stdout(
        &diff,
        &args.left_file,
        &args.right_file,
        args.format.into(),
        args.stats_only,
        ColorChoice::Auto,
    )?;

    if let Some(path) = &args.output {
        write_report(&diff, &args.left_file, &args.right_file, path)?;
        info!("wrote report to {}", path.display());
    }

    Ok(diff.has_changes())
}

fn write_report(
    diff: &framediff::DiffResult,
    left_path: &Path,
    right_path: &Path,
    path: &Path,
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = NoColor::new(BufWriter::new(file));
    JsonOutput::new().render(diff, left_path, right_path, &mut writer)?;
    writer.flush()?;
    Ok(())
}
