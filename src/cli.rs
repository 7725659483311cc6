use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use regex::Regex;

use crate::data::parse_naive_date;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Extract typed tables from vendor pipe files and compute adjustment factors",
    long_about = None
)]
pub struct Cli {
    /// Log section previews and inferred schemas
    #[arg(long, global = true)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the tables found in a pipe file or zip archive
    Tables(TablesArgs),
    /// Preview the first few rows of one table in a formatted layout
    Preview(PreviewArgs),
    /// Write every table to its own delimited file
    Extract(ExtractArgs),
    /// Write the column schema of every table as YAML
    Schema(SchemaArgs),
    /// Compute cumulative price/size adjustment factors from an adjustment table
    Adjust(AdjustArgs),
}

#[derive(Debug, Clone, Args)]
pub struct IngestArgs {
    /// Pipe file or zip archive to read
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Only read archive members whose name matches this regex
    #[arg(long = "file-regex", value_parser = parse_regex)]
    pub file_regex: Option<Regex>,
    /// Only parse tables whose name matches this regex
    #[arg(long = "table-regex", value_parser = parse_regex)]
    pub table_regex: Option<Regex>,
    /// Character encoding of the input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    #[command(flatten)]
    pub ingest: IngestArgs,
    /// Emit the listing as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub ingest: IngestArgs,
    /// Registry key of the table to preview
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Cap for automatically sized columns
    #[arg(long = "max-width")]
    pub max_width: Option<usize>,
    /// Fixed column widths of the form `column=width`
    #[arg(long = "width", value_parser = parse_width_override, action = clap::ArgAction::Append)]
    pub widths: Vec<(String, usize)>,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub ingest: IngestArgs,
    /// Directory receiving one file per table
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: PathBuf,
    /// Output delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the output files (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub ingest: IngestArgs,
    /// Destination YAML file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AdjustArgs {
    #[command(flatten)]
    pub ingest: IngestArgs,
    /// Registry key of the adjustment event table
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// Security identifier used in diagnostics (defaults to the table key)
    #[arg(long)]
    pub security: Option<String>,
    /// Start of the series; earlier events are ignored
    #[arg(long = "start-date", value_parser = parse_date)]
    pub start_date: NaiveDate,
    /// Only compute size factors from price-and-volume events
    #[arg(long = "size-only")]
    pub size_only: bool,
    /// Also emit the per-event quotient columns
    #[arg(long)]
    pub quotients: bool,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the output (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_regex(value: &str) -> Result<Regex, String> {
    Regex::new(value).map_err(|err| format!("Invalid regex '{value}': {err}"))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_naive_date(value.trim()).map_err(|err| err.to_string())
}

pub fn parse_width_override(value: &str) -> Result<(String, usize), String> {
    let (column, width) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("Expected column=width, got '{value}'"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err("Column name cannot be empty".to_string());
    }
    let width = width
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("Invalid width in '{value}': {err}"))?;
    Ok((column.to_string(), width))
}
