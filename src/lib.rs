pub mod adjust;
pub mod archive;
pub mod cli;
pub mod data;
pub mod error;
pub mod export;
pub mod ingest;
pub mod io_utils;
pub mod parse;
pub mod preview;
pub mod registry;
pub mod schema;
pub mod section;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    cli::{Cli, Commands, IngestArgs},
    data::Table,
    ingest::{IngestOptions, LogObserver},
    registry::TableRegistry,
    schema::{SchemaCatalog, TableSchema},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("pipefile", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    match cli.command {
        Commands::Tables(args) => handle_tables(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Extract(args) => handle_extract(&args),
        Commands::Schema(args) => handle_schema(&args),
        Commands::Adjust(args) => handle_adjust(&args),
    }
}

pub(crate) fn load_registry(args: &IngestArgs) -> Result<TableRegistry> {
    let options = IngestOptions {
        file_filter: args.file_regex.clone(),
        table_filter: args.table_regex.clone(),
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    };
    debug!("Ingesting {:?} with {:?}", args.input, options);
    ingest::extract_tables(&args.input, &options, &mut LogObserver)
        .with_context(|| format!("Extracting tables from {:?}", args.input))
}

pub(crate) fn lookup<'a>(registry: &'a TableRegistry, key: &str) -> Result<&'a Table> {
    registry.get(key).ok_or_else(|| {
        anyhow!(
            "Table '{key}' not found. Available tables: {}",
            registry.keys().join(", ")
        )
    })
}

#[derive(Debug, Serialize)]
struct TableSummary<'a> {
    key: &'a str,
    name: &'a str,
    qualified_name: &'a str,
    rows: usize,
    columns: usize,
}

fn handle_tables(args: &cli::TablesArgs) -> Result<()> {
    let registry = load_registry(&args.ingest)?;
    let summaries: Vec<TableSummary<'_>> = registry
        .iter()
        .map(|(key, table)| TableSummary {
            key,
            name: &table.name,
            qualified_name: &table.qualified_name,
            rows: table.row_count(),
            columns: table.column_count(),
        })
        .collect();

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&summaries).context("Serializing table listing")?;
        println!("{rendered}");
    } else {
        let headers = ["key", "name", "qualified name", "rows", "columns"].map(String::from);
        let rows: Vec<Vec<String>> = summaries
            .iter()
            .map(|s| {
                vec![
                    s.key.to_string(),
                    s.name.to_string(),
                    s.qualified_name.to_string(),
                    s.rows.to_string(),
                    s.columns.to_string(),
                ]
            })
            .collect();
        table::print_table(&headers, &rows, &table::RenderOptions::default());
    }
    info!("Listed {} table(s) from {:?}", registry.len(), args.ingest.input);
    Ok(())
}

fn handle_extract(args: &cli::ExtractArgs) -> Result<()> {
    let registry = load_registry(&args.ingest)?;
    let delimiter = args.delimiter.unwrap_or(io_utils::DEFAULT_CSV_DELIMITER);
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let written = export::write_registry(&registry, &args.output_dir, delimiter, encoding)?;
    info!(
        "Extracted {} table(s) into {:?}",
        written.len(),
        args.output_dir
    );
    Ok(())
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    let registry = load_registry(&args.ingest)?;
    let catalog = SchemaCatalog {
        tables: registry
            .iter()
            .map(|(key, table)| TableSchema {
                key: key.to_string(),
                name: table.name.clone(),
                qualified_name: table.qualified_name.clone(),
                columns: table.columns().to_vec(),
            })
            .collect(),
    };
    match &args.output {
        Some(path) if !io_utils::is_dash(path) => {
            catalog
                .save(path)
                .with_context(|| format!("Writing schema catalog to {path:?}"))?;
            info!(
                "Schema for {} table(s) written to {:?}",
                catalog.tables.len(),
                path
            );
        }
        _ => print!("{}", catalog.to_yaml_string()?),
    }
    Ok(())
}

fn handle_adjust(args: &cli::AdjustArgs) -> Result<()> {
    let registry = load_registry(&args.ingest)?;
    let events = lookup(&registry, &args.table)?;
    let security = args.security.as_deref().unwrap_or(&args.table);
    let series = adjust::compute(
        security,
        args.start_date,
        args.size_only,
        args.quotients,
        events,
    )?;
    let delimiter = io_utils::resolve_output_delimiter(args.output.as_deref(), args.delimiter);
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    export::write_table(&series.to_table(), args.output.as_deref(), delimiter, encoding)?;
    info!(
        "Computed {} adjustment row(s) for {security} from {} event(s)",
        series.rows.len(),
        events.row_count()
    );
    Ok(())
}
