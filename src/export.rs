//! Writes registry tables out as delimited text.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use encoding_rs::Encoding;
use log::info;

use crate::{data::Table, io_utils, registry::TableRegistry};

/// Writes `table` with a header row; `None` (or `-`) writes to stdout.
pub fn write_table(
    table: &Table,
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, delimiter, encoding)?;
    writer
        .write_record(table.headers())
        .context("Writing header row")?;
    for (idx, row) in table.display_rows().iter().enumerate() {
        writer
            .write_record(row)
            .with_context(|| format!("Writing row {}", idx + 1))?;
    }
    writer.flush().context("Flushing output")?;
    Ok(())
}

/// Writes every table to `<dir>/<key>.<ext>` and returns the paths in key order.
pub fn write_registry(
    registry: &TableRegistry,
    dir: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Creating output directory {dir:?}"))?;
    let extension = if delimiter == io_utils::DEFAULT_TSV_DELIMITER {
        "tsv"
    } else {
        "csv"
    };
    let mut written = Vec::with_capacity(registry.len());
    let mut stems = HashSet::new();
    for (key, table) in registry.iter() {
        let stem = file_stem(key);
        if !stems.insert(stem.clone()) {
            bail!("Table '{key}' maps to file name '{stem}' already used by another table");
        }
        let path = dir.join(format!("{stem}.{extension}"));
        write_table(table, Some(&path), delimiter, encoding)
            .with_context(|| format!("Writing table '{key}' to {path:?}"))?;
        info!("Wrote {} row(s) of '{key}' to {:?}", table.row_count(), path);
        written.push(path);
    }
    Ok(written)
}

/// File-system safe stem for a registry key.
pub fn file_stem(key: &str) -> String {
    let stem: String = key
        .trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '.' => c,
            _ => '_',
        })
        .collect();
    if stem.is_empty() {
        "table".to_string()
    } else {
        stem
    }
}
