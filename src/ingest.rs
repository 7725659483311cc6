//! Ingestion pipeline: archive → sections → schema → body → registry.
//!
//! The pipeline is a pure function of the input path and the filters in
//! [`IngestOptions`]. Progress reporting goes through an [`IngestObserver`];
//! [`LogObserver`] forwards it to the `log` facade.

use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};
use regex::Regex;

use crate::{
    archive::{self, ArchiveMember},
    parse,
    registry::{TableRecord, TableRegistry},
    schema::{self, TableHeader},
    section::{self, RawSection},
};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Archive members to read; ignored for plain files.
    pub file_filter: Option<Regex>,
    /// Tables to parse; others are reported as placeholders.
    pub table_filter: Option<Regex>,
    pub encoding: &'static Encoding,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            file_filter: None,
            table_filter: None,
            encoding: UTF_8,
        }
    }
}

/// Hooks for ingestion progress. All methods default to doing nothing.
pub trait IngestObserver {
    fn member_read(&mut self, _member: &ArchiveMember) {}

    fn section_found(
        &mut self,
        _file_name: &str,
        _section: &RawSection<'_>,
        _header: &TableHeader,
    ) {
    }

    fn table_done(&mut self, _record: &TableRecord) {}

    fn records_collected(&mut self, _records: &[TableRecord]) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl IngestObserver for NoopObserver {}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl IngestObserver for LogObserver {
    fn member_read(&mut self, member: &ArchiveMember) {
        info!("Read {} ({} characters)", member.name, member.text.len());
    }

    fn section_found(&mut self, file_name: &str, section: &RawSection<'_>, header: &TableHeader) {
        debug!(
            "fileName: {file_name}\nsection[:{}]:\n{}\nschema: {}",
            section::PREVIEW_CHARS,
            section.preview(),
            header.schema
        );
    }

    fn table_done(&mut self, record: &TableRecord) {
        match &record.table {
            Some(table) => debug!(
                "Parsed '{}' from {}: {} row(s) x {} column(s)",
                record.qualified_name,
                record.file_name,
                table.row_count(),
                table.column_count()
            ),
            None => debug!(
                "Skipped '{}' from {} (table filter)",
                record.qualified_name, record.file_name
            ),
        }
    }

    fn records_collected(&mut self, records: &[TableRecord]) {
        let parsed = records.iter().filter(|r| r.table.is_some()).count();
        info!(
            "Collected {} table section(s), {} parsed, {} skipped",
            records.len(),
            parsed,
            records.len() - parsed
        );
    }
}

/// Parses every section of one file. Sections whose table name does not match
/// `table_filter` are returned as placeholders without a table.
pub fn extract_tables_from_text(
    file_name: &str,
    text: &str,
    table_filter: Option<&Regex>,
    observer: &mut dyn IngestObserver,
) -> Result<Vec<TableRecord>> {
    let mut records = Vec::new();
    for raw in section::split_sections(file_name, text)? {
        let header = schema::extract_header(raw.header).with_context(|| {
            format!(
                "Reading header block in {file_name}\nsection:\n{}",
                raw.preview()
            )
        })?;
        let qualified_name = header.qualified_name();

        let wanted = table_filter.is_none_or(|filter| filter.is_match(&header.name));
        let table = if wanted {
            observer.section_found(file_name, &raw, &header);
            Some(parse::parse_table(file_name, &raw, &header)?)
        } else {
            None
        };

        let record = TableRecord {
            file_name: file_name.to_string(),
            name: header.name,
            qualified_name,
            table,
        };
        observer.table_done(&record);
        records.push(record);
    }
    Ok(records)
}

/// Reads `path` and returns one record per table section, in archive order.
pub fn extract_records(
    path: &Path,
    options: &IngestOptions,
    observer: &mut dyn IngestObserver,
) -> Result<Vec<TableRecord>> {
    let members = archive::read_members(path, options.file_filter.as_ref(), options.encoding)?;
    let mut records = Vec::new();
    for member in &members {
        observer.member_read(member);
        records.extend(extract_tables_from_text(
            &member.name,
            &member.text,
            options.table_filter.as_ref(),
            observer,
        )?);
    }
    observer.records_collected(&records);
    Ok(records)
}

/// Full ingestion: every matching table of `path`, uniquely keyed.
pub fn extract_tables(
    path: &Path,
    options: &IngestOptions,
    observer: &mut dyn IngestObserver,
) -> Result<TableRegistry> {
    let records = extract_records(path, options, observer)?;
    TableRegistry::register(records).with_context(|| format!("Registering tables from {path:?}"))
}
