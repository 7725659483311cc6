//! Body parser: turns a section's pipe-delimited body into a typed [`Table`].

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::{
    data::{Row, Table, parse_typed_value},
    error::PipeError,
    io_utils::{self, PIPE_DELIMITER},
    schema::{ColumnType, Schema, TableHeader},
    section::RawSection,
};

/// Lines at the top of every body that repeat the header and carry no data.
pub const BODY_HEADER_LINES: usize = 2;

static PIPE_PADDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" *\| *").expect("pipe padding pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RowFailure {
    pub line: usize,
    pub column: String,
    pub reason: String,
}

/// Parses `section.body` against `header.schema`. Any token that does not fit
/// its declared type fails the whole table.
pub fn parse_table(
    file_name: &str,
    section: &RawSection<'_>,
    header: &TableHeader,
) -> Result<Table> {
    let rows = parse_rows(section.body, &header.schema).map_err(|failure| {
        PipeError::BodyParse {
            file: file_name.to_string(),
            table: header.qualified_name(),
            line: failure.line,
            column: failure.column,
            reason: failure.reason,
            preview: section.preview(),
            schema: header.schema.to_string(),
        }
    })?;
    Ok(Table::new(
        header.name.clone(),
        header.qualified_name(),
        header.schema.clone(),
        rows,
    ))
}

pub(crate) fn parse_rows(
    body: &str,
    schema: &Schema,
) -> std::result::Result<Vec<Row>, RowFailure> {
    let normalized = PIPE_PADDING.replace_all(body, "|");
    let data = skip_lines(&normalized, BODY_HEADER_LINES);
    let width = schema.len();
    let mut reader = io_utils::open_delimited_reader(data.as_bytes(), PIPE_DELIMITER);
    let mut rows = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| RowFailure {
            line: idx + BODY_HEADER_LINES + 1,
            column: String::new(),
            reason: err.to_string(),
        })?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1)
            + BODY_HEADER_LINES;

        let fields: Vec<&str> = record.iter().collect();
        let trailing_delimiter = fields.len() == width + 1 && fields.last() == Some(&"");
        if fields.len() > width && !trailing_delimiter {
            return Err(RowFailure {
                line,
                column: String::new(),
                reason: format!("expected at most {width} field(s), found {}", fields.len()),
            });
        }

        let row = schema
            .declared()
            .iter()
            .enumerate()
            .map(|(offset, column)| {
                let raw = fields.get(offset + 1).copied().unwrap_or("");
                let storage = column.storage();
                let token = match storage {
                    ColumnType::String => raw,
                    _ => raw.trim(),
                };
                parse_typed_value(token, &storage).map_err(|err| RowFailure {
                    line,
                    column: column.name.clone(),
                    reason: format!("{err:#}"),
                })
            })
            .collect::<std::result::Result<Row, RowFailure>>()?;
        rows.push(row);
    }
    Ok(rows)
}

fn skip_lines(text: &str, count: usize) -> &str {
    let mut rest = text;
    for _ in 0..count {
        match rest.find('\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return "",
        }
    }
    rest
}
