//! Column schema model and the fixed-width header extractor.
//!
//! A pipe-file section carries its own schema as a fixed-width header block.
//! The first non-blank line names the table; each further line declares one
//! body column:
//!
//! ```text
//! 0    5                                 39                             70     76
//! |    |<- index ----------------------->|<- name --------------------->|T     |SS
//! ```
//!
//! `T` is the one-character type code (`N`, `D`, `S`) and `SS` the scale flag.
//! [`extract_header()`] turns that block into a [`TableHeader`] whose [`Schema`]
//! always starts with the synthetic `dropped` column that lines up with the
//! row-sequence marker at the front of every body line.

use std::{fmt, fs::File, io::BufReader, ops::Range, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::PipeError;

pub const DROPPED_COLUMN: &str = "dropped";

const INDEX_RANGE: Range<usize> = 5..39;
const NAME_RANGE: Range<usize> = 39..70;
const TYPE_RANGE: Range<usize> = 70..71;
const SCALE_RANGE: Range<usize> = 76..78;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogicalType {
    Numeric,
    Date,
    String,
}

impl LogicalType {
    /// Maps a header type code. Unknown codes fall back to text.
    pub fn from_code(code: &str) -> Self {
        match code {
            "N" => LogicalType::Numeric,
            "D" => LogicalType::Date,
            _ => LogicalType::String,
        }
    }
}

/// Storage type of a parsed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Date,
}

impl ColumnType {
    pub fn describe(&self) -> &'static str {
        match self {
            ColumnType::String => "String",
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::Date => "Date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub logical_type: LogicalType,
    #[serde(default)]
    pub is_scaled: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, logical_type: LogicalType, is_scaled: bool) -> Self {
        Self {
            name: name.into(),
            logical_type,
            is_scaled,
        }
    }

    pub fn dropped() -> Self {
        Self::new(DROPPED_COLUMN, LogicalType::String, false)
    }

    pub fn storage(&self) -> ColumnType {
        match (self.logical_type, self.is_scaled) {
            (LogicalType::Numeric, false) => ColumnType::Integer,
            (LogicalType::Numeric, true) => ColumnType::Float,
            (LogicalType::Date, _) => ColumnType::Date,
            (LogicalType::String, _) => ColumnType::String,
        }
    }
}

/// Ordered column list; `columns[0]` is the synthetic row-marker column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(declared: Vec<ColumnSpec>) -> Self {
        let mut columns = Vec::with_capacity(declared.len() + 1);
        columns.push(ColumnSpec::dropped());
        columns.extend(declared);
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn declared(&self) -> &[ColumnSpec] {
        self.columns.get(1..).unwrap_or_default()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .columns
            .iter()
            .map(|c| format!("{}:{}", c.name, c.storage()))
            .join(", ");
        write!(f, "[{rendered}]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    pub name: String,
    pub secondary: String,
    pub schema: Schema,
}

impl TableHeader {
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.name, &self.secondary)
    }
}

pub fn qualified_name(name: &str, secondary: &str) -> String {
    format!("{name} {secondary}")
}

/// Parses a section's fixed-width header block.
pub fn extract_header(header_text: &str) -> Result<TableHeader> {
    let mut lines = header_text.lines().filter(|line| !line.trim().is_empty());
    let identity = lines.next().ok_or_else(|| PipeError::MalformedHeader {
        reason: "header block has no table identity line".to_string(),
    })?;
    let name = fixed_field(identity, INDEX_RANGE);
    let secondary = fixed_field(identity, NAME_RANGE);

    let declared = lines
        .map(|line| {
            let logical_type = LogicalType::from_code(&fixed_field(line, TYPE_RANGE));
            ColumnSpec::new(
                fixed_field(line, NAME_RANGE),
                logical_type,
                is_scaled(&fixed_field(line, SCALE_RANGE)),
            )
        })
        .collect();

    Ok(TableHeader {
        name,
        secondary,
        schema: Schema::new(declared),
    })
}

fn fixed_field(line: &str, range: Range<usize>) -> String {
    line.chars()
        .skip(range.start)
        .take(range.end - range.start)
        .collect::<String>()
        .trim()
        .to_string()
}

// A scale flag of zero (in any zero-padded spelling) means whole numbers.
fn is_scaled(flag: &str) -> bool {
    !matches!(flag.parse::<i64>(), Ok(0))
}

/// Schema of one registry table, as written by the `schema` command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    pub key: String,
    pub name: String,
    pub qualified_name: String,
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaCatalog {
    pub tables: Vec<TableSchema>,
}

impl SchemaCatalog {
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing schema catalog to YAML string")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing schema YAML")
    }
}
