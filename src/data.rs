//! Typed cell values and the in-memory [`Table`] container.
//!
//! Every table produced by the body parser or the adjustment calculator is a
//! [`Table`]: a schema (whose first column is the synthetic row-marker column)
//! plus rows of optional [`Value`] cells aligned with the declared columns.

use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schema::{ColumnSpec, ColumnType, Schema};

/// Tokens the vendor uses for an absent cell. Nothing else counts as missing.
pub const MISSING_TOKENS: &[&str] = &["NULL", ""];

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Numeric view of the cell; text is accepted when it parses as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse().ok(),
            Value::Date(_) => None,
        }
    }

    /// Integral view of the cell. Floats must carry no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Float(_) => None,
            Value::String(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| match trimmed.parse::<f64>() {
                        Ok(f) if f.fract() == 0.0 => Some(f as i64),
                        _ => None,
                    })
            }
            Value::Date(_) => None,
        }
    }

    /// Calendar date view: typed dates, `YYYYMMDD` integers, or date text.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Integer(i) => parse_pipe_date(&i.to_string()).ok(),
            Value::String(s) => parse_naive_date(s.trim()).ok(),
            Value::Float(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn is_missing_token(value: &str) -> bool {
    MISSING_TOKENS.contains(&value)
}

/// Parses the vendor's 8-digit `YYYYMMDD` date literal.
pub fn parse_pipe_date(value: &str) -> Result<NaiveDate> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        bail!("Failed to parse '{value}' as YYYYMMDD date");
    }
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .with_context(|| format!("Failed to parse '{value}' as YYYYMMDD date"))
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    if let Ok(parsed) = parse_pipe_date(value) {
        return Ok(parsed);
    }
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Result<Option<Value>> {
    if is_missing_token(value) {
        return Ok(None);
    }
    let parsed = match ty {
        ColumnType::String => Value::String(value.to_string()),
        ColumnType::Integer => {
            let parsed: i64 = value
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as integer"))?;
            Value::Integer(parsed)
        }
        ColumnType::Float => {
            let parsed: f64 = value
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as float"))?;
            Value::Float(parsed)
        }
        ColumnType::Date => Value::Date(parse_pipe_date(value)?),
    };
    Ok(Some(parsed))
}

/// A typed rectangular table.
///
/// `schema.columns[0]` is always the synthetic row-marker column; each row holds
/// one cell per declared column, i.e. `schema.declared()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub qualified_name: String,
    pub schema: Schema,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        schema: Schema,
        rows: Vec<Row>,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            schema,
            rows,
        }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        self.schema.declared()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns().iter().position(|c| c.name == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    /// Cells of one column, top to bottom. `None` when the column is unknown.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&Value>>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).and_then(|cell| cell.as_ref()))
                .collect(),
        )
    }

    /// Rows rendered as text, absent cells as the empty string.
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}
