//! Fail-fast error taxonomy.
//!
//! Public functions return [`anyhow::Result`]; when a failure belongs to one of
//! the classes below the root cause is a [`PipeError`], so callers can
//! `downcast_ref::<PipeError>()` to tell vendor data problems from I/O faults.

use std::fmt;

use thiserror::Error;

/// One `(file, name, qualified name, row count)` tuple of a naming collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub file: String,
    pub name: String,
    pub qualified_name: String,
    pub rows: usize,
}

impl fmt::Display for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:?}, {:?}, {:?}, {})",
            self.file, self.name, self.qualified_name, self.rows
        )
    }
}

#[derive(Debug, Error)]
pub enum PipeError {
    #[error(
        "Malformed section in {file}: expected 3 '*' delimited pieces, found {pieces}\n{preview}"
    )]
    MalformedSection {
        file: String,
        pieces: usize,
        preview: String,
    },

    #[error("Malformed header block: {reason}")]
    MalformedHeader { reason: String },

    #[error(
        "Failed to parse table '{table}' in {file} at body line {line}, column '{column}': {reason}\nsection:\n{preview}\nschema: {schema}"
    )]
    BodyParse {
        file: String,
        table: String,
        line: usize,
        column: String,
        reason: String,
        preview: String,
        schema: String,
    },

    #[error("Malformed adjustment events for {security}: {reason}")]
    MalformedEvents { security: String, reason: String },

    #[error("Additive adjustments are not supported for {security}\n{rows}")]
    UnsupportedAdjustment { security: String, rows: String },

    #[error("Duplicate tables\n{}", render_entries(.entries))]
    DuplicateTables { entries: Vec<TableEntry> },
}

fn render_entries(entries: &[TableEntry]) -> String {
    entries
        .iter()
        .map(TableEntry::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_tables_lists_every_entry() {
        let err = PipeError::DuplicateTables {
            entries: vec![
                TableEntry {
                    file: "a.txt".into(),
                    name: "SEC".into(),
                    qualified_name: "SEC DAILY".into(),
                    rows: 2,
                },
                TableEntry {
                    file: "b.txt".into(),
                    name: "SEC".into(),
                    qualified_name: "SEC DAILY".into(),
                    rows: 5,
                },
            ],
        };
        let message = err.to_string();
        assert!(message.starts_with("Duplicate tables\n"));
        assert!(message.contains("(\"a.txt\", \"SEC\", \"SEC DAILY\", 2)"));
        assert!(message.contains("(\"b.txt\", \"SEC\", \"SEC DAILY\", 5)"));
    }
}
