//! Collects the tables of one ingestion run under unique keys.
//!
//! A table is keyed by its short name when no other table in the run shares
//! it, otherwise by its qualified name. Resolution is two passes over the
//! same immutable record list: count, then key.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;

use crate::{
    data::Table,
    error::{PipeError, TableEntry},
};

/// Outcome of parsing one section. `table` is `None` when the section was
/// skipped by the table-name filter.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRecord {
    pub file_name: String,
    pub name: String,
    pub qualified_name: String,
    pub table: Option<Table>,
}

impl TableRecord {
    pub fn entry(&self) -> TableEntry {
        TableEntry {
            file: self.file_name.clone(),
            name: self.name.clone(),
            qualified_name: self.qualified_name.clone(),
            rows: self.table.as_ref().map(Table::row_count).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRegistry {
    tables: BTreeMap<String, Table>,
}

impl TableRegistry {
    pub fn register(records: Vec<TableRecord>) -> Result<Self> {
        let parsed: Vec<TableRecord> = records.into_iter().filter(|r| r.table.is_some()).collect();

        let by_qualified: Vec<(&str, &TableRecord)> = parsed
            .iter()
            .map(|r| (r.qualified_name.as_str(), r))
            .collect();
        let duplicates = collisions(&by_qualified);
        if !duplicates.is_empty() {
            return Err(PipeError::DuplicateTables {
                entries: duplicates,
            }
            .into());
        }

        let keys = resolve_keys(&parsed);
        let by_key: Vec<(&str, &TableRecord)> =
            keys.iter().map(String::as_str).zip(parsed.iter()).collect();
        let residual = collisions(&by_key);
        if !residual.is_empty() {
            return Err(PipeError::DuplicateTables { entries: residual }.into());
        }

        let tables = keys
            .into_iter()
            .zip(parsed)
            .filter_map(|(key, record)| record.table.map(|table| (key, table)))
            .collect();
        Ok(Self { tables })
    }

    pub fn get(&self, key: &str) -> Option<&Table> {
        self.tables.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, Table> {
        self.tables
    }
}

/// Key of each record, in record order.
pub fn resolve_keys(records: &[TableRecord]) -> Vec<String> {
    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *name_counts.entry(record.name.as_str()).or_insert(0) += 1;
    }
    records
        .iter()
        .map(|record| {
            if name_counts.get(record.name.as_str()).copied().unwrap_or_default() > 1 {
                record.qualified_name.clone()
            } else {
                record.name.clone()
            }
        })
        .collect()
}

/// Entries of every record whose key is shared with another record.
fn collisions(keyed: &[(&str, &TableRecord)]) -> Vec<TableEntry> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (key, _) in keyed {
        *counts.entry(*key).or_insert(0) += 1;
    }
    keyed
        .iter()
        .filter(|(key, _)| counts.get(key).copied().unwrap_or_default() > 1)
        .map(|(_, record)| record.entry())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn record(file: &str, name: &str, secondary: &str) -> TableRecord {
        let qualified = format!("{name} {secondary}");
        TableRecord {
            file_name: file.to_string(),
            name: name.to_string(),
            qualified_name: qualified.clone(),
            table: Some(Table::new(name, qualified, Schema::new(Vec::new()), Vec::new())),
        }
    }

    #[test]
    fn resolve_keys_qualifies_only_shared_names() {
        let records = vec![
            record("a", "A", "one"),
            record("b", "A", "two"),
            record("c", "B", "three"),
        ];
        assert_eq!(resolve_keys(&records), vec!["A one", "A two", "B"]);
    }

    #[test]
    fn register_drops_placeholders() {
        let mut skipped = record("a", "A", "one");
        skipped.table = None;
        let registry = TableRegistry::register(vec![skipped, record("b", "A", "two")]).unwrap();
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn short_name_equal_to_another_qualified_name_collides() {
        let records = vec![
            record("a", "A", "x"),
            record("b", "A", "y"),
            record("c", "A x", "z"),
        ];
        let err = TableRegistry::register(records).unwrap_err();
        match err.downcast_ref::<PipeError>() {
            Some(PipeError::DuplicateTables { entries }) => {
                let files: Vec<&str> = entries.iter().map(|e| e.file.as_str()).collect();
                assert_eq!(files, vec!["a", "c"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
