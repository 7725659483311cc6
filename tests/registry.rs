use std::collections::BTreeSet;

use pipefile::data::Table;
use pipefile::error::PipeError;
use pipefile::registry::{TableRecord, TableRegistry, resolve_keys};
use pipefile::schema::Schema;
use proptest::prelude::*;

fn record(file: &str, name: &str, secondary: &str, rows: usize) -> TableRecord {
    let qualified = format!("{name} {secondary}");
    TableRecord {
        file_name: file.to_string(),
        name: name.to_string(),
        qualified_name: qualified.clone(),
        table: Some(Table::new(
            name,
            qualified,
            Schema::new(Vec::new()),
            vec![Vec::new(); rows],
        )),
    }
}

#[test]
fn shared_short_names_are_keyed_by_qualified_name() {
    let registry = TableRegistry::register(vec![
        record("f1", "A", "one", 1),
        record("f2", "A", "two", 2),
        record("f3", "B", "three", 3),
    ])
    .unwrap();
    let keys: Vec<&str> = registry.keys().collect();
    assert_eq!(keys, vec!["A one", "A two", "B"]);
    assert_eq!(registry.get("A two").unwrap().row_count(), 2);
    assert!(registry.get("A").is_none());
}

#[test]
fn unique_short_names_are_kept() {
    let registry =
        TableRegistry::register(vec![record("f1", "A", "one", 0), record("f1", "B", "two", 0)])
            .unwrap();
    assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["A", "B"]);
}

#[test]
fn duplicate_qualified_names_list_every_colliding_entry() {
    let err = TableRegistry::register(vec![
        record("daily.txt", "SECURITY", "DAILY", 4),
        record("other.txt", "PRICE", "EOD", 1),
        record("copy.txt", "SECURITY", "DAILY", 7),
    ])
    .unwrap_err();
    let Some(PipeError::DuplicateTables { entries }) = err.downcast_ref::<PipeError>() else {
        panic!("unexpected error {err:?}");
    };
    let described: Vec<(&str, usize)> = entries.iter().map(|e| (e.file.as_str(), e.rows)).collect();
    assert_eq!(described, vec![("daily.txt", 4), ("copy.txt", 7)]);

    let message = err.to_string();
    assert!(message.starts_with("Duplicate tables\n"));
    assert!(message.contains("(\"daily.txt\", \"SECURITY\", \"SECURITY DAILY\", 4)"));
}

#[test]
fn empty_input_gives_empty_registry() {
    let registry = TableRegistry::register(Vec::new()).unwrap();
    assert!(registry.is_empty());
}

fn records_strategy() -> impl Strategy<Value = Vec<TableRecord>> {
    prop::collection::btree_set(("[A-D]", "[a-z]{1,3}"), 0..10).prop_map(|pairs| {
        pairs
            .into_iter()
            .enumerate()
            .map(|(idx, (name, secondary))| record(&format!("f{idx}"), &name, &secondary, idx))
            .collect()
    })
}

proptest! {
    #[test]
    fn keys_are_unique_and_cover_every_table(records in records_strategy()) {
        let keys = resolve_keys(&records);
        prop_assert_eq!(keys.len(), records.len());
        for (key, record) in keys.iter().zip(&records) {
            let shared = records.iter().filter(|r| r.name == record.name).count() > 1;
            if shared {
                prop_assert_eq!(key, &record.qualified_name);
            } else {
                prop_assert_eq!(key, &record.name);
            }
        }

        let registry = TableRegistry::register(records.clone()).unwrap();
        prop_assert_eq!(registry.len(), records.len());
        let unique: BTreeSet<&String> = keys.iter().collect();
        prop_assert_eq!(unique.len(), keys.len());
    }
}
