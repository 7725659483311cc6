#![allow(dead_code)]

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Packs `members` into a zip under the workspace and returns its path.
    pub fn write_zip(&self, name: &str, members: &[(&str, &str)]) -> PathBuf {
        self.write_bytes(name, &zip_bytes(members))
    }
}

pub fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options: FileOptions<'_, ()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, content) in members {
            zip.start_file(*name, options).expect("start zip member");
            zip.write_all(content.as_bytes()).expect("write zip member");
        }
        zip.finish().expect("finish zip");
    }
    buf
}

/// One fixed-width header line: index at 5, name at 39, type code at 70,
/// scale flag at 76.
pub fn header_line(index: &str, name: &str, code: &str, scale: &str) -> String {
    format!("     {index:<34}{name:<31}{code:<6}{scale}")
}

/// Builds one complete table section, terminated by the end-of-table marker.
///
/// `columns` holds `(name, type code, scale flag)` triples; `rows` are raw body
/// lines including the leading row marker.
pub fn section(
    name: &str,
    secondary: &str,
    columns: &[(&str, &str, &str)],
    rows: &[&str],
) -> String {
    let mut text = String::from("VENDOR FEED\nGENERATED 20240102\n*\n");
    text.push_str(&header_line(name, secondary, "", ""));
    text.push('\n');
    for (idx, (column, code, scale)) in columns.iter().enumerate() {
        text.push_str(&header_line(&(idx + 1).to_string(), column, code, scale));
        text.push('\n');
    }
    text.push_str("*\n");
    let names: Vec<&str> = columns.iter().map(|(column, _, _)| *column).collect();
    text.push_str(&format!("#|{}\n", names.join("|")));
    text.push_str(&format!("-|{}\n", vec!["-"; columns.len()].join("|")));
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text.push_str("#EOD\n*\n");
    text
}

pub const SECURITY_COLUMNS: &[(&str, &str, &str)] = &[
    ("Security Id", "S", ""),
    ("Shares Outstanding", "N", "0"),
    ("Close Price", "N", "4"),
    ("Price Date", "D", ""),
];

pub fn security_section(secondary: &str) -> String {
    section(
        "SECURITY",
        secondary,
        SECURITY_COLUMNS,
        &[
            "1 | AAA | 1000 | 12.5 | 20240102",
            "2 | BBB | NULL | | 20240103",
            "3|CCC|250|0.0001|NULL",
        ],
    )
}

pub const ADJUSTMENT_COLUMNS: &[(&str, &str, &str)] = &[
    ("Security Id", "S", ""),
    ("Adjustment Date", "D", ""),
    ("Adjustment Factor", "N", "6"),
    ("Adjustment Factor Operator Type", "N", "0"),
    ("Adjustment Factor Flag", "N", "0"),
];

pub fn adjustment_section(rows: &[&str]) -> String {
    section("ADJUSTMENT", "CORPORATE ACTIONS", ADJUSTMENT_COLUMNS, rows)
}
