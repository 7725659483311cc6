//! Splits one pipe file into its table sections.
//!
//! Each table ends with an `#EOD` line followed by a `*` line. Inside a table
//! the `*` lines separate a preamble, the fixed-width header block, and the
//! pipe-delimited body.

use std::sync::LazyLock;

use anyhow::Result;
use log::debug;
use regex::Regex;

use crate::error::PipeError;

pub const PREVIEW_CHARS: usize = 200;

// Markers are whole lines; a cell that merely ends in `*` is data.
static END_OF_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^#EOD\n\*(?:\n|\z)").expect("end-of-table pattern is valid")
});
static SECTION_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\*(?:\n|\z)").expect("section separator pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSection<'a> {
    /// Full section text, used for diagnostics.
    pub text: &'a str,
    pub preamble: &'a str,
    pub header: &'a str,
    pub body: &'a str,
}

impl<'a> RawSection<'a> {
    pub fn parse(file_name: &str, text: &'a str) -> Result<Self> {
        let pieces: Vec<&str> = SECTION_SEPARATOR.split(text).collect();
        match pieces.as_slice() {
            [preamble, header, body] => Ok(Self {
                text,
                preamble: *preamble,
                header: *header,
                body: *body,
            }),
            _ => Err(PipeError::MalformedSection {
                file: file_name.to_string(),
                pieces: pieces.len(),
                preview: preview(text),
            }
            .into()),
        }
    }

    pub fn preview(&self) -> String {
        preview(self.text)
    }
}

/// Leading slice of `text`, bounded to [`PREVIEW_CHARS`] characters.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Splits file text into sections in file order. Whatever follows the last
/// end-of-table marker is not a table and is discarded.
pub fn split_sections<'a>(file_name: &str, text: &'a str) -> Result<Vec<RawSection<'a>>> {
    let mut pieces: Vec<&str> = END_OF_TABLE.split(text).collect();
    if let Some(rest) = pieces.pop() {
        if !rest.trim().is_empty() {
            debug!(
                "Ignoring {} trailing character(s) after the last table in {file_name}",
                rest.len()
            );
        }
    }
    pieces
        .into_iter()
        .map(|section| RawSection::parse(file_name, section))
        .collect()
}
