use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Per-column layout overrides for [`render_table_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Fixed widths by header name; these win over the auto width and the cap.
    pub column_widths: BTreeMap<String, usize>,
    /// Upper bound for auto-sized columns.
    pub maximum_column_width: Option<usize>,
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    render_table_with(headers, rows, &RenderOptions::default())
}

pub fn render_table_with(
    headers: &[String],
    rows: &[Vec<String>],
    options: &RenderOptions,
) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for (idx, width) in widths.iter_mut().enumerate() {
        if let Some(max) = options.maximum_column_width {
            *width = (*width).min(max);
        }
        if let Some(fixed) = options.column_widths.get(&headers[idx]) {
            *width = *fixed;
        }
        *width = (*width).max(1);
    }

    let mut output = String::new();

    // Header
    let header_line = format_row(headers, &widths);
    let _ = writeln!(output, "{header_line}");

    // Separator
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths);
    let _ = writeln!(output, "{separator_line}");

    // Rows
    for row in rows {
        let row_line = format_row(row, &widths);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>], options: &RenderOptions) {
    let rendered = render_table_with(headers, rows, options);
    print!("{rendered}");
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        let Some(width) = widths.get(idx).copied() else {
            break;
        };
        let sanitized = truncate(sanitize_cell(value), width);
        let display = display_width(sanitized.as_ref());
        let mut cell = sanitized.into_owned();
        let padding = width.saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // Skip ANSI escape sequence (e.g. \x1b[31m)
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

// Cells carrying ANSI escapes are never cut.
fn truncate(value: Cow<'_, str>, width: usize) -> Cow<'_, str> {
    if value.contains('\u{1b}') || display_width(&value) <= width {
        return value;
    }
    let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    Cow::Owned(cut)
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        let mut sanitized = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '\n' | '\r' | '\t' => sanitized.push(' '),
                other => sanitized.push(other),
            }
        }
        Cow::Owned(sanitized)
    } else {
        Cow::Borrowed(value)
    }
}
