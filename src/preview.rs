use anyhow::Result;
use log::info;

use crate::{
    cli::PreviewArgs,
    table::{self, RenderOptions},
};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let registry = crate::load_registry(&args.ingest)?;
    let selected = crate::lookup(&registry, &args.table)?;
    let headers = selected.headers();
    let rows: Vec<Vec<String>> = selected
        .display_rows()
        .into_iter()
        .take(args.rows)
        .collect();

    let options = RenderOptions {
        column_widths: args.widths.iter().cloned().collect(),
        maximum_column_width: args.max_width,
    };
    table::print_table(&headers, &rows, &options);
    info!(
        "Displayed {} of {} row(s) from '{}'",
        rows.len(),
        selected.row_count(),
        args.table
    );
    Ok(())
}
