//! Human-readable and JSON rendering of analysis results

use crate::error::Result;
use crate::types::{AnalysisReport, AuthorStatistic, RetainedRecord};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::{Deserialize, Serialize};

/// Printed instead of a table when nothing was retained
pub const NO_DATA_MESSAGE: &str = "No data: no files with author metadata were found.";

/// Output format of the command line tool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Bordered text table
    #[default]
    Table,
    /// Pretty-printed JSON of the whole report
    Json,
}

/// Render a report in the requested format
///
/// `details` adds the per-file table to text output; JSON always includes it.
pub fn render_report(
    report: &AnalysisReport,
    format: OutputFormat,
    details: bool,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            if report.is_empty() {
                return Ok(NO_DATA_MESSAGE.to_string());
            }
            let mut out = String::from("Author Statistics:\n");
            out.push_str(&render_statistics_table(&report.statistics));
            if details {
                out.push_str("\n\nFiles:\n");
                out.push_str(&render_records_table(&report.records));
            }
            Ok(out)
        }
    }
}

/// Two-column `Author | Count` table, counts right-aligned
pub fn render_statistics_table(statistics: &[AuthorStatistic]) -> String {
    let mut table = new_table(&["Author", "Count"]);
    for stat in statistics {
        table.add_row(vec![Cell::new(&stat.author), Cell::new(stat.count)]);
    }
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    table.to_string()
}

/// Per-file `Author | File | Creation Date` table
pub fn render_records_table(records: &[RetainedRecord]) -> String {
    let mut table = new_table(&["Author", "File", "Creation Date"]);
    for record in records {
        table.add_row(vec![&record.author, &record.file, &record.creation_date]);
    }
    table.to_string()
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(Cell::new).collect::<Vec<_>>());
    table
}
