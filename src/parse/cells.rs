//! Row → plain-text cells, and status/date classification.

use crate::date::{is_date_shaped, PortalTimestamp};
use crate::model::{ProgressStep, StatusRecord, StepRole};
use scraper::ElementRef;

/// Column of the protocol row that normally holds the status label
pub const STATUS_COLUMN: usize = 2;
/// Column of the protocol row that normally holds the status date
pub const STATUS_DATE_COLUMN: usize = 3;

/// The row's own `<td>`/`<th>` cells as collapsed plain text.
/// Text of nested markup (including nested tables) is kept, tags are not.
pub fn split_cells(row: &ElementRef) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
        .collect()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Status and date of a protocol row.
///
/// Uses the fixed columns when they look right. A date in the status column
/// means the columns shifted; then the first non-date cell is the status and
/// the first date-shaped cell is the date.
pub fn classify_status(cells: &[String]) -> StatusRecord {
    let first_text = || {
        cells
            .iter()
            .find(|cell| !cell.is_empty() && !is_date_shaped(cell))
    };
    let first_date = || cells.iter().find(|cell| is_date_shaped(cell));

    let shifted = cells
        .get(STATUS_COLUMN)
        .is_some_and(|cell| is_date_shaped(cell));

    let (status_text, status_date) = if shifted {
        (first_text(), first_date())
    } else {
        (
            cells
                .get(STATUS_COLUMN)
                .filter(|cell| !cell.is_empty())
                .or_else(first_text),
            cells
                .get(STATUS_DATE_COLUMN)
                .filter(|cell| is_date_shaped(cell))
                .or_else(first_date),
        )
    };

    StatusRecord {
        status_text: status_text.cloned(),
        status_date: status_date.map(|cell| PortalTimestamp::parse(cell)),
    }
}

/// A history row as a progress step: the timestamp cell (first column, or
/// the first date-shaped one) and the remaining text joined with ` | `.
pub fn progress_step(cells: &[String], role: StepRole) -> Option<ProgressStep> {
    if cells.is_empty() {
        return None;
    }

    let date_index = if is_date_shaped(&cells[0]) {
        0
    } else {
        cells.iter().position(|cell| is_date_shaped(cell)).unwrap_or(0)
    };

    let description = cells
        .iter()
        .enumerate()
        .filter(|(i, cell)| *i != date_index && !cell.is_empty())
        .map(|(_, cell)| cell.as_str())
        .collect::<Vec<_>>()
        .join(" | ");

    Some(ProgressStep {
        description: if description.is_empty() {
            role.default_description().to_string()
        } else {
            description
        },
        timestamp: PortalTimestamp::parse(&cells[date_index]),
        role,
    })
}
