use super::cells::{classify_status, split_cells};
use super::rows::{find_rows, LOOKUP_CHAIN, PROTOCOL_ROW};
use super::table::{locate_table, PROTOCOL_TABLE};
use crate::model::StatusRecord;
use scraper::Html;
use tracing::debug;

/// Latest protocol status: the last shaded row of the protocol list that
/// yields a status or a date
pub fn find_latest_status(document: &Html) -> Option<StatusRecord> {
    let table = locate_table(document, &PROTOCOL_TABLE).map(|(table, by)| {
        debug!(located_by = ?by, "protocol table located");
        table
    });

    let found = find_rows(document, table, &PROTOCOL_ROW, LOOKUP_CHAIN)?;
    found.rows.iter().rev().find_map(|row| {
        let record = classify_status(&split_cells(row));
        (!record.is_empty()).then_some(record)
    })
}
