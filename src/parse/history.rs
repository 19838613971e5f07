//! Open-step lookup and staleness detection over the history table.

use super::cells::{progress_step, split_cells};
use super::rows::{find_rows, RowStrategy, CONCLUDED_STEP, FULL_CHAIN, LOOKUP_CHAIN, OPEN_STEP};
use super::table::{locate_table, HISTORY_TABLE};
use crate::model::{ProgressStep, StepRole};
use scraper::{ElementRef, Html};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryOutcome {
    pub current: Option<ProgressStep>,
    pub stale_trigger: Option<ProgressStep>,
    pub all_concluded: bool,
}

pub fn find_progress(document: &Html) -> HistoryOutcome {
    let table = locate_table(document, &HISTORY_TABLE).map(|(table, by)| {
        debug!(located_by = ?by, "history table located");
        table
    });

    let Some(open) = find_rows(document, table, &OPEN_STEP, FULL_CHAIN) else {
        debug!("no history rows");
        return HistoryOutcome::default();
    };

    if open.strategy == RowStrategy::Substitute {
        let concluded = steps(&open.rows, StepRole::Concluded);
        let current = most_recent(&concluded).cloned();
        return HistoryOutcome {
            all_concluded: current.is_some(),
            current,
            stale_trigger: None,
        };
    }

    let Some(current) = open
        .rows
        .iter()
        .rev()
        .find_map(|row| progress_step(&split_cells(row), StepRole::Open))
    else {
        return HistoryOutcome::default();
    };

    let concluded = find_rows(document, table, &CONCLUDED_STEP, LOOKUP_CHAIN)
        .map(|found| steps(&found.rows, StepRole::Concluded))
        .unwrap_or_default();
    let stale_trigger = detect_staleness(&current, &concluded).cloned();

    HistoryOutcome {
        current: Some(current),
        stale_trigger,
        all_concluded: false,
    }
}

/// The concluded step with the latest timestamp strictly after the open
/// step, if any. Steps without a parsed timestamp are not compared.
pub fn detect_staleness<'a>(
    open: &ProgressStep,
    concluded: &'a [ProgressStep],
) -> Option<&'a ProgressStep> {
    let opened_at = open.timestamp.utc?;
    concluded
        .iter()
        .filter(|step| step.timestamp.utc.is_some_and(|at| at > opened_at))
        .max_by_key(|step| step.timestamp.utc)
}

/// Latest by timestamp; falls back to the last row when nothing parsed
fn most_recent(steps: &[ProgressStep]) -> Option<&ProgressStep> {
    steps
        .iter()
        .filter(|step| step.timestamp.utc.is_some())
        .max_by_key(|step| step.timestamp.utc)
        .or_else(|| steps.last())
}

fn steps(rows: &[ElementRef], role: StepRole) -> Vec<ProgressStep> {
    rows.iter()
        .filter_map(|row| progress_step(&split_cells(row), role))
        .collect()
}
