//! Row lookup by CSS marker.
//!
//! History and protocol rows are recognised by the class names the portal
//! uses for row shading. Lookup runs an ordered chain of strategies, each
//! looser than the previous one, and stops at the first that matches.

use super::table::enclosing_table;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("static selector"));

/// Class names identifying a kind of row
#[derive(Debug, Clone, Copy)]
pub struct RowMarker {
    pub names: &'static [&'static str],
    /// Marker to fall back to when no row of this kind exists at all
    pub substitute: Option<&'static RowMarker>,
}

pub const CONCLUDED_STEP: RowMarker = RowMarker {
    names: &["andamentoConcluido"],
    substitute: None,
};

pub const OPEN_STEP: RowMarker = RowMarker {
    names: &["andamentoAberto"],
    substitute: Some(&CONCLUDED_STEP),
};

/// Alternating light/dark rows of the protocol list
pub const PROTOCOL_ROW: RowMarker = RowMarker {
    names: &["infraTrClara", "infraTrEscura"],
    substitute: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStrategy {
    /// The table's own rows carrying the marker as a class token
    Primary,
    /// Any row under the table whose attributes mention the marker
    Relaxed,
    /// Relaxed match over every row of the document
    WholeDocument,
    /// Rows of the marker's substitute, found with the other strategies
    Substitute,
}

/// Strategies that look for the marker itself
pub const LOOKUP_CHAIN: &[RowStrategy] = &[
    RowStrategy::Primary,
    RowStrategy::Relaxed,
    RowStrategy::WholeDocument,
];

pub const FULL_CHAIN: &[RowStrategy] = &[
    RowStrategy::Primary,
    RowStrategy::Relaxed,
    RowStrategy::WholeDocument,
    RowStrategy::Substitute,
];

impl RowStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStrategy::Primary => "primary",
            RowStrategy::Relaxed => "relaxed",
            RowStrategy::WholeDocument => "whole-document",
            RowStrategy::Substitute => "substitute",
        }
    }

    /// All rows this strategy accepts, in document order
    pub fn collect<'a>(
        &self,
        document: &'a Html,
        table: Option<ElementRef<'a>>,
        marker: &RowMarker,
    ) -> Vec<ElementRef<'a>> {
        match self {
            RowStrategy::Primary => table
                .map(|table| {
                    table
                        .select(&ROW)
                        .filter(|row| enclosing_table(row) == Some(table))
                        .filter(|row| has_class_token(row, marker))
                        .collect()
                })
                .unwrap_or_default(),
            RowStrategy::Relaxed => table
                .map(|table| {
                    table
                        .select(&ROW)
                        .filter(|row| mentions_marker(row, marker))
                        .collect()
                })
                .unwrap_or_default(),
            RowStrategy::WholeDocument => document
                .select(&ROW)
                .filter(|row| mentions_marker(row, marker))
                .collect(),
            RowStrategy::Substitute => marker
                .substitute
                .and_then(|substitute| find_rows(document, table, substitute, LOOKUP_CHAIN))
                .map(|found| found.rows)
                .unwrap_or_default(),
        }
    }
}

/// Rows found by the first successful strategy
#[derive(Debug, Clone)]
pub struct RowMatch<'a> {
    pub rows: Vec<ElementRef<'a>>,
    pub strategy: RowStrategy,
}

impl<'a> RowMatch<'a> {
    /// Last match by document position. The portal appends new entries at
    /// the bottom.
    pub fn last(&self) -> Option<ElementRef<'a>> {
        self.rows.last().copied()
    }
}

/// Run `chain` in order and return the first non-empty match
pub fn find_rows<'a>(
    document: &'a Html,
    table: Option<ElementRef<'a>>,
    marker: &RowMarker,
    chain: &[RowStrategy],
) -> Option<RowMatch<'a>> {
    chain.iter().find_map(|strategy| {
        let rows = strategy.collect(document, table, marker);
        if rows.is_empty() {
            return None;
        }
        debug!(
            marker = marker.names[0],
            strategy = strategy.as_str(),
            rows = rows.len(),
            "rows matched"
        );
        Some(RowMatch {
            rows,
            strategy: *strategy,
        })
    })
}

/// Last row for `marker` using the full chain
pub fn find_last_row<'a>(
    document: &'a Html,
    table: Option<ElementRef<'a>>,
    marker: &RowMarker,
) -> Option<(ElementRef<'a>, RowStrategy)> {
    let found = find_rows(document, table, marker, FULL_CHAIN)?;
    found.last().map(|row| (row, found.strategy))
}

fn has_class_token(row: &ElementRef, marker: &RowMarker) -> bool {
    row.value().classes().any(|class| {
        marker
            .names
            .iter()
            .any(|name| class.eq_ignore_ascii_case(name))
    })
}

fn mentions_marker(row: &ElementRef, marker: &RowMarker) -> bool {
    row.value().attrs().any(|(_, value)| {
        let value = squash(value);
        marker.names.iter().any(|name| value.contains(&squash(name)))
    })
}

/// Drop whitespace and lowercase, so `andamento Aberto` matches `andamentoAberto`
fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::table::{locate_table, HISTORY_TABLE};

    fn first_cell(row: &ElementRef) -> String {
        let td = Selector::parse("td").unwrap();
        row.select(&td)
            .next()
            .map(|cell| cell.text().collect::<String>())
            .unwrap_or_default()
    }

    fn history(document: &Html) -> Option<ElementRef<'_>> {
        locate_table(document, &HISTORY_TABLE).map(|(table, _)| table)
    }

    #[test]
    fn test_primary_takes_last_match() {
        let html = r#"
            <table id="tblHistorico">
              <tr class="infraTrClara andamentoAberto"><td>first</td></tr>
              <tr class="andamentoConcluido"><td>done</td></tr>
              <tr class="andamentoAberto infraTrEscura"><td>second</td></tr>
            </table>
        "#;
        let document = Html::parse_document(html);
        let (row, strategy) = find_last_row(&document, history(&document), &OPEN_STEP).unwrap();
        assert_eq!(strategy, RowStrategy::Primary);
        assert_eq!(first_cell(&row), "second");
    }

    #[test]
    fn test_primary_ignores_rows_of_nested_tables() {
        let html = r#"
            <table id="tblHistorico">
              <tr class="andamentoAberto"><td>outer</td><td>
                <table><tr class="andamentoAberto"><td>nested</td></tr></table>
              </td></tr>
            </table>
        "#;
        let document = Html::parse_document(html);
        let found = find_rows(&document, history(&document), &OPEN_STEP, LOOKUP_CHAIN).unwrap();
        assert_eq!(found.strategy, RowStrategy::Primary);
        assert_eq!(found.rows.len(), 1);
        assert_eq!(first_cell(&found.rows[0]), "outer");
    }

    #[test]
    fn test_relaxed_matches_spaced_class() {
        let html = r#"
            <table id="tblHistorico">
              <tr class='andamento Aberto'><td>spaced</td></tr>
            </table>
        "#;
        let document = Html::parse_document(html);
        let (row, strategy) = find_last_row(&document, history(&document), &OPEN_STEP).unwrap();
        assert_eq!(strategy, RowStrategy::Relaxed);
        assert_eq!(first_cell(&row), "spaced");
    }

    #[test]
    fn test_whole_document_when_table_missing() {
        let html = r#"
            <div><table><tr class="andamentoAberto"><td>loose</td></tr></table></div>
        "#;
        let document = Html::parse_document(html);
        assert!(history(&document).is_none());
        let (row, strategy) = find_last_row(&document, None, &OPEN_STEP).unwrap();
        assert_eq!(strategy, RowStrategy::WholeDocument);
        assert_eq!(first_cell(&row), "loose");
    }

    #[test]
    fn test_whole_document_when_located_table_has_no_marker() {
        let html = r#"
            <table id="tblHistorico"><tr><td>header only</td></tr></table>
            <table><tr class="andamentoAberto"><td>elsewhere</td></tr></table>
        "#;
        let document = Html::parse_document(html);
        let (row, strategy) = find_last_row(&document, history(&document), &OPEN_STEP).unwrap();
        assert_eq!(strategy, RowStrategy::WholeDocument);
        assert_eq!(first_cell(&row), "elsewhere");
    }

    #[test]
    fn test_substitute_when_nothing_open() {
        let html = r#"
            <table id="tblHistorico">
              <tr class="andamentoConcluido"><td>a</td></tr>
              <tr class="andamentoConcluido"><td>b</td></tr>
            </table>
        "#;
        let document = Html::parse_document(html);
        let found = find_rows(&document, history(&document), &OPEN_STEP, FULL_CHAIN).unwrap();
        assert_eq!(found.strategy, RowStrategy::Substitute);
        assert_eq!(found.rows.len(), 2);
    }

    #[test]
    fn test_no_substitute_for_protocol_rows() {
        let document = Html::parse_document("<table><tr><td>plain</td></tr></table>");
        assert!(find_rows(&document, None, &PROTOCOL_ROW, FULL_CHAIN).is_none());
    }

    #[test]
    fn test_alternating_markers_both_match() {
        let html = r#"
            <table id="tblDocumentos">
              <tr class="infraTrClara"><td>1</td></tr>
              <tr class="infraTrEscura"><td>2</td></tr>
              <tr class="infraTrClara"><td>3</td></tr>
            </table>
        "#;
        let document = Html::parse_document(html);
        let table = document
            .select(&Selector::parse("table").unwrap())
            .next();
        let found = find_rows(&document, table, &PROTOCOL_ROW, LOOKUP_CHAIN).unwrap();
        assert_eq!(found.rows.len(), 3);
        assert_eq!(first_cell(&found.last().unwrap()), "3");
    }
}
