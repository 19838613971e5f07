//! Locate a target table inside a parsed page.
//!
//! A table is matched by id first, then by keyword: a `summary` attribute
//! containing the keyword, or the nearest table enclosing a text node that
//! contains it. The located element always spans to its own closing tag,
//! so nested tables never cut it short.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("static selector"));

/// How to find one table: its id, then caption/summary keywords in order
#[derive(Debug, Clone, Copy)]
pub struct TableQuery {
    pub id: &'static str,
    pub keywords: &'static [&'static str],
}

/// Process-history table ("Histórico de Andamentos")
pub const HISTORY_TABLE: TableQuery = TableQuery {
    id: "tblHistorico",
    keywords: &["Histórico de Andamentos", "Andamentos"],
};

/// Protocol list ("Lista de Protocolos")
pub const PROTOCOL_TABLE: TableQuery = TableQuery {
    id: "tblDocumentos",
    keywords: &["Lista de Protocolos", "Protocolos"],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatedBy {
    Id,
    Summary,
    Keyword,
}

/// Find the table described by `query`, or `None`
pub fn locate_table<'a>(
    document: &'a Html,
    query: &TableQuery,
) -> Option<(ElementRef<'a>, LocatedBy)> {
    if let Some(table) = by_id(document, query.id) {
        return Some((table, LocatedBy::Id));
    }

    for keyword in query.keywords {
        if let Some(table) = by_summary(document, keyword) {
            return Some((table, LocatedBy::Summary));
        }
        if let Some(table) = by_keyword_text(document, keyword) {
            return Some((table, LocatedBy::Keyword));
        }
    }

    None
}

fn by_id<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    document.select(&TABLE).find(|table| {
        table
            .value()
            .attr("id")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(id))
    })
}

fn by_summary<'a>(document: &'a Html, keyword: &str) -> Option<ElementRef<'a>> {
    let needle = fold(keyword);
    document.select(&TABLE).find(|table| {
        table
            .value()
            .attr("summary")
            .is_some_and(|summary| fold(summary).contains(&needle))
    })
}

fn by_keyword_text<'a>(document: &'a Html, keyword: &str) -> Option<ElementRef<'a>> {
    let needle = fold(keyword);
    document
        .root_element()
        .descendants()
        .filter(|node| {
            node.value()
                .as_text()
                .is_some_and(|text| fold(text).contains(&needle))
        })
        .find_map(|node| {
            node.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "table")
        })
}

/// Nearest `<table>` strictly enclosing `element`
pub fn enclosing_table<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

/// Lowercase and collapse whitespace for keyword comparison
fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    fn row_texts(table: &ElementRef) -> Vec<String> {
        let tr = Selector::parse("tr").unwrap();
        table
            .select(&tr)
            .map(|row| row.text().collect::<String>().trim().to_string())
            .collect()
    }

    #[test]
    fn test_locate_by_id_spans_past_nested_table() {
        let html = r#"
            <table id="tblHistorico">
              <tr><td>
                <table class="inner"><tr><td>inner row</td></tr></table>
              </td></tr>
              <tr class="andamentoAberto"><td>10/01/2026 09:00</td><td>after nested</td></tr>
            </table>
            <table id="other"><tr><td>unrelated</td></tr></table>
        "#;
        let document = Html::parse_document(html);
        let (table, by) = locate_table(&document, &HISTORY_TABLE).unwrap();

        assert_eq!(by, LocatedBy::Id);
        assert_eq!(table.value().attr("id"), Some("tblHistorico"));
        let rows = row_texts(&table);
        assert!(rows.iter().any(|r| r.contains("after nested")));
        assert!(!rows.iter().any(|r| r.contains("unrelated")));
    }

    #[test]
    fn test_locate_by_summary_keyword() {
        let html = r#"
            <table summary="Tabela de   Histórico de Andamentos do processo">
              <tr><td>row</td></tr>
            </table>
        "#;
        let document = Html::parse_document(html);
        let (table, by) = locate_table(&document, &HISTORY_TABLE).unwrap();
        assert_eq!(by, LocatedBy::Summary);
        assert_eq!(row_texts(&table), vec!["row"]);
    }

    #[test]
    fn test_locate_by_caption_text() {
        let html = r#"
            <table id="layout"><tr><td>
              <table>
                <caption>Lista de Protocolos (2 registros):</caption>
                <tr><td>protocol row</td></tr>
              </table>
            </td></tr></table>
        "#;
        let document = Html::parse_document(html);
        let (table, by) = locate_table(&document, &PROTOCOL_TABLE).unwrap();
        assert_eq!(by, LocatedBy::Keyword);
        // The caption's own table, not the layout table around it
        assert_eq!(table.value().attr("id"), None);
        assert_eq!(row_texts(&table), vec!["protocol row"]);
    }

    #[test]
    fn test_id_wins_over_keywords() {
        let html = r#"
            <table summary="Histórico de Andamentos"><tr><td>by summary</td></tr></table>
            <table id="tblHistorico"><tr><td>by id</td></tr></table>
        "#;
        let document = Html::parse_document(html);
        let (table, by) = locate_table(&document, &HISTORY_TABLE).unwrap();
        assert_eq!(by, LocatedBy::Id);
        assert_eq!(row_texts(&table), vec!["by id"]);
    }

    #[test]
    fn test_not_found() {
        let document = Html::parse_document("<p>Histórico de Andamentos</p><div>nothing</div>");
        assert!(locate_table(&document, &HISTORY_TABLE).is_none());
    }

    #[test]
    fn test_enclosing_table_skips_outer() {
        let html = r#"<table id="outer"><tr><td><table id="inner"><tr id="r"><td>x</td></tr></table></td></tr></table>"#;
        let document = Html::parse_document(html);
        let row = document.select(&Selector::parse("tr#r").unwrap()).next().unwrap();
        let table = enclosing_table(&row).unwrap();
        assert_eq!(table.value().attr("id"), Some("inner"));
    }
}
