//! sei-andamento: track the progress of public-procurement processes on a
//! SEI public-consultation portal.
//!
//! This library fetches a process page, extracts its current progress step,
//! the staleness flag and the latest protocol entry, and keeps the results
//! in a local SQLite store.

pub mod api;
pub mod batch;
pub mod config;
pub mod date;
pub mod db;
pub mod decode;
pub mod fetch;
pub mod format;
pub mod model;
pub mod parse;

pub use api::lookup;

use anyhow::{bail, Context, Result};
use batch::{BatchItem, BatchOutcome, Cancellation};
use config::{BatchConfig, FetchConfig};
use model::{LookupResponse, ObraUpdate, UpdateSummary};
use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::warn;

/// Fetch a portal page and extract its progress status
pub async fn lookup_url(url: &str, config: &FetchConfig) -> Result<LookupResponse> {
    let fetcher = fetch::HttpFetcher::new(config)?;
    Ok(api::lookup(&fetcher, url).await)
}

/// Extract from a page saved to disk
pub fn parse_page(bytes: &[u8]) -> LookupResponse {
    api::respond(&decode::extract_document(bytes))
}

/// `{updates: [...]}` for a found response, ready for [`import_updates`]
pub fn as_update_batch(obra_id: &str, response: &LookupResponse) -> Result<Value> {
    let Some(body) = response.found_body() else {
        bail!("no progress step found, nothing to import");
    };
    let update = ObraUpdate::from_found(obra_id, body);
    Ok(json!({ "updates": [update] }))
}

/// Apply a `{updates: [...]}` document to the store
pub fn import_updates(conn: &Connection, document: &Value) -> Result<UpdateSummary> {
    let updates = document
        .get("updates")
        .and_then(Value::as_array)
        .context("expected a JSON object with an `updates` array")?;
    db::write::apply_updates(conn, updates)
}

/// Refresh every tracked item and store the found results.
/// Items that fail or are not found keep their previous values.
pub async fn refresh_tracked(
    conn: &Connection,
    fetch_config: &FetchConfig,
    batch_config: &BatchConfig,
    cancel: &mut Cancellation,
) -> Result<Vec<BatchOutcome>> {
    let items: Vec<BatchItem> = db::queries::list_tracked(conn)?
        .into_iter()
        .map(|(obra_id, url)| BatchItem::new(obra_id, url))
        .collect();

    let fetcher = fetch::HttpFetcher::new(fetch_config)?;
    let outcomes = batch::refresh_all(&fetcher, &items, batch_config, cancel).await;
    persist_outcomes(conn, &outcomes)?;

    Ok(outcomes)
}

/// Store the found outcomes of a refresh
pub fn persist_outcomes(conn: &Connection, outcomes: &[BatchOutcome]) -> Result<usize> {
    let mut stored = 0;
    for outcome in outcomes {
        let Some(body) = outcome.response.found_body() else {
            continue;
        };
        let update = ObraUpdate::from_found(&outcome.obra_id, body);
        match db::write::apply_update(conn, &update)? {
            db::write::UpdateOutcome::Updated => stored += 1,
            other => warn!(obra = %outcome.obra_id, outcome = ?other, "refresh result not stored"),
        }
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROCESSO: &[u8] = include_bytes!("parse/fixtures/processo.html");

    #[test]
    fn test_parse_page_and_import_round_trip() {
        let conn = db::open_test_db().unwrap();
        db::write::track_obra(&conn, "obra-1", "https://sei.example.gov.br/p").unwrap();

        let response = parse_page(PROCESSO);
        let document = as_update_batch("obra-1", &response).unwrap();
        assert_eq!(document["updates"][0]["obraId"], "obra-1");

        let summary = import_updates(&conn, &document).unwrap();
        assert_eq!(summary.updated, 1);
        assert!(summary.errors.is_empty());

        let stored = db::queries::get_obra(&conn, "obra-1").unwrap().unwrap();
        assert_eq!(
            stored.sei_ultimo_andamento.as_deref(),
            Some("SEINFRA-DOP | Processo recebido na unidade")
        );
        assert_eq!(
            stored.sei_ultimo_andamento_data.as_deref(),
            Some("2026-01-10T12:00:00Z")
        );
        assert!(stored.sei_alerta_andamento_desatualizado);
        assert_eq!(stored.sei_ultimo_status.as_deref(), Some("Empenho"));
    }

    #[test]
    fn test_as_update_batch_requires_found() {
        let response = parse_page(b"<html><body></body></html>");
        assert!(as_update_batch("obra-1", &response).is_err());
    }

    #[test]
    fn test_import_requires_updates_array() {
        let conn = db::open_test_db().unwrap();
        assert!(import_updates(&conn, &json!({ "url": "x" })).is_err());
    }

    #[test]
    fn test_persist_outcomes_skips_misses() {
        let conn = db::open_test_db().unwrap();
        db::write::track_obra(&conn, "a", "https://x/a").unwrap();

        let outcomes = vec![
            BatchOutcome {
                obra_id: "a".to_string(),
                url: "https://x/a".to_string(),
                response: parse_page(PROCESSO),
            },
            BatchOutcome {
                obra_id: "b".to_string(),
                url: "https://x/b".to_string(),
                response: parse_page(b"<html></html>"),
            },
        ];
        assert_eq!(persist_outcomes(&conn, &outcomes).unwrap(), 1);
        let stored = db::queries::get_obra(&conn, "a").unwrap().unwrap();
        assert!(stored.sei_alerta_andamento_desatualizado);
        assert!(!stored.todos_andamentos_concluidos);
    }
}
