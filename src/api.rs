//! Request handling for lookups and batch updates.
//!
//! Transport-agnostic: callers hand in the raw JSON body and whether the
//! caller is authenticated, and get back an HTTP status plus a JSON body.

use crate::db::write;
use crate::decode;
use crate::fetch::{self, FetchError, PageSource};
use crate::model::{
    ErrorBody, ExtractionResult, FailureBody, FoundBody, LookupResponse, NotFoundBody,
};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

pub const MANUAL_HINT: &str = "Use manual extraction: open the link in a browser, save the page \
    (Ctrl+S), run `sei-andamento parse <file>` and import the resulting JSON with \
    `sei-andamento import`.";

pub const NOT_FOUND_MESSAGE: &str = "Could not find the open progress step on the page \
    (Histórico de Andamentos table). The page may be rendered by JavaScript or the portal \
    layout changed.";

/// HTTP status and JSON body to send back
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

fn reply<T: Serialize>(status: u16, body: &T) -> ApiReply {
    match serde_json::to_value(body) {
        Ok(body) => ApiReply { status, body },
        Err(e) => ApiReply {
            status: 500,
            body: json!({ "error": e.to_string() }),
        },
    }
}

/// Fetch `url` and extract its progress status
pub async fn lookup(source: &(dyn PageSource + Send + Sync), url: &str) -> LookupResponse {
    let url = match fetch::normalize_url(url) {
        Ok(url) => url,
        Err(err) => return fetch_failure(&err),
    };

    match source.fetch_page(&url).await {
        Ok(bytes) => {
            let result = decode::extract_document(&bytes);
            info!(
                %url,
                found = result.found(),
                stale = result.stale,
                encoding = result.encoding.as_str(),
                "page extracted"
            );
            respond(&result)
        }
        Err(err) => {
            warn!(%url, error = %err, "fetch failed");
            fetch_failure(&err)
        }
    }
}

/// Shape an extraction into the wire response
pub fn respond(result: &ExtractionResult) -> LookupResponse {
    let Some(step) = &result.current_step else {
        return LookupResponse::NotFound(NotFoundBody {
            found: false,
            error: NOT_FOUND_MESSAGE.to_string(),
        });
    };

    // With nothing open, the effective step is itself the latest concluded one
    let latest_concluded = result
        .stale_trigger
        .as_ref()
        .or(result.all_concluded.then_some(step));
    let status = result.status.as_ref();

    LookupResponse::Found(FoundBody {
        found: true,
        data: step.timestamp.raw.clone(),
        data_iso: step.timestamp.iso(),
        descricao: step.description.clone(),
        alerta_andamento_desatualizado: result.stale,
        sei_data_mais_recente_concluido: latest_concluded.and_then(|s| s.timestamp.iso_or_raw()),
        sei_descricao_mais_recente_concluido: latest_concluded.map(|s| s.description.clone()),
        todos_andamentos_concluidos: result.all_concluded,
        sei_ultimo_status: status.and_then(|s| s.status_text.clone()),
        sei_ultimo_status_data: status
            .and_then(|s| s.status_date.as_ref())
            .and_then(|d| d.iso_or_raw()),
    })
}

pub fn fetch_failure(err: &FetchError) -> LookupResponse {
    match err {
        FetchError::InvalidUrl { reason, .. } => LookupResponse::Unreachable(FailureBody {
            error: "The SEI link is not a usable URL.".to_string(),
            details: Some(reason.clone()),
            manual_hint: MANUAL_HINT.to_string(),
        }),
        FetchError::Status { status } => LookupResponse::Unreachable(FailureBody {
            error: format!(
                "The portal answered with status {status}. Automated access may be blocked."
            ),
            details: None,
            manual_hint: MANUAL_HINT.to_string(),
        }),
        FetchError::Transport { message, timed_out } => LookupResponse::Unreachable(FailureBody {
            error: "Could not reach the SEI page. The site may be blocking automated access."
                .to_string(),
            details: Some(if *timed_out {
                format!("timed out: {message}")
            } else {
                message.clone()
            }),
            manual_hint: MANUAL_HINT.to_string(),
        }),
    }
}

/// Handle one request body: a batch of `updates` to persist, or a `url`
/// to look up. Unauthenticated callers are turned away first.
pub async fn handle_request(
    source: &(dyn PageSource + Send + Sync),
    conn: &Connection,
    body: &[u8],
    authenticated: bool,
) -> ApiReply {
    if !authenticated {
        return reply(
            401,
            &ErrorBody {
                error: "Not authenticated".to_string(),
            },
        );
    }

    // An unreadable body is treated like an empty one
    let body: Value = serde_json::from_slice(body).unwrap_or_else(|_| json!({}));

    if let Some(updates) = body
        .get("updates")
        .and_then(Value::as_array)
        .filter(|updates| !updates.is_empty())
    {
        return match write::apply_updates(conn, updates) {
            Ok(summary) => reply(200, &summary),
            Err(e) => {
                error!(error = %e, "batch update failed");
                reply(500, &ErrorBody { error: e.to_string() })
            }
        };
    }

    let url = body
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if url.is_empty() {
        return reply(
            400,
            &ErrorBody {
                error: "Provide url (to look up progress) or updates (to import results)"
                    .to_string(),
            },
        );
    }

    let response = lookup(source, url).await;
    reply(response.status_code(), &response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, queries};
    use async_trait::async_trait;
    use url::Url;

    const PROCESSO: &str = include_str!("parse/fixtures/processo.html");
    const CONCLUIDO: &str = include_str!("parse/fixtures/concluido.html");

    /// Serves canned outcomes keyed by URL
    struct StubSource;

    #[async_trait]
    impl PageSource for StubSource {
        async fn fetch_page(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
            match url.path() {
                "/processo" => Ok(PROCESSO.as_bytes().to_vec()),
                "/concluido" => Ok(CONCLUIDO.as_bytes().to_vec()),
                "/vazio" => Ok(b"<html><body><div id='app'></div></body></html>".to_vec()),
                "/bloqueado" => Err(FetchError::Status { status: 403 }),
                _ => Err(FetchError::Transport {
                    message: "operation timed out".to_string(),
                    timed_out: true,
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_lookup_found() {
        let response = lookup(&StubSource, "sei.example.gov.br/processo").await;
        assert_eq!(response.status_code(), 200);

        let body = response.found_body().unwrap();
        assert_eq!(body.data, "10/01/2026 09:00");
        assert_eq!(body.data_iso.as_deref(), Some("2026-01-10T12:00:00Z"));
        assert_eq!(body.descricao, "SEINFRA-DOP | Processo recebido na unidade");
        assert!(body.alerta_andamento_desatualizado);
        assert_eq!(
            body.sei_data_mais_recente_concluido.as_deref(),
            Some("2026-01-12T17:30:00Z")
        );
        assert_eq!(
            body.sei_descricao_mais_recente_concluido.as_deref(),
            Some("SEINFRA-DOP | Assinatura de Ordem de Serviço")
        );
        assert!(!body.todos_andamentos_concluidos);
        assert_eq!(body.sei_ultimo_status.as_deref(), Some("Empenho"));
        assert_eq!(body.sei_ultimo_status_data.as_deref(), Some("2026-01-11T03:00:00Z"));
    }

    #[tokio::test]
    async fn test_lookup_all_concluded() {
        let response = lookup(&StubSource, "https://sei.example.gov.br/concluido").await;
        let body = response.found_body().unwrap();
        assert!(body.todos_andamentos_concluidos);
        assert!(!body.alerta_andamento_desatualizado);
        assert_eq!(body.descricao, "SEINFRA-GAB | Processo arquivado");
        assert_eq!(
            body.sei_data_mais_recente_concluido.as_deref(),
            Some("2025-12-02T20:45:00Z")
        );
        assert_eq!(body.sei_ultimo_status, None);
    }

    #[tokio::test]
    async fn test_lookup_structural_miss_is_200() {
        let response = lookup(&StubSource, "https://sei.example.gov.br/vazio").await;
        assert_eq!(response.status_code(), 200);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["found"], false);
        assert_eq!(json["error"], NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn test_lookup_failures_are_502_with_hint() {
        let blocked = lookup(&StubSource, "https://sei.example.gov.br/bloqueado").await;
        assert_eq!(blocked.status_code(), 502);
        let json = serde_json::to_value(&blocked).unwrap();
        assert!(json["error"].as_str().unwrap().contains("403"));
        assert_eq!(json["manualHint"], MANUAL_HINT);
        assert!(json.get("details").is_none());

        let timeout = lookup(&StubSource, "https://sei.example.gov.br/lento").await;
        assert_eq!(timeout.status_code(), 502);
        let json = serde_json::to_value(&timeout).unwrap();
        assert_eq!(json["details"], "timed out: operation timed out");
    }

    #[test]
    fn test_invalid_url_is_502_with_hint() {
        let Err(err) = fetch::normalize_url("http://") else {
            panic!("bare scheme must be rejected");
        };
        let response = fetch_failure(&err);
        assert_eq!(response.status_code(), 502);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["manualHint"], MANUAL_HINT);
        assert!(json["details"].as_str().is_some_and(|d| !d.is_empty()));
    }

    #[tokio::test]
    async fn test_handle_invalid_url_is_502() {
        let conn = db::open_test_db().unwrap();
        let reply = handle_request(&StubSource, &conn, br#"{"url": "http://"}"#, true).await;
        assert_eq!(reply.status, 502);
        assert_eq!(reply.body["manualHint"], MANUAL_HINT);
    }

    #[tokio::test]
    async fn test_handle_rejects_unauthenticated() {
        let conn = db::open_test_db().unwrap();
        let reply = handle_request(&StubSource, &conn, br#"{"url": "x/processo"}"#, false).await;
        assert_eq!(reply.status, 401);
    }

    #[tokio::test]
    async fn test_handle_requires_url_or_updates() {
        let conn = db::open_test_db().unwrap();
        let bodies: [&[u8]; 3] = [b"{}", b"not json", br#"{"url": "  ", "updates": []}"#];
        for body in bodies {
            let reply = handle_request(&StubSource, &conn, body, true).await;
            assert_eq!(reply.status, 400);
        }
    }

    #[tokio::test]
    async fn test_handle_lookup() {
        let conn = db::open_test_db().unwrap();
        let reply = handle_request(
            &StubSource,
            &conn,
            br#"{"url": "https://sei.example.gov.br/processo"}"#,
            true,
        )
        .await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["found"], true);
        assert_eq!(reply.body["alerta_andamento_desatualizado"], true);
    }

    #[tokio::test]
    async fn test_handle_batch_update() {
        let conn = db::open_test_db().unwrap();
        write::track_obra(&conn, "obra-1", "https://sei.example.gov.br/processo").unwrap();

        let body = br#"{"updates": [
            {"obraId": "obra-1", "sei_ultimo_andamento": "Recebido", "sei_ultimo_andamento_data": "10/01/2026 09:00"},
            {"sei_ultimo_andamento": "orphan"},
            {"id": "missing", "sei_ultimo_status": "Empenho"}
        ]}"#;
        let reply = handle_request(&StubSource, &conn, body, true).await;

        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["updated"], 1);
        let errors: Vec<&str> = reply.body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(errors, vec!["item without obraId", "missing: not found"]);

        let stored = queries::get_obra(&conn, "obra-1").unwrap().unwrap();
        assert_eq!(stored.sei_ultimo_andamento.as_deref(), Some("Recebido"));
        assert_eq!(
            stored.sei_ultimo_andamento_data.as_deref(),
            Some("2026-01-10T12:00:00Z")
        );
    }
}
