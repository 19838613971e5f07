//! Markdown output formatters for CLI commands

use crate::batch::BatchOutcome;
use crate::model::{LookupResponse, ObraRecord, UpdateSummary};

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Format a LookupResponse as markdown
pub fn lookup(response: &LookupResponse) -> String {
    let mut md = String::new();

    match response {
        LookupResponse::Found(body) => {
            md.push_str("# Current progress\n\n");
            md.push_str(&format!("**{}**\n\n", body.descricao));
            md.push_str(&format!(
                "- Date: {}{}\n",
                body.data,
                body.data_iso
                    .as_deref()
                    .map_or(String::new(), |iso| format!(" ({iso})"))
            ));
            md.push_str(&format!(
                "- Stale: {}\n",
                yes_no(body.alerta_andamento_desatualizado)
            ));
            md.push_str(&format!(
                "- All steps concluded: {}\n",
                yes_no(body.todos_andamentos_concluidos)
            ));

            if let Some(desc) = &body.sei_descricao_mais_recente_concluido {
                md.push_str(&format!(
                    "- Latest concluded: {} ({})\n",
                    desc,
                    or_dash(body.sei_data_mais_recente_concluido.as_deref())
                ));
            }

            if body.sei_ultimo_status.is_some() || body.sei_ultimo_status_data.is_some() {
                md.push_str(&format!(
                    "- Latest protocol: {} ({})\n",
                    or_dash(body.sei_ultimo_status.as_deref()),
                    or_dash(body.sei_ultimo_status_data.as_deref())
                ));
            }
        }
        LookupResponse::NotFound(body) => {
            md.push_str("# Not found\n\n");
            md.push_str(&body.error);
            md.push('\n');
        }
        LookupResponse::Unreachable(body) => {
            md.push_str("# Portal unreachable\n\n");
            md.push_str(&body.error);
            md.push('\n');
            if let Some(details) = &body.details {
                md.push_str(&format!("\n`{details}`\n"));
            }
            md.push_str(&format!("\n> {}\n", body.manual_hint));
        }
    }

    md
}

/// Format stored work items as markdown
pub fn obras(records: &[ObraRecord]) -> String {
    if records.is_empty() {
        return "No tracked items.\n".to_string();
    }

    let mut md = String::new();
    md.push_str(&format!("# Tracked items ({})\n\n", records.len()));

    for record in records {
        let flag = if record.sei_alerta_andamento_desatualizado {
            " [stale]"
        } else if record.todos_andamentos_concluidos {
            " [concluded]"
        } else {
            ""
        };
        md.push_str(&format!("## {}{}\n\n", record.id, flag));
        md.push_str(&format!("- URL: {}\n", or_dash(record.sei_url.as_deref())));
        md.push_str(&format!(
            "- Progress: {} ({})\n",
            or_dash(record.sei_ultimo_andamento.as_deref()),
            or_dash(record.sei_ultimo_andamento_data.as_deref())
        ));
        if record.sei_ultimo_status.is_some() {
            md.push_str(&format!(
                "- Protocol: {} ({})\n",
                or_dash(record.sei_ultimo_status.as_deref()),
                or_dash(record.sei_ultimo_status_data.as_deref())
            ));
        }
        md.push_str(&format!(
            "- Updated: {}\n\n",
            or_dash(record.updated_at.as_deref())
        ));
    }

    md
}

/// Format batch refresh outcomes as markdown
pub fn batch(outcomes: &[BatchOutcome]) -> String {
    let mut md = String::new();
    let found = outcomes.iter().filter(|o| o.response.is_found()).count();
    md.push_str(&format!(
        "# Refresh: {found}/{} found\n\n",
        outcomes.len()
    ));

    for outcome in outcomes {
        let summary = match &outcome.response {
            LookupResponse::Found(body) => {
                let stale = if body.alerta_andamento_desatualizado {
                    " (stale)"
                } else {
                    ""
                };
                format!("{}, {}{}", body.data, body.descricao, stale)
            }
            LookupResponse::NotFound(_) => "not found".to_string(),
            LookupResponse::Unreachable(body) => format!("failed: {}", body.error),
        };
        md.push_str(&format!("- `{}`: {}\n", outcome.obra_id, summary));
    }

    md
}

/// Format an UpdateSummary as markdown
pub fn update_summary(summary: &UpdateSummary) -> String {
    let mut md = format!("Updated {} item(s)\n", summary.updated);
    if !summary.errors.is_empty() {
        md.push_str(&format!("\n## Errors ({})\n\n", summary.errors.len()));
        for error in &summary.errors {
            md.push_str(&format!("- {error}\n"));
        }
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FailureBody, FoundBody, NotFoundBody};

    fn found_body() -> FoundBody {
        FoundBody {
            found: true,
            data: "10/01/2026 09:00".to_string(),
            data_iso: Some("2026-01-10T12:00:00Z".to_string()),
            descricao: "SEINFRA-DOP | Processo recebido na unidade".to_string(),
            alerta_andamento_desatualizado: true,
            sei_data_mais_recente_concluido: Some("2026-01-12T17:30:00Z".to_string()),
            sei_descricao_mais_recente_concluido: Some("Assinatura".to_string()),
            todos_andamentos_concluidos: false,
            sei_ultimo_status: None,
            sei_ultimo_status_data: None,
        }
    }

    #[test]
    fn test_lookup_found() {
        let md = lookup(&LookupResponse::Found(found_body()));
        assert!(md.contains("**SEINFRA-DOP | Processo recebido na unidade**"));
        assert!(md.contains("- Date: 10/01/2026 09:00 (2026-01-10T12:00:00Z)"));
        assert!(md.contains("- Stale: yes"));
        assert!(md.contains("- Latest concluded: Assinatura (2026-01-12T17:30:00Z)"));
        assert!(!md.contains("Latest protocol"));
    }

    #[test]
    fn test_lookup_failures() {
        let md = lookup(&LookupResponse::Unreachable(FailureBody {
            error: "blocked".to_string(),
            details: Some("timed out".to_string()),
            manual_hint: "save the page".to_string(),
        }));
        assert!(md.contains("# Portal unreachable"));
        assert!(md.contains("`timed out`"));
        assert!(md.contains("> save the page"));

        let md = lookup(&LookupResponse::NotFound(NotFoundBody {
            found: false,
            error: "no table".to_string(),
        }));
        assert_eq!(md, "# Not found\n\nno table\n");
    }

    #[test]
    fn test_obras_format() {
        let record = ObraRecord {
            id: "obra-1".to_string(),
            sei_url: Some("https://sei.example.gov.br/p".to_string()),
            sei_ultimo_andamento: Some("Recebido".to_string()),
            sei_ultimo_andamento_data: None,
            sei_alerta_andamento_desatualizado: true,
            sei_data_mais_recente_concluido: None,
            sei_descricao_mais_recente_concluido: None,
            todos_andamentos_concluidos: false,
            sei_ultimo_status: None,
            sei_ultimo_status_data: None,
            updated_at: None,
        };
        let md = obras(&[record]);
        assert!(md.contains("# Tracked items (1)"));
        assert!(md.contains("## obra-1 [stale]"));
        assert!(md.contains("- Progress: Recebido (-)"));
    }

    #[test]
    fn test_obras_format_empty() {
        assert_eq!(obras(&[]), "No tracked items.\n");
    }

    #[test]
    fn test_batch_format() {
        let outcomes = vec![
            BatchOutcome {
                obra_id: "a".to_string(),
                url: "https://x/a".to_string(),
                response: LookupResponse::Found(found_body()),
            },
            BatchOutcome {
                obra_id: "b".to_string(),
                url: "https://x/b".to_string(),
                response: LookupResponse::NotFound(NotFoundBody {
                    found: false,
                    error: "no table".to_string(),
                }),
            },
        ];
        let md = batch(&outcomes);
        assert!(md.contains("# Refresh: 1/2 found"));
        assert!(md.contains("- `a`: 10/01/2026 09:00, SEINFRA-DOP | Processo recebido na unidade (stale)"));
        assert!(md.contains("- `b`: not found"));
    }

    #[test]
    fn test_update_summary_format() {
        let summary = UpdateSummary {
            updated: 2,
            errors: vec!["x: not found".to_string()],
        };
        let md = update_summary(&summary);
        assert!(md.starts_with("Updated 2 item(s)\n"));
        assert!(md.contains("## Errors (1)"));
        assert!(md.contains("- x: not found"));

        assert_eq!(update_summary(&UpdateSummary::default()), "Updated 0 item(s)\n");
    }
}
