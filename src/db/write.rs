// Write operations on the record store
use crate::date::normalize_field;
use crate::model::{ObraUpdate, UpdateSummary};
use anyhow::Result;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    /// The item carried no fields
    Skipped,
}

/// Register a work item and its portal URL, replacing any previous URL
pub fn track_obra(conn: &Connection, id: &str, sei_url: &str) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO obras (id, sei_url, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET sei_url = excluded.sei_url, updated_at = excluded.updated_at",
        (id, sei_url, &now),
    )?;
    Ok(())
}

/// Apply the fields present in `update`. Date fields in portal format are
/// stored as ISO UTC; anything else is stored as given.
pub fn apply_update(conn: &Connection, update: &ObraUpdate) -> Result<UpdateOutcome> {
    let mut columns: Vec<&'static str> = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();
    let mut set = |column: &'static str, value: SqlValue| {
        columns.push(column);
        values.push(value);
    };

    if let Some(v) = &update.sei_ultimo_andamento {
        set("sei_ultimo_andamento", text(v.as_deref()));
    }
    if let Some(v) = &update.sei_ultimo_andamento_data {
        set("sei_ultimo_andamento_data", date(v.as_deref()));
    }
    if let Some(v) = update.sei_alerta_andamento_desatualizado {
        set("sei_alerta_andamento_desatualizado", flag(v));
    }
    if let Some(v) = &update.sei_data_mais_recente_concluido {
        set("sei_data_mais_recente_concluido", date(v.as_deref()));
    }
    if let Some(v) = &update.sei_descricao_mais_recente_concluido {
        set("sei_descricao_mais_recente_concluido", text(v.as_deref()));
    }
    if let Some(v) = update.todos_andamentos_concluidos {
        set("sei_todos_andamentos_concluidos", flag(v));
    }
    if let Some(v) = &update.sei_ultimo_status {
        set("sei_ultimo_status", text(v.as_deref()));
    }
    if let Some(v) = &update.sei_ultimo_status_data {
        set("sei_ultimo_status_data", date(v.as_deref()));
    }

    if columns.is_empty() {
        return Ok(UpdateOutcome::Skipped);
    }

    columns.push("updated_at");
    values.push(SqlValue::Text(chrono::Utc::now().to_rfc3339()));

    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE obras SET {assignments} WHERE id = ?{}",
        columns.len() + 1
    );
    values.push(SqlValue::Text(update.obra_id.clone()));

    let changed = conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
    Ok(if changed == 0 {
        UpdateOutcome::NotFound
    } else {
        UpdateOutcome::Updated
    })
}

/// Apply a batch of raw JSON update items in one transaction.
/// Per-item problems are collected into `errors`; only transaction
/// failures abort the batch.
pub fn apply_updates(conn: &Connection, items: &[Value]) -> Result<UpdateSummary> {
    let tx = conn.unchecked_transaction()?;
    let mut summary = UpdateSummary::default();

    for item in items {
        let Some(obra_id) = item_id(item) else {
            summary.errors.push("item without obraId".to_string());
            continue;
        };

        let mut update: ObraUpdate = match serde_json::from_value(item.clone()) {
            Ok(update) => update,
            Err(e) => {
                summary.errors.push(format!("{obra_id}: {e}"));
                continue;
            }
        };
        update.obra_id = obra_id.to_string();

        match apply_update(&tx, &update) {
            Ok(UpdateOutcome::Updated) => summary.updated += 1,
            Ok(UpdateOutcome::NotFound) => summary.errors.push(format!("{obra_id}: not found")),
            Ok(UpdateOutcome::Skipped) => {}
            Err(e) => summary.errors.push(format!("{obra_id}: {e}")),
        }
    }

    tx.commit()?;
    Ok(summary)
}

/// `obraId`, falling back to `id` when absent or null
fn item_id(item: &Value) -> Option<&str> {
    item.get("obraId")
        .filter(|v| !v.is_null())
        .or_else(|| item.get("id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn text(value: Option<&str>) -> SqlValue {
    value.map_or(SqlValue::Null, |v| SqlValue::Text(v.to_string()))
}

fn date(value: Option<&str>) -> SqlValue {
    value.map_or(SqlValue::Null, |v| SqlValue::Text(normalize_field(v)))
}

fn flag(value: Option<bool>) -> SqlValue {
    SqlValue::Integer(i64::from(value.unwrap_or(false)))
}
