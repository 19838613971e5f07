// Query operations on the record store
use crate::model::ObraRecord;
use anyhow::Result;
use rusqlite::{Connection, Row};

const OBRA_COLUMNS: &str = "id, sei_url, sei_ultimo_andamento, sei_ultimo_andamento_data,
    sei_alerta_andamento_desatualizado, sei_data_mais_recente_concluido,
    sei_descricao_mais_recente_concluido, sei_todos_andamentos_concluidos,
    sei_ultimo_status, sei_ultimo_status_data, updated_at";

fn obra_from_row(row: &Row) -> rusqlite::Result<ObraRecord> {
    Ok(ObraRecord {
        id: row.get(0)?,
        sei_url: row.get(1)?,
        sei_ultimo_andamento: row.get(2)?,
        sei_ultimo_andamento_data: row.get(3)?,
        sei_alerta_andamento_desatualizado: row.get::<_, i64>(4)? != 0,
        sei_data_mais_recente_concluido: row.get(5)?,
        sei_descricao_mais_recente_concluido: row.get(6)?,
        todos_andamentos_concluidos: row.get::<_, i64>(7)? != 0,
        sei_ultimo_status: row.get(8)?,
        sei_ultimo_status_data: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Get a work item by id
pub fn get_obra(conn: &Connection, id: &str) -> Result<Option<ObraRecord>> {
    let sql = format!("SELECT {OBRA_COLUMNS} FROM obras WHERE id = ?1");
    let result = conn.query_row(&sql, [id], obra_from_row);

    match result {
        Ok(obra) => Ok(Some(obra)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All work items, ordered by id
pub fn list_obras(conn: &Connection) -> Result<Vec<ObraRecord>> {
    let sql = format!("SELECT {OBRA_COLUMNS} FROM obras ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let obras = stmt
        .query_map([], obra_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(obras)
}

/// (id, url) of every work item with a portal URL, ordered by id
pub fn list_tracked(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT id, sei_url FROM obras
         WHERE sei_url IS NOT NULL AND TRIM(sei_url) != ''
         ORDER BY id",
    )?;
    let tracked = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tracked)
}
