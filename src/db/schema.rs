use anyhow::Result;
use rusqlite::Connection;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Check if already initialized
    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='obras'",
        [],
        |row| row.get(0),
    )?;

    if table_count > 0 {
        return Ok(());
    }

    conn.execute_batch(
        r#"
        CREATE TABLE obras (
            id                                    TEXT PRIMARY KEY,
            sei_url                               TEXT,
            sei_ultimo_andamento                  TEXT,
            sei_ultimo_andamento_data             TEXT,
            sei_alerta_andamento_desatualizado    INTEGER NOT NULL DEFAULT 0,
            sei_data_mais_recente_concluido       TEXT,
            sei_descricao_mais_recente_concluido  TEXT,
            sei_todos_andamentos_concluidos       INTEGER NOT NULL DEFAULT 0,
            sei_ultimo_status                     TEXT,
            sei_ultimo_status_data                TEXT,
            updated_at                            TEXT
        );

        CREATE INDEX idx_obras_url ON obras(sei_url);
        "#,
    )?;

    Ok(())
}
