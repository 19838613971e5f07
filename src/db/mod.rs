pub mod queries;
pub mod schema;
pub mod write;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Get the database file path
/// `SEI_ANDAMENTO_DB` overrides the default under `$HOME`
pub fn get_db_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SEI_ANDAMENTO_DB") {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var("HOME").context("HOME is not set and SEI_ANDAMENTO_DB is not given")?;
    Ok(PathBuf::from(home).join(".sei-andamento").join("obras.db"))
}

/// Open or create the database at the default location
pub fn open_or_create_db() -> Result<Connection> {
    open_db_at(&get_db_path()?)
}

/// Open or create the database at `path`, applying schema if needed
pub fn open_db_at(path: &Path) -> Result<Connection> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    schema::initialize_schema(&conn)?;

    Ok(conn)
}

#[cfg(test)]
pub fn open_test_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    schema::initialize_schema(&conn)?;
    Ok(conn)
}
