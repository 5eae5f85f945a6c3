use std::fs;
use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

/// Opens the database file (creating its directory when needed) and ensures
/// the schema exists.
pub fn open(database_path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(database_path)?;
    crate::database::create_tables(&conn)?;

    Ok(conn)
}
