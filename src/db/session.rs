//! Warehouse sessions: one short-lived connection per run or request.

use diesel::PgConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::info;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn connect(database_url: &str) -> Result<PgConnection, String> {
    PgConnection::establish(database_url).map_err(|e| format!("warehouse connection failed: {}", e))
}

/// Open a session, run `f`, and close the session whatever `f` returns.
pub fn with_session<T, F>(database_url: &str, f: F) -> Result<T, String>
where
    F: FnOnce(&mut PgConnection) -> Result<T, String>,
{
    let mut conn = connect(database_url)?;
    f(&mut conn)
}

pub fn apply_migrations(conn: &mut PgConnection) -> Result<(), String> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| format!("applying warehouse migrations failed: {}", e))?;
    if applied.is_empty() {
        info!("Warehouse schema is up to date; no migrations were applied");
    } else {
        let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
        info!("Applied {} warehouse migration(s): {}", applied.len(), names);
    }
    Ok(())
}
