use crate::error::{Error, Result};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::debug;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Handle to the durable store. One connection; callers serialize access.
pub struct Database {
    conn: SqliteConnection,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = SqliteConnection::establish(path)?;
        let mut db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        debug!("Opened tracking database at {}", path);
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn configure_pragmas(&mut self) -> Result<()> {
        self.conn.batch_execute(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, foreign keys on)");
        Ok(())
    }

    fn migrate_schema(&mut self) -> Result<()> {
        let applied = self
            .conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| Error::Migration(e.to_string()))?;
        for version in applied {
            debug!("Applied migration {}", version);
        }
        Ok(())
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}
