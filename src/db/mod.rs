pub mod schema;

use rusqlite::Connection;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;

/// Database connection wrapper for the directory cache
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create the database at `path`, creating parent directories.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    let db = Self { conn };
    db.configure()?;
    db.run_migrations()?;

    info!("Opened cache database at {}", path.display());
    Ok(db)
  }

  /// Open a private in-memory database
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let db = Self {
      conn: Connection::open_in_memory()?,
    };
    db.configure()?;
    db.run_migrations()?;
    Ok(db)
  }

  fn configure(&self) -> Result<()> {
    self.conn.execute_batch(
      "PRAGMA journal_mode = WAL;
       PRAGMA busy_timeout = 5000;
       PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
  }

  /// Run database migrations.
  ///
  /// The cache is derived data, so any version mismatch simply rebuilds it.
  fn run_migrations(&self) -> Result<()> {
    let current: u32 = self
      .conn
      .pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current != 0 && current != schema::SCHEMA_VERSION {
      warn!(
        "Cache schema v{} does not match v{}, rebuilding",
        current,
        schema::SCHEMA_VERSION
      );
      self.conn.execute_batch(schema::DROP_ALL)?;
    }

    self.conn.execute_batch(schema::SCHEMA)?;
    self
      .conn
      .pragma_update(None, "user_version", schema::SCHEMA_VERSION)?;
    Ok(())
  }

  /// Take ownership of the connection
  pub fn into_connection(self) -> Connection {
    self.conn
  }
}
