//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Transaction};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::remote::types::{Base, BaseDetails, Organization, PageCards};

use super::traits::Record;

/// Trait for cache storage backends.
///
/// Writes replace whole rows by primary key and stamp `last_updated`.
pub trait CacheStorage: Send + Sync {
  /// Insert or replace records by primary key.
  fn upsert_many<T: Record>(&self, records: &[T]) -> Result<()>;

  /// Make `records` the complete set stored for a base: rows of that base
  /// missing from `records` are deleted. Runs as one transaction.
  fn replace_for_base<T: Record>(&self, base_id: &str, records: &[T]) -> Result<()>;

  /// Insert or replace a single record.
  #[cfg(test)]
  fn upsert_one<T: Record>(&self, record: &T) -> Result<()> {
    self.upsert_many(std::slice::from_ref(record))
  }

  /// Every readable row of the table. Rows that fail to decode are skipped.
  fn get_all<T: Record>(&self) -> Result<Vec<T>>;

  /// A single row; a row that fails to decode is an error.
  fn get_by_id<T: Record>(&self, id: &str) -> Result<Option<T>>;

  /// Rows owned by a base. Rows that fail to decode are skipped.
  fn get_by_base_id<T: Record>(&self, base_id: &str) -> Result<Vec<T>>;

  fn delete_by_base_id<T: Record>(&self, base_id: &str) -> Result<usize>;

  fn delete_all<T: Record>(&self) -> Result<usize>;

  /// Most recent `last_updated` stamp in the table (epoch millis).
  fn last_updated<T: Record>(&self) -> Result<Option<i64>>;

  /// Live view of the Bases table, refreshed after every write to it.
  fn subscribe_bases(&self) -> watch::Receiver<Vec<Base>>;

  /// Most recent write across the Bases and Organizations tables.
  fn last_update_time(&self) -> Result<Option<DateTime<Utc>>> {
    let latest = self
      .last_updated::<Base>()?
      .max(self.last_updated::<Organization>()?);
    Ok(latest.and_then(DateTime::<Utc>::from_timestamp_millis))
  }

  fn has_cached_data(&self) -> Result<bool> {
    Ok(self.last_updated::<Base>()?.is_some())
  }

  /// Remove everything cached for one base.
  fn clear_base(&self, base_id: &str) -> Result<()> {
    self.delete_by_base_id::<Organization>(base_id)?;
    self.delete_by_base_id::<BaseDetails>(base_id)?;
    self.delete_by_base_id::<PageCards>(base_id)?;
    self.delete_by_base_id::<Base>(base_id)?;
    Ok(())
  }

  /// Remove everything.
  fn clear_all(&self) -> Result<()> {
    self.delete_all::<Organization>()?;
    self.delete_all::<BaseDetails>()?;
    self.delete_all::<PageCards>()?;
    self.delete_all::<Base>()?;
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
  bases_tx: watch::Sender<Vec<Base>>,
}

impl SqliteStorage {
  pub fn new(db: Database) -> Result<Self> {
    let conn = db.into_connection();
    let bases = select_many::<Base>(&conn, None)?;
    let (bases_tx, _) = watch::channel(bases);

    Ok(Self {
      conn: Mutex::new(conn),
      bases_tx,
    })
  }

  pub fn open(path: &std::path::Path) -> Result<Self> {
    Self::new(Database::open(path)?)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    Self::new(Database::open_in_memory()?)
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| Error::LockPoisoned)
  }

  /// Refresh bases subscribers after a write to the Bases table.
  fn publish_if_bases<T: Record>(&self, conn: &Connection) -> Result<()> {
    if T::TABLE == Base::TABLE {
      let bases = select_many::<Base>(conn, None)?;
      self.bases_tx.send_replace(bases);
    }
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
    self.lock()?.execute_batch(sql)?;
    Ok(())
  }
}

fn column_list<T: Record>() -> String {
  T::COLUMNS.join(", ")
}

/// Select rows, optionally filtered by base, skipping rows that fail to decode.
fn select_many<T: Record>(conn: &Connection, base_id: Option<&str>) -> Result<Vec<T>> {
  let sql = match base_id {
    Some(_) => format!(
      "SELECT {} FROM {} WHERE {} = ?1 ORDER BY {}",
      column_list::<T>(),
      T::TABLE,
      T::BASE_COLUMN,
      T::ORDER_BY
    ),
    None => format!(
      "SELECT {} FROM {} ORDER BY {}",
      column_list::<T>(),
      T::TABLE,
      T::ORDER_BY
    ),
  };

  let mut stmt = conn.prepare(&sql)?;
  let mut rows = match base_id {
    Some(id) => stmt.query(params![id])?,
    None => stmt.query([])?,
  };

  let mut records = Vec::new();
  while let Some(row) = rows.next()? {
    match T::from_row(row) {
      Ok(record) => records.push(record),
      Err(e @ Error::Deserialization { .. }) => {
        warn!("Skipping unreadable {} row: {}", T::TABLE, e);
      }
      Err(e) => return Err(e),
    }
  }
  Ok(records)
}

/// Insert or replace rows inside an open transaction, stamping `last_updated`.
fn insert_rows<T: Record>(tx: &Transaction<'_>, records: &[T]) -> Result<()> {
  let now = Utc::now().timestamp_millis();
  let placeholders: Vec<String> = (1..=T::COLUMNS.len() + 1)
    .map(|i| format!("?{}", i))
    .collect();
  let sql = format!(
    "INSERT OR REPLACE INTO {} ({}, last_updated) VALUES ({})",
    T::TABLE,
    column_list::<T>(),
    placeholders.join(", ")
  );

  let mut stmt = tx.prepare(&sql)?;
  for record in records {
    let mut values = record.to_values()?;
    values.push(now.into());
    stmt.execute(params_from_iter(values.iter()))?;
  }
  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn upsert_many<T: Record>(&self, records: &[T]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    insert_rows(&tx, records)?;
    tx.commit()?;

    debug!("Upserted {} rows into {}", records.len(), T::TABLE);
    self.publish_if_bases::<T>(&conn)
  }

  fn replace_for_base<T: Record>(&self, base_id: &str, records: &[T]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    let removed = tx.execute(
      &format!("DELETE FROM {} WHERE {} = ?1", T::TABLE, T::BASE_COLUMN),
      params![base_id],
    )?;
    insert_rows(&tx, records)?;
    tx.commit()?;

    debug!(
      "Replaced {} rows of {} for base {} with {}",
      removed,
      T::TABLE,
      base_id,
      records.len()
    );
    self.publish_if_bases::<T>(&conn)
  }

  fn get_all<T: Record>(&self) -> Result<Vec<T>> {
    let conn = self.lock()?;
    select_many(&conn, None)
  }

  fn get_by_id<T: Record>(&self, id: &str) -> Result<Option<T>> {
    let conn = self.lock()?;
    let sql = format!(
      "SELECT {} FROM {} WHERE id = ?1",
      column_list::<T>(),
      T::TABLE
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id])?;
    let record = match rows.next()? {
      Some(row) => Some(T::from_row(row)?),
      None => None,
    };
    Ok(record)
  }

  fn get_by_base_id<T: Record>(&self, base_id: &str) -> Result<Vec<T>> {
    let conn = self.lock()?;
    select_many(&conn, Some(base_id))
  }

  fn delete_by_base_id<T: Record>(&self, base_id: &str) -> Result<usize> {
    let conn = self.lock()?;
    let deleted = conn.execute(
      &format!("DELETE FROM {} WHERE {} = ?1", T::TABLE, T::BASE_COLUMN),
      params![base_id],
    )?;
    self.publish_if_bases::<T>(&conn)?;
    Ok(deleted)
  }

  fn delete_all<T: Record>(&self) -> Result<usize> {
    let conn = self.lock()?;
    let deleted = conn.execute(&format!("DELETE FROM {}", T::TABLE), [])?;
    self.publish_if_bases::<T>(&conn)?;
    Ok(deleted)
  }

  fn last_updated<T: Record>(&self) -> Result<Option<i64>> {
    let conn = self.lock()?;
    let latest: Option<i64> = conn.query_row(
      &format!("SELECT MAX(last_updated) FROM {}", T::TABLE),
      [],
      |row| row.get(0),
    )?;
    Ok(latest)
  }

  fn subscribe_bases(&self) -> watch::Receiver<Vec<Base>> {
    self.bases_tx.subscribe()
  }
}
