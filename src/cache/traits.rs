//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;

use crate::error::Result;

/// Trait for entities that live in their own cache table.
///
/// `COLUMNS` lists every column except `last_updated`, primary key first;
/// `to_values` and `from_row` use that same order.
pub trait Record: Clone + Send + Sync + Sized {
  /// Table name
  const TABLE: &'static str;

  /// Column names, `id` first
  const COLUMNS: &'static [&'static str];

  /// Column holding the owning base's id
  const BASE_COLUMN: &'static str;

  /// ORDER BY clause for multi-row reads
  const ORDER_BY: &'static str;

  /// Column values, in `COLUMNS` order
  fn to_values(&self) -> Result<Vec<Value>>;

  /// Rebuild a record from a row selected with `COLUMNS`
  fn from_row(row: &Row<'_>) -> Result<Self>;
}

/// Result of a read, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// Most recent write to the local store, if any
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result served while the network was unavailable.
  pub fn offline(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at,
    }
  }

  /// True when at least part of the data came from the local store.
  pub fn from_cache(&self) -> bool {
    self.source != CacheSource::Network
  }
}

/// Indicates where data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Network unavailable, everything served from the local store
  Offline,
  /// Some parts came from the network, the rest from the local store
  Mixed,
}

impl CacheSource {
  /// Combine the sources of independently loaded parts.
  pub fn combine(parts: &[CacheSource]) -> CacheSource {
    if parts.iter().all(|p| *p == CacheSource::Network) {
      CacheSource::Network
    } else if parts.iter().all(|p| *p == CacheSource::Offline) {
      CacheSource::Offline
    } else {
      CacheSource::Mixed
    }
  }
}
