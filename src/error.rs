//! Error types shared by the remote source, the local store and the read path.

use thiserror::Error;

/// Errors raised by the data layer.
#[derive(Debug, Error)]
pub enum Error {
  /// The remote backend could not be reached or answered with something unusable.
  #[error("remote unavailable: {0}")]
  RemoteUnavailable(String),

  /// A record (remote payload or cached blob) could not be decoded.
  #[error("failed to decode {what}: {source}")]
  Deserialization {
    what: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("local store error: {0}")]
  Store(#[from] rusqlite::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("local store lock poisoned")]
  LockPoisoned,
}

impl Error {
  pub fn deserialization(what: impl Into<String>, source: serde_json::Error) -> Self {
    Error::Deserialization {
      what: what.into(),
      source,
    }
  }
}

impl From<reqwest::Error> for Error {
  fn from(e: reqwest::Error) -> Self {
    Error::RemoteUnavailable(e.to_string())
  }
}

pub type Result<T> = std::result::Result<T, Error>;

/// User-visible failure of a base view load, after both sources were tried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
  /// The remote failed and the store has nothing for this base.
  #[error("no saved data for base {base_id}; connect to the internet and refresh")]
  NoCachedData { base_id: String },

  /// The remote failed and reading the store failed too.
  #[error("failed to load: {0}")]
  LoadFailed(String),
}
