//! Offline cache for the directory.
//!
//! - `storage`: SQLite tables for bases, organizations, base details and page cards
//! - `layer`: read path that serves remote data and falls back to the store
//! - `sync`: write path that copies followed bases' data into the store
//!
//! The read path never writes; only a sync updates the store.

mod layer;
mod records;
mod storage;
mod sync;
mod traits;

pub use layer::{BaseView, CacheLayer};
pub use storage::{CacheStorage, SqliteStorage};
pub use sync::{BaseSyncOutcome, EntityOutcome, SyncReport, Synchronizer};
pub use traits::CacheResult;
