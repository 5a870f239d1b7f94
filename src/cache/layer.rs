//! Cache layer that serves remote data and falls back to the local store.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Error, LoadError, Result};
use crate::remote::types::{Base, BaseDetails, Organization, PageCards};
use crate::remote::RemoteSource;

use super::storage::CacheStorage;
use super::traits::{CacheResult, CacheSource};

/// Everything shown on a base's detail screen
#[derive(Debug, Clone, PartialEq)]
pub struct BaseView {
  pub base_id: String,
  /// Sorted by name
  pub organizations: Vec<Organization>,
  pub base_details: Option<BaseDetails>,
  pub page_cards: Option<PageCards>,
}

/// Read path for the UI: remote first, local store on failure.
///
/// This layer never writes to the store. Fresh remote data only reaches the
/// store through an explicit sync.
pub struct CacheLayer<R: RemoteSource, S: CacheStorage> {
  remote: Arc<R>,
  storage: Arc<S>,
}

impl<R: RemoteSource, S: CacheStorage> CacheLayer<R, S> {
  pub fn new(remote: Arc<R>, storage: Arc<S>) -> Self {
    Self { remote, storage }
  }

  /// Load a base's organizations, details and page cards.
  ///
  /// The three fetches run concurrently. Each one that fails is replaced by
  /// the store's copy of the same entity, so a partial outage only degrades
  /// the parts that actually failed. The result is an error only when the
  /// organizations had to come from the store and it has none, or when
  /// reading the store failed.
  pub async fn load_base_view(
    &self,
    base_id: &str,
  ) -> std::result::Result<CacheResult<BaseView>, LoadError> {
    let (orgs, details, cards) = tokio::join!(
      self.remote.fetch_organizations(base_id),
      self.remote.fetch_base_details(base_id),
      self.remote.fetch_page_cards(base_id),
    );

    let (mut organizations, orgs_source) = self.or_cached(orgs, "organizations", base_id, |s| {
      s.get_by_base_id::<Organization>(base_id)
    })?;
    let (base_details, details_source) = self.or_cached(
      details.map(first),
      "base details",
      base_id,
      |s| s.get_by_base_id::<BaseDetails>(base_id).map(first),
    )?;
    let (page_cards, cards_source) = self.or_cached(
      cards.map(first),
      "page cards",
      base_id,
      |s| s.get_by_base_id::<PageCards>(base_id).map(first),
    )?;

    if orgs_source == CacheSource::Offline && organizations.is_empty() {
      info!("No cached organizations for base {}", base_id);
      return Err(LoadError::NoCachedData {
        base_id: base_id.to_string(),
      });
    }

    organizations.sort_by(|a, b| a.name.cmp(&b.name));
    let view = BaseView {
      base_id: base_id.to_string(),
      organizations,
      base_details,
      page_cards,
    };

    let source = CacheSource::combine(&[orgs_source, details_source, cards_source]);
    if source == CacheSource::Network {
      return Ok(CacheResult::from_network(view));
    }

    let cached_at = self.storage.last_update_time().unwrap_or_else(|e| {
      warn!("Could not read last update time: {}", e);
      None
    });
    Ok(CacheResult {
      data: view,
      source,
      cached_at,
    })
  }

  /// The full list of bases to choose from, falling back to the cached list.
  pub async fn load_bases(&self) -> std::result::Result<CacheResult<Vec<Base>>, LoadError> {
    match self.remote.fetch_bases().await {
      Ok(mut bases) => {
        bases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(CacheResult::from_network(bases))
      }
      Err(remote_err) => {
        warn!("Fetching bases failed: {}, trying cache", remote_err);
        let bases = self
          .storage
          .get_all::<Base>()
          .map_err(|e| load_failed(&remote_err, &e))?;
        let cached_at = self.storage.last_update_time().ok().flatten();
        Ok(CacheResult::offline(bases, cached_at))
      }
    }
  }

  /// Live list of cached bases for the selection screen.
  pub fn subscribe_bases(&self) -> watch::Receiver<Vec<Base>> {
    self.storage.subscribe_bases()
  }

  pub fn has_cached_data(&self) -> Result<bool> {
    self.storage.has_cached_data()
  }

  pub fn last_update_time(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    self.storage.last_update_time()
  }

  fn or_cached<T>(
    &self,
    remote: Result<T>,
    what: &str,
    base_id: &str,
    cached: impl FnOnce(&S) -> Result<T>,
  ) -> std::result::Result<(T, CacheSource), LoadError> {
    match remote {
      Ok(data) => Ok((data, CacheSource::Network)),
      Err(remote_err) => {
        warn!(
          "Fetching {} for base {} failed: {}, trying cache",
          what, base_id, remote_err
        );
        let data = cached(self.storage.as_ref()).map_err(|e| load_failed(&remote_err, &e))?;
        debug!("Serving cached {} for base {}", what, base_id);
        Ok((data, CacheSource::Offline))
      }
    }
  }
}

fn first<T>(records: Vec<T>) -> Option<T> {
  records.into_iter().next()
}

fn load_failed(remote_err: &Error, cache_err: &Error) -> LoadError {
  warn!("Cache read failed as well: {}", cache_err);
  LoadError::LoadFailed(format!("{} (cache: {})", remote_err, cache_err))
}

impl<R: RemoteSource, S: CacheStorage> Clone for CacheLayer<R, S> {
  fn clone(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      storage: Arc::clone(&self.storage),
    }
  }
}
