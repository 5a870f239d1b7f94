//! Writes remote data for followed bases into the local store.

use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::Result;
use crate::remote::types::{Base, Table};
use crate::remote::RemoteSource;

use super::storage::CacheStorage;
use super::traits::Record;

/// Outcome of one entity type for one base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityOutcome {
  /// Fetched and stored this many records
  Synced(usize),
  /// Fetch or write failed; the store keeps its previous copy
  Failed(String),
}

impl EntityOutcome {
  pub fn is_synced(&self) -> bool {
    matches!(self, EntityOutcome::Synced(_))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSyncOutcome {
  pub base_id: String,
  pub base_name: String,
  pub organizations: EntityOutcome,
  pub base_details: EntityOutcome,
  pub page_cards: EntityOutcome,
}

impl BaseSyncOutcome {
  pub fn is_complete(&self) -> bool {
    self.organizations.is_synced() && self.base_details.is_synced() && self.page_cards.is_synced()
  }

  /// (entity, reason) for every failed entity
  pub fn failures(&self) -> Vec<(&'static str, &str)> {
    [
      ("organizations", &self.organizations),
      ("base details", &self.base_details),
      ("page cards", &self.page_cards),
    ]
    .into_iter()
    .filter_map(|(name, outcome)| match outcome {
      EntityOutcome::Failed(reason) => Some((name, reason.as_str())),
      EntityOutcome::Synced(_) => None,
    })
    .collect()
  }
}

/// Best-effort summary of a sync run. Outcomes are in completion order.
#[derive(Debug, Clone)]
pub struct SyncReport {
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  /// Whether the followed bases themselves were written
  pub bases_saved: bool,
  pub outcomes: Vec<BaseSyncOutcome>,
}

impl SyncReport {
  #[cfg(test)]
  pub fn outcome(&self, base_id: &str) -> Option<&BaseSyncOutcome> {
    self.outcomes.iter().find(|o| o.base_id == base_id)
  }

  pub fn complete_count(&self) -> usize {
    self.outcomes.iter().filter(|o| o.is_complete()).count()
  }

  pub fn is_complete(&self) -> bool {
    self.bases_saved && self.outcomes.iter().all(BaseSyncOutcome::is_complete)
  }
}

/// Populates the local store from the remote source.
pub struct Synchronizer<R: RemoteSource, S: CacheStorage> {
  remote: Arc<R>,
  storage: Arc<S>,
  /// Bases synced at once
  concurrency: usize,
}

impl<R: RemoteSource, S: CacheStorage> Synchronizer<R, S> {
  pub fn new(remote: Arc<R>, storage: Arc<S>) -> Self {
    Self {
      remote,
      storage,
      concurrency: 4,
    }
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  /// Save the followed bases and refresh everything cached for each of them.
  ///
  /// Never fails: each base, and each entity within a base, is isolated, so
  /// one failure only leaves that entity's previous copy in place.
  pub async fn sync_all(&self, followed: &[Base]) -> SyncReport {
    let started_at = Utc::now();
    let bases = dedup_by_id(followed);
    info!("Syncing {} followed bases", bases.len());

    let bases_saved = match self.storage.upsert_many(&bases) {
      Ok(()) => true,
      Err(e) => {
        warn!("Failed to save followed bases: {}", e);
        false
      }
    };

    let units: Vec<_> = bases.iter().map(|base| self.sync_base(base)).collect();
    let outcomes: Vec<BaseSyncOutcome> = futures::stream::iter(units)
      .buffer_unordered(self.concurrency)
      .collect()
      .await;

    let report = SyncReport {
      started_at,
      finished_at: Utc::now(),
      bases_saved,
      outcomes,
    };
    info!(
      "Sync finished: {}/{} bases complete",
      report.complete_count(),
      report.outcomes.len()
    );
    report
  }

  /// Run `sync_all` in the background.
  pub fn spawn(&self, followed: Vec<Base>) -> JoinHandle<SyncReport>
  where
    R: 'static,
    S: 'static,
  {
    let this = self.clone();
    tokio::spawn(async move { this.sync_all(&followed).await })
  }

  async fn sync_base(&self, base: &Base) -> BaseSyncOutcome {
    let id = base.id.as_str();

    let orgs = self.remote.fetch_organizations(id).map(|res| {
      if let Ok(orgs) = &res {
        for org in orgs {
          check_tables(&org.id, &org.table_data);
        }
      }
      res
    });
    let cards = self.remote.fetch_page_cards(id).map(|res| {
      if let Ok(cards) = &res {
        for card in cards {
          check_tables(&card.id, &card.table_data);
        }
      }
      res
    });

    let (organizations, base_details, page_cards) = tokio::join!(
      self.sync_entity("organizations", id, orgs, false),
      self.sync_entity("base details", id, self.remote.fetch_base_details(id), true),
      self.sync_entity("page cards", id, cards, true),
    );

    BaseSyncOutcome {
      base_id: base.id.clone(),
      base_name: base.name.clone(),
      organizations,
      base_details,
      page_cards,
    }
  }

  /// Fetch one entity type and make it the stored set for the base.
  /// Singular entities keep only the first record. On a failed fetch the
  /// stored rows are left alone.
  async fn sync_entity<T, F>(
    &self,
    what: &str,
    base_id: &str,
    fetch: F,
    singular: bool,
  ) -> EntityOutcome
  where
    T: Record,
    F: Future<Output = Result<Vec<T>>>,
  {
    let mut records = match fetch.await {
      Ok(records) => records,
      Err(e) => {
        warn!("Sync of {} for base {} failed: {}", what, base_id, e);
        return EntityOutcome::Failed(e.to_string());
      }
    };
    if singular {
      records.truncate(1);
    }

    match self.storage.replace_for_base(base_id, &records) {
      Ok(()) => EntityOutcome::Synced(records.len()),
      Err(e) => {
        warn!("Writing {} for base {} failed: {}", what, base_id, e);
        EntityOutcome::Failed(e.to_string())
      }
    }
  }
}

impl<R: RemoteSource, S: CacheStorage> Clone for Synchronizer<R, S> {
  fn clone(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      storage: Arc::clone(&self.storage),
      concurrency: self.concurrency,
    }
  }
}

/// Keep the last occurrence of each id, in first-seen order.
fn dedup_by_id(bases: &[Base]) -> Vec<Base> {
  let mut order: Vec<&str> = Vec::new();
  let mut latest: HashMap<&str, &Base> = HashMap::new();
  for base in bases {
    if latest.insert(base.id.as_str(), base).is_none() {
      order.push(base.id.as_str());
    }
  }
  order
    .into_iter()
    .filter_map(|id| latest.get(id).map(|b| (*b).clone()))
    .collect()
}

/// Ragged tables are stored as-is; readers pad them with `Table::padded_rows`.
fn check_tables(owner: &str, tables: &[Table]) {
  for table in tables.iter().filter(|t| !t.is_rectangular()) {
    warn!(
      "Table {} of {} has rows that don't match its {} headers",
      table.id,
      owner,
      table.headers.len()
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::layer::CacheLayer;
  use crate::cache::SqliteStorage;
  use crate::remote::types::{BaseDetails, Organization, PageCards};
  use crate::testing::{base, details, organization, page_cards, Call, FakeRemote};

  fn setup(remote: FakeRemote) -> (Synchronizer<FakeRemote, SqliteStorage>, Arc<FakeRemote>, Arc<SqliteStorage>) {
    let remote = Arc::new(remote);
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    (
      Synchronizer::new(Arc::clone(&remote), Arc::clone(&storage)),
      remote,
      storage,
    )
  }

  fn two_bases() -> FakeRemote {
    FakeRemote::new()
      .with_organizations("A", vec![organization("OA", "A", "Alpha")])
      .with_details("A", vec![details("DA", "A")])
      .with_page_cards("A", vec![page_cards("PA", "A")])
      .with_organizations("B", vec![organization("OB", "B", "Bravo")])
      .with_details("B", vec![details("DB", "B")])
      .with_page_cards("B", vec![page_cards("PB", "B")])
  }

  #[tokio::test]
  async fn test_sync_stores_everything() {
    let (sync, _, storage) = setup(two_bases());

    let report = sync.sync_all(&[base("A", "Base A"), base("B", "Base B")]).await;
    assert!(report.is_complete());
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(storage.get_all::<Base>().unwrap().len(), 2);
    assert_eq!(storage.get_all::<Organization>().unwrap().len(), 2);
    assert_eq!(storage.get_all::<BaseDetails>().unwrap().len(), 2);
    assert_eq!(storage.get_all::<PageCards>().unwrap().len(), 2);
    assert!(storage.has_cached_data().unwrap());
  }

  #[tokio::test]
  async fn test_failure_is_isolated_per_base_and_entity() {
    let (sync, remote, storage) = setup(two_bases());
    remote.fail("A", Call::Organizations);

    let report = sync.sync_all(&[base("A", "Base A"), base("B", "Base B")]).await;

    let a = report.outcome("A").unwrap();
    assert!(matches!(a.organizations, EntityOutcome::Failed(_)));
    assert_eq!(a.base_details, EntityOutcome::Synced(1));
    assert_eq!(a.page_cards, EntityOutcome::Synced(1));
    assert_eq!(a.failures().len(), 1);
    assert!(report.outcome("B").unwrap().is_complete());
    assert!(!report.is_complete());

    assert!(storage.get_by_base_id::<Organization>("A").unwrap().is_empty());
    assert_eq!(storage.get_by_base_id::<BaseDetails>("A").unwrap().len(), 1);
    assert_eq!(storage.get_by_base_id::<PageCards>("A").unwrap().len(), 1);
    assert_eq!(storage.get_by_base_id::<Organization>("B").unwrap().len(), 1);
    assert_eq!(storage.get_by_base_id::<BaseDetails>("B").unwrap().len(), 1);
    assert_eq!(storage.get_by_base_id::<PageCards>("B").unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_failed_fetch_keeps_previous_copy() {
    let (sync, remote, storage) = setup(two_bases());
    let previous = organization("OLD", "A", "Previously synced");
    storage.upsert_one(&previous).unwrap();
    remote.fail("A", Call::Organizations);

    sync.sync_all(&[base("A", "Base A")]).await;
    assert_eq!(
      storage.get_by_base_id::<Organization>("A").unwrap(),
      vec![previous]
    );
  }

  #[tokio::test]
  async fn test_offline_sync_still_saves_bases() {
    let (sync, remote, storage) = setup(two_bases());
    remote.go_offline();

    let report = sync.sync_all(&[base("A", "Base A")]).await;
    assert!(report.bases_saved);
    assert_eq!(report.complete_count(), 0);
    assert_eq!(storage.get_all::<Base>().unwrap(), vec![base("A", "Base A")]);
  }

  #[tokio::test]
  async fn test_singular_entities_keep_first_record() {
    let remote = FakeRemote::new().with_details("A", vec![details("D1", "A"), details("D2", "A")]);
    let (sync, _, storage) = setup(remote);

    let report = sync.sync_all(&[base("A", "Base A")]).await;
    assert_eq!(report.outcome("A").unwrap().base_details, EntityOutcome::Synced(1));
    let stored = storage.get_by_base_id::<BaseDetails>("A").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "D1");
  }

  #[tokio::test]
  async fn test_duplicate_bases_are_synced_once() {
    let (sync, remote, _) = setup(two_bases());

    let mut renamed = base("A", "Base A renamed");
    renamed.active = None;
    let report = sync
      .sync_all(&[base("A", "Base A"), base("B", "Base B"), renamed])
      .await;
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcome("A").unwrap().base_name, "Base A renamed");
    // Three fetches per base
    assert_eq!(remote.call_count(), 6);
  }

  #[tokio::test]
  async fn test_many_bases_with_low_concurrency() {
    let mut remote = FakeRemote::new();
    let mut bases = Vec::new();
    for i in 0..10 {
      let id = format!("B{}", i);
      remote = remote.with_organizations(&id, vec![organization(&format!("O{}", i), &id, "Org")]);
      bases.push(base(&id, &format!("Base {}", i)));
    }
    let (sync, _, storage) = setup(remote);
    let sync = sync.with_concurrency(2);

    let report = sync.sync_all(&bases).await;
    assert_eq!(report.complete_count(), 10);
    assert_eq!(storage.get_all::<Organization>().unwrap().len(), 10);
  }

  #[tokio::test]
  async fn test_spawned_sync_reports() {
    let (sync, _, storage) = setup(two_bases());
    let handle = sync.spawn(vec![base("B", "Base B")]);
    let report = handle.await.unwrap();
    assert!(report.is_complete());
    assert_eq!(storage.get_by_base_id::<Organization>("B").unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_offline_view_matches_online_view_after_sync() {
    let mut org = organization("O1", "B1", "Alpha");
    org.use_table = true;
    org.table_data = vec![Table {
      id: "T1".to_string(),
      title: "Roster".to_string(),
      headers: vec!["Name".to_string()],
      rows: vec![vec!["Alpha".to_string()]],
    }];
    let remote = FakeRemote::new()
      .with_organizations("B1", vec![org])
      .with_details("B1", vec![details("D1", "B1")])
      .with_page_cards("B1", vec![page_cards("P1", "B1")]);
    let (sync, remote, storage) = setup(remote);
    let loader = CacheLayer::new(Arc::clone(&remote), Arc::clone(&storage));

    let online = loader.load_base_view("B1").await.unwrap();
    assert!(!online.from_cache());

    sync.sync_all(&[base("B1", "Base One")]).await;
    remote.go_offline();

    let offline = loader.load_base_view("B1").await.unwrap();
    assert!(offline.from_cache());
    assert_eq!(offline.data, online.data);
  }

  #[tokio::test]
  async fn test_resync_drops_rows_the_server_no_longer_has() {
    let remote = FakeRemote::new()
      .with_organizations("B1", vec![organization("O1", "B1", "Alpha")])
      .with_details("B1", vec![details("D1", "B1")]);
    let (sync, _, storage) = setup(remote);
    sync.sync_all(&[base("B1", "Base One")]).await;

    let remote = Arc::new(
      FakeRemote::new()
        .with_organizations("B1", vec![organization("O2", "B1", "Bravo")])
        .with_details("B1", vec![details("D2", "B1")]),
    );
    let sync = Synchronizer::new(Arc::clone(&remote), Arc::clone(&storage));
    let loader = CacheLayer::new(Arc::clone(&remote), Arc::clone(&storage));
    sync.sync_all(&[base("B1", "Base One")]).await;
    let online = loader.load_base_view("B1").await.unwrap();

    remote.go_offline();
    let offline = loader.load_base_view("B1").await.unwrap();
    assert!(offline.from_cache());
    assert_eq!(offline.data, online.data);
    let ids: Vec<&str> = offline.data.organizations.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["O2"]);
    assert_eq!(offline.data.base_details.map(|d| d.id).as_deref(), Some("D2"));
  }

  #[tokio::test]
  async fn test_empty_fetch_clears_the_base() {
    let (sync, _, storage) = setup(FakeRemote::new());
    storage.upsert_one(&organization("OLD", "A", "Disbanded")).unwrap();
    storage.upsert_one(&organization("KEEP", "B", "Other base")).unwrap();

    let report = sync.sync_all(&[base("A", "Base A")]).await;
    assert_eq!(report.outcome("A").unwrap().organizations, EntityOutcome::Synced(0));
    assert!(storage.get_by_base_id::<Organization>("A").unwrap().is_empty());
    assert_eq!(storage.get_by_base_id::<Organization>("B").unwrap().len(), 1);
  }

  #[test]
  fn test_dedup_keeps_last_in_first_seen_order() {
    let bases = dedup_by_id(&[base("A", "1"), base("B", "2"), base("A", "3")]);
    let pairs: Vec<(&str, &str)> = bases
      .iter()
      .map(|b| (b.id.as_str(), b.name.as_str()))
      .collect();
    assert_eq!(pairs, vec![("A", "3"), ("B", "2")]);
  }
}
