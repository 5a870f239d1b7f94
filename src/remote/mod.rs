//! Remote data source: the REST backend that owns the directory data.

pub mod api_types;
pub mod client;
mod de;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

use self::types::{Base, BaseDetails, Organization, PageCards};

pub use client::RemoteClient;

/// Read-only access to the backend.
///
/// Each call either returns every record the backend sent (possibly none) or
/// fails with `Error::RemoteUnavailable`. Nothing is retried here.
#[async_trait]
pub trait RemoteSource: Send + Sync {
  async fn fetch_bases(&self) -> Result<Vec<Base>>;

  async fn fetch_organizations(&self, base_id: &str) -> Result<Vec<Organization>>;

  /// Usually zero or one record; callers take the first.
  async fn fetch_base_details(&self, base_id: &str) -> Result<Vec<BaseDetails>>;

  /// Usually zero or one record; callers take the first.
  async fn fetch_page_cards(&self, base_id: &str) -> Result<Vec<PageCards>>;
}
