//! Fixtures and a scripted remote source for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::remote::types::{Base, BaseDetails, Organization, OrganizationKind, PageCards};
use crate::remote::RemoteSource;

pub fn base(id: &str, name: &str) -> Base {
  Base {
    id: id.to_string(),
    name: name.to_string(),
    city: "City".to_string(),
    state: "ST".to_string(),
    active: Some(true),
  }
}

pub fn organization(id: &str, base_id: &str, name: &str) -> Organization {
  Organization {
    id: id.to_string(),
    name: name.to_string(),
    kind: OrganizationKind::Squadron,
    description: None,
    contact: None,
    base_id: base_id.to_string(),
    web_url: None,
    image_url: None,
    primary_color: None,
    secondary_color: None,
    text_color: None,
    email: format!("{}@example.test", id),
    building_number: None,
    address: None,
    links: None,
    use_table: false,
    table_data: Vec::new(),
  }
}

pub fn details(id: &str, base_id: &str) -> BaseDetails {
  BaseDetails {
    id: id.to_string(),
    base_id: base_id.to_string(),
    image_url: format!("https://img.test/{}.png", base_id),
    phone: Some("555-0100".to_string()),
    email: None,
    commander: Some("Col. Example".to_string()),
    motto: Some("Aim high".to_string()),
    population: Some(5000.0),
    user_id: "user-1".to_string(),
  }
}

pub fn page_cards(id: &str, base_id: &str) -> PageCards {
  PageCards {
    id: id.to_string(),
    base_id: Some(base_id.to_string()),
    org_id: None,
    show_name: true,
    show_motto: true,
    show_commander: true,
    show_phone: true,
    show_email: false,
    show_tables: false,
    table_data: Vec::new(),
    tiles_config: Vec::new(),
  }
}

/// Which remote call a failure is scripted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
  Bases,
  Organizations,
  BaseDetails,
  PageCards,
}

/// In-memory remote source with per-base, per-call failure injection.
#[derive(Default)]
pub struct FakeRemote {
  bases: Mutex<Vec<Base>>,
  organizations: Mutex<HashMap<String, Vec<Organization>>>,
  details: Mutex<HashMap<String, Vec<BaseDetails>>>,
  cards: Mutex<HashMap<String, Vec<PageCards>>>,
  failures: Mutex<HashSet<(String, Call)>>,
  offline: Mutex<bool>,
  calls: Mutex<Vec<(String, Call)>>,
}

impl FakeRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_bases(self, bases: Vec<Base>) -> Self {
    *self.bases.lock().unwrap() = bases;
    self
  }

  pub fn with_organizations(self, base_id: &str, orgs: Vec<Organization>) -> Self {
    self
      .organizations
      .lock()
      .unwrap()
      .insert(base_id.to_string(), orgs);
    self
  }

  pub fn with_details(self, base_id: &str, details: Vec<BaseDetails>) -> Self {
    self
      .details
      .lock()
      .unwrap()
      .insert(base_id.to_string(), details);
    self
  }

  pub fn with_page_cards(self, base_id: &str, cards: Vec<PageCards>) -> Self {
    self
      .cards
      .lock()
      .unwrap()
      .insert(base_id.to_string(), cards);
    self
  }

  /// Make one call for one base fail.
  pub fn fail(&self, base_id: &str, call: Call) {
    self
      .failures
      .lock()
      .unwrap()
      .insert((base_id.to_string(), call));
  }

  /// Make every call fail.
  pub fn go_offline(&self) {
    *self.offline.lock().unwrap() = true;
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  fn check(&self, base_id: &str, call: Call) -> Result<()> {
    self
      .calls
      .lock()
      .unwrap()
      .push((base_id.to_string(), call));
    let failing = *self.offline.lock().unwrap()
      || self
        .failures
        .lock()
        .unwrap()
        .contains(&(base_id.to_string(), call));
    if failing {
      Err(Error::RemoteUnavailable(format!(
        "scripted failure: {:?} for {}",
        call, base_id
      )))
    } else {
      Ok(())
    }
  }
}

#[async_trait]
impl RemoteSource for FakeRemote {
  async fn fetch_bases(&self) -> Result<Vec<Base>> {
    self.check("", Call::Bases)?;
    Ok(self.bases.lock().unwrap().clone())
  }

  async fn fetch_organizations(&self, base_id: &str) -> Result<Vec<Organization>> {
    self.check(base_id, Call::Organizations)?;
    Ok(
      self
        .organizations
        .lock()
        .unwrap()
        .get(base_id)
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn fetch_base_details(&self, base_id: &str) -> Result<Vec<BaseDetails>> {
    self.check(base_id, Call::BaseDetails)?;
    Ok(
      self
        .details
        .lock()
        .unwrap()
        .get(base_id)
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn fetch_page_cards(&self, base_id: &str) -> Result<Vec<PageCards>> {
    self.check(base_id, Call::PageCards)?;
    Ok(
      self
        .cards
        .lock()
        .unwrap()
        .get(base_id)
        .cloned()
        .unwrap_or_default(),
    )
  }
}
