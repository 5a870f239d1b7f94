//! Serde-deserializable types matching the REST backend's responses.
//!
//! These types are separate from domain types so that server-side schema
//! drift (missing or null columns) is absorbed here and nowhere else.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

use super::de::{null_as_default, opt_string_or_number, string_or_number};

use super::types::{
  Base, BaseDetails, Link, Organization, OrganizationKind, PageCards, Table, TileConfig,
};

/// Decode a JSON array body into records, skipping elements that don't fit.
///
/// A body that is not a JSON array at all is treated as the remote being
/// unusable; a single bad element only costs that element.
pub fn decode_records<T: DeserializeOwned>(resource: &str, body: &[u8]) -> Result<Vec<T>> {
  let items: Vec<Value> = serde_json::from_slice(body).map_err(|e| {
    Error::RemoteUnavailable(format!("malformed {} payload: {}", resource, e))
  })?;

  let mut records = Vec::with_capacity(items.len());
  for (index, item) in items.into_iter().enumerate() {
    match serde_json::from_value(item) {
      Ok(record) => records.push(record),
      Err(e) => {
        let err = Error::deserialization(format!("{} #{}", resource, index), e);
        warn!("Skipping record: {}", err);
      }
    }
  }
  Ok(records)
}

/// Treat an empty string the same as a missing value.
fn non_empty(s: Option<String>) -> Option<String> {
  s.filter(|s| !s.is_empty())
}

// ============================================================================
// base
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiBase {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub name: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub city: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub state: String,
  pub active: Option<bool>,
}

impl From<ApiBase> for Base {
  fn from(b: ApiBase) -> Self {
    Base {
      id: b.id,
      name: b.name,
      city: b.city,
      state: b.state,
      active: b.active,
    }
  }
}

// ============================================================================
// organization
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiOrganization {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub name: String,
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub description: Option<String>,
  pub contact: Option<String>,
  #[serde(deserialize_with = "string_or_number")]
  pub base_id: String,
  pub web_url: Option<String>,
  pub image_url: Option<String>,
  pub primary_color: Option<String>,
  pub secondary_color: Option<String>,
  pub text_color: Option<String>,
  pub email: Option<String>,
  pub building_number: Option<String>,
  pub address: Option<String>,
  pub links: Option<Vec<Link>>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub use_tables: bool,
  #[serde(default)]
  pub table_data: Option<Vec<Table>>,
}

impl From<ApiOrganization> for Organization {
  fn from(o: ApiOrganization) -> Self {
    Organization {
      id: o.id,
      name: o.name,
      kind: o
        .kind
        .as_deref()
        .map(OrganizationKind::parse)
        .unwrap_or_default(),
      description: non_empty(o.description),
      contact: non_empty(o.contact),
      base_id: o.base_id,
      web_url: non_empty(o.web_url),
      image_url: non_empty(o.image_url),
      primary_color: non_empty(o.primary_color),
      secondary_color: non_empty(o.secondary_color),
      text_color: non_empty(o.text_color),
      email: o.email.unwrap_or_default(),
      building_number: non_empty(o.building_number),
      address: non_empty(o.address),
      links: o.links,
      use_table: o.use_tables,
      table_data: o.table_data.unwrap_or_default(),
    }
  }
}

// ============================================================================
// baseDetails
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiBaseDetails {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default, deserialize_with = "opt_string_or_number")]
  pub base_id: Option<String>,
  #[serde(default)]
  pub image_url: Option<String>,
  pub phone: Option<String>,
  pub email: Option<String>,
  pub commander: Option<String>,
  pub motto: Option<String>,
  pub population: Option<f64>,
  #[serde(default, deserialize_with = "opt_string_or_number")]
  pub user_id: Option<String>,
}

impl ApiBaseDetails {
  /// Convert to the domain type, stamping the requested base when the row omits it.
  pub fn into_domain(self, requested_base: &str) -> BaseDetails {
    BaseDetails {
      id: self.id,
      base_id: self
        .base_id
        .unwrap_or_else(|| requested_base.to_string()),
      image_url: self.image_url.unwrap_or_default(),
      phone: non_empty(self.phone),
      email: non_empty(self.email),
      commander: non_empty(self.commander),
      motto: non_empty(self.motto),
      population: self.population,
      user_id: self.user_id.unwrap_or_default(),
    }
  }
}

// ============================================================================
// appFields (page cards)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPageCards {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default, deserialize_with = "opt_string_or_number")]
  pub base_id: Option<String>,
  #[serde(default, deserialize_with = "opt_string_or_number")]
  pub org_id: Option<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub show_name: bool,
  #[serde(default, deserialize_with = "null_as_default")]
  pub show_motto: bool,
  #[serde(default, deserialize_with = "null_as_default")]
  pub show_commander: bool,
  #[serde(default, deserialize_with = "null_as_default")]
  pub show_phone: bool,
  #[serde(default, deserialize_with = "null_as_default")]
  pub show_email: bool,
  #[serde(default, deserialize_with = "null_as_default")]
  pub show_tables: bool,
  #[serde(default)]
  pub table_data: Option<Vec<Table>>,
  #[serde(default)]
  pub tiles_config: Option<Vec<TileConfig>>,
}

impl ApiPageCards {
  pub fn into_domain(self, requested_base: &str) -> PageCards {
    PageCards {
      id: self.id,
      base_id: Some(
        self
          .base_id
          .unwrap_or_else(|| requested_base.to_string()),
      ),
      org_id: self.org_id,
      show_name: self.show_name,
      show_motto: self.show_motto,
      show_commander: self.show_commander,
      show_phone: self.show_phone,
      show_email: self.show_email,
      show_tables: self.show_tables,
      table_data: self.table_data.unwrap_or_default(),
      tiles_config: self.tiles_config.unwrap_or_default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decode_skips_bad_elements() {
    let body = br#"[
      {"id": "O1", "name": "Alpha", "base_id": "B1", "use_tables": false},
      {"name": "missing id"},
      {"id": "O2", "name": "Bravo", "base_id": "B1", "email": null}
    ]"#;
    let orgs: Vec<ApiOrganization> = decode_records("organization", body).unwrap();
    assert_eq!(orgs.len(), 2);
    assert_eq!(orgs[1].id, "O2");
  }

  #[test]
  fn test_decode_rejects_non_array_body() {
    let body = br#"{"message": "JWT expired"}"#;
    let err = decode_records::<ApiBase>("base", body).unwrap_err();
    assert!(matches!(err, Error::RemoteUnavailable(_)));
  }

  #[test]
  fn test_organization_mapping_normalises_empty_strings() {
    let body = br#"[{
      "id": "O1", "name": "Alpha", "type": "Squadron", "description": "",
      "base_id": "B1", "web_url": "https://alpha", "use_tables": true,
      "links": [{"label": "Site", "link": "https://alpha"}],
      "table_data": [{"id": "T1", "title": "Roster", "headers": ["Name"], "data": [["Alpha"]]}]
    }]"#;
    let org: Organization = decode_records::<ApiOrganization>("organization", body)
      .unwrap()
      .remove(0)
      .into();
    assert_eq!(org.kind, OrganizationKind::Squadron);
    assert_eq!(org.description, None);
    assert_eq!(org.web_url.as_deref(), Some("https://alpha"));
    assert_eq!(org.email, "");
    assert!(org.use_table);
    assert_eq!(org.table_data[0].rows, vec![vec!["Alpha".to_string()]]);
    assert_eq!(org.links.unwrap()[0].url, "https://alpha");
  }

  #[test]
  fn test_details_without_base_id_get_requested_base() {
    let body = br#"[{"id": "D1", "image_url": "https://img", "population": 12000, "user_id": "u"}]"#;
    let details = decode_records::<ApiBaseDetails>("baseDetails", body)
      .unwrap()
      .remove(0)
      .into_domain("B1");
    assert_eq!(details.base_id, "B1");
    assert_eq!(details.population, Some(12000.0));
  }

  #[test]
  fn test_null_columns_keep_the_record() {
    let body = br#"[{
      "id": "P1", "base_id": null, "org_id": null, "show_name": null,
      "show_tables": null, "table_data": null, "tiles_config": null
    }]"#;
    let cards = decode_records::<ApiPageCards>("appFields", body).unwrap();
    assert_eq!(cards.len(), 1);
    let cards = cards.into_iter().next().unwrap().into_domain("B1");
    assert!(!cards.show_name);
    assert!(!cards.show_tables);
    assert_eq!(cards.base_id.as_deref(), Some("B1"));

    let body = br#"[{
      "id": "O1", "name": null, "type": null, "base_id": "B1", "email": null,
      "use_tables": null, "links": null, "table_data": null
    }]"#;
    let orgs = decode_records::<ApiOrganization>("organization", body).unwrap();
    assert_eq!(orgs.len(), 1);
    let org = Organization::from(orgs.into_iter().next().unwrap());
    assert!(!org.use_table);
    assert_eq!(org.name, "");
    assert_eq!(org.kind, OrganizationKind::Organization);
  }

  #[test]
  fn test_numeric_ids_are_read_as_strings() {
    let body = br#"[{
      "id": 5, "name": "Alpha", "base_id": 3, "use_tables": true,
      "table_data": [{"id": 1, "title": null, "headers": ["Day", "Hours"],
                      "rows": [["Mon", 800]]}]
    }]"#;
    let orgs = decode_records::<ApiOrganization>("organization", body).unwrap();
    assert_eq!(orgs.len(), 1);
    let org = Organization::from(orgs.into_iter().next().unwrap());
    assert_eq!(org.id, "5");
    assert_eq!(org.base_id, "3");
    let table = &org.table_data[0];
    assert_eq!(table.id, "1");
    assert_eq!(table.title, "");
    assert_eq!(table.rows, vec![vec!["Mon".to_string(), "800".to_string()]]);
  }

  #[test]
  fn test_tile_null_fields_use_defaults() {
    let body = br#"[{
      "id": "P1",
      "tiles_config": [{"id": 9, "type": "text", "color": null, "title": null,
                        "content": "Hello", "visible": null}]
    }]"#;
    let cards = decode_records::<ApiPageCards>("appFields", body)
      .unwrap()
      .remove(0)
      .into_domain("B1");
    let tile = &cards.tiles_config[0];
    assert_eq!(tile.id, "9");
    assert_eq!(tile.color, "");
    assert!(tile.visible);
    assert_eq!(cards.visible_tiles().count(), 1);
  }

  #[test]
  fn test_page_cards_tolerate_missing_columns() {
    let body = br#"[{"id": "P1", "show_name": true}]"#;
    let cards = decode_records::<ApiPageCards>("appFields", body)
      .unwrap()
      .remove(0)
      .into_domain("B1");
    assert_eq!(cards.base_id.as_deref(), Some("B1"));
    assert!(cards.show_name);
    assert!(!cards.show_tables);
    assert!(cards.tiles_config.is_empty());
  }
}
