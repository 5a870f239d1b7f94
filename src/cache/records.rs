//! Table mappings for the directory entities.

use rusqlite::types::Value;
use rusqlite::Row;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::remote::types::{Base, BaseDetails, Organization, OrganizationKind, PageCards};

use super::traits::Record;

fn encode_blob<T: Serialize>(value: &T, what: &str) -> Result<Value> {
  serde_json::to_string(value)
    .map(Value::Text)
    .map_err(|e| Error::deserialization(what, e))
}

fn decode_blob<T: DeserializeOwned>(text: &str, what: &str, id: &str) -> Result<T> {
  serde_json::from_str(text).map_err(|e| Error::deserialization(format!("{} of {}", what, id), e))
}

// ============================================================================
// bases
// ============================================================================

impl Record for Base {
  const TABLE: &'static str = "bases";
  const COLUMNS: &'static [&'static str] = &["id", "name", "city", "state", "active"];
  const BASE_COLUMN: &'static str = "id";
  const ORDER_BY: &'static str = "name ASC";

  fn to_values(&self) -> Result<Vec<Value>> {
    Ok(vec![
      self.id.clone().into(),
      self.name.clone().into(),
      self.city.clone().into(),
      self.state.clone().into(),
      self.active.into(),
    ])
  }

  fn from_row(row: &Row<'_>) -> Result<Self> {
    Ok(Base {
      id: row.get(0)?,
      name: row.get(1)?,
      city: row.get(2)?,
      state: row.get(3)?,
      active: row.get(4)?,
    })
  }
}

// ============================================================================
// organizations
// ============================================================================

impl Record for Organization {
  const TABLE: &'static str = "organizations";
  const COLUMNS: &'static [&'static str] = &[
    "id",
    "base_id",
    "name",
    "kind",
    "description",
    "contact",
    "web_url",
    "image_url",
    "primary_color",
    "secondary_color",
    "text_color",
    "email",
    "building_number",
    "address",
    "links",
    "use_table",
    "table_data",
  ];
  const BASE_COLUMN: &'static str = "base_id";
  const ORDER_BY: &'static str = "name ASC";

  fn to_values(&self) -> Result<Vec<Value>> {
    let links = match &self.links {
      Some(links) => encode_blob(links, "organization links")?,
      None => Value::Null,
    };
    Ok(vec![
      self.id.clone().into(),
      self.base_id.clone().into(),
      self.name.clone().into(),
      self.kind.as_str().to_string().into(),
      self.description.clone().into(),
      self.contact.clone().into(),
      self.web_url.clone().into(),
      self.image_url.clone().into(),
      self.primary_color.clone().into(),
      self.secondary_color.clone().into(),
      self.text_color.clone().into(),
      self.email.clone().into(),
      self.building_number.clone().into(),
      self.address.clone().into(),
      links,
      self.use_table.into(),
      encode_blob(&self.table_data, "organization tables")?,
    ])
  }

  fn from_row(row: &Row<'_>) -> Result<Self> {
    let id: String = row.get(0)?;
    let kind: String = row.get(3)?;
    let links: Option<String> = row.get(14)?;
    let table_data: String = row.get(16)?;

    let links = match links {
      Some(text) => Some(decode_blob(&text, "links", &id)?),
      None => None,
    };
    let table_data = decode_blob(&table_data, "tables", &id)?;

    Ok(Organization {
      base_id: row.get(1)?,
      name: row.get(2)?,
      kind: OrganizationKind::parse(&kind),
      description: row.get(4)?,
      contact: row.get(5)?,
      web_url: row.get(6)?,
      image_url: row.get(7)?,
      primary_color: row.get(8)?,
      secondary_color: row.get(9)?,
      text_color: row.get(10)?,
      email: row.get(11)?,
      building_number: row.get(12)?,
      address: row.get(13)?,
      links,
      use_table: row.get(15)?,
      table_data,
      id,
    })
  }
}

// ============================================================================
// base_details
// ============================================================================

impl Record for BaseDetails {
  const TABLE: &'static str = "base_details";
  const COLUMNS: &'static [&'static str] = &[
    "id",
    "base_id",
    "image_url",
    "phone",
    "email",
    "commander",
    "motto",
    "population",
    "user_id",
  ];
  const BASE_COLUMN: &'static str = "base_id";
  const ORDER_BY: &'static str = "id ASC";

  fn to_values(&self) -> Result<Vec<Value>> {
    Ok(vec![
      self.id.clone().into(),
      self.base_id.clone().into(),
      self.image_url.clone().into(),
      self.phone.clone().into(),
      self.email.clone().into(),
      self.commander.clone().into(),
      self.motto.clone().into(),
      self.population.into(),
      self.user_id.clone().into(),
    ])
  }

  fn from_row(row: &Row<'_>) -> Result<Self> {
    Ok(BaseDetails {
      id: row.get(0)?,
      base_id: row.get(1)?,
      image_url: row.get(2)?,
      phone: row.get(3)?,
      email: row.get(4)?,
      commander: row.get(5)?,
      motto: row.get(6)?,
      population: row.get(7)?,
      user_id: row.get(8)?,
    })
  }
}

// ============================================================================
// page_cards
// ============================================================================

impl Record for PageCards {
  const TABLE: &'static str = "page_cards";
  const COLUMNS: &'static [&'static str] = &[
    "id",
    "base_id",
    "org_id",
    "show_name",
    "show_motto",
    "show_commander",
    "show_phone",
    "show_email",
    "show_tables",
    "table_data",
    "tiles_config",
  ];
  const BASE_COLUMN: &'static str = "base_id";
  const ORDER_BY: &'static str = "id ASC";

  fn to_values(&self) -> Result<Vec<Value>> {
    Ok(vec![
      self.id.clone().into(),
      self.base_id.clone().into(),
      self.org_id.clone().into(),
      self.show_name.into(),
      self.show_motto.into(),
      self.show_commander.into(),
      self.show_phone.into(),
      self.show_email.into(),
      self.show_tables.into(),
      encode_blob(&self.table_data, "page tables")?,
      encode_blob(&self.tiles_config, "page tiles")?,
    ])
  }

  fn from_row(row: &Row<'_>) -> Result<Self> {
    let id: String = row.get(0)?;
    let table_data: String = row.get(9)?;
    let tiles_config: String = row.get(10)?;

    Ok(PageCards {
      base_id: row.get(1)?,
      org_id: row.get(2)?,
      show_name: row.get(3)?,
      show_motto: row.get(4)?,
      show_commander: row.get(5)?,
      show_phone: row.get(6)?,
      show_email: row.get(7)?,
      show_tables: row.get(8)?,
      table_data: decode_blob(&table_data, "tables", &id)?,
      tiles_config: decode_blob(&tiles_config, "tiles", &id)?,
      id,
    })
  }
}
