//! Domain types for the base directory.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::de::{null_as_default, null_as_true, scalar_rows, scalar_strings, string_or_number};

/// An installation the user can follow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Base {
  pub id: String,
  pub name: String,
  pub city: String,
  pub state: String,
  #[serde(default)]
  pub active: Option<bool>,
}

/// A labelled hyperlink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  #[serde(default, deserialize_with = "null_as_default")]
  pub label: String,
  #[serde(alias = "link")]
  pub url: String,
}

/// A titled table of strings.
///
/// Rows are kept exactly as received, including rows whose length differs
/// from the header count. Use [`Table::padded_rows`] when a rectangular
/// shape is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub title: String,
  #[serde(default, deserialize_with = "scalar_strings")]
  pub headers: Vec<String>,
  #[serde(default, alias = "data", deserialize_with = "scalar_rows")]
  pub rows: Vec<Vec<String>>,
}

impl Table {
  /// True when every row has as many cells as there are headers.
  pub fn is_rectangular(&self) -> bool {
    self.rows.iter().all(|r| r.len() == self.headers.len())
  }

  /// Rows padded with empty cells or truncated to the header count.
  pub fn padded_rows(&self) -> Vec<Vec<String>> {
    let width = self.headers.len();
    self
      .rows
      .iter()
      .map(|row| {
        let mut row: Vec<String> = row.iter().take(width).cloned().collect();
        row.resize(width, String::new());
        row
      })
      .collect()
  }
}

/// Category of an organization, parsed from the server's `type` string
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationKind {
  Wing,
  Group,
  Squadron,
  Agency,
  #[default]
  Organization,
  Support,
}

impl OrganizationKind {
  pub fn parse(s: &str) -> Self {
    match s.trim().to_lowercase().as_str() {
      "wing" => Self::Wing,
      "group" => Self::Group,
      "squadron" => Self::Squadron,
      "agency" => Self::Agency,
      "support" => Self::Support,
      _ => Self::Organization,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Wing => "wing",
      Self::Group => "group",
      Self::Squadron => "squadron",
      Self::Agency => "agency",
      Self::Organization => "organization",
      Self::Support => "support",
    }
  }

  pub fn display_name(&self) -> &'static str {
    match self {
      Self::Wing => "Wing",
      Self::Group => "Group",
      Self::Squadron => "Squadron",
      Self::Agency => "Agency",
      Self::Organization => "Organization",
      Self::Support => "Support",
    }
  }
}

/// A unit or department belonging to a base
#[derive(Debug, Clone, PartialEq)]
pub struct Organization {
  pub id: String,
  pub name: String,
  pub kind: OrganizationKind,
  pub description: Option<String>,
  pub contact: Option<String>,
  pub base_id: String,
  pub web_url: Option<String>,
  pub image_url: Option<String>,
  pub primary_color: Option<String>,
  pub secondary_color: Option<String>,
  pub text_color: Option<String>,
  pub email: String,
  pub building_number: Option<String>,
  pub address: Option<String>,
  pub links: Option<Vec<Link>>,
  pub use_table: bool,
  pub table_data: Vec<Table>,
}

/// Header information for a base, one per base
#[derive(Debug, Clone, PartialEq)]
pub struct BaseDetails {
  pub id: String,
  pub base_id: String,
  pub image_url: String,
  pub phone: Option<String>,
  pub email: Option<String>,
  pub commander: Option<String>,
  pub motto: Option<String>,
  pub population: Option<f64>,
  pub user_id: String,
}

/// Per-base display configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PageCards {
  pub id: String,
  pub base_id: Option<String>,
  pub org_id: Option<String>,
  pub show_name: bool,
  pub show_motto: bool,
  pub show_commander: bool,
  pub show_phone: bool,
  pub show_email: bool,
  pub show_tables: bool,
  pub table_data: Vec<Table>,
  pub tiles_config: Vec<TileConfig>,
}

impl PageCards {
  pub fn visible_tiles(&self) -> impl Iterator<Item = &TileConfig> {
    self.tiles_config.iter().filter(|t| t.visible)
  }

  /// Resolve a table referenced by a tile.
  pub fn table(&self, id: &str) -> Option<&Table> {
    self.table_data.iter().find(|t| t.id == id)
  }
}

/// One tile of a base's home grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTile", into = "RawTile")]
pub struct TileConfig {
  pub id: String,
  /// Section type as sent by the server, e.g. "text" or "links"
  pub kind: String,
  /// Theme token such as "sky-500/20"
  pub color: String,
  pub title: String,
  pub content: TileContent,
  pub visible: bool,
}

/// Payload of a tile, shaped by the tile's type
#[derive(Debug, Clone, PartialEq)]
pub enum TileContent {
  Text(String),
  Images(Vec<String>),
  TableRefs(Vec<String>),
  Links(Vec<Link>),
  Contact {
    phone: Option<String>,
    email: Option<String>,
  },
  /// Unrecognised type, or a payload of the wrong shape for its type
  Unknown(Value),
}

impl TileContent {
  /// Interpret a raw payload according to the sibling `type` field.
  pub fn from_raw(kind: &str, raw: Value) -> Self {
    let parsed = match kind.trim().to_lowercase().as_str() {
      "text" => match &raw {
        Value::String(s) => Some(TileContent::Text(s.clone())),
        _ => None,
      },
      "image" | "images" => image_urls(&raw).map(TileContent::Images),
      "table" => string_list(&raw).map(TileContent::TableRefs),
      "link" | "links" => links(&raw).map(TileContent::Links),
      "contact" => match &raw {
        Value::Object(map) => Some(TileContent::Contact {
          phone: map.get("phone").and_then(scalar_string),
          email: map.get("email").and_then(scalar_string),
        }),
        _ => None,
      },
      _ => None,
    };
    parsed.unwrap_or(TileContent::Unknown(raw))
  }

  /// The payload in the shape [`TileContent::from_raw`] accepts.
  pub fn to_raw(&self) -> Value {
    match self {
      TileContent::Text(s) => Value::String(s.clone()),
      TileContent::Images(urls) | TileContent::TableRefs(urls) => {
        Value::Array(urls.iter().cloned().map(Value::String).collect())
      }
      TileContent::Links(links) => Value::Array(
        links
          .iter()
          .map(|l| serde_json::json!({ "label": l.label, "url": l.url }))
          .collect(),
      ),
      TileContent::Contact { phone, email } => {
        let mut map = serde_json::Map::new();
        if let Some(p) = phone {
          map.insert("phone".to_string(), Value::String(p.clone()));
        }
        if let Some(e) = email {
          map.insert("email".to_string(), Value::String(e.clone()));
        }
        Value::Object(map)
      }
      TileContent::Unknown(raw) => raw.clone(),
    }
  }
}

fn scalar_string(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn string_list(v: &Value) -> Option<Vec<String>> {
  match v {
    Value::Array(items) => Some(items.iter().filter_map(scalar_string).collect()),
    other => scalar_string(other).map(|s| vec![s]),
  }
}

fn image_urls(v: &Value) -> Option<Vec<String>> {
  match v {
    Value::Object(map) => map
      .get("url")
      .and_then(scalar_string)
      .map(|url| vec![url]),
    other => string_list(other),
  }
}

fn links(v: &Value) -> Option<Vec<Link>> {
  match v {
    Value::Array(items) => items
      .iter()
      .map(|item| serde_json::from_value(item.clone()).ok())
      .collect(),
    Value::Object(_) => serde_json::from_value(v.clone()).ok().map(|l| vec![l]),
    _ => None,
  }
}

/// Tile as it appears on the wire and in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTile {
  #[serde(deserialize_with = "string_or_number")]
  id: String,
  #[serde(rename = "type", default, deserialize_with = "null_as_default")]
  kind: String,
  #[serde(default, deserialize_with = "null_as_default")]
  color: String,
  #[serde(default, deserialize_with = "null_as_default")]
  title: String,
  #[serde(default)]
  content: Value,
  #[serde(default = "default_visible", deserialize_with = "null_as_true")]
  visible: bool,
}

fn default_visible() -> bool {
  true
}

impl From<RawTile> for TileConfig {
  fn from(raw: RawTile) -> Self {
    let content = TileContent::from_raw(&raw.kind, raw.content);
    Self {
      id: raw.id,
      kind: raw.kind,
      color: raw.color,
      title: raw.title,
      content,
      visible: raw.visible,
    }
  }
}

impl From<TileConfig> for RawTile {
  fn from(tile: TileConfig) -> Self {
    Self {
      content: tile.content.to_raw(),
      id: tile.id,
      kind: tile.kind,
      color: tile.color,
      title: tile.title,
      visible: tile.visible,
    }
  }
}
