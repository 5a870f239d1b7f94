//! Lenient field deserializers for backend columns.
//!
//! The backend sends every column, so "missing" usually arrives as `null`.
//! Ids may be numeric. These helpers are used with `deserialize_with`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `null` reads as `T::default()`. Pair with `#[serde(default)]` for absent fields.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `null` reads as `true`.
pub fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

fn scalar_to_string(v: Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// An id sent as either a string or a number.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let v = Value::deserialize(deserializer)?;
  match v {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(D::Error::custom(format!(
      "expected a string or number id, got {}",
      other
    ))),
  }
}

/// Optional id sent as a string, a number or `null`.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(Some(s)),
    Some(Value::Number(n)) => Ok(Some(n.to_string())),
    Some(other) => Err(D::Error::custom(format!(
      "expected a string or number id, got {}",
      other
    ))),
  }
}

/// List of strings where `null` is empty and scalar items are stringified.
pub fn scalar_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let items: Vec<Value> = null_as_default(deserializer)?;
  Ok(
    items
      .into_iter()
      .map(|v| scalar_to_string(v).unwrap_or_default())
      .collect(),
  )
}

/// Table rows: `null` rows are empty, `null` cells are empty strings.
pub fn scalar_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
  D: Deserializer<'de>,
{
  let rows: Vec<Option<Vec<Value>>> = null_as_default(deserializer)?;
  Ok(
    rows
      .into_iter()
      .map(|row| {
        row
          .unwrap_or_default()
          .into_iter()
          .map(|v| scalar_to_string(v).unwrap_or_default())
          .collect()
      })
      .collect(),
  )
}
