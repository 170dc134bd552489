//! Entity model
//!
//! Records of every resource share one shape: a numeric id, an opaque JSON
//! attribute object and two timestamps. The pipeline never interprets the
//! attributes beyond the fields it sorts, filters, slugs or populates on.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys owned by the store; clients cannot write them
pub const RESERVED_KEYS: &[&str] = &["id", "createdAt", "updatedAt"];

/// A stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique identifier
    pub id: i64,
    /// Resource-specific attributes
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Attribute lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute lookup as a string slice
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Read the id stored in a relation attribute.
    ///
    /// Accepts a bare id, a numeric string or an already populated object.
    pub fn relation_id(&self, field: &str) -> Option<i64> {
        match self.attributes.get(field)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            Value::Object(obj) => obj.get("id").and_then(Value::as_i64),
            _ => None,
        }
    }
}

/// Drop store-owned keys from a client-supplied attribute object
pub fn sanitize_attributes(mut attributes: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_KEYS {
        attributes.remove(*key);
    }
    attributes
}

/// Timestamps are stored as fixed-width RFC 3339 strings so they order
/// lexicographically.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid stored timestamp: {}", raw))?
        .with_timezone(&Utc))
}
