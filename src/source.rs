//! The remote side of a lookup.
//!
//! Everything the resolution pipeline needs from the outside world goes
//! through [`RecordSource`]: a filtered table lookup, a file search by file
//! id and a best-effort classification of the root spell. The `http` feature
//! provides [`wago::WagoSource`], which talks to wago.tools and wowhead.

#[cfg(feature = "http")]
pub mod wago;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::Identifier;
use crate::error::LookupError;

/// Category returned when a spell can't be classified.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Query parameters of a lookup, e.g. `filter[SpellID] = exact:133`.
pub type Filters = BTreeMap<String, String>;

/// One data row of a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(pub Map<String, Value>);

impl Row {
    /// Reads an integer field. Missing, null, zero and non-numeric values are
    /// all treated as absent.
    pub fn id(&self, field: &str) -> Option<Identifier> {
        let id = match self.0.get(field)? {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }?;

        (id != 0).then_some(id)
    }

    /// Reads a non-empty text field.
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.0.get(field)? {
            Value::String(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Row(map)
    }
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Rows of `table` matching `filters`. An empty list means nothing was
    /// found.
    async fn lookup(&self, table: &str, filters: &Filters) -> Result<Vec<Row>, LookupError>;

    /// File names associated with a file data id.
    async fn file_search(&self, id: Identifier) -> Result<Vec<String>, LookupError>;

    /// Category label of a root spell, [`UNKNOWN_CATEGORY`] when it can't be
    /// determined.
    async fn classify(&self, id: Identifier) -> Result<String, LookupError>;
}

/// Builds an exact-match filter on a single field.
pub fn exact(field: &str, value: impl ToString) -> (String, String) {
    (format!("filter[{field}]"), format!("exact:{}", value.to_string()))
}
