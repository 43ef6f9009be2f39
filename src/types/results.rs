//! Result records extracted by the agent
//!
//! Records are semi-structured: the backend forwards whatever the agent
//! extracted. The accessors below read the common fields under their usual
//! aliases and return `None` when a record does not carry them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

const LABEL_KEYS: &[&str] = &["label", "title", "name", "item"];
const DESCRIPTION_KEYS: &[&str] = &["description", "desc", "summary"];
const VALUE_KEYS: &[&str] = &["value", "price", "amount"];
const LINK_KEYS: &[&str] = &["link", "url", "href"];

/// One extracted result, kept as the raw JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultRecord(Map<String, Value>);

impl ResultRecord {
    /// Create a record from a JSON object
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Label of the record (`label`, `title`, `name` or `item`)
    #[must_use]
    pub fn label(&self) -> Option<String> {
        self.first_text(LABEL_KEYS)
    }

    /// Description of the record (`description`, `desc` or `summary`)
    #[must_use]
    pub fn description(&self) -> Option<String> {
        self.first_text(DESCRIPTION_KEYS)
    }

    /// Numeric or text value (`value`, `price` or `amount`)
    #[must_use]
    pub fn value(&self) -> Option<String> {
        self.first_text(VALUE_KEYS)
    }

    /// Link (`link`, `url` or `href`)
    #[must_use]
    pub fn link(&self) -> Option<String> {
        self.first_text(LINK_KEYS)
    }

    fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(render_value)
    }
}

/// Render a JSON value as display text; `null` renders as absent
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

impl From<Map<String, Value>> for ResultRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl From<Value> for ResultRecord {
    /// Objects are kept as-is; any other value is wrapped as `{"value": ...}`
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            other => {
                let mut fields = Map::new();
                fields.insert("value".to_string(), other);
                Self(fields)
            }
        }
    }
}

impl<'de> Deserialize<'de> for ResultRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}
