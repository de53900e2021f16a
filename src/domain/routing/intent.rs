//! Intent - structured interpretation of a request within one domain.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{ActionSpec, DomainConfig};

/// Reasons an intent reply could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentParseError {
    #[error("intent reply contained no JSON object")]
    NoJson,

    #[error("intent reply is not valid JSON: {0}")]
    Malformed(String),

    #[error("intent reply has no action")]
    MissingAction,

    #[error("action {action} is not one of: {allowed}")]
    UnknownAction { action: String, allowed: String },

    #[error("intent reply has no usable {0} filter")]
    MissingFilter(&'static str),
}

/// An action tag from the domain's enumeration plus filter values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intent {
    action: String,
    filters: BTreeMap<String, Value>,
}

impl Intent {
    /// Builds an intent directly (the action is not validated).
    pub fn new(action: impl Into<String>, filters: BTreeMap<String, Value>) -> Self {
        Self {
            action: action.into(),
            filters,
        }
    }

    /// Parses a reasoning-service reply of the form
    /// `{"action": "...", "filters": {...}}`.
    ///
    /// The action must belong to `config`'s enumeration; filters whose key is
    /// not one of the domain's filter keys, or whose value is null, are
    /// dropped.
    pub fn parse(reply: &str, config: &DomainConfig) -> Result<Self, IntentParseError> {
        Self::resolve(reply, config).map(|(intent, _)| intent)
    }

    /// Like [`Intent::parse`], also returning the action's specification.
    pub fn resolve<'a>(
        reply: &str,
        config: &'a DomainConfig,
    ) -> Result<(Self, &'a ActionSpec), IntentParseError> {
        let object = extract_json_object(reply)?;

        let action = match object.get("action") {
            Some(Value::String(a)) if !a.trim().is_empty() => a.trim().to_ascii_lowercase(),
            _ => return Err(IntentParseError::MissingAction),
        };

        let Some(spec) = config.action(&action) else {
            return Err(IntentParseError::UnknownAction {
                action,
                allowed: config.action_names().join(", "),
            });
        };

        let filters = match object.get("filters") {
            Some(Value::Object(filters)) => filters
                .iter()
                .filter(|(key, value)| {
                    !value.is_null() && config.filter_keys().contains(&key.as_str())
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => BTreeMap::new(),
        };

        Ok((Self { action, filters }, spec))
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn filters(&self) -> &BTreeMap<String, Value> {
        &self.filters
    }

    pub fn filter(&self, key: &str) -> Option<&Value> {
        self.filters.get(key)
    }

    /// An integer filter, given either as a JSON number or a numeric string
    /// such as `"3"` or `"#3"`.
    pub fn integer_filter(&self, key: &str) -> Option<i64> {
        match self.filters.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({ "action": self.action, "filters": self.filters })
    }
}

/// Pulls the outermost JSON object out of a reply that may wrap it in a code
/// fence or prose.
fn extract_json_object(reply: &str) -> Result<Map<String, Value>, IntentParseError> {
    let start = reply.find('{').ok_or(IntentParseError::NoJson)?;
    let end = reply.rfind('}').ok_or(IntentParseError::NoJson)?;
    if end < start {
        return Err(IntentParseError::NoJson);
    }
    match serde_json::from_str::<Value>(&reply[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(IntentParseError::NoJson),
        Err(e) => Err(IntentParseError::Malformed(e.to_string())),
    }
}
