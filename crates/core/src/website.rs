use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::ValidationError;

/// Stored in place of a favicon URL when the page did not provide one.
pub const DEFAULT_FAVICON: &str = "null";

/// Title given to an active page that reported none.
pub const UNKNOWN_TITLE: &str = "unknown";

/// One blocked-website record. `domain` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedWebsite {
    pub domain: String,
    pub title: String,
    pub favicon: String,
    pub blocked: bool,
}

impl BlockedWebsite {
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            title: title.into(),
            favicon: DEFAULT_FAVICON.to_string(),
            blocked: false,
        }
    }

    pub fn with_favicon(mut self, favicon: impl Into<String>) -> Self {
        let favicon = favicon.into();
        self.favicon = if favicon.is_empty() { DEFAULT_FAVICON.to_string() } else { favicon };
        self
    }

    pub fn with_blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }

    pub fn has_favicon(&self) -> bool {
        self.favicon != DEFAULT_FAVICON
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "domain": self.domain,
            "title": self.title,
            "favicon": self.favicon,
            "blocked": self.blocked,
        })
    }
}

/// The page currently open in the host, as reported by the host. Untrusted:
/// every field goes through the record validators before it is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePage {
    pub domain: Option<String>,
    pub title: Option<String>,
    pub favicon_url: Option<String>,
}

impl ActivePage {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Self::default()
        }
    }

    /// Validate into a record marked as blocked. A missing title becomes
    /// [`UNKNOWN_TITLE`] and a missing favicon the sentinel.
    pub fn to_record(&self) -> Result<BlockedWebsite, ValidationError> {
        let raw = serde_json::json!({
            "domain": self.domain,
            "title": self.title.as_deref().unwrap_or(UNKNOWN_TITLE),
            "favicon": self.favicon_url,
            "blocked": true,
        });
        validate(&raw)
    }
}

/// JavaScript-style truthiness of a JSON value.
pub fn is_truthy(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn type_name(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Coerce anything to a boolean. Missing counts as false.
pub fn validate_boolean(raw: Option<&Value>) -> bool {
    raw.is_some_and(is_truthy)
}

/// Falsy input becomes [`DEFAULT_FAVICON`]; truthy input must be a string.
pub fn validate_favicon(raw: Option<&Value>) -> Result<String, ValidationError> {
    match raw {
        Some(v) if is_truthy(v) => v
            .as_str()
            .map(str::to_string)
            .ok_or(ValidationError::WrongType { field: "favicon", expected: "a string" }),
        _ => Ok(DEFAULT_FAVICON.to_string()),
    }
}

fn required_string(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::WrongType { field, expected: "a string" }),
    }
}

/// Validate a single raw record. Optional fields are defaulted rather than
/// rejected; `domain` and `title` are required strings.
pub fn validate(raw: &Value) -> Result<BlockedWebsite, ValidationError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ValidationError::NotAnObject(type_name(raw)))?;

    let domain = required_string(obj, "domain")?;
    let domain = domain.trim();
    if domain.is_empty() {
        return Err(ValidationError::Empty("domain"));
    }
    let title = required_string(obj, "title")?;
    let favicon = validate_favicon(obj.get("favicon"))?;
    let blocked = validate_boolean(obj.get("blocked"));

    Ok(BlockedWebsite {
        domain: domain.to_string(),
        title,
        favicon,
        blocked,
    })
}

/// Best-effort parse of a stored collection.
///
/// Returns `None` only when `raw` is not an array. Elements that fail
/// validation are dropped; the rest keep their order.
pub fn validate_collection(raw: &Value) -> Option<Vec<BlockedWebsite>> {
    let items = raw.as_array()?;
    let mut websites = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match validate(item) {
            Ok(website) => websites.push(website),
            Err(e) => tracing::warn!(index, error = %e, "dropping malformed blocked website"),
        }
    }
    Some(websites)
}

/// Keep the first record for each domain, preserving order.
pub fn dedup(websites: Vec<BlockedWebsite>) -> Vec<BlockedWebsite> {
    let mut seen = HashSet::with_capacity(websites.len());
    websites
        .into_iter()
        .filter(|w| seen.insert(w.domain.clone()))
        .collect()
}
