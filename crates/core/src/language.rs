use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// UI language preference. Only the stored tag lives here; looking up
/// translated strings is the presentation layer's business.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en-US")]
    English,
    #[serde(rename = "pt-BR")]
    Portuguese,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Portuguese];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::English => "en-US",
            Self::Portuguese => "pt-BR",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.tag() == tag)
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.tag().to_string())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Anything that is not exactly a known tag yields `default`.
pub fn validate_language(raw: Option<&Value>, default: Language) -> Language {
    raw.and_then(Value::as_str)
        .and_then(Language::from_tag)
        .unwrap_or(default)
}
