use serde::{Deserialize, Serialize};
use std::fmt;

/// A versioned key in the host store, rendered as `{name}-v{version}`.
///
/// Bumping the version yields an unrelated key; data stored under the old
/// version is left in place and never migrated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageKey(String);

pub const BLOCKED_WEBSITES: (&str, u32) = ("blockedDomains", 2);
pub const ENABLED: (&str, u32) = ("enabled", 1);
pub const LANGUAGE: (&str, u32) = ("i18n", 1);

impl StorageKey {
    pub fn new(name: &str, version: u32) -> Self {
        Self(format!("{name}-v{version}"))
    }

    pub fn blocked_websites() -> Self {
        Self::new(BLOCKED_WEBSITES.0, BLOCKED_WEBSITES.1)
    }

    pub fn enabled() -> Self {
        Self::new(ENABLED.0, ENABLED.1)
    }

    pub fn language() -> Self {
        Self::new(LANGUAGE.0, LANGUAGE.1)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
