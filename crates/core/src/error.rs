use thiserror::Error;

/// Why a raw value was rejected as a record. Never escapes the validators:
/// collection parsing drops the offending element instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expected an object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("field {field} must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field {0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
