use std::fmt;

/// Success xor failure.
///
/// Interconverts with [`Result`]; the extra surface is the fail-fast
/// [`Outcome::from_parts`] constructor for callers that receive a value slot
/// and an error slot separately, and a logging [`Outcome::unwrap_or`] used
/// wherever a storage failure should degrade to a default.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T, E> {
    Ok(T),
    Err(E),
}

impl<T, E> Outcome<T, E> {
    /// Build from two payload slots. Exactly one must be populated.
    ///
    /// # Panics
    /// If both or neither slot is populated.
    #[track_caller]
    pub fn from_parts(value: Option<T>, error: Option<E>) -> Self {
        match (value, error) {
            (Some(value), None) => Outcome::Ok(value),
            (None, Some(error)) => Outcome::Err(error),
            (Some(_), Some(_)) => panic!("outcome cannot hold both a value and an error"),
            (None, None) => panic!("outcome must hold a value or an error"),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Outcome::Err(_))
    }

    pub fn err(&self) -> Option<&E> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Err(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        self.into()
    }
}

impl<T, E: fmt::Display> Outcome<T, E> {
    /// # Panics
    /// On `Err`, with the wrapped error as the message.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Outcome::Ok(value) => value,
            Outcome::Err(e) => panic!("called `Outcome::unwrap()` on an `Err`: {e}"),
        }
    }

    /// Never fails. A discarded error is logged before the default is returned.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Outcome::Ok(value) => value,
            Outcome::Err(e) => {
                tracing::warn!(error = %e, "falling back to default value");
                default
            }
        }
    }

    /// # Panics
    /// On `Err`, with `msg` prepended to the wrapped error.
    #[track_caller]
    pub fn expect(self, msg: &str) -> T {
        match self {
            Outcome::Ok(value) => value,
            Outcome::Err(e) => panic!("{msg}:\n {e}"),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(e) => Outcome::Err(e),
        }
    }
}

impl<T, E> From<Outcome<T, E>> for Result<T, E> {
    fn from(outcome: Outcome<T, E>) -> Self {
        match outcome {
            Outcome::Ok(value) => Ok(value),
            Outcome::Err(e) => Err(e),
        }
    }
}
