use crate::{Error, Result};
use std::fmt;

/// Authentication token issued by the analysis server for one project.
///
/// A `Credential` is never empty: construction rejects empty and
/// whitespace-only values, so anything holding one can hand it to the
/// build tool without re-checking.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token value, trimming surrounding whitespace.
    pub fn new(token: impl AsRef<str>) -> Result<Self> {
        let token = token.as_ref().trim();
        if token.is_empty() {
            return Err(Error::invalid("token", "must not be empty"));
        }
        Ok(Self(token.to_string()))
    }

    /// Expose the secret value. Call sites should pass it straight to the
    /// consumer (HTTP auth, file, build tool) and not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(***)")
    }
}
