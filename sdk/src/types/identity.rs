//! Subscriber identity.
//!
//! The identity scopes one real-time connection. It is used verbatim as the
//! last path segment of the endpoint URL.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// A validated subscriber identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Parses and validates an identity.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the identity is empty, contains
    /// whitespace, or contains a `/`.
    pub fn parse(raw: impl Into<String>) -> Result<Self, SyncError> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(SyncError::Configuration(
                "identity cannot be empty".to_string(),
            ));
        }

        if raw.chars().any(char::is_whitespace) {
            return Err(SyncError::Configuration(format!(
                "identity cannot contain whitespace: {:?}",
                raw
            )));
        }

        if raw.contains('/') {
            return Err(SyncError::Configuration(format!(
                "identity cannot contain '/': {:?}",
                raw
            )));
        }

        Ok(Self(raw))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}
