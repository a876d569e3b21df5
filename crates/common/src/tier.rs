//! Client tier identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a client tier ("gateway"), e.g. `enterprise`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierId(String);

impl TierId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TierId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TierId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for TierId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
