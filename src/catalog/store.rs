use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque store identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StoreId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One store of the roster: identifier plus its region (state) tag
///
/// Immutable reference data, loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Store {
    /// The store identifier
    pub id: StoreId,

    /// Region (state) tag, e.g. "TX"
    pub region: String,
}
