//! Companion identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix every companion id carries on the wire
pub const COMPANION_ID_PREFIX: &str = "companion_";

/// Globally unique companion identifier, e.g. `companion_natsumi`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanionId(String);

impl CompanionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the namespaced id for a companion display name
    pub fn from_name(name: &str) -> Self {
        Self(format!("{}{}", COMPANION_ID_PREFIX, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display name with the namespace stripped, if the id is namespaced
    pub fn name(&self) -> &str {
        self.0.strip_prefix(COMPANION_ID_PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for CompanionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CompanionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CompanionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_is_namespaced() {
        let id = CompanionId::from_name("natsumi");
        assert_eq!(id.as_str(), "companion_natsumi");
        assert_eq!(id.name(), "natsumi");
    }

    #[test]
    fn test_unprefixed_name_is_whole_id() {
        let id = CompanionId::new("user");
        assert_eq!(id.name(), "user");
    }
}
