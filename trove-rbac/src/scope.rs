//! # Grant scopes
//!
//! The levels of the resource tree below the container at which a scoped
//! permission grant can be attached.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Level a [`PermissionSet`](crate::PermissionSet) override is attached to.
///
/// Container-wide access is expressed by memberships, so only the two
/// narrower levels appear here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScopeType {
    /// A sub-container and, by default, everything inside it.
    #[serde(rename = "SUBCONTAINER")]
    SubContainer,
    /// A single item.
    #[serde(rename = "ITEM")]
    Item,
}

impl ScopeType {
    /// Get the string representation used in grant ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::SubContainer => "SUBCONTAINER",
            ScopeType::Item => "ITEM",
        }
    }

    /// Parse scope type from string representation (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SUBCONTAINER" | "SUB_CONTAINER" => Some(ScopeType::SubContainer),
            "ITEM" => Some(ScopeType::Item),
            _ => None,
        }
    }

    /// Specificity rank; higher wins.
    pub fn specificity(&self) -> u8 {
        match self {
            ScopeType::SubContainer => 1,
            ScopeType::Item => 2,
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
