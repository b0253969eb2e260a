//! Deployment-time policy advisories.
//!
//! Advisories never fail composition. They mark decisions an operator has to
//! revisit for the target environment.

use crate::options::parse_cidr;
use crate::role::RoleKind;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// The admin allow-list admits every source address.
    UnrestrictedAdminAccess { role: RoleKind, cidrs: Vec<String> },
    /// A secret was generated because none was configured.
    GeneratedCredential { field: String },
}

impl Advisory {
    /// Log the advisory at the level its severity warrants.
    pub fn log(&self) {
        match self {
            Advisory::UnrestrictedAdminAccess { .. } => tracing::warn!(advisory = %self),
            Advisory::GeneratedCredential { .. } => tracing::info!(advisory = %self),
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::UnrestrictedAdminAccess { role, cidrs } => write!(
                f,
                "{role}: admin API allow-list {} admits any source; tighten it for this environment",
                cidrs.join(",")
            ),
            Advisory::GeneratedCredential { field } => {
                write!(f, "{field} was not configured; a random value was generated")
            }
        }
    }
}

/// Allow-list entries that match every address. Any zero-length prefix
/// qualifies, whatever the host bits or spelling of the address.
pub(crate) fn unrestricted_cidrs(allow_admin: &[String]) -> Vec<String> {
    allow_admin
        .iter()
        .filter(|cidr| parse_cidr(cidr).is_some_and(|(_, prefix)| prefix == 0))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_allow_list(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|entry| entry.to_string()).collect()
    }

    #[test]
    fn test_unrestricted_cidrs_canonical_forms() {
        let allow = create_test_allow_list(&["0.0.0.0/0", "::/0", "10.0.0.0/8"]);
        assert_eq!(unrestricted_cidrs(&allow), vec!["0.0.0.0/0", "::/0"]);
    }

    #[test]
    fn test_unrestricted_cidrs_any_zero_prefix() {
        let allow = create_test_allow_list(&["10.0.0.0/0", "0.0.0.0/00", "::0/0", "1.2.3.4/0"]);
        assert_eq!(unrestricted_cidrs(&allow), allow);
    }

    #[test]
    fn test_unrestricted_cidrs_ignores_narrow_prefixes() {
        let allow = create_test_allow_list(&["127.0.0.1/32", "10.0.0.0/8", "fd00::/8", "0.0.0.0/1"]);
        assert!(unrestricted_cidrs(&allow).is_empty());
    }
}
