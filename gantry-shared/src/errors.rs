//! Error types for topology composition.
//!
//! Every composition failure is detected before any resource is emitted, so
//! callers either receive a complete topology or one of these errors.

use thiserror::Error;

/// Result alias used across the workspace.
pub type GantryResult<T> = Result<T, GantryError>;

#[derive(Debug, Error)]
pub enum GantryError {
    /// A role's configuration needs a value another role has not produced.
    #[error("missing cross reference: role {role} requires {field}")]
    MissingCrossReference { role: String, field: String },

    /// A writable runtime directory has no packaged default tree to seed it from.
    #[error("unresolvable bootstrap source: role {role} needs writable {target} but no packaged default tree is known")]
    UnresolvableBootstrapSource { role: String, target: String },

    /// Post-hoc validation found two roles that disagree.
    #[error("topology inconsistency between {left} and {right} on {field}: {detail}")]
    TopologyInconsistency {
        left: String,
        right: String,
        field: String,
        detail: String,
    },

    #[error("invalid namespace {0:?}: must be a DNS-1123 label")]
    InvalidNamespace(String),

    #[error("invalid role spec for {role}: {reason}")]
    InvalidRoleSpec { role: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GantryError {
    /// Process exit code for this error kind. Always nonzero.
    pub fn exit_code(&self) -> u8 {
        match self {
            GantryError::TopologyInconsistency { .. } => 3,
            GantryError::MissingCrossReference { .. } => 4,
            GantryError::UnresolvableBootstrapSource { .. } => 5,
            GantryError::InvalidNamespace(_)
            | GantryError::InvalidRoleSpec { .. }
            | GantryError::Config(_) => 2,
            GantryError::Serialization(_) | GantryError::Io(_) => 1,
        }
    }

    /// Whether this is one of the composition-time error kinds.
    pub fn is_composition_error(&self) -> bool {
        matches!(
            self,
            GantryError::MissingCrossReference { .. }
                | GantryError::UnresolvableBootstrapSource { .. }
                | GantryError::TopologyInconsistency { .. }
        )
    }
}
