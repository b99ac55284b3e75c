//! Error types for the layout core.
//!
//! The taxonomy is deliberately narrow. Exactly one class of failure is
//! fatal and surfaces as an `Err`: a structural violation, i.e. adding a
//! member whose container differs from the group's. Policy violations
//! (adding an already-grouped piece, moving a locked group, and so on) are
//! silent no-ops with a `tracing` diagnostic, and data violations are
//! caught up front by the boolean record validators.

use thiserror::Error;

/// Hard invariant violations. The operation aborts and state is unchanged.
#[derive(Debug, Error, PartialEq)]
pub enum StructuralError {
    /// A member was added to a group anchored to a different container.
    #[error(
        "cannot add '{member}' to group '{group}': it lives on container \
         '{found}' but the group is anchored to '{expected}'"
    )]
    ContainerMismatch {
        group: String,
        member: String,
        expected: String,
        found: String,
    },

    /// An operation referenced an id the board does not know.
    #[error("unknown {entity} id '{id}'")]
    UnknownId { entity: &'static str, id: String },
}

impl StructuralError {
    pub fn unknown(entity: &'static str, id: impl Into<String>) -> Self {
        Self::UnknownId {
            entity,
            id: id.into(),
        }
    }
}

/// Errors loading a saved layout file.
#[derive(Debug, Error)]
pub enum LayoutFileError {
    #[error("failed to read layout file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse layout TOML: {0}")]
    Parse(#[from] toml::de::Error),
}
