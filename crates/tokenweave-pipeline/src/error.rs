//! Error types for field access and pipeline processing

use thiserror::Error;

/// Result alias for field access
pub type FieldResult<T> = Result<T, FieldAccessError>;

/// Result alias for unit processing
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failure reaching into a unit's slots
///
/// `NotFound` may be tolerable to the caller. Every other variant means the host
/// type does not look the way the caller was built against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldAccessError {
    /// No slot with this name and type on the type or any of its bases
    #[error("no slot `{name}` of type {requested} on {owner} or its bases")]
    NotFound {
        /// Most-derived type searched
        owner: &'static str,
        /// Requested slot name
        name: String,
        /// Requested slot type
        requested: &'static str,
    },

    /// The slot exists but holds a different type
    #[error("slot `{name}` on {owner} is declared as {declared}, not {requested}")]
    TypeMismatch {
        /// Type declaring the slot
        owner: &'static str,
        /// Slot name
        name: String,
        /// Declared slot type
        declared: &'static str,
        /// Type the caller used
        requested: &'static str,
    },

    /// The slot cannot be read or written (class-level or vanished)
    #[error("slot `{name}` on {owner} is not accessible")]
    Inaccessible {
        /// Type declaring the slot
        owner: &'static str,
        /// Slot name
        name: String,
    },

    /// Source and target share no type to copy through
    #[error("cannot copy {from} into {to}: target does not extend source")]
    Incompatible {
        /// Source runtime type
        from: &'static str,
        /// Target runtime type
        to: &'static str,
    },
}

impl FieldAccessError {
    /// Whether the slot simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failure while a unit processes an exchange
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A unit could not complete its work
    #[error("{unit} failed: {message}")]
    Unit {
        /// Unit type name
        unit: &'static str,
        /// What went wrong
        message: String,
    },

    /// Error raised by a collaborator
    #[error(transparent)]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl PipelineError {
    /// Create a unit error
    pub fn unit(unit: &'static str, message: impl Into<String>) -> Self {
        Self::Unit {
            unit,
            message: message.into(),
        }
    }

    /// Wrap a collaborator error
    pub fn source<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_display() {
        let err = FieldAccessError::NotFound {
            owner: "LogoutUnit",
            name: "handlers".into(),
            requested: "Vec<u8>",
        };
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "no slot `handlers` of type Vec<u8> on LogoutUnit or its bases"
        );
    }

    #[test]
    fn test_pipeline_error_wraps_sources() {
        let io = std::io::Error::other("disk on fire");
        let err = PipelineError::source(io);
        assert_eq!(err.to_string(), "disk on fire");

        let err = PipelineError::unit("LogoutUnit", "no handlers");
        assert_eq!(err.to_string(), "LogoutUnit failed: no handlers");
    }
}
