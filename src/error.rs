//! Error types for the tailor change-planning engine.
//!
//! This module provides the error hierarchy for the two fallible areas of
//! the engine: resource canonicalization and JSON pointer navigation.
//! Each resource is canonicalized independently; an error aborts that
//! resource's comparison but does not poison a whole changeset build.

use thiserror::Error;

/// The main error type for the tailor engine.
#[derive(Debug, Error)]
pub enum TailorError {
    /// Resource canonicalization errors.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// JSON pointer navigation errors.
    #[error("Pointer error: {0}")]
    Pointer(#[from] PointerError),
}

/// Errors raised while canonicalizing or comparing a resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A required identity field is missing from the resource tree.
    #[error("Malformed resource: missing {pointer}")]
    MissingField {
        /// Pointer of the missing field.
        pointer: String,
    },

    /// A field that must hold a string holds another value type.
    #[error("Malformed resource: {pointer} is not a string")]
    NotAString {
        /// Pointer of the offending field.
        pointer: String,
    },

    /// A tailor bookkeeping annotation does not round-trip.
    #[error("Malformed annotation {annotation}: {message}")]
    MalformedAnnotation {
        /// Key of the offending annotation.
        annotation: String,
        /// Description of the failure.
        message: String,
    },

    /// A canonicalization step expected a pointer to exist and it did not.
    #[error("Internal invariant violation: could not delete {pointer}")]
    InvariantViolation {
        /// Pointer the step tried to delete.
        pointer: String,
    },

    /// An unknown resource kind was passed to the filter.
    #[error("Unknown resource kind: {kind}")]
    UnknownKind {
        /// The unrecognized kind string.
        kind: String,
    },
}

/// JSON pointer errors (RFC 6901).
#[derive(Debug, Error)]
pub enum PointerError {
    /// The pointer string is not valid RFC 6901 syntax.
    #[error("Invalid JSON pointer syntax: {pointer}")]
    InvalidSyntax {
        /// The offending pointer.
        pointer: String,
    },

    /// The pointer does not resolve to a value.
    #[error("No value at {pointer}")]
    NotFound {
        /// The offending pointer.
        pointer: String,
    },

    /// The pointer steps through a scalar.
    #[error("{pointer} resolves into a non-container")]
    NotAContainer {
        /// The offending pointer.
        pointer: String,
    },

    /// A reference token is not a valid array index.
    #[error("Invalid array index '{token}' in {pointer}")]
    InvalidIndex {
        /// The offending pointer.
        pointer: String,
        /// The token that failed to parse.
        token: String,
    },
}

/// Result type alias for tailor operations.
pub type Result<T> = std::result::Result<T, TailorError>;

impl ResourceError {
    /// Creates a malformed-annotation error.
    #[must_use]
    pub fn malformed_annotation(annotation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedAnnotation {
            annotation: annotation.into(),
            message: message.into(),
        }
    }

    /// Creates an invariant-violation error for the given pointer.
    #[must_use]
    pub fn invariant(pointer: impl Into<String>) -> Self {
        Self::InvariantViolation {
            pointer: pointer.into(),
        }
    }
}

impl PointerError {
    /// Returns the pointer string the error refers to.
    #[must_use]
    pub fn pointer(&self) -> &str {
        match self {
            Self::InvalidSyntax { pointer }
            | Self::NotFound { pointer }
            | Self::NotAContainer { pointer }
            | Self::InvalidIndex { pointer, .. } => pointer,
        }
    }
}
