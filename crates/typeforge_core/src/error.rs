//! Error contract shared by blueprint resolution, assembly and object access.
//!
//! # Invariants
//! - Shape faults raised by composition primitives are propagated unchanged;
//!   the core never recovers from them locally.
//! - A block that is absent at one hierarchy level is never an error.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result alias used across the crate.
pub type FactoryResult<T> = Result<T, FactoryError>;

/// Errors raised while resolving, assembling or using a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// A reserved or extension block holds a value of the wrong shape.
    ConfigShape {
        block: String,
        expected: &'static str,
    },
    /// A raw extension entry declared a kind that does not exist.
    UnknownExtensionKind(String),
    /// A raw extension entry could not be wrapped into a descriptor.
    InvalidExtension { name: String, reason: String },
    /// The per-instance trigger was used before the class was assembled.
    NotAssembled,
    /// `assemble()` was called on a factory that already assembled.
    AlreadyAssembled,
    MemberNotFound(String),
    NotCallable(String),
    ReadOnlyMember(String),
    /// Configuration JSON could not be parsed.
    Json(String),
    /// Failure reported by a user-supplied closure.
    Callback(String),
}

impl FactoryError {
    pub(crate) fn shape(block: impl Into<String>, expected: &'static str) -> Self {
        Self::ConfigShape {
            block: block.into(),
            expected,
        }
    }

    /// Convenience for user closures that need to fail assembly or construction.
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback(message.into())
    }

    /// Stable machine-readable code, used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigShape { .. } => "config_shape",
            Self::UnknownExtensionKind(_) => "unknown_extension_kind",
            Self::InvalidExtension { .. } => "invalid_extension",
            Self::NotAssembled => "not_assembled",
            Self::AlreadyAssembled => "already_assembled",
            Self::MemberNotFound(_) => "member_not_found",
            Self::NotCallable(_) => "not_callable",
            Self::ReadOnlyMember(_) => "read_only_member",
            Self::Json(_) => "json",
            Self::Callback(_) => "callback",
        }
    }
}

impl Display for FactoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigShape { block, expected } => {
                write!(f, "block `{block}` has an unusable shape; expected {expected}")
            }
            Self::UnknownExtensionKind(kind) => write!(f, "unknown extension kind: {kind}"),
            Self::InvalidExtension { name, reason } => {
                write!(f, "extension `{name}` is invalid: {reason}")
            }
            Self::NotAssembled => write!(f, "class has not been assembled yet"),
            Self::AlreadyAssembled => write!(f, "factory has already been assembled"),
            Self::MemberNotFound(name) => write!(f, "member not found: {name}"),
            Self::NotCallable(name) => write!(f, "member is not callable: {name}"),
            Self::ReadOnlyMember(name) => write!(f, "member is read-only: {name}"),
            Self::Json(err) => write!(f, "invalid configuration json: {err}"),
            Self::Callback(message) => write!(f, "callback failed: {message}"),
        }
    }
}

impl Error for FactoryError {}

impl From<serde_json::Error> for FactoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
