//! Registry error types.

use thiserror::Error;

use crate::class::ClassId;

/// Error raised while building a [`crate::Registry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A class with this code name already exists.
    #[error("class '{0}' is already registered")]
    DuplicateClass(String),

    /// A registration referenced a class id the builder never handed out.
    #[error("unknown class: {0:?}")]
    UnknownClass(ClassId),

    /// Supertypes must be registered before their subtypes.
    #[error("supertype {supertype:?} of '{class}' is not registered")]
    UnknownSupertype { class: String, supertype: ClassId },

    /// Object/Object comparators would match every pair of values.
    #[error("comparators between object and object are not allowed")]
    ObjectComparator,

    /// Event value times are -1, 0 or 1.
    #[error("invalid event value time: {0}")]
    InvalidTime(i8),

    /// Event values must be keyed by an event class.
    #[error("'{0}' is not an event class")]
    NotAnEvent(String),
}

/// Result type for registry construction.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Strict conversion failed for one element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("element {index} of class {from:?} cannot be converted to {to:?}")]
pub struct ConversionError {
    pub index: usize,
    pub from: ClassId,
    pub to: ClassId,
}

/// Event value resolution hit an explicit exclusion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventValueError {
    #[error("{message}")]
    Excluded { message: String },
}

/// Error raised while turning a value into fields or back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("field '{field}' should be {expected}, found {found}")]
    WrongFieldType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The serializer was handed a value of another class.
    #[error("cannot serialize a value of class {0:?}")]
    UnexpectedValue(ClassId),

    #[error("invalid data: {0}")]
    Invalid(String),
}
