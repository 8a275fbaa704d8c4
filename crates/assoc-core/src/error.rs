//! Error types for index construction and selection operations

use thiserror::Error;

/// Errors raised while building an association index
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("record {record} already holds '{existing}' in field '{field}', cannot also hold '{value}'")]
    ConflictingValue {
        field: String,
        record: u32,
        existing: String,
        value: String,
    },

    #[error("row has {actual} cells but {expected} fields are declared")]
    RowWidth { expected: usize, actual: usize },

    #[error("record count exceeds the {max} record limit")]
    RecordOverflow { max: u64 },
}

/// Errors raised by selection and resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// The value is not a member of the field's value set
    #[error("value '{value}' is not in the domain of field '{field}'")]
    InvalidValue { field: String, value: String },

    /// The field does not exist in the data model
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A change listener tried to mutate the selection it is being notified about
    #[error("selection cannot be mutated from inside a change notification")]
    ReentrantMutation,
}

pub type Result<T, E = SelectionError> = std::result::Result<T, E>;
