//! Error types for record mapping and database access.

use thiserror::Error;

/// Boxed error coming from the execution collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by every operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The database could not be opened or did not answer a ping.
    #[error("database connectivity failed: {0}")]
    Connectivity(#[source] BoxError),

    /// The collaborator failed to run a statement.
    #[error("query failed: {0}")]
    Query(#[source] BoxError),

    /// A row value cannot be stored in the field mapped to its column.
    #[error("cannot convert column `{column}` from {from} to {to}")]
    TypeMismatch {
        column: String,
        from: &'static str,
        to: &'static str,
    },

    /// The caller handed over something with the wrong shape.
    #[error("invalid input: {0}")]
    Shape(String),

    /// A row carries a column that the record type does not declare.
    #[error("unknown column `{column}` for record type {record}")]
    UnknownColumn { column: String, record: &'static str },

    /// A single-row lookup produced no rows.
    #[error("no rows returned by query")]
    NotFound,

    /// An update was requested for a record with no id value.
    #[error("record has no value for id column `{column}`")]
    MissingId { column: String },

    /// A bulk operation failed on one of its items. Items before `index`
    /// were already applied.
    #[error("{operation} failed on item {index}: {source}")]
    Item {
        operation: &'static str,
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// The per-chunk callback returned an error.
    #[error("chunk callback failed: {0}")]
    Callback(#[source] anyhow::Error),
}

impl Error {
    /// Wraps an arbitrary collaborator error as a query failure.
    pub fn query(err: impl Into<BoxError>) -> Self {
        Error::Query(err.into())
    }

    pub(crate) fn item(operation: &'static str, index: usize, source: Error) -> Self {
        Error::Item {
            operation,
            index,
            source: Box::new(source),
        }
    }

    /// Index of the failing item for bulk operations.
    pub fn item_index(&self) -> Option<usize> {
        match self {
            Error::Item { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Query(Box::new(err))
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
