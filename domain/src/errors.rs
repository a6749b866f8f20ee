use thiserror::Error;

/// Failures a vector store reports for caller mistakes.
///
/// Backend failures (I/O, SQLite) travel as plain `anyhow` errors; these
/// variants can be recovered with `anyhow::Error::downcast_ref`.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("collection already exists: {0}")]
    CollectionExists(String),
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("duplicate id '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },
    #[error("vector dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("batch length mismatch: {ids} ids, {vectors} vectors, {texts} texts")]
    LengthMismatch {
        ids: usize,
        vectors: usize,
        texts: usize,
    },
    #[error("vectors must not be empty")]
    EmptyVector,
    #[error("vector for id '{id}' contains NaN or infinite values")]
    NonFiniteVector { id: String },
}
