use std::io;
use std::result;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A selection or index falls outside the current extent.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// An operation tried to change, or address with, a different number of axes.
    #[error("rank mismatch: expected rank {expected}, got {actual}")]
    RankMismatch { expected: usize, actual: usize },

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("dimension limit: {0}")]
    DimensionLimit(String),

    /// Something read back from storage doesn't make sense.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("duplicate name: {0}")]
    DuplicateName(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Failure reported by a storage backend.
    #[error("storage: {0}")]
    Storage(String),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    IO(#[from] io::Error),
}

pub type Result<T> = result::Result<T, Error>;
