use thiserror::Error;

use crate::document::DocumentError;
use crate::TreeError;

/// Unified error type covering decoding, compilation, and I/O.
///
/// Returned by convenience loaders like [`Tree::from_json()`](crate::Tree::from_json)
/// and [`Tree::from_file()`](crate::Tree::from_file).
#[derive(Debug, Error)]
pub enum DectreeError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Serialize(#[from] crate::serial::SerializeError),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Deserialize(#[from] crate::serial::DeserializeError),
}
