//! Error types for the recording reader.

use std::fmt;
use std::path::PathBuf;

use mcsh5_format::FormatError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while opening a recording or decoding its streams.
#[derive(Error, Debug)]
pub enum Error {
    /// The file could not be opened or is not a readable HDF5 file.
    #[error("cannot open {}: {source}", path.display())]
    Open {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O or format failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// An expected group, dataset or field is missing or malformed.
    #[error("schema violation: {0}")]
    Schema(String),

    /// The inspected dataset does not have a compound type.
    #[error("{path} is not a compound dataset")]
    NotCompound {
        /// Dataset path.
        path: String,
    },

    /// The stream has no channel with this label.
    #[error("no channel labelled {label:?} in {stream}")]
    UnknownLabel {
        /// Requested label.
        label: String,
        /// Stream name.
        stream: String,
    },

    /// The raw sample matrix does not match the channel table.
    #[error("unexpected shape in {stream}: {reason}")]
    Shape {
        /// Stream name.
        stream: String,
        /// What did not match.
        reason: String,
    },

    /// Low-level HDF5 structure error.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// I/O error after the file was opened.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a text report failed.
    #[error("failed to render report: {0}")]
    Render(#[from] fmt::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Open,
    Schema,
    NotCompound,
    UnknownLabel,
    Shape,
    Format,
    Io,
    Render,
}

impl Error {
    /// The class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Open { .. } => ErrorKind::Open,
            Error::Schema(_) => ErrorKind::Schema,
            Error::NotCompound { .. } => ErrorKind::NotCompound,
            Error::UnknownLabel { .. } => ErrorKind::UnknownLabel,
            Error::Shape { .. } => ErrorKind::Shape,
            Error::Format(_) => ErrorKind::Format,
            Error::Io(_) => ErrorKind::Io,
            Error::Render(_) => ErrorKind::Render,
        }
    }

    pub(crate) fn open(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Error {
        Error::Open {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Turn a failed lookup into a schema violation described by `what`.
    pub(crate) fn missing(self, what: impl FnOnce() -> String) -> Error {
        match self {
            Error::Format(FormatError::PathNotFound(_)) => Error::Schema(what()),
            other => other,
        }
    }
}
