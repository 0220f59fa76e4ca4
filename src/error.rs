//! Error and result types shared across the query engine.
//!
//! Clause compilation and execution report failures as formatted strings
//! rather than a closed set of typed variants — the stable prefixes
//! (`"syntax error: ..."`, `"cannot delete node: ..."`) are the actual
//! contract consumers match against, not the Rust type. [`Error::Storage`]
//! is the one variant that crosses the [`crate::model`] boundary; everything
//! raised by the parser, planner, and evaluator goes through [`Error::Other`]
//! or [`Error::NotImplemented`].

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// A feature recognized by the grammar but not (yet, or ever) executed.
    NotImplemented(&'static str),
    /// A storage-capability failure, surfaced verbatim from the host graph.
    Storage(String),
    /// Parse, validation, binding, and procedure errors — distinguished by
    /// their message prefix (see the error taxonomy in the query API docs).
    Other(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::NotImplemented(msg) => write!(f, "not implemented: {msg}"),
            Error::Storage(msg) => write!(f, "{msg}"),
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
