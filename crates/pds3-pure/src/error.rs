use std::path::PathBuf;

use thiserror::Error;

/// What went wrong on a label line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// A statement that is neither a marker nor a `KEY = VALUE` assignment.
    #[error("expected `KEY = VALUE`")]
    ExpectedAssignment,
    /// A key was given without any value after the `=`.
    #[error("missing value")]
    EmptyValue,
    /// A key contained characters outside the label identifier set.
    #[error("invalid key `{0}`")]
    InvalidKey(String),
    /// The value text could not be tokenized.
    #[error("malformed value: {0}")]
    MalformedValue(String),
    /// A `^KEY` pointer value did not match any supported pointer form.
    #[error("malformed pointer: {0}")]
    MalformedPointer(String),
    /// A key was declared twice in the same group.
    #[error("duplicate key `{0}`")]
    DuplicateKey(String),
    /// An `END_OBJECT`/`END_GROUP` with no open block.
    #[error("`{0}` without a matching opener")]
    UnmatchedEnd(String),
    /// An `END_OBJECT`/`END_GROUP` whose kind or name differs from the open block.
    #[error("`{found}` does not close `{expected}`")]
    MismatchedEnd { expected: String, found: String },
    /// The top-level `END` appeared while a block was still open.
    #[error("`END` inside open block `{0}`")]
    EndInsideBlock(String),
    /// The text ran out inside a quoted string, list or comment.
    #[error("unterminated {0}")]
    Unterminated(&'static str),
    /// The text ran out before the top-level `END`.
    #[error("label is not terminated by `END`")]
    UnterminatedLabel,
}

/// A label statement that could not be parsed, with its location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind} in `{content}`")]
pub struct ParseError {
    /// 1-based line number of the first physical line of the statement.
    pub line: usize,
    /// The offending statement text.
    pub content: String,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(line: usize, content: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self {
            line,
            content: content.into(),
            kind,
        }
    }
}

/// All errors that can occur while reading a PDS3 product.
#[derive(Debug, Error)]
pub enum Error {
    /// The label text does not follow the label grammar.
    #[error("label parse error: {0}")]
    Parse(#[from] ParseError),
    /// A keyword the image layout depends on was not found.
    #[error("missing required keyword: {0}")]
    MissingKeyword(String),
    /// A keyword was present but its value has the wrong type or range.
    #[error("invalid value for {key}: {reason}")]
    InvalidKeyword { key: String, reason: String },
    /// The image layout cannot be decoded into a sample array.
    #[error("unsupported sample layout: {0}")]
    UnsupportedSampleLayout(String),
    /// The data file holds fewer bytes than the label declares.
    #[error("{}: expected {expected} bytes at offset {offset}, file has {available}", .path.display())]
    UnexpectedEof {
        path: PathBuf,
        offset: u64,
        expected: u64,
        available: u64,
    },
    /// A rescaled sample falls outside the 8-bit output range.
    #[error("rescaled sample {value} outside 0..={limit}")]
    SampleOutOfRange { value: f64, limit: u32 },
    /// An I/O error while reading a label or data file.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Error::InvalidKeyword {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
