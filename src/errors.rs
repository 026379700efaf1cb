use itertools::Itertools;
use thiserror::Error;

use crate::scanner::TagMap;

/// Errors surfaced by interpreters and by the default expression language.
#[derive(Debug, Error)]
pub enum ElError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("unknown interpreter `{0}`")]
    UnknownInterpreter(String),
}

/// Errors raised by the tag scanner.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The stream ended inside a quoted value. `partial` keeps every pair
    /// committed before the error point.
    #[error("unterminated {quote}-quoted value")]
    UnterminatedQuote { quote: char, partial: TagMap },

    #[error("read: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Pairs scanned successfully before the failure, if any.
    pub fn partial(&self) -> Option<&TagMap> {
        match self {
            ScanError::UnterminatedQuote { partial, .. } => Some(partial),
            ScanError::Io(_) => None,
        }
    }
}

/// What went wrong on one field.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("scan: {0}")]
    Scan(ScanError),

    #[error("{0}")]
    Interpreter(ElError),

    #[error("interpreter panicked: {0}")]
    Panic(String),

    #[error("cannot convert result: {0}")]
    Convert(String),

    #[error("cannot evaluate into empty optional")]
    EmptyOptional,
}

/// A failure on one field, tagged with the fully qualified path name.
#[derive(Debug, Error)]
#[error("<<{path}>>: {fault}")]
pub struct FieldError {
    pub path: String,
    pub fault: Fault,
}

/// Every per-field failure of one `eval()` call, in field-encounter order.
#[derive(Debug, Default)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().map(|e| e.to_string()).join("; "))
    }
}

/// Top-level evaluation error.
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal configuration error at construction.
    #[error("no interpreters registered")]
    EmptyRegistry,

    /// Precondition failure: nothing was processed.
    #[error("`{type_name}` must describe a struct")]
    NotAStruct { type_name: &'static str },

    /// The target could not be snapshot into a value tree.
    #[error("snapshot: {0}")]
    Snapshot(serde_json::Error),

    /// The evaluated value tree could not be written back into the target.
    #[error("write back: {0}")]
    Writeback(serde_json::Error),

    /// One or more fields failed; the rest were still processed.
    #[error("{0}")]
    Fields(FieldErrors),
}

impl Error {
    /// Per-field failures, when this is an aggregate.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Error::Fields(errors) => Some(errors),
            _ => None,
        }
    }
}
