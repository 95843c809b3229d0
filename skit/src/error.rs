//! Load errors with a human-readable location.

use std::fmt;

use contract_schema_core::SchemaError;
use thiserror::Error;

/// Where in the source document a [`ParseError`] was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// 1-based line of a SKIT document.
    Line(usize),
    /// 1-based line and column of a JSON or YAML document.
    Position { line: usize, column: usize },
    /// 1-based index into the `declarations` list of a structured document.
    Declaration(usize),
    /// The document as a whole.
    Document,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(line) => write!(f, "line {line}"),
            Self::Position { line, column } => write!(f, "line {line}, column {column}"),
            Self::Declaration(index) => write!(f, "declaration {index}"),
            Self::Document => f.write_str("document"),
        }
    }
}

/// What went wrong while loading a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unrecognized statement '{0}'")]
    UnknownStatement(String),
    #[error("unknown predicate '{0}'")]
    UnknownPredicate(String),
    #[error("malformed {what}: '{text}'")]
    Malformed { what: &'static str, text: String },
    #[error("'{entry}' is not allowed in a {block} block")]
    UnexpectedEntry { block: &'static str, entry: String },
    #[error("'{0}' is given more than once in the same function block")]
    RepeatedEntry(&'static str),
    #[error("container blocks are not supported")]
    UnsupportedContainer,
    #[error(
        "argument {position} of '{function}' links to argument {linked}, which is not declared"
    )]
    UnresolvedArgument {
        function: String,
        position: u32,
        linked: u32,
    },
    #[error("{0}")]
    Syntax(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A load failure. Loading is all or nothing, so this is the only outcome
/// besides a complete spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {kind}")]
pub struct ParseError {
    pub location: Location,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(location: Location, kind: impl Into<ParseErrorKind>) -> Self {
        Self {
            location,
            kind: kind.into(),
        }
    }

    pub(crate) fn at_line(line: usize, kind: impl Into<ParseErrorKind>) -> Self {
        Self::new(Location::Line(line), kind)
    }
}

/// Errors raised while serializing a spec to a structured format.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
