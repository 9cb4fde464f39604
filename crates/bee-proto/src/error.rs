//! Error types for the command grammar.
//!
//! Every failure here is scoped to a single command: a transport that hits
//! one of these reports it and moves on to the next command.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level grammar errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The transport payload could not be decoded.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A typed literal did not match its tag.
    #[error(transparent)]
    Cast(#[from] CastError),

    /// The expression lacks module, class or function.
    #[error(transparent)]
    MissingFields(#[from] MissingFieldsError),
}

impl ProtocolError {
    /// Static error code for metrics labels and error events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::Cast(_) => "cast_error",
            Self::MissingFields(_) => "missing_fields",
        }
    }
}

/// Malformed transport payloads.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Empty command line.
    #[error("empty command")]
    Empty,

    /// Unbalanced quotes or a dangling escape in a console line.
    #[error("unbalanced quoting in command line: {0}")]
    Quoting(String),

    /// A path that does not decode to the expected number of segments.
    #[error("invalid path arity: {path}")]
    Arity {
        /// The offending path.
        path: String,
    },

    /// JSON text that is not valid JSON.
    #[error("invalid json payload: {0}")]
    Json(String),

    /// Binary payload that is not a valid packed map.
    #[error("invalid msgpack payload: {0}")]
    MsgPack(String),

    /// Decoded payload has the wrong shape (not a map or a list of maps).
    #[error("unexpected payload shape: {0}")]
    Shape(String),

    /// A query component that could not be percent-decoded.
    #[error("invalid query encoding: {0}")]
    Encoding(String),
}

/// A typed literal that does not parse as its tag demands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot cast {literal:?} as {kind}: {reason}")]
pub struct CastError {
    /// Canonical tag (`i+`, `d+`, ...).
    pub kind: &'static str,
    /// The literal that failed.
    pub literal: String,
    /// Underlying parser message.
    pub reason: String,
}

impl CastError {
    pub(crate) fn new(kind: &'static str, literal: &str, reason: impl ToString) -> Self {
        Self {
            kind,
            literal: literal.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Validation failure when building an `Action`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required parameters: {}", missing.join(", "))]
pub struct MissingFieldsError {
    /// Wire names of the absent keys (`_m`, `_c`, `_f`).
    pub missing: Vec<&'static str>,
}

/// Invalid permission rule definitions.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A parameter pattern is not a valid regular expression.
    #[error("invalid pattern for parameter {param:?}: {source}")]
    Pattern {
        /// Parameter name the pattern applies to.
        param: String,
        /// Regex compiler error.
        #[source]
        source: regex::Error,
    },
}

/// Failures loading a shortcut table.
#[derive(Debug, Error)]
pub enum ShortcutError {
    /// The alias file could not be read.
    #[error("failed to read shortcut file: {0}")]
    Io(#[from] std::io::Error),

    /// The alias file is not valid YAML or not a mapping.
    #[error("failed to parse shortcut file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A template entry has fields of the wrong type.
    #[error("invalid shortcut {alias:?}: {reason}")]
    Template {
        /// Alias name.
        alias: String,
        /// Why it was rejected.
        reason: String,
    },
}
