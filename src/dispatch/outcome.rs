//! Terminal states of a dispatched command.

use crate::error::DispatchError;
use bee_proto::Value;

/// Doc text returned for undocumented functions.
pub const MISSING_DOC: &str = "Missing doc.";

/// How a command ended.
#[derive(Debug)]
pub enum Outcome {
    /// The handler returned a value.
    Succeeded(Value),
    /// Handed to a background task; its result is delivered later.
    Spawned,
    /// `_help`/`_h` was set: the function's doc instead of a call.
    HelpReturned(String),
    /// The handler failed or panicked.
    Failed(DispatchError),
    /// No rule admitted the action.
    Denied(DispatchError),
    /// Module, class or function could not be resolved.
    NotFound(DispatchError),
    /// The payload never became a valid action.
    Rejected(DispatchError),
}

impl Outcome {
    /// Metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "succeeded",
            Self::Spawned => "spawned",
            Self::HelpReturned(_) => "help",
            Self::Failed(_) => "failed",
            Self::Denied(_) => "denied",
            Self::NotFound(_) => "not_found",
            Self::Rejected(_) => "rejected",
        }
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            Self::Failed(e) | Self::Denied(e) | Self::NotFound(e) | Self::Rejected(e) => Some(e),
            Self::Succeeded(_) | Self::Spawned | Self::HelpReturned(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error().is_none()
    }
}

impl From<DispatchError> for Outcome {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Protocol(_) => Self::Rejected(err),
            DispatchError::Denied { .. } => Self::Denied(err),
            DispatchError::UnknownModule { .. }
            | DispatchError::UnknownClass { .. }
            | DispatchError::UnknownFunction { .. } => Self::NotFound(err),
            DispatchError::Handler(_) | DispatchError::Panicked(_) => Self::Failed(err),
        }
    }
}
