//! Unified error handling for bee-ng.
//!
//! This module provides the error hierarchy for handler code and the
//! dispatcher, with metric labels and bus event generation.

use crate::bus::BusError;
use bee_proto::ProtocolError;
use serde_json::{Value as Json, json};
use thiserror::Error;

// ============================================================================
// Handler Errors (raised by business logic)
// ============================================================================

/// Errors a handler function can return.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("missing parameter: {0}")]
    MissingParam(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("access denied")]
    AccessDenied,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// Free-form failure text, shown to the caller as-is.
    #[error("{0}")]
    Failed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingParam(_) => "missing_param",
            Self::InvalidParam { .. } => "invalid_param",
            Self::AccessDenied => "access_denied",
            Self::Database(_) => "database_error",
            Self::Bus(_) => "bus_error",
            Self::Failed(_) => "handler_failed",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Result type for handler functions.
pub type HandlerResult = Result<bee_proto::Value, HandlerError>;

// ============================================================================
// Dispatch Errors (per-command failure taxonomy)
// ============================================================================

/// Why a command did not produce a result.
///
/// None of these escape the dispatcher: each one is logged, counted and
/// published on the bus, then the command is discarded.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Parse, cast or missing-field failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Permission denied!")]
    Denied { target: String },

    #[error("Module not found, action-> {target}")]
    UnknownModule { target: String, reason: String },

    #[error("module {module} has no class {class}")]
    UnknownClass { module: String, class: String },

    #[error("{module}.{class} has no function {function}")]
    UnknownFunction {
        module: String,
        class: String,
        function: String,
    },

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl DispatchError {
    /// Get a static error code string for metrics labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Protocol(e) => e.error_code(),
            Self::Denied { .. } => "permission_denied",
            Self::UnknownModule { .. } => "unknown_module",
            Self::UnknownClass { .. } => "unknown_class",
            Self::UnknownFunction { .. } => "unknown_function",
            Self::Handler(e) => e.error_code(),
            Self::Panicked(_) => "panicked",
        }
    }

    /// Bus topic the failure is reported on.
    ///
    /// Admission failures go to `error`; failures past module resolution
    /// go to `exp`.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Protocol(_) | Self::Denied { .. } | Self::UnknownModule { .. } => "error",
            Self::UnknownClass { .. }
            | Self::UnknownFunction { .. }
            | Self::Handler(_)
            | Self::Panicked(_) => "exp",
        }
    }

    /// Structured event payload: `desc`, `code` and an optional `detail`.
    pub fn to_event(&self) -> Json {
        let detail = match self {
            Self::Denied { target } => Some(target.clone()),
            Self::UnknownModule { reason, .. } => Some(reason.clone()),
            _ => None,
        };
        let mut event = json!({
            "desc": self.to_string(),
            "code": self.error_code(),
        });
        if let Some(detail) = detail {
            event["detail"] = Json::String(detail);
        }
        event
    }
}
