//! The error type shared by every hostkit crate.
//!
//! Plugin hooks and posted tasks fail with [`AppError`] too, so the
//! orchestrator can log, aggregate and return failures without knowing
//! where they came from.

use std::any::Any;
use std::fmt;
use thiserror::Error;

/// What went wrong, independent of where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Unknown plugin, queue or option.
    NotFound,
    /// A value was rejected: mistyped option, dependency cycle.
    Validation,
    /// Bad or missing configuration, or no reactor to work with.
    Configuration,
    /// Something that must be unique already exists.
    Conflict,
    /// A plugin hook reported failure.
    Plugin,
    /// A posted task reported failure.
    Task,
    /// A task or hook panicked.
    Panic,
    /// JSON (de)serialization failed.
    Serialization,
    /// Everything else.
    Internal,
}

impl ErrorKind {
    /// Stable upper-case code used in messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::Configuration => "CONFIGURATION",
            Self::Conflict => "CONFLICT",
            Self::Plugin => "PLUGIN",
            Self::Task => "TASK",
            Self::Panic => "PANIC",
            Self::Serialization => "SERIALIZATION",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every fallible hostkit operation, plugin hook and task.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// Category.
    pub kind: ErrorKind,
    /// Message shown to operators.
    pub message: String,
    /// Underlying cause, when there is one.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Builds an error without a cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error wrapping `source`.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(kind, message)
        }
    }

    /// `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// `Conflict` error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// `Plugin` error, for hooks that refuse to proceed.
    pub fn plugin(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Plugin, message)
    }

    /// `Task` error, for posted work that failed.
    pub fn task(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Task, message)
    }

    /// `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Build a panic error from a `catch_unwind` payload.
    ///
    /// `origin` names what was running (a plugin hook, "application loop", ...).
    pub fn from_panic(origin: &str, payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(ErrorKind::Panic, format!("{origin} panicked: {detail}"))
    }

    /// Returns `true` if this error was produced by a caught panic.
    pub fn is_panic(&self) -> bool {
        self.kind == ErrorKind::Panic
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        let message = format!("Invalid JSON value: {err}");
        Self::with_source(ErrorKind::Serialization, message, err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        let message = format!("Invalid configuration: {err}");
        Self::with_source(ErrorKind::Configuration, message, err)
    }
}
