//! Structured error types shared across OLM crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`OlmError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (axis names, case ids, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the library pipeline.
///
/// Configuration and structural families are fatal to a whole run, while
/// [`OlmError::External`] is localised to a single case by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum OlmError {
    /// Malformed axes, schedules, mappings or options detected before dispatch.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// An external collaborator (solver, templater process) failed.
    #[error("external failure: {0}")]
    External(ErrorInfo),
    /// The interpolation grid is missing at least one coordinate combination.
    #[error("incomplete grid: {0}")]
    IncompleteGrid(ErrorInfo),
    /// Assembly-time structural violation of the library schema.
    #[error("schema error: {0}")]
    Schema(ErrorInfo),
    /// A consistency check did not meet its acceptance criterion.
    #[error("tolerance failure: {0}")]
    Tolerance(ErrorInfo),
    /// Serialization and deserialization errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Filesystem errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl OlmError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            OlmError::Configuration(info)
            | OlmError::External(info)
            | OlmError::IncompleteGrid(info)
            | OlmError::Schema(info)
            | OlmError::Tolerance(info)
            | OlmError::Serde(info)
            | OlmError::Io(info) => info,
        }
    }

    /// Shorthand for a configuration error with the given code and message.
    pub fn configuration(code: impl Into<String>, message: impl Into<String>) -> Self {
        OlmError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a schema error with the given code and message.
    pub fn schema(code: impl Into<String>, message: impl Into<String>) -> Self {
        OlmError::Schema(ErrorInfo::new(code, message))
    }

    /// Shorthand for an io error wrapping any displayable source.
    pub fn io(code: impl Into<String>, err: impl ToString) -> Self {
        OlmError::Io(ErrorInfo::new(code, err.to_string()))
    }

    /// Returns true for the families that must abort a run before dispatch.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, OlmError::External(_) | OlmError::Tolerance(_))
    }
}
