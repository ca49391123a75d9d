//! Core types for page scripts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors that can occur while running a page script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The chunk failed to compile or run its top level.
    #[error("Failed to load script '{name}': {message}")]
    Load { name: String, message: String },

    /// The entry point raised an error.
    #[error("Script '{name}' execution error: {message}")]
    Execution { name: String, message: String },

    /// Neither the method's entry point nor `render` is defined.
    #[error("Script '{name}' defines no '{entry}' function")]
    MissingEntryPoint { name: String, entry: String },

    /// The entry point did not return `(status, body)`.
    #[error("Script '{name}' returned an invalid result: {message}")]
    BadReturn { name: String, message: String },

    /// The script answered a page render with a non-200 status.
    #[error("Script '{name}' returned status {status}: {body}")]
    Status {
        name: String,
        status: u16,
        body: String,
    },

    /// The script ran past its deadline.
    #[error("Script '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    /// The script hit a sandbox ceiling other than time.
    #[error("Script '{name}' violated its sandbox: {message}")]
    Sandbox { name: String, message: String },

    /// The blocking task running the script panicked or was cancelled.
    #[error("Script '{name}' task failed: {message}")]
    Join { name: String, message: String },
}

/// A value held in the scratch space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScratchValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
}

impl std::fmt::Display for ScratchValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for ScratchValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ScratchValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for ScratchValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for ScratchValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for ScratchValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// The request as seen by a script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// Upper-case HTTP method.
    pub method: String,

    /// Request path.
    pub path: String,

    /// Header names are lower-case.
    pub headers: HashMap<String, String>,

    /// Query string parameters.
    pub query: HashMap<String, String>,

    /// Query parameters merged with the decoded body (body wins).
    pub params: HashMap<String, String>,
}

impl ScriptRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Default::default()
        }
    }
}

/// What an entry point returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptResponse {
    pub status: u16,
    pub body: String,
}

impl ScriptResponse {
    /// Accept the response as a page body; anything but 200 is a failure.
    pub fn into_page_body(self, name: &str) -> ScriptResult<String> {
        if self.status == 200 {
            Ok(self.body)
        } else {
            Err(ScriptError::Status {
                name: name.to_string(),
                status: self.status,
                body: self.body,
            })
        }
    }
}
