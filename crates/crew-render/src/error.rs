//! Error types for page rendering.

use std::path::PathBuf;

use crew_core::TreeError;
use crew_script::ScriptError;
use thiserror::Error;

use crate::rpc::RpcError;

/// Errors that abort a page render.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("Remote render of {url} failed: {source}")]
    Rpc {
        url: String,
        #[source]
        source: RpcError,
    },

    /// A remote-procedure node without an endpoint.
    #[error("No remote endpoint configured for {url}")]
    MissingEndpoint { url: String },

    /// Only script nodes accept POST and PUT.
    #[error("Method {method} not allowed on {url}")]
    MethodNotAllowed { method: String, url: String },

    /// The page body rendered but its navigation could not be built.
    #[error("Navigation for {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: TreeError,
    },

    /// A blocking task panicked or was cancelled.
    #[error("Blocking task failed: {0}")]
    Join(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
}

impl RenderError {
    /// Create an IO error, folding a missing file into `NotFound`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Tree(TreeError::io(path, source))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Tree(e) if e.is_not_found())
    }
}
