//! Async entry point for running page scripts.

use std::time::Instant;

use crate::lua::LuaIsolate;
use crate::sandbox::SandboxConfig;
use crate::scratch::ScratchStore;
use crate::types::{ScriptError, ScriptRequest, ScriptResponse, ScriptResult};

/// Entry point function for an HTTP method.
pub fn entry_point(method: &str) -> &'static str {
    if method.eq_ignore_ascii_case("POST") {
        "post"
    } else if method.eq_ignore_ascii_case("PUT") {
        "put"
    } else {
        "render"
    }
}

/// Runs scripts with a fixed sandbox and a shared scratch store.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    sandbox: SandboxConfig,
    scratch: ScratchStore,
}

impl ScriptRunner {
    pub fn new(sandbox: SandboxConfig, scratch: ScratchStore) -> Self {
        Self { sandbox, scratch }
    }

    pub fn sandbox(&self) -> &SandboxConfig {
        &self.sandbox
    }

    /// The scratch store injected into every script.
    pub fn scratch(&self) -> &ScratchStore {
        &self.scratch
    }

    /// Run `source` for `request` on the blocking pool.
    ///
    /// A fresh interpreter is built for the call and dropped before this
    /// returns, including on error or panic.
    pub async fn run(
        &self,
        name: &str,
        source: Vec<u8>,
        request: ScriptRequest,
    ) -> ScriptResult<ScriptResponse> {
        let sandbox = self.sandbox.clone();
        let scratch = self.scratch.clone();
        let task_name = name.to_string();
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            let isolate = LuaIsolate::new(&task_name, sandbox, &scratch)?;
            isolate.invoke(&source, &request)
        })
        .await
        .map_err(|e| ScriptError::Join {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        match &result {
            Ok(resp) => tracing::debug!(
                script = name,
                status = resp.status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "script finished"
            ),
            Err(e) => tracing::warn!(script = name, error = %e, "script failed"),
        }
        result
    }
}
