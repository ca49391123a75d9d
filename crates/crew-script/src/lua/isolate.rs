//! One-shot Lua interpreter for a single script invocation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mlua::{Function, Lua, LuaSerdeExt, MultiValue, Value as LuaValue};

use crate::runtime::entry_point;
use crate::sandbox::SandboxConfig;
use crate::scratch::ScratchStore;
use crate::types::{ScriptError, ScriptRequest, ScriptResponse, ScriptResult};

use super::bindings;

/// Raised from the instruction hook once the deadline passes.
const DEADLINE_EXCEEDED: &str = "crew: script deadline exceeded";

/// Instructions between deadline checks.
const HOOK_INTERVAL: u32 = 1000;

/// Re-raises errors from the protected-call primitives once the deadline
/// has passed. Receives the expiry check as its only argument.
const GUARD_PROTECTED_CALLS: &str = r#"
local expired = ...
local pack, unpack = table.pack, table.unpack
local raw_pcall, raw_xpcall, raw_resume = pcall, xpcall, coroutine.resume
local function settle(results)
  if not results[1] and expired() then
    error(results[2], 0)
  end
  return unpack(results, 1, results.n)
end
pcall = function(...) return settle(pack(raw_pcall(...))) end
xpcall = function(...) return settle(pack(raw_xpcall(...))) end
coroutine.resume = function(...) return settle(pack(raw_resume(...))) end
"#;

/// Globals removed before any script code runs.
const STRIPPED_GLOBALS: [&str; 8] = [
    "loadfile", "dofile", "load", "require", "package", "os", "io", "debug",
];

/// A fresh interpreter with the script API installed.
///
/// Dropping the isolate tears the interpreter down.
pub struct LuaIsolate {
    lua: Lua,
    name: String,
    sandbox: SandboxConfig,
    /// Set by the instruction hook once the deadline has passed.
    expired: Arc<AtomicBool>,
}

impl LuaIsolate {
    /// Create an interpreter for the script `name`.
    pub fn new(name: &str, sandbox: SandboxConfig, scratch: &ScratchStore) -> ScriptResult<Self> {
        let lua = Lua::new();
        let load_error = |e: mlua::Error| ScriptError::Load {
            name: name.to_string(),
            message: e.to_string(),
        };

        if sandbox.max_memory > 0 {
            lua.set_memory_limit(sandbox.max_memory)
                .map_err(load_error)?;
        }

        let globals = lua.globals();
        for global in STRIPPED_GLOBALS {
            globals.set(global, LuaValue::Nil).map_err(load_error)?;
        }

        let crew = bindings::create_crew_api(&lua, name).map_err(load_error)?;
        globals.set("crew", crew).map_err(load_error)?;

        let scratch = bindings::create_scratch_api(&lua, scratch).map_err(load_error)?;
        globals.set("scratch", scratch).map_err(load_error)?;

        let fs = bindings::create_fs_api(&lua, &sandbox).map_err(load_error)?;
        globals.set("fs", fs).map_err(load_error)?;

        let expired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&expired);
        let is_expired = lua
            .create_function(move |_, ()| Ok(flag.load(Ordering::Relaxed)))
            .map_err(load_error)?;
        lua.load(GUARD_PROTECTED_CALLS)
            .set_name("=crew")
            .call::<()>(is_expired)
            .map_err(load_error)?;

        Ok(Self {
            lua,
            name: name.to_string(),
            sandbox,
            expired,
        })
    }

    /// Run `source` and call the entry point for `request.method`.
    ///
    /// `post` and `put` fall back to `render` when the script does not
    /// define them.
    ///
    /// Once the deadline passes every later instruction batch raises again,
    /// and protected calls re-raise, so the run always ends as `Timeout`.
    pub fn invoke(&self, source: &[u8], request: &ScriptRequest) -> ScriptResult<ScriptResponse> {
        self.arm_deadline()?;
        let result = self.run(source, request);
        self.lua.remove_hook();

        if self.expired.load(Ordering::Relaxed) {
            return Err(self.timeout());
        }
        result
    }

    fn run(&self, source: &[u8], request: &ScriptRequest) -> ScriptResult<ScriptResponse> {
        let req = self
            .lua
            .to_value(request)
            .map_err(|e| self.load_error(e))?;
        self.lua
            .globals()
            .set("request", req.clone())
            .map_err(|e| self.load_error(e))?;

        self.lua
            .load(source)
            .set_name(self.name.as_str())
            .exec()
            .map_err(|e| self.classify(e, true))?;

        let entry = self.find_entry(entry_point(&request.method))?;
        let returned: MultiValue = entry.call(req).map_err(|e| self.classify(e, false))?;
        self.read_response(returned)
    }

    fn arm_deadline(&self) -> ScriptResult<()> {
        self.expired.store(false, Ordering::Relaxed);
        if self.sandbox.timeout_ms == 0 {
            return Ok(());
        }
        let deadline = Instant::now() + Duration::from_millis(self.sandbox.timeout_ms);
        let expired = Arc::clone(&self.expired);
        self.lua
            .set_hook(
                mlua::HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
                move |_lua, _debug| {
                    if expired.load(Ordering::Relaxed) || Instant::now() >= deadline {
                        expired.store(true, Ordering::Relaxed);
                        return Err(mlua::Error::RuntimeError(DEADLINE_EXCEEDED.to_string()));
                    }
                    Ok(mlua::VmState::Continue)
                },
            )
            .map_err(|e| self.load_error(e))
    }

    fn timeout(&self) -> ScriptError {
        ScriptError::Timeout {
            name: self.name.clone(),
            timeout_ms: self.sandbox.timeout_ms,
        }
    }

    fn find_entry(&self, preferred: &str) -> ScriptResult<Function> {
        let globals = self.lua.globals();
        let lookup = |name: &str| {
            globals
                .get::<Option<Function>>(name)
                .map_err(|e| ScriptError::BadReturn {
                    name: self.name.clone(),
                    message: format!("'{name}' is not a function: {e}"),
                })
        };

        if let Some(func) = lookup(preferred)? {
            return Ok(func);
        }
        if preferred != "render" {
            if let Some(func) = lookup("render")? {
                return Ok(func);
            }
        }
        Err(ScriptError::MissingEntryPoint {
            name: self.name.clone(),
            entry: preferred.to_string(),
        })
    }

    fn read_response(&self, returned: MultiValue) -> ScriptResult<ScriptResponse> {
        let bad = |message: String| ScriptError::BadReturn {
            name: self.name.clone(),
            message,
        };

        let mut values = returned.into_iter();
        let status = match values.next() {
            Some(LuaValue::Integer(i)) => i,
            Some(LuaValue::Number(n)) if n.fract() == 0.0 => n as i64,
            Some(other) => {
                return Err(bad(format!("status must be an integer, got {}", other.type_name())));
            }
            None => return Err(bad("expected (status, body), got nothing".into())),
        };
        let status = u16::try_from(status)
            .map_err(|_| bad(format!("status {status} is out of range")))?;

        let body = match values.next() {
            Some(LuaValue::String(s)) => s.to_string_lossy(),
            Some(LuaValue::Integer(i)) => i.to_string(),
            Some(LuaValue::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(bad(format!("body must be a string, got {}", other.type_name())));
            }
            None => return Err(bad("missing body".into())),
        };

        Ok(ScriptResponse { status, body })
    }

    fn load_error(&self, e: mlua::Error) -> ScriptError {
        ScriptError::Load {
            name: self.name.clone(),
            message: e.to_string(),
        }
    }

    /// Map an interpreter error onto the matching failure.
    fn classify(&self, e: mlua::Error, loading: bool) -> ScriptError {
        let message = e.to_string();
        if message.contains(DEADLINE_EXCEEDED) {
            self.timeout()
        } else if matches!(e, mlua::Error::MemoryError(_)) || message.contains("not enough memory") {
            ScriptError::Sandbox {
                name: self.name.clone(),
                message: "memory limit exceeded".to_string(),
            }
        } else if loading {
            ScriptError::Load {
                name: self.name.clone(),
                message,
            }
        } else {
            ScriptError::Execution {
                name: self.name.clone(),
                message,
            }
        }
    }
}

impl Drop for LuaIsolate {
    fn drop(&mut self) {
        tracing::trace!(script = %self.name, "isolate torn down");
    }
}
