//! Sandboxed Lua page scripts for crew.
//!
//! A script node is a Lua chunk defining one function per HTTP method:
//!
//! ```lua
//! function render(req)            -- GET, and fallback for the others
//!   local hits = (scratch.get("hits") or 0) + 1
//!   scratch.set("hits", hits)
//!   return 200, "<p>" .. hits .. " visits</p>"
//! end
//!
//! function post(req)
//!   fs.create("inbox/" .. req.params.id .. ".md", req.params.body)
//!   return 201, "stored"
//! end
//! ```
//!
//! # Execution model
//!
//! Every invocation gets a fresh interpreter ([`lua::LuaIsolate`]) on the
//! blocking thread pool. The interpreter is dropped when the invocation ends,
//! whatever the outcome; nothing is reused between requests. The only state
//! scripts share is the injected [`ScratchStore`].
//!
//! Scripts see these globals:
//!
//! - `request`: `method`, `path`, `headers`, `query`, `params` (also passed
//!   as the entry point's only argument)
//! - `scratch`: `get`, `set`, `delete` on the shared scratch space; values are
//!   strings, numbers or booleans
//! - `fs`: `read`, `create`, `delete`, `exists` on paths relative to the
//!   content root; directories cannot be deleted
//! - `crew`: `version`, `log_info`, `log_warn`, `log_error`

pub mod lua;
mod runtime;
mod sandbox;
mod scratch;
mod types;

pub use runtime::{ScriptRunner, entry_point};
pub use sandbox::{Permission, SandboxConfig, SandboxViolation, ViolationKind};
pub use scratch::ScratchStore;
pub use types::{ScratchValue, ScriptError, ScriptRequest, ScriptResponse, ScriptResult};
