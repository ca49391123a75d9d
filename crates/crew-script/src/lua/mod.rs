//! Lua 5.4 runtime for page scripts, via mlua.

mod bindings;
mod isolate;

pub use isolate::LuaIsolate;
